//! Deploy command with duplicate filtering and version upgrade

use std::sync::Arc;

use flowx_core::events::{FlowEvent, FlowEventType};
use flowx_core::model::DeploymentEntity;
use flowx_core::{Command, CommandContext, Entity, EntityKind, FlowXError, Result};
use tracing::{debug, info};

/// Verdict whether a new deployment differs from the stored one
pub trait DeploymentComparator: Send + Sync {
    fn differ(&self, deployment: &DeploymentEntity, saved: &DeploymentEntity) -> bool;
}

/// Compares release versions when both sides carry one, otherwise the
/// bytes of every resource the new deployment supplies
///
/// Generated resources (diagrams and the like) are ignored; a resource
/// missing from the saved deployment is a difference.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultDeploymentComparator;

impl DeploymentComparator for DefaultDeploymentComparator {
    fn differ(&self, deployment: &DeploymentEntity, saved: &DeploymentEntity) -> bool {
        if let (Some(new_release), Some(saved_release)) = (
            deployment.project_release_version.as_deref(),
            saved.project_release_version.as_deref(),
        ) {
            return new_release != saved_release;
        }

        deployment.resources.iter().any(|(name, resource)| {
            match saved.resources.get(name) {
                None => true,
                Some(saved_resource) if saved_resource.generated => false,
                Some(saved_resource) => saved_resource.bytes != resource.bytes,
            }
        })
    }
}

pub struct DeployCmd {
    deployment: DeploymentEntity,
    duplicate_filter: bool,
    enforced_version: Option<i32>,
    comparator: Arc<dyn DeploymentComparator>,
}

impl DeployCmd {
    pub fn new(deployment: DeploymentEntity) -> Self {
        Self {
            deployment,
            duplicate_filter: false,
            enforced_version: None,
            comparator: Arc::new(DefaultDeploymentComparator),
        }
    }

    /// Skip the deployment when an identical one with the same name exists
    pub fn enable_duplicate_filtering(mut self) -> Self {
        self.duplicate_filter = true;
        self
    }

    /// Deploy under this exact version; only an equal saved version counts
    /// as a duplicate
    pub fn enforced_version(mut self, version: i32) -> Self {
        self.enforced_version = Some(version);
        self
    }

    pub fn comparator(mut self, comparator: Arc<dyn DeploymentComparator>) -> Self {
        self.comparator = comparator;
        self
    }

    fn differs_from(&self, deployment: &DeploymentEntity, saved: &DeploymentEntity) -> bool {
        match self.enforced_version {
            Some(version) => version != saved.version,
            None => self.comparator.differ(deployment, saved),
        }
    }
}

impl std::fmt::Debug for DeployCmd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeployCmd")
            .field("name", &self.deployment.name)
            .field("duplicate_filter", &self.duplicate_filter)
            .field("enforced_version", &self.enforced_version)
            .finish()
    }
}

impl Command for DeployCmd {
    type Output = DeploymentEntity;

    fn name(&self) -> &str {
        "deploy"
    }

    fn execute(&self, ctx: &mut CommandContext) -> Result<DeploymentEntity> {
        if self.deployment.name.trim().is_empty() {
            return Err(FlowXError::InvalidDeployment {
                reason: "deployment name must not be blank".to_string(),
            }
            .into());
        }

        let mut deployment = self.deployment.clone();
        deployment.deployment_time = Some(ctx.now());
        deployment.version = 1;

        if self.duplicate_filter {
            let existing = ctx.store().find_latest_deployment_by_name(
                &deployment.name,
                deployment.tenant_id.as_deref(),
            )?;
            if let Some(saved) = existing {
                if !self.differs_from(&deployment, &saved) {
                    debug!(
                        deployment_id = saved.id(),
                        name = %saved.name,
                        "unchanged deployment, keeping the existing one"
                    );
                    return Ok(saved);
                }
                deployment.version = saved.version + 1;
            }
        }
        if let Some(version) = self.enforced_version {
            deployment.version = version;
        }

        deployment.is_new = true;
        let inserted = ctx.insert(deployment)?.clone();
        ctx.dispatch(FlowEvent::entity(
            FlowEventType::EntityInitialized,
            EntityKind::Deployment,
            inserted.id(),
        ));
        info!(
            deployment_id = inserted.id(),
            name = %inserted.name,
            version = inserted.version,
            "deployment registered"
        );

        Ok(inserted)
    }
}
