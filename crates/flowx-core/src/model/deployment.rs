use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityHeader, EntityKind, HeaderToken};

/// A named artifact inside a deployment
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Resource {
    pub bytes: Vec<u8>,
    /// Produced by the engine (e.g. diagrams), not supplied by the deployer
    pub generated: bool,
}

impl Resource {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            generated: false,
        }
    }

    pub fn generated(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            generated: true,
        }
    }
}

/// Persisted columns of a deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentState {
    pub name: String,
    pub tenant_id: Option<String>,
    pub deployment_time: Option<DateTime<Utc>>,
    pub version: i32,
    pub project_release_version: Option<String>,
    pub resources: BTreeMap<String, Resource>,
}

#[derive(Debug, Clone)]
pub struct DeploymentEntity {
    header: EntityHeader,
    pub name: String,
    pub tenant_id: Option<String>,
    pub deployment_time: Option<DateTime<Utc>>,
    pub version: i32,
    pub project_release_version: Option<String>,
    pub resources: BTreeMap<String, Resource>,
    /// Set while the deployment is being created; never persisted
    pub is_new: bool,
}

impl DeploymentEntity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            header: EntityHeader::new(),
            name: name.into(),
            tenant_id: None,
            deployment_time: None,
            version: 1,
            project_release_version: None,
            resources: BTreeMap::new(),
            is_new: true,
        }
    }

    pub fn restore(header: EntityHeader, state: DeploymentState) -> Self {
        Self {
            header,
            name: state.name,
            tenant_id: state.tenant_id,
            deployment_time: state.deployment_time,
            version: state.version,
            project_release_version: state.project_release_version,
            resources: state.resources,
            is_new: false,
        }
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn add_resource(&mut self, name: impl Into<String>, resource: Resource) {
        self.resources.insert(name.into(), resource);
    }
}

impl Entity for DeploymentEntity {
    type State = DeploymentState;
    const KIND: EntityKind = EntityKind::Deployment;

    fn header(&self) -> &EntityHeader {
        &self.header
    }

    fn header_slot(&mut self, _token: HeaderToken) -> &mut EntityHeader {
        &mut self.header
    }

    fn persistent_state(&self) -> DeploymentState {
        DeploymentState {
            name: self.name.clone(),
            tenant_id: self.tenant_id.clone(),
            deployment_time: self.deployment_time,
            version: self.version,
            project_release_version: self.project_release_version.clone(),
            resources: self.resources.clone(),
        }
    }
}
