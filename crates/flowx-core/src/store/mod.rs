//! Durable store seam
//!
//! The command context reads through [`DataStore`] and writes its flush plan
//! through one [`StoreTransaction`]. Updates and deletes are
//! compare-and-set on the entity revision: when the stored revision has
//! moved, the store reports `ExErrorKind::OptimisticLock`.

pub mod memory;

use chrono::{DateTime, Utc};

use crate::entity::{Entity, Persistable};
use crate::errors::{ExError, ExErrorKind, FlowXError, Result};
use crate::model::{DeploymentEntity, JobEntity, TimerJobEntity};

pub use memory::{MemoryStore, Statement, StatementOp};

/// Read access plus transaction factory
pub trait DataStore: Send + Sync {
    /// Open a write transaction
    ///
    /// # Errors
    ///
    /// Persistence failures opening the transaction.
    fn begin(&self) -> Result<Box<dyn StoreTransaction + '_>>;

    /// # Errors
    ///
    /// Persistence failures.
    fn find_timer_job(&self, id: &str) -> Result<Option<TimerJobEntity>>;

    /// Timer jobs due at or before `now` that nobody holds a live claim on,
    /// oldest due date first, at most `limit` rows
    ///
    /// # Errors
    ///
    /// Persistence failures.
    fn find_due_timer_jobs(&self, now: DateTime<Utc>, limit: usize)
        -> Result<Vec<TimerJobEntity>>;

    /// # Errors
    ///
    /// Persistence failures.
    fn list_timer_jobs(&self) -> Result<Vec<TimerJobEntity>>;

    /// # Errors
    ///
    /// Persistence failures.
    fn find_job(&self, id: &str) -> Result<Option<JobEntity>>;

    /// # Errors
    ///
    /// Persistence failures.
    fn list_jobs(&self) -> Result<Vec<JobEntity>>;

    /// # Errors
    ///
    /// Persistence failures.
    fn find_deployment(&self, id: &str) -> Result<Option<DeploymentEntity>>;

    /// Highest-version deployment with this name within the tenant
    ///
    /// # Errors
    ///
    /// Persistence failures.
    fn find_latest_deployment_by_name(
        &self,
        name: &str,
        tenant_id: Option<&str>,
    ) -> Result<Option<DeploymentEntity>>;
}

/// One all-or-nothing write batch
pub trait StoreTransaction {
    /// Write a new row at revision 1
    ///
    /// # Errors
    ///
    /// `AlreadyExists` for a duplicate id, persistence failures.
    fn insert(&mut self, entity: &dyn Persistable) -> Result<()>;

    /// Write the entity's state if the stored revision still matches
    ///
    /// # Errors
    ///
    /// `OptimisticLock` when the row moved or vanished.
    fn update(&mut self, entity: &dyn Persistable) -> Result<()>;

    /// Remove the row if the stored revision still matches
    ///
    /// # Errors
    ///
    /// `OptimisticLock` when the row moved or vanished.
    fn delete(&mut self, entity: &dyn Persistable) -> Result<()>;

    /// # Errors
    ///
    /// Persistence failures; nothing is applied.
    fn commit(self: Box<Self>) -> Result<()>;

    /// # Errors
    ///
    /// Persistence failures.
    fn rollback(self: Box<Self>) -> Result<()>;
}

/// Recover the concrete entity behind a [`Persistable`]
///
/// # Errors
///
/// `Internal` when the entity is not an `E`.
pub fn downcast_entity<E: Entity>(entity: &dyn Persistable) -> Result<&E> {
    entity.as_any().downcast_ref::<E>().ok_or_else(|| {
        ExError::new(ExErrorKind::Internal)
            .with_entity_kind(entity.entity_kind())
            .with_message(format!("store received a {} it cannot map", entity.entity_kind()))
    })
}

/// The id a write needs; entities reach the store only after insert assigned one
///
/// # Errors
///
/// `MissingId` for an entity without id.
pub fn require_id(entity: &dyn Persistable) -> Result<&str> {
    entity.entity_header().id().ok_or_else(|| {
        FlowXError::MissingId {
            kind: entity.entity_kind(),
        }
        .into()
    })
}

/// Lost compare-and-set on `entity`
pub fn stale_revision(entity: &dyn Persistable) -> ExError {
    FlowXError::StaleRevision {
        kind: entity.entity_kind(),
        id: entity.entity_header().id().unwrap_or_default().to_string(),
        revision: entity.entity_header().revision(),
    }
    .into()
}
