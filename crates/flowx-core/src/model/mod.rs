//! Persisted entity types
//!
//! Timer jobs, executable jobs and deployments, each with an explicit
//! value snapshot used for dirty detection.

pub mod deployment;
pub mod job;
pub mod timer_job;

pub use deployment::{DeploymentEntity, DeploymentState, Resource};
pub use job::{JobEntity, JobPayload, JobState};
pub use timer_job::{TimerJobEntity, TimerJobState, TIMER_JOB_TYPE};

use crate::entity::Entity;
use crate::errors::Result;
use crate::store::DataStore;

/// Entities a context can fetch from the store by id
pub trait Loadable: Entity + Sized {
    /// # Errors
    ///
    /// Store failures; a missing row is `Ok(None)`.
    fn load(store: &dyn DataStore, id: &str) -> Result<Option<Self>>;
}

impl Loadable for TimerJobEntity {
    fn load(store: &dyn DataStore, id: &str) -> Result<Option<Self>> {
        store.find_timer_job(id)
    }
}

impl Loadable for JobEntity {
    fn load(store: &dyn DataStore, id: &str) -> Result<Option<Self>> {
        store.find_job(id)
    }
}

impl Loadable for DeploymentEntity {
    fn load(store: &dyn DataStore, id: &str) -> Result<Option<Self>> {
        store.find_deployment(id)
    }
}
