use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::timer_job::TimerJobEntity;
use crate::entity::{Entity, EntityHeader, EntityKind, HeaderToken};

/// Work description shared by timer jobs and executable jobs
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JobPayload {
    /// Key of the handler that runs the job (e.g. "trigger-timer")
    pub handler_type: String,
    pub handler_configuration: Option<String>,
    pub execution_id: Option<String>,
    pub process_instance_id: Option<String>,
    pub process_definition_id: Option<String>,
    pub retries: i32,
    pub exclusive: bool,
    pub exception_message: Option<String>,
    pub tenant_id: Option<String>,
}

impl JobPayload {
    pub fn new(handler_type: impl Into<String>) -> Self {
        Self {
            handler_type: handler_type.into(),
            retries: 3,
            exclusive: true,
            ..Self::default()
        }
    }
}

/// Persisted columns of an executable job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobState {
    pub due_date: Option<DateTime<Utc>>,
    pub lock_owner: Option<String>,
    pub lock_expiration_time: Option<DateTime<Utc>>,
    pub payload: JobPayload,
}

/// Executable job - the dispatch-ready form of a claimed timer
#[derive(Debug, Clone)]
pub struct JobEntity {
    header: EntityHeader,
    pub due_date: Option<DateTime<Utc>>,
    pub lock_owner: Option<String>,
    pub lock_expiration_time: Option<DateTime<Utc>>,
    pub payload: JobPayload,
    pub created_at: DateTime<Utc>,
}

impl JobEntity {
    pub fn new(payload: JobPayload, created_at: DateTime<Utc>) -> Self {
        Self {
            header: EntityHeader::new(),
            due_date: None,
            lock_owner: None,
            lock_expiration_time: None,
            payload,
            created_at,
        }
    }

    /// Executable counterpart of a claimed timer job
    ///
    /// The payload and the claim are carried over so the acquirer that won
    /// the timer also owns the resulting job. The id is left unassigned.
    pub fn from_timer_job(timer: &TimerJobEntity, now: DateTime<Utc>) -> Self {
        Self {
            header: EntityHeader::new(),
            due_date: Some(timer.due_date),
            lock_owner: timer.lock_owner.clone(),
            lock_expiration_time: timer.lock_expiration_time,
            payload: timer.payload.clone(),
            created_at: now,
        }
    }

    /// Rebuild a job read from the store
    pub fn restore(header: EntityHeader, state: JobState, created_at: DateTime<Utc>) -> Self {
        Self {
            header,
            due_date: state.due_date,
            lock_owner: state.lock_owner,
            lock_expiration_time: state.lock_expiration_time,
            payload: state.payload,
            created_at,
        }
    }
}

impl Entity for JobEntity {
    type State = JobState;
    const KIND: EntityKind = EntityKind::Job;

    fn header(&self) -> &EntityHeader {
        &self.header
    }

    fn header_slot(&mut self, _token: HeaderToken) -> &mut EntityHeader {
        &mut self.header
    }

    fn persistent_state(&self) -> JobState {
        JobState {
            due_date: self.due_date,
            lock_owner: self.lock_owner.clone(),
            lock_expiration_time: self.lock_expiration_time,
            payload: self.payload.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_from_timer_job_carries_claim_and_payload() {
        let due = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut timer = TimerJobEntity::new(due, JobPayload::new("trigger-timer"), due);
        timer.lock("node-a", due + Duration::minutes(5));

        let job = JobEntity::from_timer_job(&timer, due + Duration::seconds(1));
        assert!(job.header().id().is_none());
        assert_eq!(job.lock_owner.as_deref(), Some("node-a"));
        assert_eq!(job.due_date, Some(due));
        assert_eq!(job.payload.handler_type, "trigger-timer");
    }

    #[test]
    fn test_payload_defaults() {
        let payload = JobPayload::new("async-continuation");
        assert_eq!(payload.retries, 3);
        assert!(payload.exclusive);
    }
}
