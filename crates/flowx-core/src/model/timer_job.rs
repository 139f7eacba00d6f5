use chrono::{DateTime, Utc};

use super::job::JobPayload;
use crate::entity::{Entity, EntityHeader, EntityKind, HeaderToken};

pub const TIMER_JOB_TYPE: &str = "timer";

/// Persisted columns of a timer job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerJobState {
    pub due_date: DateTime<Utc>,
    pub lock_owner: Option<String>,
    pub lock_expiration_time: Option<DateTime<Utc>>,
    pub payload: JobPayload,
}

/// A due-time-triggered job awaiting claim
#[derive(Debug, Clone)]
pub struct TimerJobEntity {
    header: EntityHeader,
    pub due_date: DateTime<Utc>,
    pub lock_owner: Option<String>,
    pub lock_expiration_time: Option<DateTime<Utc>>,
    pub payload: JobPayload,
    pub created_at: DateTime<Utc>,
}

impl TimerJobEntity {
    pub fn new(due_date: DateTime<Utc>, payload: JobPayload, created_at: DateTime<Utc>) -> Self {
        Self {
            header: EntityHeader::new(),
            due_date,
            lock_owner: None,
            lock_expiration_time: None,
            payload,
            created_at,
        }
    }

    /// Rebuild a timer job read from the store
    pub fn restore(header: EntityHeader, state: TimerJobState, created_at: DateTime<Utc>) -> Self {
        Self {
            header,
            due_date: state.due_date,
            lock_owner: state.lock_owner,
            lock_expiration_time: state.lock_expiration_time,
            payload: state.payload,
            created_at,
        }
    }

    /// Stamp the claim marker
    pub fn lock(&mut self, owner: impl Into<String>, until: DateTime<Utc>) {
        self.lock_owner = Some(owner.into());
        self.lock_expiration_time = Some(until);
    }

    pub fn unlock(&mut self) {
        self.lock_owner = None;
        self.lock_expiration_time = None;
    }

    pub fn is_due_at(&self, now: DateTime<Utc>) -> bool {
        self.due_date <= now
    }

    /// Claimed by someone and the claim has not expired
    pub fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        match (&self.lock_owner, self.lock_expiration_time) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(_), Some(expires)) => expires > now,
        }
    }

    /// Due and free to claim
    pub fn is_acquirable_at(&self, now: DateTime<Utc>) -> bool {
        self.is_due_at(now) && !self.is_locked_at(now)
    }
}

impl Entity for TimerJobEntity {
    type State = TimerJobState;
    const KIND: EntityKind = EntityKind::TimerJob;

    fn header(&self) -> &EntityHeader {
        &self.header
    }

    fn header_slot(&mut self, _token: HeaderToken) -> &mut EntityHeader {
        &mut self.header
    }

    fn persistent_state(&self) -> TimerJobState {
        TimerJobState {
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

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(secs)
    }

    #[test]
    fn test_due_and_lock_windows() {
        let mut timer = TimerJobEntity::new(at(10), JobPayload::new("trigger-timer"), at(0));
        assert!(!timer.is_due_at(at(9)));
        assert!(timer.is_acquirable_at(at(10)));

        timer.lock("node-a", at(20));
        assert!(timer.is_locked_at(at(15)));
        assert!(!timer.is_acquirable_at(at(15)));

        // expired claims can be taken over
        assert!(timer.is_acquirable_at(at(20)));

        timer.unlock();
        assert!(!timer.is_locked_at(at(15)));
    }

    #[test]
    fn test_lock_changes_persistent_state() {
        let mut timer = TimerJobEntity::new(at(0), JobPayload::new("trigger-timer"), at(0));
        let before = timer.persistent_state();
        timer.lock("node-a", at(60));
        assert_ne!(before, timer.persistent_state());
    }
}
