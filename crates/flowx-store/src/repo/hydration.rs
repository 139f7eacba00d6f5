//! Hydration layer - rebuilds entities from SQLite rows
//!
//! Timestamps are stored as milliseconds since the Unix epoch.

#![allow(clippy::result_large_err)]

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use flowx_core::model::{
    DeploymentEntity, DeploymentState, JobEntity, JobPayload, JobState, Resource,
    TimerJobEntity, TimerJobState,
};
use flowx_core::EntityHeader;
use rusqlite::Row;

use crate::errors::conversion_error;

/// Column list shared by `timer_jobs` and `jobs`, in hydration order
pub const JOB_COLUMNS: &str = "id, revision, due_date, lock_owner, lock_expiration_time, \
     handler_type, handler_configuration, execution_id, process_instance_id, \
     process_definition_id, retries, exclusive, exception_message, tenant_id, created_at";

pub const DEPLOYMENT_COLUMNS: &str =
    "id, revision, name, tenant_id, deployment_time, version, project_release_version";

pub fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn from_millis(column: usize, millis: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| conversion_error(column, format!("timestamp {} out of range", millis)))
}

fn optional_millis(column: usize, millis: Option<i64>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    millis.map(|m| from_millis(column, m)).transpose()
}

fn payload_from_row(row: &Row<'_>) -> rusqlite::Result<JobPayload> {
    let exclusive: i32 = row.get(11)?;
    Ok(JobPayload {
        handler_type: row.get(5)?,
        handler_configuration: row.get(6)?,
        execution_id: row.get(7)?,
        process_instance_id: row.get(8)?,
        process_definition_id: row.get(9)?,
        retries: row.get(10)?,
        exclusive: exclusive != 0,
        exception_message: row.get(12)?,
        tenant_id: row.get(13)?,
    })
}

/// Map a `timer_jobs` row selected with [`JOB_COLUMNS`]
pub fn timer_job_from_row(row: &Row<'_>) -> rusqlite::Result<TimerJobEntity> {
    let id: String = row.get(0)?;
    let revision: i64 = row.get(1)?;
    let state = TimerJobState {
        due_date: from_millis(2, row.get(2)?)?,
        lock_owner: row.get(3)?,
        lock_expiration_time: optional_millis(4, row.get(4)?)?,
        payload: payload_from_row(row)?,
    };
    let created_at = from_millis(14, row.get(14)?)?;

    Ok(TimerJobEntity::restore(
        EntityHeader::loaded(id, revision),
        state,
        created_at,
    ))
}

/// Map a `jobs` row selected with [`JOB_COLUMNS`]
pub fn job_from_row(row: &Row<'_>) -> rusqlite::Result<JobEntity> {
    let id: String = row.get(0)?;
    let revision: i64 = row.get(1)?;
    let state = JobState {
        due_date: optional_millis(2, row.get(2)?)?,
        lock_owner: row.get(3)?,
        lock_expiration_time: optional_millis(4, row.get(4)?)?,
        payload: payload_from_row(row)?,
    };
    let created_at = from_millis(14, row.get(14)?)?;

    Ok(JobEntity::restore(
        EntityHeader::loaded(id, revision),
        state,
        created_at,
    ))
}

/// Map a `deployments` row selected with [`DEPLOYMENT_COLUMNS`]
///
/// Resources live in their own table and are attached by the caller.
pub fn deployment_from_row(
    row: &Row<'_>,
    resources: BTreeMap<String, Resource>,
) -> rusqlite::Result<DeploymentEntity> {
    let id: String = row.get(0)?;
    let revision: i64 = row.get(1)?;
    let state = DeploymentState {
        name: row.get(2)?,
        tenant_id: row.get(3)?,
        deployment_time: optional_millis(4, row.get(4)?)?,
        version: row.get(5)?,
        project_release_version: row.get(6)?,
        resources,
    };

    Ok(DeploymentEntity::restore(
        EntityHeader::loaded(id, revision),
        state,
    ))
}

/// Map a `deployment_resources` row: (name, bytes, generated)
pub fn resource_from_row(row: &Row<'_>) -> rusqlite::Result<(String, Resource)> {
    let name: String = row.get(0)?;
    let bytes: Vec<u8> = row.get(1)?;
    let generated: i32 = row.get(2)?;
    Ok((name, Resource { bytes, generated: generated != 0 }))
}
