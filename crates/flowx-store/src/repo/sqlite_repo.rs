//! SQLite repository implementation
//!
//! Row-level reads and writes for timer jobs, executable jobs and
//! deployments. Updates and deletes match on `(id, revision)` and report the
//! number of rows they touched; zero means the compare-and-set was lost.

#![allow(clippy::result_large_err)]

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use flowx_core::model::{DeploymentEntity, JobEntity, JobPayload, TimerJobEntity};
use flowx_core::Entity;
use rusqlite::{Connection, OptionalExtension};

use crate::errors::{from_insert, from_rusqlite, Result};
use crate::repo::hydration::{
    deployment_from_row, job_from_row, resource_from_row, timer_job_from_row, to_millis,
    DEPLOYMENT_COLUMNS, JOB_COLUMNS,
};

/// Columns a timer job and an executable job have in common
struct JobRow<'a> {
    id: &'a str,
    due_date: Option<DateTime<Utc>>,
    lock_owner: Option<&'a str>,
    lock_expiration_time: Option<DateTime<Utc>>,
    payload: &'a JobPayload,
    created_at: DateTime<Utc>,
}

impl<'a> JobRow<'a> {
    fn timer(timer: &'a TimerJobEntity) -> Self {
        Self {
            id: timer.id(),
            due_date: Some(timer.due_date),
            lock_owner: timer.lock_owner.as_deref(),
            lock_expiration_time: timer.lock_expiration_time,
            payload: &timer.payload,
            created_at: timer.created_at,
        }
    }

    fn job(job: &'a JobEntity) -> Self {
        Self {
            id: job.id(),
            due_date: job.due_date,
            lock_owner: job.lock_owner.as_deref(),
            lock_expiration_time: job.lock_expiration_time,
            payload: &job.payload,
            created_at: job.created_at,
        }
    }
}

/// SQLite repository for the engine's runtime tables
pub struct SqliteRepo;

impl SqliteRepo {
    // ---- timer jobs ----

    pub fn insert_timer_job(conn: &Connection, timer: &TimerJobEntity) -> Result<()> {
        insert_job_row(conn, "timer_jobs", &JobRow::timer(timer))
    }

    pub fn update_timer_job(conn: &Connection, timer: &TimerJobEntity) -> Result<usize> {
        update_job_row(conn, "timer_jobs", &JobRow::timer(timer), timer.revision())
    }

    pub fn delete_timer_job(conn: &Connection, id: &str, revision: i64) -> Result<usize> {
        delete_row(conn, "timer_jobs", id, revision)
    }

    pub fn find_timer_job(conn: &Connection, id: &str) -> Result<Option<TimerJobEntity>> {
        conn.query_row(
            &format!("SELECT {} FROM timer_jobs WHERE id = ?1", JOB_COLUMNS),
            [id],
            timer_job_from_row,
        )
        .optional()
        .map_err(from_rusqlite)
    }

    /// Due, unclaimed (or claim expired) timers, oldest due date first
    pub fn find_due_timer_jobs(
        conn: &Connection,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TimerJobEntity>> {
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM timer_jobs
                 WHERE due_date <= ?1
                   AND (lock_owner IS NULL OR lock_expiration_time IS NULL OR lock_expiration_time <= ?1)
                 ORDER BY due_date, id
                 LIMIT ?2",
                JOB_COLUMNS
            ))
            .map_err(from_rusqlite)?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map(rusqlite::params![to_millis(now), limit], timer_job_from_row)
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;

        Ok(rows)
    }

    pub fn list_timer_jobs(conn: &Connection) -> Result<Vec<TimerJobEntity>> {
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM timer_jobs ORDER BY due_date, id",
                JOB_COLUMNS
            ))
            .map_err(from_rusqlite)?;

        let rows = stmt
            .query_map([], timer_job_from_row)
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;

        Ok(rows)
    }

    // ---- executable jobs ----

    pub fn insert_job(conn: &Connection, job: &JobEntity) -> Result<()> {
        insert_job_row(conn, "jobs", &JobRow::job(job))
    }

    pub fn update_job(conn: &Connection, job: &JobEntity) -> Result<usize> {
        update_job_row(conn, "jobs", &JobRow::job(job), job.revision())
    }

    pub fn delete_job(conn: &Connection, id: &str, revision: i64) -> Result<usize> {
        delete_row(conn, "jobs", id, revision)
    }

    pub fn find_job(conn: &Connection, id: &str) -> Result<Option<JobEntity>> {
        conn.query_row(
            &format!("SELECT {} FROM jobs WHERE id = ?1", JOB_COLUMNS),
            [id],
            job_from_row,
        )
        .optional()
        .map_err(from_rusqlite)
    }

    pub fn list_jobs(conn: &Connection) -> Result<Vec<JobEntity>> {
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM jobs ORDER BY created_at, id",
                JOB_COLUMNS
            ))
            .map_err(from_rusqlite)?;

        let rows = stmt
            .query_map([], job_from_row)
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;

        Ok(rows)
    }

    // ---- deployments ----

    pub fn insert_deployment(conn: &Connection, deployment: &DeploymentEntity) -> Result<()> {
        conn.execute(
            "INSERT INTO deployments
                (id, revision, name, tenant_id, deployment_time, version, project_release_version)
             VALUES (?1, 1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                deployment.id(),
                deployment.name,
                deployment.tenant_id,
                deployment.deployment_time.map(to_millis),
                deployment.version,
                deployment.project_release_version,
            ],
        )
        .map_err(from_insert)?;

        write_resources(conn, deployment)
    }

    pub fn update_deployment(conn: &Connection, deployment: &DeploymentEntity) -> Result<usize> {
        let updated = conn
            .execute(
                "UPDATE deployments SET
                    revision = revision + 1,
                    name = ?3,
                    tenant_id = ?4,
                    deployment_time = ?5,
                    version = ?6,
                    project_release_version = ?7
                 WHERE id = ?1 AND revision = ?2",
                rusqlite::params![
                    deployment.id(),
                    deployment.revision(),
                    deployment.name,
                    deployment.tenant_id,
                    deployment.deployment_time.map(to_millis),
                    deployment.version,
                    deployment.project_release_version,
                ],
            )
            .map_err(from_rusqlite)?;

        if updated > 0 {
            conn.execute(
                "DELETE FROM deployment_resources WHERE deployment_id = ?1",
                [deployment.id()],
            )
            .map_err(from_rusqlite)?;
            write_resources(conn, deployment)?;
        }

        Ok(updated)
    }

    /// Resources go with the row through `ON DELETE CASCADE`
    pub fn delete_deployment(conn: &Connection, id: &str, revision: i64) -> Result<usize> {
        delete_row(conn, "deployments", id, revision)
    }

    pub fn find_deployment(conn: &Connection, id: &str) -> Result<Option<DeploymentEntity>> {
        let resources = load_resources(conn, id)?;
        conn.query_row(
            &format!("SELECT {} FROM deployments WHERE id = ?1", DEPLOYMENT_COLUMNS),
            [id],
            |row| deployment_from_row(row, resources),
        )
        .optional()
        .map_err(from_rusqlite)
    }

    /// Highest version of `name` within the tenant; `None` tenant matches
    /// only deployments without tenant
    pub fn find_latest_deployment_by_name(
        conn: &Connection,
        name: &str,
        tenant_id: Option<&str>,
    ) -> Result<Option<DeploymentEntity>> {
        let id: Option<String> = conn
            .query_row(
                "SELECT id FROM deployments
                 WHERE name = ?1 AND tenant_id IS ?2
                 ORDER BY version DESC
                 LIMIT 1",
                rusqlite::params![name, tenant_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(from_rusqlite)?;

        match id {
            Some(id) => Self::find_deployment(conn, &id),
            None => Ok(None),
        }
    }
}

fn insert_job_row(conn: &Connection, table: &str, row: &JobRow<'_>) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO {} ({}) VALUES (?1, 1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            table, JOB_COLUMNS
        ),
        rusqlite::params![
            row.id,
            row.due_date.map(to_millis),
            row.lock_owner,
            row.lock_expiration_time.map(to_millis),
            row.payload.handler_type,
            row.payload.handler_configuration,
            row.payload.execution_id,
            row.payload.process_instance_id,
            row.payload.process_definition_id,
            row.payload.retries,
            i32::from(row.payload.exclusive),
            row.payload.exception_message,
            row.payload.tenant_id,
            to_millis(row.created_at),
        ],
    )
    .map_err(from_insert)?;

    Ok(())
}

fn update_job_row(conn: &Connection, table: &str, row: &JobRow<'_>, revision: i64) -> Result<usize> {
    conn.execute(
        &format!(
            "UPDATE {} SET
                revision = revision + 1,
                due_date = ?3,
                lock_owner = ?4,
                lock_expiration_time = ?5,
                handler_type = ?6,
                handler_configuration = ?7,
                execution_id = ?8,
                process_instance_id = ?9,
                process_definition_id = ?10,
                retries = ?11,
                exclusive = ?12,
                exception_message = ?13,
                tenant_id = ?14
             WHERE id = ?1 AND revision = ?2",
            table
        ),
        rusqlite::params![
            row.id,
            revision,
            row.due_date.map(to_millis),
            row.lock_owner,
            row.lock_expiration_time.map(to_millis),
            row.payload.handler_type,
            row.payload.handler_configuration,
            row.payload.execution_id,
            row.payload.process_instance_id,
            row.payload.process_definition_id,
            row.payload.retries,
            if row.payload.exclusive { 1 } else { 0 },
            row.payload.exception_message,
            row.payload.tenant_id,
        ],
    )
    .map_err(from_rusqlite)
}

fn delete_row(conn: &Connection, table: &str, id: &str, revision: i64) -> Result<usize> {
    conn.execute(
        &format!("DELETE FROM {} WHERE id = ?1 AND revision = ?2", table),
        rusqlite::params![id, revision],
    )
    .map_err(from_rusqlite)
}

fn write_resources(conn: &Connection, deployment: &DeploymentEntity) -> Result<()> {
    let mut stmt = conn
        .prepare(
            "INSERT INTO deployment_resources (deployment_id, name, bytes, generated)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .map_err(from_rusqlite)?;

    for (name, resource) in &deployment.resources {
        stmt.execute(rusqlite::params![
            deployment.id(),
            name,
            resource.bytes,
            if resource.generated { 1 } else { 0 },
        ])
        .map_err(from_rusqlite)?;
    }

    Ok(())
}

fn load_resources(
    conn: &Connection,
    deployment_id: &str,
) -> Result<BTreeMap<String, flowx_core::model::Resource>> {
    let mut stmt = conn
        .prepare(
            "SELECT name, bytes, generated FROM deployment_resources
             WHERE deployment_id = ?1 ORDER BY name",
        )
        .map_err(from_rusqlite)?;

    let resources = stmt
        .query_map([deployment_id], resource_from_row)
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<BTreeMap<_, _>, _>>()
        .map_err(from_rusqlite)?;

    Ok(resources)
}
