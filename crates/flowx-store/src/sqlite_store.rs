//! SQLite-backed [`DataStore`]
//!
//! One connection per store behind a mutex. Each engine process opens its
//! own store on the shared database file; `BEGIN IMMEDIATE` plus the busy
//! timeout serialize competing flushes, and the revision checks in the
//! repository decide who wins a contended row.

#![allow(clippy::result_large_err)]

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use flowx_core::errors::{ExError, ExErrorKind};
use flowx_core::model::{DeploymentEntity, JobEntity, TimerJobEntity};
use flowx_core::store::{
    downcast_entity, require_id, stale_revision, DataStore, StoreTransaction,
};
use flowx_core::{EntityKind, Persistable};
use rusqlite::Connection;
use tracing::{debug, warn};

use crate::db;
use crate::errors::{from_rusqlite, Result};
use crate::migrations::apply_migrations;
use crate::repo::SqliteRepo;

pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and migrate it
    ///
    /// # Errors
    ///
    /// Persistence failures opening, configuring or migrating the database.
    pub fn open<P: AsRef<Path>>(path: P, busy_timeout: Duration) -> Result<Self> {
        let mut conn = db::open(path)?;
        db::configure(&conn, busy_timeout)?;
        apply_migrations(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Private in-memory database, migrated
    ///
    /// # Errors
    ///
    /// Persistence failures migrating the database.
    pub fn open_in_memory() -> Result<Self> {
        let mut conn = db::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])
            .map_err(from_rusqlite)?;
        apply_migrations(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| {
            ExError::new(ExErrorKind::Internal).with_message("sqlite connection lock poisoned")
        })
    }
}

impl DataStore for SqliteStore {
    fn begin(&self) -> Result<Box<dyn StoreTransaction + '_>> {
        let conn = self.lock()?;
        conn.execute_batch("BEGIN IMMEDIATE").map_err(from_rusqlite)?;
        Ok(Box::new(SqliteTransaction {
            conn,
            finished: false,
        }))
    }

    fn find_timer_job(&self, id: &str) -> Result<Option<TimerJobEntity>> {
        let conn = self.lock()?;
        SqliteRepo::find_timer_job(&conn, id)
    }

    fn find_due_timer_jobs(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TimerJobEntity>> {
        let conn = self.lock()?;
        SqliteRepo::find_due_timer_jobs(&conn, now, limit)
    }

    fn list_timer_jobs(&self) -> Result<Vec<TimerJobEntity>> {
        let conn = self.lock()?;
        SqliteRepo::list_timer_jobs(&conn)
    }

    fn find_job(&self, id: &str) -> Result<Option<JobEntity>> {
        let conn = self.lock()?;
        SqliteRepo::find_job(&conn, id)
    }

    fn list_jobs(&self) -> Result<Vec<JobEntity>> {
        let conn = self.lock()?;
        SqliteRepo::list_jobs(&conn)
    }

    fn find_deployment(&self, id: &str) -> Result<Option<DeploymentEntity>> {
        let conn = self.lock()?;
        SqliteRepo::find_deployment(&conn, id)
    }

    fn find_latest_deployment_by_name(
        &self,
        name: &str,
        tenant_id: Option<&str>,
    ) -> Result<Option<DeploymentEntity>> {
        let conn = self.lock()?;
        SqliteRepo::find_latest_deployment_by_name(&conn, name, tenant_id)
    }
}

/// An open `BEGIN IMMEDIATE` on the store's connection
///
/// Dropped without commit or rollback, it rolls back.
struct SqliteTransaction<'a> {
    conn: MutexGuard<'a, Connection>,
    finished: bool,
}

impl SqliteTransaction<'_> {
    fn finish(&mut self, sql: &str) -> Result<()> {
        self.finished = true;
        self.conn.execute_batch(sql).map_err(from_rusqlite)
    }
}

impl StoreTransaction for SqliteTransaction<'_> {
    fn insert(&mut self, entity: &dyn Persistable) -> Result<()> {
        let inserted = match entity.entity_kind() {
            EntityKind::TimerJob => {
                SqliteRepo::insert_timer_job(&self.conn, downcast_entity(entity)?)
            }
            EntityKind::Job => SqliteRepo::insert_job(&self.conn, downcast_entity(entity)?),
            EntityKind::Deployment => {
                SqliteRepo::insert_deployment(&self.conn, downcast_entity(entity)?)
            }
        };
        inserted.map_err(|e| {
            e.with_entity_kind(entity.entity_kind())
                .with_entity_id(entity.entity_header().id().unwrap_or_default())
        })
    }

    fn update(&mut self, entity: &dyn Persistable) -> Result<()> {
        let touched = match entity.entity_kind() {
            EntityKind::TimerJob => {
                SqliteRepo::update_timer_job(&self.conn, downcast_entity(entity)?)?
            }
            EntityKind::Job => SqliteRepo::update_job(&self.conn, downcast_entity(entity)?)?,
            EntityKind::Deployment => {
                SqliteRepo::update_deployment(&self.conn, downcast_entity(entity)?)?
            }
        };
        if touched == 0 {
            return Err(stale_revision(entity));
        }
        Ok(())
    }

    fn delete(&mut self, entity: &dyn Persistable) -> Result<()> {
        let id = require_id(entity)?;
        let revision = entity.entity_header().revision();
        let touched = match entity.entity_kind() {
            EntityKind::TimerJob => SqliteRepo::delete_timer_job(&self.conn, id, revision)?,
            EntityKind::Job => SqliteRepo::delete_job(&self.conn, id, revision)?,
            EntityKind::Deployment => SqliteRepo::delete_deployment(&self.conn, id, revision)?,
        };
        if touched == 0 {
            return Err(stale_revision(entity));
        }
        Ok(())
    }

    fn commit(mut self: Box<Self>) -> Result<()> {
        if let Err(err) = self.finish("COMMIT") {
            // a failed COMMIT can leave the transaction open
            if let Err(rollback_err) = self.conn.execute_batch("ROLLBACK") {
                warn!(
                    error = %rollback_err,
                    "rollback after failed commit failed"
                );
            }
            return Err(err);
        }
        Ok(())
    }

    fn rollback(mut self: Box<Self>) -> Result<()> {
        self.finish("ROLLBACK")
    }
}

impl Drop for SqliteTransaction<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        debug!("sqlite transaction dropped without commit, rolling back");
        if let Err(err) = self.conn.execute_batch("ROLLBACK") {
            warn!(error = %err, "rollback of abandoned transaction failed");
        }
    }
}
