//! In-memory [`DataStore`]
//!
//! Tables are ordered maps behind one mutex. A transaction holds the lock,
//! writes into a working copy and swaps it in on commit, so concurrent
//! contexts see each other's changes only once committed. Committed writes
//! are also appended to a statement log tests can inspect.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::{downcast_entity, require_id, stale_revision, DataStore, StoreTransaction};
use crate::entity::{Entity, EntityHeader, EntityKind, Persistable};
use crate::errors::{ExError, ExErrorKind, Result};
use crate::model::{DeploymentEntity, JobEntity, TimerJobEntity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementOp {
    Insert,
    Update,
    Delete,
}

/// One committed write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub op: StatementOp,
    pub kind: EntityKind,
    pub id: String,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    timer_jobs: BTreeMap<String, TimerJobEntity>,
    jobs: BTreeMap<String, JobEntity>,
    deployments: BTreeMap<String, DeploymentEntity>,
}

#[derive(Debug, Default)]
struct Inner {
    tables: Tables,
    log: Vec<Statement>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every write committed so far, in commit order
    pub fn statements(&self) -> Vec<Statement> {
        self.lock().map(|inner| inner.log.clone()).unwrap_or_default()
    }

    pub fn clear_statements(&self) {
        if let Ok(mut inner) = self.lock() {
            inner.log.clear();
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| {
            ExError::new(ExErrorKind::Internal).with_message("memory store lock poisoned")
        })
    }
}

impl DataStore for MemoryStore {
    fn begin(&self) -> Result<Box<dyn StoreTransaction + '_>> {
        let guard = self.lock()?;
        let working = guard.tables.clone();
        Ok(Box::new(MemoryTransaction {
            guard,
            working,
            pending: Vec::new(),
        }))
    }

    fn find_timer_job(&self, id: &str) -> Result<Option<TimerJobEntity>> {
        Ok(self.lock()?.tables.timer_jobs.get(id).cloned())
    }

    fn find_due_timer_jobs(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TimerJobEntity>> {
        let inner = self.lock()?;
        let mut due: Vec<TimerJobEntity> = inner
            .tables
            .timer_jobs
            .values()
            .filter(|timer| timer.is_acquirable_at(now))
            .cloned()
            .collect();
        due.sort_by(|a, b| a.due_date.cmp(&b.due_date).then_with(|| a.id().cmp(b.id())));
        due.truncate(limit);
        Ok(due)
    }

    fn list_timer_jobs(&self) -> Result<Vec<TimerJobEntity>> {
        Ok(self.lock()?.tables.timer_jobs.values().cloned().collect())
    }

    fn find_job(&self, id: &str) -> Result<Option<JobEntity>> {
        Ok(self.lock()?.tables.jobs.get(id).cloned())
    }

    fn list_jobs(&self) -> Result<Vec<JobEntity>> {
        Ok(self.lock()?.tables.jobs.values().cloned().collect())
    }

    fn find_deployment(&self, id: &str) -> Result<Option<DeploymentEntity>> {
        Ok(self.lock()?.tables.deployments.get(id).cloned())
    }

    fn find_latest_deployment_by_name(
        &self,
        name: &str,
        tenant_id: Option<&str>,
    ) -> Result<Option<DeploymentEntity>> {
        Ok(self
            .lock()?
            .tables
            .deployments
            .values()
            .filter(|d| d.name == name && d.tenant_id.as_deref() == tenant_id)
            .max_by_key(|d| d.version)
            .cloned())
    }
}

struct MemoryTransaction<'a> {
    guard: MutexGuard<'a, Inner>,
    working: Tables,
    pending: Vec<Statement>,
}

impl MemoryTransaction<'_> {
    fn record(&mut self, op: StatementOp, entity: &dyn Persistable) -> Result<()> {
        self.pending.push(Statement {
            op,
            kind: entity.entity_kind(),
            id: require_id(entity)?.to_string(),
        });
        Ok(())
    }
}

impl StoreTransaction for MemoryTransaction<'_> {
    fn insert(&mut self, entity: &dyn Persistable) -> Result<()> {
        match entity.entity_kind() {
            EntityKind::TimerJob => insert_row(&mut self.working.timer_jobs, entity)?,
            EntityKind::Job => insert_row(&mut self.working.jobs, entity)?,
            EntityKind::Deployment => {
                insert_row::<DeploymentEntity>(&mut self.working.deployments, entity)?;
                if let Some(row) = self.working.deployments.get_mut(require_id(entity)?) {
                    row.is_new = false;
                }
            }
        }
        self.record(StatementOp::Insert, entity)
    }

    fn update(&mut self, entity: &dyn Persistable) -> Result<()> {
        match entity.entity_kind() {
            EntityKind::TimerJob => update_row(&mut self.working.timer_jobs, entity)?,
            EntityKind::Job => update_row(&mut self.working.jobs, entity)?,
            EntityKind::Deployment => update_row(&mut self.working.deployments, entity)?,
        }
        self.record(StatementOp::Update, entity)
    }

    fn delete(&mut self, entity: &dyn Persistable) -> Result<()> {
        match entity.entity_kind() {
            EntityKind::TimerJob => delete_row(&mut self.working.timer_jobs, entity)?,
            EntityKind::Job => delete_row(&mut self.working.jobs, entity)?,
            EntityKind::Deployment => delete_row(&mut self.working.deployments, entity)?,
        }
        self.record(StatementOp::Delete, entity)
    }

    fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTransaction {
            mut guard,
            working,
            pending,
        } = *self;
        guard.tables = working;
        guard.log.extend(pending);
        Ok(())
    }

    fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

fn insert_row<E: Entity + Clone>(
    table: &mut BTreeMap<String, E>,
    entity: &dyn Persistable,
) -> Result<()> {
    let typed = downcast_entity::<E>(entity)?;
    let id = require_id(entity)?;
    if table.contains_key(id) {
        return Err(ExError::new(ExErrorKind::AlreadyExists)
            .with_entity_kind(E::KIND)
            .with_entity_id(id)
            .with_message("duplicate id"));
    }
    let mut row = typed.clone();
    row.header_mut().replace(EntityHeader::loaded(id, 1));
    table.insert(id.to_string(), row);
    Ok(())
}

fn update_row<E: Entity + Clone>(
    table: &mut BTreeMap<String, E>,
    entity: &dyn Persistable,
) -> Result<()> {
    let typed = downcast_entity::<E>(entity)?;
    let id = require_id(entity)?;
    match table.get(id) {
        Some(current) if current.revision() == typed.revision() => {
            let mut row = typed.clone();
            row.header_mut()
                .replace(EntityHeader::loaded(id, typed.header().next_revision()));
            table.insert(id.to_string(), row);
            Ok(())
        }
        _ => Err(stale_revision(entity)),
    }
}

fn delete_row<E: Entity>(table: &mut BTreeMap<String, E>, entity: &dyn Persistable) -> Result<()> {
    let id = require_id(entity)?;
    match table.get(id) {
        Some(current) if current.revision() == entity.entity_header().revision() => {
            table.remove(id);
            Ok(())
        }
        _ => Err(stale_revision(entity)),
    }
}
