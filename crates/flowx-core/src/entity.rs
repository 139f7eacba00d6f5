//! Entity contract
//!
//! Every object under transactional management carries an [`EntityHeader`]
//! (identity, optimistic-lock revision, lifecycle flags) and exposes a
//! structurally comparable snapshot of what the store holds for it. The
//! entity cache compares that snapshot against the one taken at load time to
//! decide whether an update has to be written back.

use std::any::Any;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{FlowXError, Result};

/// Kinds of entity the store knows how to persist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    TimerJob,
    Job,
    Deployment,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::TimerJob => "timer_job",
            EntityKind::Job => "job",
            EntityKind::Deployment => "deployment",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle markers consulted when the cache builds its flush plan
///
/// The flags are not mutually exclusive: `deleted` on an entity that is
/// still `inserted` means the entity is discarded without ever being written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LifecycleFlags {
    pub inserted: bool,
    pub updated: bool,
    pub deleted: bool,
}

/// Identity, revision and lifecycle flags shared by all entities
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityHeader {
    id: Option<String>,
    revision: i64,
    flags: LifecycleFlags,
}

impl EntityHeader {
    /// Header for a brand-new entity; the id is assigned on insert
    pub fn new() -> Self {
        Self::default()
    }

    /// Header for an entity whose id is chosen by the caller
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Header for an entity hydrated from the store
    pub fn loaded(id: impl Into<String>, revision: i64) -> Self {
        Self {
            id: Some(id.into()),
            revision,
            flags: LifecycleFlags::default(),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Assign the identity
    ///
    /// Re-assigning the same id is a no-op; a different id is rejected.
    ///
    /// # Errors
    ///
    /// `IdAlreadyAssigned` when the header already carries another id.
    pub fn assign_id(&mut self, id: impl Into<String>) -> Result<()> {
        let id = id.into();
        match &self.id {
            Some(current) if *current != id => Err(FlowXError::IdAlreadyAssigned {
                current: current.clone(),
                attempted: id,
            }
            .into()),
            Some(_) => Ok(()),
            None => {
                self.id = Some(id);
                Ok(())
            }
        }
    }

    /// Revision read from the store; 0 for entities never persisted
    pub fn revision(&self) -> i64 {
        self.revision
    }

    /// Revision the store writes on a successful update
    pub fn next_revision(&self) -> i64 {
        self.revision + 1
    }

    pub fn flags(&self) -> LifecycleFlags {
        self.flags
    }

    pub fn is_inserted(&self) -> bool {
        self.flags.inserted
    }

    pub fn set_inserted(&mut self, inserted: bool) {
        self.flags.inserted = inserted;
    }

    pub fn is_updated(&self) -> bool {
        self.flags.updated
    }

    pub fn set_updated(&mut self, updated: bool) {
        self.flags.updated = updated;
    }

    pub fn is_deleted(&self) -> bool {
        self.flags.deleted
    }

    pub fn set_deleted(&mut self, deleted: bool) {
        self.flags.deleted = deleted;
    }
}

/// Proof of access to an entity's raw header
///
/// Only this crate can produce one, so code outside it can implement
/// [`Entity::header_slot`] but never call it.
pub struct HeaderToken(());

/// Mutable view of a header that cannot replace or re-key it
///
/// The id can only go from unset to set; revision and the inserted flag
/// belong to the cache and the stores.
pub struct HeaderMut<'a> {
    header: &'a mut EntityHeader,
}

impl HeaderMut<'_> {
    pub fn id(&self) -> Option<&str> {
        self.header.id()
    }

    /// See [`EntityHeader::assign_id`]
    ///
    /// # Errors
    ///
    /// `IdAlreadyAssigned` when the header already carries another id.
    pub fn assign_id(&mut self, id: impl Into<String>) -> Result<()> {
        self.header.assign_id(id)
    }

    pub fn set_updated(&mut self, updated: bool) {
        self.header.set_updated(updated);
    }

    pub fn set_deleted(&mut self, deleted: bool) {
        self.header.set_deleted(deleted);
    }

    pub(crate) fn set_inserted(&mut self, inserted: bool) {
        self.header.set_inserted(inserted);
    }

    /// Swap in the header a store wrote for this row
    pub(crate) fn replace(&mut self, header: EntityHeader) {
        *self.header = header;
    }
}

/// Contract for any persisted object
pub trait Entity: Any + Send + fmt::Debug {
    /// Value snapshot of the persisted columns
    type State: Clone + PartialEq + fmt::Debug + Send + 'static;

    const KIND: EntityKind;

    fn header(&self) -> &EntityHeader;

    /// Raw header access, reachable only through [`header_mut`](Self::header_mut)
    fn header_slot(&mut self, token: HeaderToken) -> &mut EntityHeader;

    fn header_mut(&mut self) -> HeaderMut<'_> {
        HeaderMut {
            header: self.header_slot(HeaderToken(())),
        }
    }

    /// Representation of the entity as it would be stored
    ///
    /// Compared against the snapshot taken at load time to detect changes.
    fn persistent_state(&self) -> Self::State;

    /// The entity's id, or `""` before insert assigned one
    fn id(&self) -> &str {
        self.header().id().unwrap_or_default()
    }

    fn revision(&self) -> i64 {
        self.header().revision()
    }
}

/// Object-safe, read-only view of an entity handed to the store
pub trait Persistable: fmt::Debug + Send {
    fn entity_kind(&self) -> EntityKind;

    fn entity_header(&self) -> &EntityHeader;

    /// The concrete entity, for stores that write typed rows
    fn as_any(&self) -> &dyn Any;
}

impl<E: Entity> Persistable for E {
    fn entity_kind(&self) -> EntityKind {
        E::KIND
    }

    fn entity_header(&self) -> &EntityHeader {
        self.header()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ExErrorKind;

    #[test]
    fn test_assign_id_once() {
        let mut header = EntityHeader::new();
        assert!(header.id().is_none());

        header.assign_id("a").unwrap();
        assert_eq!(header.id(), Some("a"));

        // same id again is fine
        header.assign_id("a").unwrap();

        let err = header.assign_id("b").unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::IdReassigned);
        assert_eq!(header.id(), Some("a"));
    }

    #[test]
    fn test_loaded_header_revision() {
        let header = EntityHeader::loaded("t1", 4);
        assert_eq!(header.revision(), 4);
        assert_eq!(header.next_revision(), 5);
        assert_eq!(header.flags(), LifecycleFlags::default());
    }

    #[test]
    fn test_flags_are_independent() {
        let mut header = EntityHeader::with_id("x");
        header.set_inserted(true);
        header.set_deleted(true);
        assert!(header.is_inserted());
        assert!(header.is_deleted());
        assert!(!header.is_updated());
    }

    #[derive(Debug)]
    struct Marker {
        header: EntityHeader,
    }

    impl Entity for Marker {
        type State = ();
        const KIND: EntityKind = EntityKind::Job;

        fn header(&self) -> &EntityHeader {
            &self.header
        }

        fn header_slot(&mut self, _token: HeaderToken) -> &mut EntityHeader {
            &mut self.header
        }

        fn persistent_state(&self) {}
    }

    #[test]
    fn test_header_handle_cannot_rekey() {
        let mut entity = Marker {
            header: EntityHeader::loaded("a", 3),
        };

        let err = entity.header_mut().assign_id("b").unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::IdReassigned);

        entity.header_mut().set_deleted(true);
        assert_eq!(entity.id(), "a");
        assert_eq!(entity.revision(), 3);
        assert!(entity.header().is_deleted());
    }

    #[test]
    fn test_entity_kind_display() {
        assert_eq!(EntityKind::TimerJob.to_string(), "timer_job");
        assert_eq!(EntityKind::Deployment.as_str(), "deployment");
    }
}
