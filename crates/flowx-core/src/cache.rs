//! Per-context entity cache
//!
//! An identity map keyed by (kind, id) that keeps entities in registration
//! order. At close the owning context asks it for a [`FlushPlan`]: inserts,
//! then updates, then deletes, each phase in registration order.

use std::any::Any;
use std::collections::HashMap;

use crate::entity::{Entity, EntityKind, LifecycleFlags, Persistable};
use crate::errors::{FlowXError, Result};

/// Type-erased cache slot
trait TrackedEntity: Send {
    fn kind(&self) -> EntityKind;
    /// Id the entity was registered under
    fn key_id(&self) -> &str;
    fn flags(&self) -> LifecycleFlags;
    fn is_dirty(&self) -> bool;
    fn as_persistable(&self) -> &dyn Persistable;
    fn entity_any(&self) -> &dyn Any;
    fn entity_any_mut(&mut self) -> &mut dyn Any;
}

struct Tracked<E: Entity> {
    key_id: String,
    entity: E,
    /// Snapshot taken when the entity was loaded; `None` for new entities
    loaded_state: Option<E::State>,
}

impl<E: Entity> TrackedEntity for Tracked<E> {
    fn kind(&self) -> EntityKind {
        E::KIND
    }

    fn key_id(&self) -> &str {
        &self.key_id
    }

    fn flags(&self) -> LifecycleFlags {
        self.entity.header().flags()
    }

    fn is_dirty(&self) -> bool {
        self.loaded_state
            .as_ref()
            .is_some_and(|loaded| *loaded != self.entity.persistent_state())
    }

    fn as_persistable(&self) -> &dyn Persistable {
        &self.entity
    }

    fn entity_any(&self) -> &dyn Any {
        &self.entity
    }

    fn entity_any_mut(&mut self) -> &mut dyn Any {
        &mut self.entity
    }
}

/// Ordered write-back plan computed from the cache
#[derive(Debug, Default)]
pub struct FlushPlan<'a> {
    pub inserts: Vec<&'a dyn Persistable>,
    pub updates: Vec<&'a dyn Persistable>,
    pub deletes: Vec<&'a dyn Persistable>,
}

impl FlushPlan<'_> {
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inserts.len() + self.updates.len() + self.deletes.len()
    }
}

/// Identity map for one unit of work
#[derive(Default)]
pub struct EntityCache {
    entries: Vec<Box<dyn TrackedEntity>>,
    index: HashMap<(EntityKind, String), usize>,
}

impl EntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, kind: EntityKind, id: &str) -> bool {
        self.index.contains_key(&(kind, id.to_string()))
    }

    /// Track an entity read from the store
    ///
    /// If the identity is already tracked, the cached instance wins and the
    /// freshly loaded copy is dropped, so a context never holds two
    /// instances of the same row.
    pub fn track_loaded<E: Entity>(&mut self, entity: E) -> &mut E {
        let key = (E::KIND, entity.id().to_string());
        let slot = match self.index.get(&key) {
            Some(&slot) => slot,
            None => {
                let loaded_state = Some(entity.persistent_state());
                self.push(key.clone(), Tracked {
                    key_id: key.1,
                    entity,
                    loaded_state,
                })
            }
        };
        self.downcast_slot_mut::<E>(slot)
            .unwrap_or_else(|| unreachable!("slot {} holds a {}", slot, E::KIND))
    }

    /// Track a new entity scheduled for insertion
    ///
    /// # Errors
    ///
    /// - `MissingId` when the entity has no id yet
    /// - `EntityAlreadyTracked` when the identity is already in the cache
    pub fn track_new<E: Entity>(&mut self, mut entity: E) -> Result<&mut E> {
        if entity.header().id().is_none() {
            return Err(FlowXError::MissingId { kind: E::KIND }.into());
        }
        let key = (E::KIND, entity.id().to_string());
        if self.index.contains_key(&key) {
            return Err(FlowXError::EntityAlreadyTracked {
                kind: E::KIND,
                id: key.1,
            }
            .into());
        }
        entity.header_mut().set_inserted(true);
        let slot = self.push(key.clone(), Tracked {
            key_id: key.1,
            entity,
            loaded_state: None,
        });
        Ok(self
            .downcast_slot_mut::<E>(slot)
            .unwrap_or_else(|| unreachable!("slot {} holds a {}", slot, E::KIND)))
    }

    pub fn get<E: Entity>(&self, id: &str) -> Option<&E> {
        let slot = *self.index.get(&(E::KIND, id.to_string()))?;
        self.entries[slot].entity_any().downcast_ref::<E>()
    }

    pub fn get_mut<E: Entity>(&mut self, id: &str) -> Option<&mut E> {
        let slot = *self.index.get(&(E::KIND, id.to_string()))?;
        self.downcast_slot_mut::<E>(slot)
    }

    /// All tracked entities of one type, in registration order
    pub fn entities<E: Entity>(&self) -> impl Iterator<Item = &E> {
        self.entries
            .iter()
            .filter(|entry| entry.kind() == E::KIND)
            .filter_map(|entry| entry.entity_any().downcast_ref::<E>())
    }

    /// Compute the insert → update → delete plan
    ///
    /// - inserts: inserted and not deleted
    /// - updates: neither inserted nor deleted, and flagged updated or dirty
    /// - deletes: deleted and not inserted (inserted+deleted is dropped)
    ///
    /// # Errors
    ///
    /// `IdAlreadyAssigned` when a tracked entity no longer carries the id it
    /// was registered under, e.g. because a command overwrote it wholesale.
    pub fn flush_plan(&self) -> Result<FlushPlan<'_>> {
        let mut plan = FlushPlan::default();
        for entry in &self.entries {
            let current = entry.as_persistable().entity_header().id().unwrap_or_default();
            if current != entry.key_id() {
                return Err(FlowXError::IdAlreadyAssigned {
                    current: entry.key_id().to_string(),
                    attempted: current.to_string(),
                }
                .into());
            }
            let flags = entry.flags();
            match (flags.inserted, flags.deleted) {
                (true, false) => plan.inserts.push(entry.as_persistable()),
                (false, true) => plan.deletes.push(entry.as_persistable()),
                (false, false) if flags.updated || entry.is_dirty() => {
                    plan.updates.push(entry.as_persistable())
                }
                _ => {}
            }
        }
        Ok(plan)
    }

    fn push<E: Entity>(&mut self, key: (EntityKind, String), tracked: Tracked<E>) -> usize {
        let slot = self.entries.len();
        self.entries.push(Box::new(tracked));
        self.index.insert(key, slot);
        slot
    }

    fn downcast_slot_mut<E: Entity>(&mut self, slot: usize) -> Option<&mut E> {
        self.entries[slot].entity_any_mut().downcast_mut::<E>()
    }
}

impl std::fmt::Debug for EntityCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| e.as_persistable()))
            .finish()
    }
}
