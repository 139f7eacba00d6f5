//! Lifecycle notifications
//!
//! Fire-and-forget from the core's point of view: dispatch is synchronous,
//! listeners cannot veto, and nothing is dispatched while the dispatcher is
//! disabled.

use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::entity::EntityKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowEventType {
    EntityCreated,
    EntityInitialized,
    EntityDeleted,
    /// A timer job was promoted to an executable job
    TimerFired,
    EngineCreated,
    EngineClosed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowEvent {
    pub event_type: FlowEventType,
    pub entity_kind: Option<EntityKind>,
    pub entity_id: Option<String>,
}

impl FlowEvent {
    pub fn entity(event_type: FlowEventType, kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            event_type,
            entity_kind: Some(kind),
            entity_id: Some(id.into()),
        }
    }

    pub fn engine(event_type: FlowEventType) -> Self {
        Self {
            event_type,
            entity_kind: None,
            entity_id: None,
        }
    }
}

pub trait EventDispatcher: Send + Sync {
    fn is_enabled(&self) -> bool;

    fn dispatch(&self, event: FlowEvent);
}

/// Dispatcher that drops everything
#[derive(Debug, Default)]
pub struct NoopDispatcher;

impl EventDispatcher for NoopDispatcher {
    fn is_enabled(&self) -> bool {
        false
    }

    fn dispatch(&self, _event: FlowEvent) {}
}

type Listener = Arc<dyn Fn(&FlowEvent) + Send + Sync>;

/// Dispatcher fanning events out to registered closures
pub struct ListenerDispatcher {
    enabled: bool,
    listeners: Mutex<Vec<Listener>>,
}

impl ListenerDispatcher {
    pub fn new() -> Self {
        Self {
            enabled: true,
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn add_listener<F>(&self, listener: F)
    where
        F: Fn(&FlowEvent) + Send + Sync + 'static,
    {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push(Arc::new(listener));
        }
    }
}

impl Default for ListenerDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl EventDispatcher for ListenerDispatcher {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn dispatch(&self, event: FlowEvent) {
        if !self.enabled {
            return;
        }
        // listeners run outside the lock so they may register others
        let listeners: Vec<Listener> = match self.listeners.lock() {
            Ok(listeners) => listeners.clone(),
            Err(_) => return,
        };
        for listener in listeners {
            listener(&event);
        }
    }
}

/// Listener that records every event, for tests and the CLI's verbose mode
#[derive(Debug, Clone, Default)]
pub struct RecordingListener {
    events: Arc<Mutex<Vec<FlowEvent>>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register on `dispatcher`; the returned handle reads what was recorded
    pub fn attach(dispatcher: &ListenerDispatcher) -> Self {
        let recorder = Self::new();
        let sink = recorder.events.clone();
        dispatcher.add_listener(move |event| {
            if let Ok(mut events) = sink.lock() {
                events.push(event.clone());
            }
        });
        recorder
    }

    pub fn events(&self) -> Vec<FlowEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn of_type(&self, event_type: FlowEventType) -> Vec<FlowEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_dispatcher_drops_events() {
        let dispatcher = ListenerDispatcher::disabled();
        let recorder = RecordingListener::attach(&dispatcher);
        dispatcher.dispatch(FlowEvent::engine(FlowEventType::EngineCreated));
        assert!(recorder.events().is_empty());
    }

    #[test]
    fn test_listeners_receive_events_in_order() {
        let dispatcher = ListenerDispatcher::new();
        let recorder = RecordingListener::attach(&dispatcher);
        dispatcher.dispatch(FlowEvent::entity(
            FlowEventType::EntityCreated,
            EntityKind::Job,
            "j1",
        ));
        dispatcher.dispatch(FlowEvent::engine(FlowEventType::EngineClosed));

        let types: Vec<FlowEventType> = recorder.events().iter().map(|e| e.event_type).collect();
        assert_eq!(
            types,
            vec![FlowEventType::EntityCreated, FlowEventType::EngineClosed]
        );
        assert_eq!(recorder.of_type(FlowEventType::EntityCreated).len(), 1);
    }
}
