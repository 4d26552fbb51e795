//! Overmind Events - Synchronous lifecycle event bus
//!
//! Lifecycle events flow from the orchestrator and agent runtimes to
//! subscribed observers. Delivery is synchronous and in registration order
//! at the point of emission; there is no buffering or reordering.

use overmind_core::{EventEnvelope, EventKind, LifecycleEvent};
use std::sync::{Arc, Mutex, RwLock};

// ============================================================================
// OBSERVER TRAIT
// ============================================================================

/// Trait for lifecycle event observers.
/// Implementations must be thread-safe (Send + Sync).
///
/// Observers are invoked synchronously while the emitter waits; long-running
/// work belongs elsewhere.
pub trait EventObserver: Send + Sync {
    /// Handle one emitted event.
    fn on_event(&self, envelope: &EventEnvelope);
}

// ============================================================================
// EVENT BUS
// ============================================================================

/// Synchronous pub/sub over the closed lifecycle event union.
///
/// Observers are dispatched in the order they subscribed. The bus is shared
/// by reference (`Arc<EventBus>`) between the orchestrator, agent runtimes,
/// and the metrics collector.
pub struct EventBus {
    observers: RwLock<Vec<Arc<dyn EventObserver>>>,
}

impl EventBus {
    /// Create a bus with no observers.
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(Vec::new()),
        }
    }

    /// Subscribe an observer. Observers receive events in subscription order.
    pub fn subscribe(&self, observer: Arc<dyn EventObserver>) {
        if let Ok(mut observers) = self.observers.write() {
            observers.push(observer);
        }
    }

    /// Number of subscribed observers.
    pub fn observer_count(&self) -> usize {
        self.observers.read().map(|o| o.len()).unwrap_or(0)
    }

    /// Wrap an event in an envelope and deliver it to every observer.
    /// Returns the envelope that was delivered.
    pub fn emit(&self, event: LifecycleEvent) -> EventEnvelope {
        let envelope = EventEnvelope::new(event);
        if let Ok(observers) = self.observers.read() {
            for observer in observers.iter() {
                observer.on_event(&envelope);
            }
        }
        envelope
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("observers", &self.observer_count())
            .finish()
    }
}

// ============================================================================
// COLLECTING OBSERVER
// ============================================================================

/// Observer that records every event it sees. Used by tests and diagnostics.
pub struct CollectingObserver {
    events: Mutex<Vec<EventEnvelope>>,
}

impl CollectingObserver {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of every event seen so far, in delivery order.
    pub fn events(&self) -> Vec<EventEnvelope> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Kinds of every event seen so far, in delivery order.
    pub fn kinds(&self) -> Vec<EventKind> {
        self.events()
            .iter()
            .map(|envelope| envelope.kind())
            .collect()
    }

    /// Number of events seen.
    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// Whether no events have been seen.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Count of events of one kind.
    pub fn count_of(&self, kind: EventKind) -> usize {
        self.events()
            .iter()
            .filter(|envelope| envelope.kind() == kind)
            .count()
    }
}

impl Default for CollectingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl EventObserver for CollectingObserver {
    fn on_event(&self, envelope: &EventEnvelope) {
        if let Ok(mut events) = self.events.lock() {
            events.push(envelope.clone());
        }
    }
}

impl std::fmt::Debug for CollectingObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectingObserver")
            .field("events", &self.len())
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================
