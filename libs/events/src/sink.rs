//! Event sinks and the per-search event recorder.

use std::sync::{Arc, Mutex};

use halving_id::{EventSeq, SearchId};
use tracing::{info, warn};

use crate::{EventEnvelope, EventError, SearchEvent};

/// Destination for search events.
///
/// Sinks are called inline from the scheduler loop, so implementations
/// should return quickly. A failing sink never stops a search.
pub trait EventSink: Send + Sync {
    /// Store or forward one event.
    fn record(&self, envelope: &EventEnvelope) -> Result<(), EventError>;
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn record(&self, _envelope: &EventEnvelope) -> Result<(), EventError> {
        Ok(())
    }
}

/// Writes every event as a JSON line through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, envelope: &EventEnvelope) -> Result<(), EventError> {
        let line = envelope.to_json_line()?;
        info!(
            target: "halving::events",
            event_type = envelope.event_type(),
            seq = envelope.seq.value(),
            event = %line,
            "search event"
        );
        Ok(())
    }
}

/// Keeps every event in memory. Intended for tests and short runs.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<EventEnvelope>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded events, in arrival order.
    pub fn events(&self) -> Vec<EventEnvelope> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Recorded events of one type.
    pub fn events_of_type(&self, event_type: &str) -> Vec<EventEnvelope> {
        self.events()
            .into_iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }
}

impl EventSink for MemorySink {
    fn record(&self, envelope: &EventEnvelope) -> Result<(), EventError> {
        self.events
            .lock()
            .map_err(|_| EventError::Sink("memory sink lock poisoned".to_string()))?
            .push(envelope.clone());
        Ok(())
    }
}

/// Stamps events of one search with a monotonic sequence and hands them to a
/// sink.
pub struct EventRecorder {
    search_id: SearchId,
    next_seq: EventSeq,
    sink: Arc<dyn EventSink>,
}

impl EventRecorder {
    /// Create a recorder for the given search.
    pub fn new(search_id: SearchId, sink: Arc<dyn EventSink>) -> Self {
        Self {
            search_id,
            next_seq: EventSeq::FIRST,
            sink,
        }
    }

    /// The search this recorder stamps events with.
    pub fn search_id(&self) -> SearchId {
        self.search_id
    }

    /// Emit one event. Sink failures are logged and swallowed.
    pub fn emit(&mut self, event: SearchEvent) {
        let envelope = EventEnvelope::new(self.search_id, self.next_seq, event);
        self.next_seq = self.next_seq.next();

        if let Err(e) = self.sink.record(&envelope) {
            warn!(
                search_id = %self.search_id,
                event_type = envelope.event_type(),
                error = %e,
                "Failed to record search event"
            );
        }
    }
}

impl std::fmt::Debug for EventRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRecorder")
            .field("search_id", &self.search_id)
            .field("next_seq", &self.next_seq)
            .finish_non_exhaustive()
    }
}
