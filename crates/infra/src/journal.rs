//! JSON audit journal fed from the event bus.

use std::sync::RwLock;

use serde_json::{Value as JsonValue, json};

use stockflow_events::{Event, EventEnvelope, Subscription};
use stockflow_stock::StockEvent;

use crate::store::StoreError;

/// Append-only journal of audit envelopes, one JSON document per event.
#[derive(Debug, Default)]
pub struct AuditJournal {
    entries: RwLock<Vec<JsonValue>>,
}

impl AuditJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, envelope: &EventEnvelope<StockEvent>) -> Result<(), StoreError> {
        let event = envelope.payload();
        let entry = json!({
            "event_id": envelope.event_id(),
            "pass_id": envelope.pass_id(),
            "event_type": event.event_type(),
            "event_version": event.version(),
            "occurred_at": event.occurred_at(),
            "subject_id": envelope.subject_id(),
            "unit_id": envelope.unit_id(),
            "sequence_number": envelope.sequence_number(),
            "payload": serde_json::to_value(event)?,
        });
        self.entries
            .write()
            .map_err(|_| StoreError::Poisoned)?
            .push(entry);
        Ok(())
    }

    /// Record everything currently waiting on `subscription`.
    pub fn drain_from(
        &self,
        subscription: &Subscription<EventEnvelope<StockEvent>>,
    ) -> Result<usize, StoreError> {
        let pending = subscription.drain();
        for envelope in &pending {
            self.record(envelope)?;
        }
        Ok(pending.len())
    }

    pub fn entries(&self) -> Result<Vec<JsonValue>, StoreError> {
        Ok(self.entries.read().map_err(|_| StoreError::Poisoned)?.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The journal as JSON lines.
    pub fn to_json_lines(&self) -> Result<String, StoreError> {
        let entries = self.entries.read().map_err(|_| StoreError::Poisoned)?;
        let mut out = String::new();
        for entry in entries.iter() {
            out.push_str(&serde_json::to_string(entry)?);
            out.push('\n');
        }
        Ok(out)
    }
}
