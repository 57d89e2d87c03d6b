use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockflow_core::{StockUnitId, SubjectId};

use crate::event::Event;

/// An event as published after its pass was committed.
///
/// Every event of one commit shares a `pass_id`; `sequence_number` orders
/// them within that pass, starting at 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    pass_id: Uuid,
    subject_id: SubjectId,
    unit_id: StockUnitId,
    sequence_number: u64,
    payload: E,
}

impl<E: Event> EventEnvelope<E> {
    /// Wrap `payload` under a fresh time-ordered id.
    pub fn wrap(pass_id: Uuid, sequence_number: u64, payload: E) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            pass_id,
            subject_id: payload.subject_id(),
            unit_id: payload.unit_id(),
            sequence_number,
            payload,
        }
    }
}

impl<E> EventEnvelope<E> {
    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn pass_id(&self) -> Uuid {
        self.pass_id
    }

    pub fn subject_id(&self) -> SubjectId {
        self.subject_id
    }

    pub fn unit_id(&self) -> StockUnitId {
        self.unit_id
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }
}
