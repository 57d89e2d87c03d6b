//! Audit events and their transport.
//!
//! Every quantity delta applied by the allocation engine is described by an
//! event; events are wrapped in an [`EventEnvelope`] and handed to an
//! [`EventBus`] once the pass that produced them has been committed.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
