//! Prioritization pipeline (application-level orchestration).
//!
//! ```text
//! Demand
//!   ↓
//! 1. Open a pass context over the store (units load lazily, at most once)
//!   ↓
//! 2. Check: could anything change? (read only)
//!   ↓
//! 3. Prioritize in memory (moves, splits, merges, exchanges)
//!   ↓
//! 4. Commit the change set atomically (per-unit version checks)
//!   ↓
//! 5. Publish the pass's audit events to the bus
//! ```
//!
//! A version conflict at step 4 throws the pass away and runs it again on
//! fresh state, up to `max_retries` times. Any other failure aborts the pass
//! with nothing written.

use uuid::Uuid;

use stockflow_allocation::{
    AllocationConfig, AllocationError, DemandDirectory, PassContext, PrioritizeChecker,
    Prioritizer, RepositoryError, StockUnitRepository,
};
use stockflow_core::{DemandItemId, DomainError};
use stockflow_demand::Demand;
use stockflow_events::{EventBus, EventEnvelope};
use stockflow_stock::StockEvent;

#[derive(Debug)]
pub enum PrioritizeError {
    /// Conflicts persisted through every retry.
    Concurrency(String),
    /// Malformed demand (deterministic).
    Validation(String),
    /// A move would break a stock invariant (deterministic).
    InvariantViolation(String),
    /// Inconsistent state, e.g. an assignment missing from its unit.
    Logic(String),
    /// The repository failed for another reason than a conflict.
    Store(String),
}

impl From<DomainError> for PrioritizeError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => PrioritizeError::Validation(msg),
            DomainError::InvalidId(msg) => PrioritizeError::Validation(msg),
            DomainError::InvariantViolation(msg) => PrioritizeError::InvariantViolation(msg),
            DomainError::Logic(msg) => PrioritizeError::Logic(msg),
            DomainError::Conflict(msg) => PrioritizeError::Concurrency(msg),
        }
    }
}

impl From<RepositoryError> for PrioritizeError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Conflict(msg) => PrioritizeError::Concurrency(msg),
            RepositoryError::Unavailable(msg) => PrioritizeError::Store(msg),
        }
    }
}

impl From<AllocationError> for PrioritizeError {
    fn from(value: AllocationError) -> Self {
        match value {
            AllocationError::Domain(e) => e.into(),
            AllocationError::Repository(e) => e.into(),
        }
    }
}

/// Summary of a committed (or skipped) pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PassReport {
    pub changed: bool,
    pub saved_units: usize,
    pub removed_units: usize,
    pub events: usize,
    /// Passes run, including the successful one.
    pub attempts: u32,
    /// Shared by every event the commit published.
    pub pass_id: Option<Uuid>,
}

/// Runs prioritization passes against a store and publishes their audit
/// trail.
#[derive(Debug)]
pub struct PrioritizationService<S, B> {
    store: S,
    bus: B,
    config: AllocationConfig,
    checker: PrioritizeChecker,
    prioritizer: Prioritizer,
}

impl<S, B> PrioritizationService<S, B> {
    pub fn new(store: S, bus: B, config: AllocationConfig) -> Self {
        Self {
            store,
            bus,
            config,
            checker: PrioritizeChecker::new(),
            prioritizer: Prioritizer::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &AllocationConfig {
        &self.config
    }
}

impl<S, B> PrioritizationService<S, B>
where
    S: StockUnitRepository + DemandDirectory,
    B: EventBus<EventEnvelope<StockEvent>>,
{
    /// Whether prioritizing `demand` could change anything.
    pub fn check(&self, demand: &Demand) -> Result<bool, PrioritizeError> {
        let mut ctx = PassContext::new(&self.store, &self.store, &self.config);
        Ok(self.checker.check(&mut ctx, demand)?)
    }

    pub fn prioritize(&self, demand: &Demand) -> Result<PassReport, PrioritizeError> {
        self.run(demand, |ctx| {
            if !self.checker.check(ctx, demand)? {
                return Ok(false);
            }
            self.prioritizer.prioritize(ctx, demand)
        })
    }

    pub fn prioritize_item(
        &self,
        demand: &Demand,
        item: DemandItemId,
    ) -> Result<PassReport, PrioritizeError> {
        self.run(demand, |ctx| {
            if !self.checker.check_item(ctx, demand, item)? {
                return Ok(false);
            }
            self.prioritizer.prioritize_item(ctx, demand, item)
        })
    }

    fn run(
        &self,
        demand: &Demand,
        pass: impl Fn(&mut PassContext<'_>) -> Result<bool, AllocationError>,
    ) -> Result<PassReport, PrioritizeError> {
        let attempts = self.config.max_retries + 1;
        let mut last_conflict = String::new();

        for attempt in 1..=attempts {
            let mut ctx = PassContext::new(&self.store, &self.store, &self.config);
            let changed = pass(&mut ctx)?;
            let outcome = ctx.finish();

            if outcome.changes.is_empty() {
                tracing::debug!(demand = %demand.id_typed(), attempt, "nothing to commit");
                return Ok(PassReport {
                    changed: false,
                    attempts: attempt,
                    ..PassReport::default()
                });
            }

            let saved_units = outcome.changes.saved.len();
            let removed_units = outcome.changes.removed.len();
            match self.store.commit(outcome.changes) {
                Ok(()) => {
                    let pass_id = Uuid::now_v7();
                    let events = self.publish(pass_id, outcome.events);
                    tracing::info!(
                        demand = %demand.id_typed(),
                        %pass_id,
                        attempt,
                        saved_units,
                        removed_units,
                        events,
                        "prioritization committed"
                    );
                    return Ok(PassReport {
                        changed,
                        saved_units,
                        removed_units,
                        events,
                        attempts: attempt,
                        pass_id: Some(pass_id),
                    });
                }
                Err(RepositoryError::Conflict(msg)) => {
                    tracing::warn!(demand = %demand.id_typed(), attempt, %msg, "conflict, retrying pass");
                    last_conflict = msg;
                }
                Err(other) => return Err(other.into()),
            }
        }

        Err(PrioritizeError::Concurrency(format!(
            "gave up after {attempts} attempts: {last_conflict}"
        )))
    }

    /// Publish committed events in order; returns how many went out.
    fn publish(&self, pass_id: Uuid, events: Vec<StockEvent>) -> usize {
        let mut published = 0;
        for (index, event) in events.into_iter().enumerate() {
            let envelope = EventEnvelope::wrap(pass_id, index as u64 + 1, event);
            match self.bus.publish(envelope) {
                Ok(()) => published += 1,
                Err(e) => {
                    tracing::warn!(%pass_id, error = ?e, "audit event publication failed");
                    break;
                }
            }
        }
        published
    }
}
