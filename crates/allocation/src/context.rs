use chrono::{DateTime, Utc};

use stockflow_core::{DemandId, DemandItemId, StockAssignmentId, StockUnitId, SubjectId};
use stockflow_demand::ShipmentState;
use stockflow_stock::{StockEvent, StockUnit, UnitCreated};

use crate::cache::StockUnitCache;
use crate::config::AllocationConfig;
use crate::error::AllocationResult;
use crate::repository::{ChangeSet, DemandDirectory, StockUnitRepository};

/// What a pass leaves behind once it is done.
#[derive(Debug, Default)]
pub struct PassOutcome {
    pub changes: ChangeSet,
    /// Audit events, in the order the changes were applied.
    pub events: Vec<StockEvent>,
}

/// State threaded through every component during one prioritization pass.
///
/// Nothing reaches the store until [`PassContext::finish`] hands the change
/// set to the caller.
pub struct PassContext<'a> {
    repository: &'a dyn StockUnitRepository,
    directory: &'a dyn DemandDirectory,
    config: &'a AllocationConfig,
    cache: StockUnitCache,
    events: Vec<StockEvent>,
    started_at: DateTime<Utc>,
}

impl<'a> PassContext<'a> {
    pub fn new(
        repository: &'a dyn StockUnitRepository,
        directory: &'a dyn DemandDirectory,
        config: &'a AllocationConfig,
    ) -> Self {
        Self {
            repository,
            directory,
            config,
            cache: StockUnitCache::new(),
            events: Vec::new(),
            started_at: Utc::now(),
        }
    }

    pub fn config(&self) -> &AllocationConfig {
        self.config
    }

    pub fn directory(&self) -> &'a dyn DemandDirectory {
        self.directory
    }

    pub fn cache(&self) -> &StockUnitCache {
        &self.cache
    }

    /// Timestamp stamped on every event of the pass.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn shipment_state(&self, demand: DemandId) -> Option<ShipmentState> {
        self.directory.shipment_state(demand)
    }

    /// Load the units holding assignments of `item` (once per pass).
    pub fn load_item_units(&mut self, item: DemandItemId) -> AllocationResult<()> {
        if self.cache.item_loaded(item) {
            return Ok(());
        }
        let units = self.repository.find_units_by_item(item)?;
        tracing::debug!(item = %item, units = units.len(), "loaded units of demand line");
        for unit in units {
            self.cache.add(unit);
        }
        Ok(())
    }

    /// Load the READY and PENDING units of `subject` (once per pass).
    pub fn load_ready_units(&mut self, subject: SubjectId) -> AllocationResult<()> {
        if self.cache.ready_loaded(subject) {
            return Ok(());
        }
        let units = self.repository.find_ready_units(subject)?;
        tracing::debug!(subject = %subject, units = units.len(), "loaded ready units");
        for unit in units {
            self.cache.add(unit);
        }
        Ok(())
    }

    /// Load every non-closed unit of `subject` (once per pass).
    pub fn load_assignable_units(&mut self, subject: SubjectId) -> AllocationResult<()> {
        if self.cache.assignable_loaded(subject) {
            return Ok(());
        }
        let units = self.repository.find_assignable_units(subject)?;
        tracing::debug!(subject = %subject, units = units.len(), "loaded assignable units");
        for unit in units {
            self.cache.add(unit);
        }
        Ok(())
    }

    /// Assignments of an already loaded demand line, oldest first.
    pub fn item_assignments(&self, item: DemandItemId) -> Vec<(StockUnitId, StockAssignmentId)> {
        self.cache.assignments_for_item(item)
    }

    pub fn unit(&self, id: StockUnitId) -> Option<&StockUnit> {
        self.cache.get(id)
    }

    pub fn unit_mut(&mut self, id: StockUnitId) -> Option<&mut StockUnit> {
        self.cache.get_mut(id)
    }

    pub(crate) fn take_unit(&mut self, id: StockUnitId) -> Option<StockUnit> {
        self.cache.take(id)
    }

    pub(crate) fn put_back(&mut self, unit: StockUnit, touched: bool) {
        self.cache.put_back(unit, touched);
    }

    /// Create a virtual unit of `subject` in the cache.
    pub fn create_unit(&mut self, subject: SubjectId) -> StockUnitId {
        let id = self.repository.next_unit_id();
        self.cache.insert_new(StockUnit::new(id, subject));
        self.record(StockEvent::UnitCreated(UnitCreated {
            subject_id: subject,
            unit_id: id,
            occurred_at: self.started_at,
        }));
        tracing::debug!(unit = %id, subject = %subject, "created virtual unit");
        id
    }

    /// The repository, also the source of fresh assignment ids.
    pub fn repository(&self) -> &'a dyn StockUnitRepository {
        self.repository
    }

    pub fn record(&mut self, event: StockEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[StockEvent] {
        &self.events
    }

    pub fn finish(self) -> PassOutcome {
        PassOutcome {
            changes: self.cache.into_changes(),
            events: self.events,
        }
    }
}
