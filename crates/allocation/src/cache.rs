use std::collections::{BTreeMap, BTreeSet};

use stockflow_core::{AggregateRoot, DemandItemId, StockAssignmentId, StockUnitId, SubjectId};
use stockflow_stock::StockUnit;

use crate::repository::ChangeSet;

/// Identity map of the stock units touched by one pass.
///
/// A unit enters the cache once; later loads of the same unit are ignored so
/// that in-memory changes are never overwritten by stale copies. The cache
/// also remembers which queries already ran.
#[derive(Debug, Default)]
pub struct StockUnitCache {
    units: BTreeMap<StockUnitId, StockUnit>,
    dirty: BTreeSet<StockUnitId>,
    loaded_items: BTreeSet<DemandItemId>,
    loaded_ready: BTreeSet<SubjectId>,
    loaded_assignable: BTreeSet<SubjectId>,
}

impl StockUnitCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a unit unless one with the same id is already cached.
    /// Returns whether the unit was added.
    pub fn add(&mut self, unit: StockUnit) -> bool {
        let id = unit.id_typed();
        if self.units.contains_key(&id) {
            return false;
        }
        self.units.insert(id, unit);
        true
    }

    pub fn contains(&self, id: StockUnitId) -> bool {
        self.units.contains_key(&id)
    }

    pub fn get(&self, id: StockUnitId) -> Option<&StockUnit> {
        self.units.get(&id)
    }

    /// Mutable access; the unit is recorded as changed.
    pub fn get_mut(&mut self, id: StockUnitId) -> Option<&mut StockUnit> {
        let unit = self.units.get_mut(&id)?;
        self.dirty.insert(id);
        Some(unit)
    }

    /// Take a unit out, e.g. to mutate it together with another one.
    /// It must come back through [`StockUnitCache::put_back`].
    pub fn take(&mut self, id: StockUnitId) -> Option<StockUnit> {
        self.units.remove(&id)
    }

    /// Return a taken unit; `touched` records it as changed.
    pub fn put_back(&mut self, unit: StockUnit, touched: bool) {
        let id = unit.id_typed();
        if touched {
            self.dirty.insert(id);
        }
        self.units.insert(id, unit);
    }

    /// Insert a unit created during the pass.
    pub fn insert_new(&mut self, unit: StockUnit) {
        self.put_back(unit, true);
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Cached units of `subject`, by ascending id.
    pub fn units_of_subject(&self, subject: SubjectId) -> impl Iterator<Item = &StockUnit> {
        self.units.values().filter(move |u| u.subject_id() == subject)
    }

    /// The unit currently holding `assignment`.
    pub fn locate(&self, assignment: StockAssignmentId) -> Option<&StockUnit> {
        self.units
            .values()
            .find(|u| u.assignment(assignment).is_some())
    }

    /// `(unit, assignment)` pairs for a demand line, oldest assignment first.
    pub fn assignments_for_item(&self, item: DemandItemId) -> Vec<(StockUnitId, StockAssignmentId)> {
        let mut found: Vec<_> = self
            .units
            .values()
            .filter_map(|u| u.assignment_for_item(item).map(|a| (u.id_typed(), a.id_typed())))
            .collect();
        found.sort_by_key(|(_, a)| *a);
        found
    }

    pub(crate) fn item_loaded(&mut self, item: DemandItemId) -> bool {
        !self.loaded_items.insert(item)
    }

    pub(crate) fn ready_loaded(&mut self, subject: SubjectId) -> bool {
        !self.loaded_ready.insert(subject)
    }

    pub(crate) fn assignable_loaded(&mut self, subject: SubjectId) -> bool {
        !self.loaded_assignable.insert(subject)
    }

    pub fn clear(&mut self) {
        self.units.clear();
        self.dirty.clear();
        self.loaded_items.clear();
        self.loaded_ready.clear();
        self.loaded_assignable.clear();
    }

    /// Turn changed units into a change set.
    ///
    /// Removable units are deleted, or dropped silently when they were
    /// created by this pass and never stored.
    pub fn into_changes(mut self) -> ChangeSet {
        let mut changes = ChangeSet::default();
        for id in std::mem::take(&mut self.dirty) {
            let Some(unit) = self.units.remove(&id) else {
                continue;
            };
            if unit.is_removable() {
                if unit.is_persisted() {
                    changes.removed.push((id, unit.expected_version()));
                }
                continue;
            }
            changes.saved.push(unit);
        }
        changes
    }
}
