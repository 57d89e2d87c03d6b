use std::sync::Arc;

use proptest::prelude::*;
use rust_decimal::Decimal;

use stockflow_allocation::AllocationConfig;
use stockflow_core::{DemandId, DemandItemId, StockAssignmentId, StockUnitId, SubjectId, SupplyLineId};
use stockflow_demand::{Demand, DemandItem, DemandStatus};
use stockflow_events::{EventEnvelope, InMemoryEventBus};
use stockflow_infra::{InMemoryStockStore, PrioritizationService};
use stockflow_stock::{StockEvent, StockUnit};

const SUBJECT: SubjectId = SubjectId::new(7);

fn build_store(supply: &[(u32, u32)], credits: &[(usize, u64, u32)]) -> (InMemoryStockStore, Decimal) {
    let mut units: Vec<StockUnit> = supply
        .iter()
        .enumerate()
        .map(|(n, &(pending, received))| {
            let id = n as u64 + 1;
            let mut unit = StockUnit::new(StockUnitId::new(id), SUBJECT);
            let ordered = Decimal::from(pending + received);
            if ordered > Decimal::ZERO {
                unit.link_supply(SupplyLineId::new(id), ordered, Decimal::ONE).unwrap();
            }
            if received > 0 {
                unit.receive(Decimal::from(received)).unwrap();
            }
            unit
        })
        .collect();

    let mut next = 1;
    let mut line_total = Decimal::ZERO;
    for &(slot, item, qty) in credits {
        let unit = &mut units[slot % supply.len()];
        let quantity = Decimal::from(qty);
        let capacity = unit.ordered_quantity() + unit.received_quantity();
        if unit.sold_quantity() + quantity > capacity {
            continue;
        }
        let id = StockAssignmentId::new(next);
        next += 1;
        unit.credit(DemandItemId::new(item), DemandId::new(item), quantity, || id)
            .unwrap();
        if item == 1 {
            line_total += quantity;
        }
    }

    let store = InMemoryStockStore::new();
    for unit in units {
        store.save(unit).unwrap();
    }
    (store, line_total)
}

fn sold_per_item(store: &InMemoryStockStore) -> Vec<(DemandItemId, Decimal)> {
    let mut totals = std::collections::BTreeMap::new();
    for unit in store.units().unwrap() {
        for a in unit.assignments() {
            *totals.entry(a.demand_item_id()).or_insert(Decimal::ZERO) += a.sold_quantity();
        }
    }
    totals.into_iter().collect()
}

proptest! {
    #[test]
    fn prioritizing_never_changes_what_each_line_holds(
        supply in prop::collection::vec((0u32..12, 0u32..12), 2..5),
        credits in prop::collection::vec((0usize..5, 1u64..5, 1u32..6), 1..12),
    ) {
        let (store, line_total) = build_store(&supply, &credits);
        prop_assume!(line_total > Decimal::ZERO);
        let before = sold_per_item(&store);

        let bus = Arc::new(InMemoryEventBus::<EventEnvelope<StockEvent>>::new());
        let service = PrioritizationService::new(store, bus, AllocationConfig::default());
        let demand = Demand::order(DemandId::new(1))
            .with_status(DemandStatus::Accepted)
            .with_item(DemandItem::stocked(DemandItemId::new(1), SUBJECT, line_total));
        service.prioritize(&demand).unwrap();

        let store = service.store();
        prop_assert_eq!(sold_per_item(store), before);
        for unit in store.units().unwrap() {
            prop_assert!(unit.verify().is_ok());
            prop_assert!(unit.sold_quantity() <= unit.ordered_quantity() + unit.received_quantity());
        }
    }
}
