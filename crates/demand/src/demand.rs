use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockflow_core::{DemandId, DemandItemId, DomainError, DomainResult, Quantity};

use crate::item::DemandItem;

/// Kind of demand competing for stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DemandKind {
    /// Customer order.
    Order,
    /// Production order consuming components.
    Production,
    /// Any other sale document holding stock (e.g. a counter sale).
    Sale,
}

/// Workflow status of a demand, as reported by the surrounding workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemandStatus {
    New,
    Pending,
    Accepted,
    InProgress,
    Completed,
    Canceled,
    Refunded,
}

/// Shipment progress of a demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentState {
    New,
    Pending,
    Partial,
    /// A shipment is being prepared: quantities are locked.
    Preparation,
    Completed,
    Returned,
}

impl ShipmentState {
    /// Nothing left to ship (or the goods came back).
    pub fn is_done(self) -> bool {
        matches!(self, ShipmentState::Completed | ShipmentState::Returned)
    }
}

/// Demand: the top of a tree of lines holding stock assignments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Demand {
    id: DemandId,
    kind: DemandKind,
    status: DemandStatus,
    shipment_state: ShipmentState,
    /// Multiplier applied to root lines (production quantity; 1 otherwise).
    quantity: Quantity,
    items: Vec<DemandItem>,
}

impl Demand {
    fn empty(id: DemandId, kind: DemandKind, quantity: Quantity) -> Self {
        Self {
            id,
            kind,
            status: DemandStatus::New,
            shipment_state: ShipmentState::New,
            quantity,
            items: Vec::new(),
        }
    }

    pub fn order(id: DemandId) -> Self {
        Self::empty(id, DemandKind::Order, Decimal::ONE)
    }

    pub fn sale(id: DemandId) -> Self {
        Self::empty(id, DemandKind::Sale, Decimal::ONE)
    }

    /// A production order making `quantity` products; its lines are per product.
    pub fn production(id: DemandId, quantity: Quantity) -> Self {
        Self::empty(id, DemandKind::Production, quantity)
    }

    pub fn with_status(mut self, status: DemandStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_shipment_state(mut self, state: ShipmentState) -> Self {
        self.shipment_state = state;
        self
    }

    pub fn with_item(mut self, item: DemandItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn id_typed(&self) -> DemandId {
        self.id
    }

    pub fn kind(&self) -> DemandKind {
        self.kind
    }

    pub fn status(&self) -> DemandStatus {
        self.status
    }

    pub fn shipment_state(&self) -> ShipmentState {
        self.shipment_state
    }

    pub fn items(&self) -> &[DemandItem] {
        &self.items
    }

    /// Total quantity a root line's quantity is multiplied by.
    pub fn root_quantity(&self) -> Quantity {
        self.quantity
    }

    /// Whether the workflow status allows the demand to hold stock.
    pub fn is_stockable_state(&self) -> bool {
        match self.kind {
            DemandKind::Order => matches!(
                self.status,
                DemandStatus::Pending | DemandStatus::Accepted | DemandStatus::InProgress
            ),
            DemandKind::Sale => {
                matches!(self.status, DemandStatus::Pending | DemandStatus::Accepted)
            }
            DemandKind::Production => {
                matches!(self.status, DemandStatus::Accepted | DemandStatus::InProgress)
            }
        }
    }

    /// Find a line anywhere in the tree, with its effective quantity.
    pub fn find_item(&self, id: DemandItemId) -> Option<(&DemandItem, Quantity)> {
        self.items.iter().find_map(|i| i.find(id, self.quantity))
    }

    /// Like [`Demand::find_item`], for callers that name a line explicitly.
    pub fn line(&self, id: DemandItemId) -> DomainResult<(&DemandItem, Quantity)> {
        self.find_item(id).ok_or_else(|| {
            DomainError::validation(format!("line {id} is not part of demand {}", self.id))
        })
    }

    /// Whether any line tree has more than `max` levels.
    pub fn is_deeper_than(&self, max: usize) -> bool {
        self.items.iter().any(|item| item.is_deeper_than(max))
    }

    /// Check that quantities are positive and line ids unique.
    pub fn validate(&self) -> DomainResult<()> {
        if self.quantity <= Decimal::ZERO {
            return Err(DomainError::validation("demand quantity must be positive"));
        }
        if self.items.iter().any(DemandItem::has_non_positive_quantity) {
            return Err(DomainError::validation("line quantity must be positive"));
        }
        let mut ids = Vec::new();
        for item in &self.items {
            item.collect_ids(&mut ids);
        }
        ids.sort();
        if ids.windows(2).any(|w| w[0] == w[1]) {
            return Err(DomainError::validation("line ids must be unique within a demand"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use stockflow_core::SubjectId;

    fn line(id: u64, qty: Quantity) -> DemandItem {
        DemandItem::stocked(DemandItemId::new(id), SubjectId::new(1), qty)
    }

    #[test]
    fn stockable_states_depend_on_kind() {
        let order = Demand::order(DemandId::new(1)).with_status(DemandStatus::InProgress);
        assert!(order.is_stockable_state());

        let sale = Demand::sale(DemandId::new(2)).with_status(DemandStatus::InProgress);
        assert!(!sale.is_stockable_state());

        let production = Demand::production(DemandId::new(3), dec!(4)).with_status(DemandStatus::Pending);
        assert!(!production.is_stockable_state());
        let production = production.with_status(DemandStatus::Accepted);
        assert!(production.is_stockable_state());

        let canceled = Demand::order(DemandId::new(4)).with_status(DemandStatus::Canceled);
        assert!(!canceled.is_stockable_state());
    }

    #[test]
    fn production_lines_are_multiplied_by_production_quantity() {
        let production = Demand::production(DemandId::new(1), dec!(4)).with_item(line(1, dec!(2.5)));
        let (_, total) = production.find_item(DemandItemId::new(1)).unwrap();
        assert_eq!(total, dec!(10));
    }

    #[test]
    fn unknown_line_is_a_validation_error() {
        let demand = Demand::order(DemandId::new(1)).with_item(line(1, dec!(1)));
        assert!(demand.line(DemandItemId::new(1)).is_ok());
        assert!(matches!(
            demand.line(DemandItemId::new(9)),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn validate_rejects_duplicate_line_ids() {
        let demand = Demand::order(DemandId::new(1))
            .with_item(line(1, dec!(1)))
            .with_item(DemandItem::group(DemandItemId::new(2), dec!(1)).with_child(line(1, dec!(1))));
        let err = demand.validate().unwrap_err();
        match err {
            DomainError::Validation(msg) if msg.contains("unique") => {}
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_non_positive_quantities() {
        let demand = Demand::order(DemandId::new(1)).with_item(line(1, dec!(0)));
        assert!(demand.validate().is_err());
    }
}
