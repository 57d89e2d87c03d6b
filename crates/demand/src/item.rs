use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockflow_core::{DemandItemId, Quantity, SubjectId};

/// Capability shared by every demand line that can carry stock assignments.
///
/// A line exposes its children and its quantity relative to its parent. Its
/// assignments live on stock units and are resolved by [`Assignable::item_id`]
/// through the stock repository.
pub trait Assignable {
    type Child: Assignable;

    fn item_id(&self) -> DemandItemId;

    /// The stock subject of the line, `None` for lines that do not hold stock
    /// themselves (e.g. a bundle parent).
    fn subject_id(&self) -> Option<SubjectId>;

    /// Quantity per unit of the parent (or absolute, for a root line).
    fn quantity(&self) -> Quantity;

    fn children(&self) -> &[Self::Child];

    /// Effective quantity given the parent's total quantity.
    fn total_quantity(&self, parent_total: Quantity) -> Quantity {
        self.quantity() * parent_total
    }

    fn is_stock_managed(&self) -> bool {
        self.subject_id().is_some()
    }
}

/// Demand line: order line, production line or a nested child line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemandItem {
    id: DemandItemId,
    subject_id: Option<SubjectId>,
    quantity: Quantity,
    children: Vec<DemandItem>,
}

impl DemandItem {
    /// A line holding stock of `subject`.
    pub fn stocked(id: DemandItemId, subject_id: SubjectId, quantity: Quantity) -> Self {
        Self {
            id,
            subject_id: Some(subject_id),
            quantity,
            children: Vec::new(),
        }
    }

    /// A line that only groups children.
    pub fn group(id: DemandItemId, quantity: Quantity) -> Self {
        Self {
            id,
            subject_id: None,
            quantity,
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: DemandItem) -> Self {
        self.children.push(child);
        self
    }

    /// Whether the subtree rooted at this line has more than `max` levels
    /// (a leaf has one). Stops descending once the bound is crossed.
    pub fn is_deeper_than(&self, max: usize) -> bool {
        match max {
            0 => true,
            _ => self.children.iter().any(|c| c.is_deeper_than(max - 1)),
        }
    }

    /// Find a line in this subtree, with its effective quantity.
    pub fn find(&self, id: DemandItemId, parent_total: Quantity) -> Option<(&DemandItem, Quantity)> {
        let total = self.total_quantity(parent_total);
        if self.id == id {
            return Some((self, total));
        }
        self.children.iter().find_map(|c| c.find(id, total))
    }

    pub(crate) fn collect_ids(&self, out: &mut Vec<DemandItemId>) {
        out.push(self.id);
        for child in &self.children {
            child.collect_ids(out);
        }
    }

    pub(crate) fn has_non_positive_quantity(&self) -> bool {
        self.quantity <= Decimal::ZERO || self.children.iter().any(DemandItem::has_non_positive_quantity)
    }
}

impl Assignable for DemandItem {
    type Child = DemandItem;

    fn item_id(&self) -> DemandItemId {
        self.id
    }

    fn subject_id(&self) -> Option<SubjectId> {
        self.subject_id
    }

    fn quantity(&self) -> Quantity {
        self.quantity
    }

    fn children(&self) -> &[DemandItem] {
        &self.children
    }
}
