use chrono::{DateTime, Utc};

use stockflow_core::{StockUnitId, SubjectId};

/// A recorded stock movement.
///
/// Each event belongs to the stream of the unit whose counters it changed;
/// the subject is carried along so consumers can follow one product.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Dotted name, e.g. `stock.assignment.merged`.
    fn event_type(&self) -> &'static str;

    /// Payload schema version.
    fn version(&self) -> u32;

    fn occurred_at(&self) -> DateTime<Utc>;

    fn subject_id(&self) -> SubjectId;

    fn unit_id(&self) -> StockUnitId;
}
