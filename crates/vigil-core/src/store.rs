use crate::error::StorageError;
use crate::point::{TraceId, TracePoint, TraceRecord};
use crate::query::PointQuery;

/// A bounded page of points plus whether the store holds more matches.
#[derive(Debug, Clone, Default)]
pub struct PointQueryResult {
    /// Matching points, ordered by duration descending.
    pub points: Vec<TracePoint>,
    /// True if the store holds additional matches beyond the query limit.
    pub more_available: bool,
}

/// Abstraction over durable trace storage backends.
pub trait TraceStore: Send + Sync {
    /// Persist the record of a completed transaction.
    fn insert(&self, record: &TraceRecord) -> Result<(), StorageError>;

    /// Retrieve a stored record by id.
    fn get(&self, id: &TraceId) -> Result<Option<TraceRecord>, StorageError>;

    /// Read the points matching `query`, bounded by `query.limit`.
    ///
    /// The returned list MUST be ordered by duration descending; the query
    /// engine's merge step relies on that ordering.
    fn read_points(&self, query: &PointQuery) -> Result<PointQueryResult, StorageError>;

    /// Total stored record count.
    fn count(&self) -> Result<u64, StorageError>;
}
