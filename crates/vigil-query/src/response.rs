use std::sync::Arc;

use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use vigil_core::point::{TraceId, TracePoint};
use vigil_transaction::Transaction;

const NANOS_PER_MILLI: f64 = 1_000_000.0;

/// One response entry, serialized as the array
/// `[captureTimeMillis, durationMillis, id]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponsePoint {
    pub capture_time_ms: u64,
    pub duration_millis: f64,
    pub id: TraceId,
}

impl Serialize for ResponsePoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(3))?;
        seq.serialize_element(&self.capture_time_ms)?;
        seq.serialize_element(&self.duration_millis)?;
        seq.serialize_element(&self.id)?;
        seq.end()
    }
}

/// The assembled answer to a point query.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointResponse {
    pub normal_points: Vec<ResponsePoint>,
    pub error_points: Vec<ResponsePoint>,
    pub active_points: Vec<ResponsePoint>,
    /// True if the store held more matches than the query limit.
    #[serde(skip_serializing_if = "is_false")]
    pub limit_exceeded: bool,
    /// True if the result is empty because the window predates retention.
    #[serde(skip_serializing_if = "is_false")]
    pub expired: bool,
}

fn is_false(value: &bool) -> bool {
    !value
}

/// Partition merged points by their error flag, preserving relative order, and
/// emit the surviving active transactions against the snapshot's single
/// capture time / capture tick pair.
pub(crate) fn assemble_response(
    points: Vec<TracePoint>,
    active: &[Arc<Transaction>],
    capture_time_ms: u64,
    capture_tick: u64,
    limit_exceeded: bool,
    expired: bool,
) -> PointResponse {
    let mut normal_points = Vec::new();
    let mut error_points = Vec::new();
    for point in points {
        let entry = ResponsePoint {
            capture_time_ms: point.capture_time_ms,
            duration_millis: point.duration.as_nanos() as f64 / NANOS_PER_MILLI,
            id: point.id,
        };
        if point.error {
            error_points.push(entry);
        } else {
            normal_points.push(entry);
        }
    }

    let active_points = active
        .iter()
        .map(|transaction| ResponsePoint {
            capture_time_ms,
            duration_millis: transaction.duration_at(capture_tick).as_nanos() as f64
                / NANOS_PER_MILLI,
            id: transaction.id(),
        })
        .collect();

    PointResponse {
        normal_points,
        error_points,
        active_points,
        limit_exceeded,
        expired,
    }
}
