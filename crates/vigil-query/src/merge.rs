use std::sync::Arc;

use vigil_core::point::TracePoint;
use vigil_transaction::Transaction;

/// Fold one pending point into the duration-descending `ordered` list.
///
/// A duplicate id never inserts: the stored entry is replaced only when the
/// pending view shows a strictly longer duration (the unit kept running after
/// its record was captured). Otherwise the point lands immediately before the
/// first entry with a strictly smaller duration, or at the end.
pub(crate) fn insert_into_ordered_points(pending: TracePoint, ordered: &mut Vec<TracePoint>) {
    let mut duplicate_index = None;
    let mut insertion_index = None;
    // Check for a duplicate and capture the insertion index in one pass.
    for (i, point) in ordered.iter().enumerate() {
        if point.id == pending.id {
            duplicate_index = Some(i);
            break;
        }
        if pending.duration > point.duration {
            insertion_index = Some(i);
            break;
        }
    }
    if let Some(i) = duplicate_index {
        if pending.duration > ordered[i].duration {
            ordered[i] = pending;
        }
        return;
    }
    match insertion_index {
        Some(i) => ordered.insert(i, pending),
        None => ordered.push(pending),
    }
}

/// Remove id collisions between the active snapshot and the merged point list.
///
/// The side reflecting the longer elapsed duration wins: a live duration past
/// the point's means the unit is still running beyond the moment its point was
/// captured, so the point is stale; otherwise the point is the more complete
/// view and the active entry goes.
pub(crate) fn remove_duplicates(
    active: &mut Vec<Arc<Transaction>>,
    points: &mut Vec<TracePoint>,
    capture_tick: u64,
) {
    let mut i = 0;
    'active: while i < active.len() {
        for j in 0..points.len() {
            if points[j].id != active[i].id() {
                continue;
            }
            if active[i].duration_at(capture_tick) > points[j].duration {
                points.remove(j);
                i += 1;
            } else {
                active.remove(i);
            }
            // At most one duplicate per id.
            continue 'active;
        }
        i += 1;
    }
}
