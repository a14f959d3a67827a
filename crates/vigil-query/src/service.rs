use std::sync::Arc;

use tracing::debug;
use vigil_core::config::StorageConfig;
use vigil_core::error::StorageError;
use vigil_core::point::TracePoint;
use vigil_core::query::PointQuery;
use vigil_core::store::TraceStore;
use vigil_core::time::TimeSource;
use vigil_transaction::{TraceCollector, Transaction, TransactionRegistry};

use crate::filter::matches_transaction;
use crate::merge::{insert_into_ordered_points, remove_duplicates};
use crate::response::{PointResponse, assemble_response};

/// Answers point queries by merging the three views of a unit of work's
/// lifetime — the live registry, the pending buffer and the durable store —
/// into one deduplicated, duration-ordered, size-bounded result.
///
/// Runs synchronously on the calling thread and is a pure reader of the shared
/// structures; only the store call may block.
pub struct TracePointService {
    store: Arc<dyn TraceStore>,
    registry: Arc<TransactionRegistry>,
    collector: Arc<TraceCollector>,
    config: StorageConfig,
    time: Arc<dyn TimeSource>,
}

impl TracePointService {
    pub fn new(
        store: Arc<dyn TraceStore>,
        registry: Arc<TransactionRegistry>,
        collector: Arc<TraceCollector>,
        config: StorageConfig,
        time: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            store,
            registry,
            collector,
            config,
            time,
        }
    }

    /// Execute one point query.
    pub fn query_points(&self, query: &PointQuery) -> Result<PointResponse, StorageError> {
        let capture_active = self.should_capture_active(query);
        let mut active = Vec::new();
        let mut capture_time_ms = 0;
        let mut capture_tick = 0;
        if capture_active {
            // Snapshot active transactions first so none are missed in the
            // transition between active and pending/stored; duplicates are
            // reconciled below.
            active = self.matching_active_transactions(query);
            // The clock pair is read only after the snapshot, so no snapshot
            // member can have started after the recorded tick.
            capture_time_ms = self.time.wall_millis();
            capture_tick = self.time.tick_nanos();
        }
        // Pending is read before the store so a transaction moving from
        // pending to stored mid-query is seen in at least one of the two.
        let pending = if capture_active {
            self.matching_pending_points(query)
        } else {
            Vec::new()
        };
        let stored = self.store.read_points(query)?;
        let mut points = stored.points;
        debug_assert!(
            points.windows(2).all(|w| w[0].duration >= w[1].duration),
            "store returned points out of duration order"
        );
        for pending_point in pending {
            insert_into_ordered_points(pending_point, &mut points);
        }
        remove_duplicates(&mut active, &mut points, capture_tick);
        let expired = points.is_empty() && self.window_expired(query);
        debug!(
            points = points.len(),
            active = active.len(),
            more_available = stored.more_available,
            "answered point query"
        );
        Ok(assemble_response(
            points,
            &active,
            capture_time_ms,
            capture_tick,
            stored.more_available,
            expired,
        ))
    }

    /// Active transactions can only be part of the answer if the window end is
    /// open or still in the future and the window start is already in the
    /// past. A purely historical window skips active capture and pending
    /// collection entirely.
    fn should_capture_active(&self, query: &PointQuery) -> bool {
        let now = self.time.wall_millis();
        (query.to == 0 || query.to > now) && query.from < now
    }

    fn matching_active_transactions(&self, query: &PointQuery) -> Vec<Arc<Transaction>> {
        let mut active: Vec<Arc<Transaction>> = self
            .registry
            .active_transactions()
            .into_iter()
            .filter(|transaction| matches_transaction(query, transaction, &self.collector))
            .collect();
        active.sort_by_key(|transaction| transaction.start_tick());
        if query.limit != 0 && active.len() > query.limit {
            // The oldest matching transactions are the ones retained.
            active.truncate(query.limit);
        }
        active
    }

    fn matching_pending_points(&self, query: &PointQuery) -> Vec<TracePoint> {
        self.collector
            .pending_transactions()
            .into_iter()
            .filter(|transaction| matches_transaction(query, transaction, &self.collector))
            .map(|transaction| TracePoint {
                id: transaction.id(),
                capture_time_ms: self.time.wall_millis(),
                duration: transaction.duration(),
                error: transaction.has_error(),
            })
            .collect()
    }

    fn window_expired(&self, query: &PointQuery) -> bool {
        if query.to == 0 {
            // An open-ended window cannot predate retention.
            return false;
        }
        let now = self.time.wall_millis();
        query.to < now.saturating_sub(self.config.retention_millis())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    use parking_lot::Mutex;
    use vigil_core::point::{TraceId, TraceRecord};
    use vigil_core::store::PointQueryResult;

    use super::*;

    struct ManualTime {
        millis: AtomicU64,
        tick: AtomicU64,
    }

    impl ManualTime {
        fn new(millis: u64, tick: u64) -> Arc<Self> {
            Arc::new(Self {
                millis: AtomicU64::new(millis),
                tick: AtomicU64::new(tick),
            })
        }

        fn set_tick(&self, tick: u64) {
            self.tick.store(tick, Ordering::SeqCst);
        }
    }

    impl TimeSource for ManualTime {
        fn wall_millis(&self) -> u64 {
            self.millis.load(Ordering::SeqCst)
        }

        fn tick_nanos(&self) -> u64 {
            self.tick.load(Ordering::SeqCst)
        }
    }

    struct FixedStore {
        result: Mutex<PointQueryResult>,
    }

    impl FixedStore {
        fn with_points(points: Vec<TracePoint>, more_available: bool) -> Arc<Self> {
            Arc::new(Self {
                result: Mutex::new(PointQueryResult {
                    points,
                    more_available,
                }),
            })
        }

        fn empty() -> Arc<Self> {
            Self::with_points(Vec::new(), false)
        }
    }

    impl TraceStore for FixedStore {
        fn insert(&self, _record: &TraceRecord) -> Result<(), StorageError> {
            Ok(())
        }

        fn get(&self, _id: &TraceId) -> Result<Option<TraceRecord>, StorageError> {
            Ok(None)
        }

        fn read_points(&self, _query: &PointQuery) -> Result<PointQueryResult, StorageError> {
            Ok(self.result.lock().clone())
        }

        fn count(&self) -> Result<u64, StorageError> {
            Ok(0)
        }
    }

    struct Fixture {
        registry: Arc<TransactionRegistry>,
        collector: Arc<TraceCollector>,
        time: Arc<ManualTime>,
        service: TracePointService,
    }

    fn fixture(store: Arc<FixedStore>, time: Arc<ManualTime>) -> Fixture {
        // Zero slow threshold: every completed transaction qualifies for
        // storage, which keeps the pending path easy to drive.
        let config = StorageConfig {
            slow_threshold_ms: 0,
            ..StorageConfig::default()
        };
        let registry = Arc::new(TransactionRegistry::new());
        let collector = Arc::new(TraceCollector::new(
            config.clone(),
            Arc::clone(&time) as Arc<dyn TimeSource>,
        ));
        let service = TracePointService::new(
            store,
            Arc::clone(&registry),
            Arc::clone(&collector),
            config,
            Arc::clone(&time) as Arc<dyn TimeSource>,
        );
        Fixture {
            registry,
            collector,
            time,
            service,
        }
    }

    fn start_transaction(fixture: &Fixture, start_tick: u64) -> Arc<Transaction> {
        fixture.time.set_tick(start_tick);
        let tx = Arc::new(Transaction::new(
            "Servlet",
            "/api/users",
            "GET /api/users",
            Arc::clone(&fixture.time) as Arc<dyn TimeSource>,
        ));
        fixture.registry.register(Arc::clone(&tx));
        tx
    }

    fn stored_point(id: TraceId, duration_nanos: u64) -> TracePoint {
        TracePoint {
            id,
            capture_time_ms: 5_000,
            duration: Duration::from_nanos(duration_nanos),
            error: false,
        }
    }

    fn open_query() -> PointQuery {
        PointQuery::default()
    }

    #[test]
    fn test_historical_window_uses_store_only() {
        let time = ManualTime::new(10_000, 0);
        let store = FixedStore::with_points(vec![stored_point(TraceId([9; 16]), 700)], false);
        let fx = fixture(store, time);
        // This active transaction must not appear: the window is in the past.
        start_transaction(&fx, 100);

        let query = PointQuery {
            from: 1_000,
            to: 5_000,
            ..Default::default()
        };
        let response = fx.service.query_points(&query).unwrap();

        assert_eq!(response.normal_points.len(), 1);
        assert!(response.active_points.is_empty());
    }

    #[test]
    fn test_limit_keeps_oldest_active_transactions() {
        let time = ManualTime::new(10_000, 0);
        let fx = fixture(FixedStore::empty(), time);
        let oldest = start_transaction(&fx, 10);
        let middle = start_transaction(&fx, 20);
        let newest = start_transaction(&fx, 30);
        fx.time.set_tick(100);

        let query = PointQuery {
            limit: 2,
            ..open_query()
        };
        let response = fx.service.query_points(&query).unwrap();

        let ids: Vec<TraceId> = response.active_points.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![oldest.id(), middle.id()]);
        assert!(!ids.contains(&newest.id()));
        assert!(
            response
                .active_points
                .iter()
                .all(|p| p.duration_millis >= 0.0)
        );
    }

    #[test]
    fn test_live_duration_beats_shorter_stored_point() {
        let time = ManualTime::new(10_000, 0);
        let fx = fixture_with_late_store(time, 200);
        let response = fx.service.query_points(&open_query()).unwrap();

        // Live duration 300ns > stored 200ns: the point is stale, the
        // transaction stays active.
        assert!(response.normal_points.is_empty());
        assert_eq!(response.active_points.len(), 1);
        assert_eq!(
            response.active_points[0].duration_millis,
            300.0 / 1_000_000.0
        );
    }

    #[test]
    fn test_longer_stored_point_beats_active_entry() {
        let time = ManualTime::new(10_000, 0);
        let fx = fixture_with_late_store(time, 900);
        let response = fx.service.query_points(&open_query()).unwrap();

        // Stored 900ns > live 300ns: the completed view wins.
        assert_eq!(response.normal_points.len(), 1);
        assert!(response.active_points.is_empty());
    }

    /// One active transaction with start tick 1000 and capture tick 1300 (live
    /// duration 300ns), plus a stored point for the same id with the given
    /// duration.
    fn fixture_with_late_store(time: Arc<ManualTime>, stored_nanos: u64) -> Fixture {
        let store = FixedStore::with_points(Vec::new(), false);
        let fx = fixture(Arc::clone(&store), time);
        let tx = start_transaction(&fx, 1_000);
        fx.time.set_tick(1_300);
        store.result.lock().points = vec![stored_point(tx.id(), stored_nanos)];
        fx
    }

    #[test]
    fn test_pending_point_replaces_shorter_stored_duplicate() {
        let time = ManualTime::new(10_000, 0);
        let store = FixedStore::with_points(Vec::new(), false);
        let fx = fixture(Arc::clone(&store), Arc::clone(&time));

        let tx = start_transaction(&fx, 0);
        time.set_tick(700);
        fx.collector.on_completed(&fx.registry, Arc::clone(&tx));
        store.result.lock().points = vec![stored_point(tx.id(), 500)];

        let response = fx.service.query_points(&open_query()).unwrap();

        // The pending view (700ns) supersedes the stored record (500ns).
        assert_eq!(response.normal_points.len(), 1);
        assert_eq!(
            response.normal_points[0].duration_millis,
            700.0 / 1_000_000.0
        );
        assert!(response.active_points.is_empty());
    }

    #[test]
    fn test_no_id_appears_twice_across_partitions() {
        let time = ManualTime::new(10_000, 0);
        let store = FixedStore::with_points(Vec::new(), false);
        let fx = fixture(Arc::clone(&store), Arc::clone(&time));

        let active_tx = start_transaction(&fx, 100);
        let finished = start_transaction(&fx, 200);
        time.set_tick(1_000);
        fx.collector.on_completed(&fx.registry, Arc::clone(&finished));
        store.result.lock().points = vec![
            stored_point(TraceId([1; 16]), 900),
            stored_point(finished.id(), 300),
            stored_point(active_tx.id(), 50),
        ];

        let response = fx.service.query_points(&open_query()).unwrap();

        let mut ids: Vec<TraceId> = response
            .normal_points
            .iter()
            .chain(&response.error_points)
            .chain(&response.active_points)
            .map(|p| p.id)
            .collect();
        let total = ids.len();
        ids.sort_by_key(|id| id.0);
        ids.dedup();
        assert_eq!(ids.len(), total);

        // Merged partitions stay duration-descending.
        let normal: Vec<f64> = response
            .normal_points
            .iter()
            .map(|p| p.duration_millis)
            .collect();
        assert!(normal.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_expired_only_for_pre_retention_windows() {
        let now: u64 = 2_000_000_000_000;
        let retention = StorageConfig::default().retention_millis();
        let time = ManualTime::new(now, 0);
        let fx = fixture(FixedStore::empty(), time);

        let ancient = PointQuery {
            from: 0,
            to: now - retention - 1,
            ..Default::default()
        };
        assert!(fx.service.query_points(&ancient).unwrap().expired);

        let recent = PointQuery {
            from: 0,
            to: now - 1_000,
            ..Default::default()
        };
        assert!(!fx.service.query_points(&recent).unwrap().expired);

        // An open-ended window is never expired.
        assert!(!fx.service.query_points(&open_query()).unwrap().expired);
    }

    #[test]
    fn test_empty_retained_window_is_not_expired_when_points_exist() {
        let now: u64 = 2_000_000_000_000;
        let retention = StorageConfig::default().retention_millis();
        let time = ManualTime::new(now, 0);
        let store = FixedStore::with_points(vec![stored_point(TraceId([3; 16]), 100)], false);
        let fx = fixture(store, time);

        let ancient = PointQuery {
            from: 0,
            to: now - retention - 1,
            ..Default::default()
        };
        assert!(!fx.service.query_points(&ancient).unwrap().expired);
    }

    #[test]
    fn test_more_available_surfaces_as_limit_exceeded() {
        let time = ManualTime::new(10_000, 0);
        let store = FixedStore::with_points(vec![stored_point(TraceId([5; 16]), 100)], true);
        let fx = fixture(store, time);

        let response = fx.service.query_points(&open_query()).unwrap();
        assert!(response.limit_exceeded);
    }

    #[test]
    fn test_same_query_twice_is_idempotent() {
        let time = ManualTime::new(10_000, 0);
        let store = FixedStore::with_points(
            vec![
                stored_point(TraceId([1; 16]), 900),
                stored_point(TraceId([2; 16]), 400),
            ],
            false,
        );
        let fx = fixture(store, time);
        start_transaction(&fx, 50);
        fx.time.set_tick(500);

        let query = open_query();
        let first = serde_json::to_string(&fx.service.query_points(&query).unwrap()).unwrap();
        let second = serde_json::to_string(&fx.service.query_points(&query).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_filtered_active_transactions_are_excluded() {
        let time = ManualTime::new(10_000, 0);
        let fx = fixture(FixedStore::empty(), time);
        let matching = start_transaction(&fx, 10);
        matching.set_user("alice");
        let other = start_transaction(&fx, 20);
        other.set_user("bob");
        fx.time.set_tick(100);

        let query = PointQuery {
            user: Some("alice".to_string()),
            user_comparator: Some(vigil_core::query::StringComparator::Equals),
            ..open_query()
        };
        let response = fx.service.query_points(&query).unwrap();
        assert_eq!(response.active_points.len(), 1);
        assert_eq!(response.active_points[0].id, matching.id());
    }
}
