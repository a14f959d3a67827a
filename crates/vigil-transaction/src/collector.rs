use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;
use vigil_core::config::StorageConfig;
use vigil_core::error::StorageError;
use vigil_core::store::TraceStore;
use vigil_core::time::TimeSource;

use crate::registry::TransactionRegistry;
use crate::transaction::Transaction;

/// Receives completed transactions, holds them in the pending buffer until
/// they are written to the durable store, and owns the "worth storing"
/// decisions the query engine's filter predicate delegates.
pub struct TraceCollector {
    pending: Mutex<Vec<Arc<Transaction>>>,
    config: StorageConfig,
    time: Arc<dyn TimeSource>,
}

impl TraceCollector {
    pub fn new(config: StorageConfig, time: Arc<dyn TimeSource>) -> Self {
        Self {
            pending: Mutex::new(Vec::new()),
            config,
            time,
        }
    }

    /// Slow enough to store on its own merits.
    pub fn should_store_slow(&self, transaction: &Transaction) -> bool {
        transaction.duration() >= self.config.slow_threshold()
    }

    /// An error worth storing.
    pub fn should_store_error(&self, transaction: &Transaction) -> bool {
        transaction.has_error()
    }

    pub fn should_store(&self, transaction: &Transaction) -> bool {
        self.should_store_slow(transaction) || self.should_store_error(transaction)
    }

    /// The completed-but-unstored transactions, in completion order.
    pub fn pending_transactions(&self) -> Vec<Arc<Transaction>> {
        self.pending.lock().clone()
    }

    /// Complete `transaction`: stamp its end tick, drop it from the live
    /// registry and, if it qualifies for storage, queue it as pending.
    pub fn on_completed(&self, registry: &TransactionRegistry, transaction: Arc<Transaction>) {
        transaction.end();
        registry.unregister(&transaction.id());
        if self.should_store(&transaction) {
            self.pending.lock().push(transaction);
        }
    }

    /// Write pending transactions to `store`. Each is removed from the buffer
    /// only after its record is committed, so a concurrent query observes a
    /// transitioning transaction in at least one of the two places. A write
    /// failure leaves the remainder pending for the next flush.
    pub fn flush(&self, store: &dyn TraceStore) -> Result<usize, StorageError> {
        let pending = self.pending_transactions();
        for transaction in &pending {
            let slow = self.should_store_slow(transaction);
            let record = transaction.to_record(self.time.wall_millis(), slow);
            store.insert(&record)?;
            let id = transaction.id();
            self.pending.lock().retain(|tx| tx.id() != id);
        }
        if !pending.is_empty() {
            debug!(count = pending.len(), "flushed pending transactions");
        }
        Ok(pending.len())
    }
}
