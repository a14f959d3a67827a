use std::sync::Arc;

use dashmap::DashMap;
use vigil_core::point::TraceId;

use crate::transaction::Transaction;

/// Live registry of in-flight transactions.
///
/// Producer threads register at start and the collector unregisters at
/// completion. Enumeration is weakly consistent: a concurrently completing
/// transaction may be observed or missed, and no global snapshot is taken —
/// the query engine is written to tolerate both.
#[derive(Default)]
pub struct TransactionRegistry {
    transactions: DashMap<TraceId, Arc<Transaction>>,
}

impl TransactionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, transaction: Arc<Transaction>) {
        self.transactions.insert(transaction.id(), transaction);
    }

    pub fn unregister(&self, id: &TraceId) {
        self.transactions.remove(id);
    }

    /// The currently active transactions, in no particular order.
    pub fn active_transactions(&self) -> Vec<Arc<Transaction>> {
        self.transactions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}
