mod collector;
mod registry;
mod transaction;

pub use collector::TraceCollector;
pub use registry::TransactionRegistry;
pub use transaction::Transaction;
