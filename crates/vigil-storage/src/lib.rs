mod fjall_store;

pub use fjall_store::FjallTraceStore;
