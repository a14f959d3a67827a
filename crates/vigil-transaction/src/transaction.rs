use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use vigil_core::point::{TraceId, TraceRecord};
use vigil_core::time::TimeSource;

/// `end_tick` sentinel meaning "still running".
const ACTIVE: u64 = u64::MAX;

/// One in-flight unit of work.
///
/// Created and mutated by the producer thread executing it; the query engine
/// only ever reads. Two reads of the same field during one query may observe
/// different values — readers must not assume a consistent snapshot across
/// accessors.
pub struct Transaction {
    id: TraceId,
    start_time_ms: u64,
    start_tick: u64,
    transaction_type: String,
    headline: RwLock<String>,
    transaction_name: RwLock<String>,
    user: RwLock<Option<String>>,
    custom_attributes: RwLock<HashMap<String, Vec<String>>>,
    error_message: RwLock<Option<String>>,
    end_tick: AtomicU64,
    time: Arc<dyn TimeSource>,
}

impl Transaction {
    pub fn new(
        transaction_type: impl Into<String>,
        headline: impl Into<String>,
        transaction_name: impl Into<String>,
        time: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            id: TraceId::generate(),
            start_time_ms: time.wall_millis(),
            start_tick: time.tick_nanos(),
            transaction_type: transaction_type.into(),
            headline: RwLock::new(headline.into()),
            transaction_name: RwLock::new(transaction_name.into()),
            user: RwLock::new(None),
            custom_attributes: RwLock::new(HashMap::new()),
            error_message: RwLock::new(None),
            end_tick: AtomicU64::new(ACTIVE),
            time,
        }
    }

    pub fn id(&self) -> TraceId {
        self.id
    }

    pub fn start_time_ms(&self) -> u64 {
        self.start_time_ms
    }

    pub fn start_tick(&self) -> u64 {
        self.start_tick
    }

    pub fn transaction_type(&self) -> &str {
        &self.transaction_type
    }

    pub fn headline(&self) -> String {
        self.headline.read().clone()
    }

    pub fn transaction_name(&self) -> String {
        self.transaction_name.read().clone()
    }

    pub fn user(&self) -> Option<String> {
        self.user.read().clone()
    }

    pub fn custom_attributes(&self) -> HashMap<String, Vec<String>> {
        self.custom_attributes.read().clone()
    }

    pub fn error_message(&self) -> Option<String> {
        self.error_message.read().clone()
    }

    pub fn has_error(&self) -> bool {
        self.error_message.read().is_some()
    }

    pub fn set_headline(&self, headline: impl Into<String>) {
        *self.headline.write() = headline.into();
    }

    pub fn set_transaction_name(&self, name: impl Into<String>) {
        *self.transaction_name.write() = name.into();
    }

    pub fn set_user(&self, user: impl Into<String>) {
        *self.user.write() = Some(user.into());
    }

    pub fn add_custom_attribute(&self, name: impl Into<String>, value: impl Into<String>) {
        self.custom_attributes
            .write()
            .entry(name.into())
            .or_default()
            .push(value.into());
    }

    pub fn set_error(&self, message: impl Into<String>) {
        *self.error_message.write() = Some(message.into());
    }

    pub fn is_completed(&self) -> bool {
        self.end_tick.load(Ordering::Acquire) != ACTIVE
    }

    /// Stamp the end tick. Called once by the collector when the producer
    /// reports completion.
    pub(crate) fn end(&self) {
        self.end_tick
            .store(self.time.tick_nanos(), Ordering::Release);
    }

    /// Elapsed duration: start to end once completed, start to now otherwise.
    pub fn duration(&self) -> Duration {
        let end = match self.end_tick.load(Ordering::Acquire) {
            ACTIVE => self.time.tick_nanos(),
            end_tick => end_tick,
        };
        Duration::from_nanos(end.saturating_sub(self.start_tick))
    }

    /// Elapsed duration measured against a caller-fixed tick.
    pub fn duration_at(&self, tick: u64) -> Duration {
        Duration::from_nanos(tick.saturating_sub(self.start_tick))
    }

    /// Snapshot this transaction into its persisted record form.
    pub fn to_record(&self, capture_time_ms: u64, slow: bool) -> TraceRecord {
        TraceRecord {
            id: self.id,
            capture_time_ms,
            duration_nanos: self.duration().as_nanos() as u64,
            transaction_type: self.transaction_type.clone(),
            headline: self.headline.read().clone(),
            transaction_name: self.transaction_name.read().clone(),
            user: self.user.read().clone(),
            error_message: self.error_message.read().clone(),
            custom_attributes: self.custom_attributes.read().clone(),
            slow,
        }
    }
}
