use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::InvalidTraceId;

/// Unique identifier for one unit of work (128-bit, hex-encoded in JSON).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceId(pub [u8; 16]);

impl TraceId {
    pub fn generate() -> Self {
        let mut buf = [0u8; 16];
        buf.iter_mut().for_each(|b| *b = rand::random());
        Self(buf)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl FromStr for TraceId {
    type Err = InvalidTraceId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| InvalidTraceId(s.to_string()))?;
        let bytes: [u8; 16] = bytes
            .try_into()
            .map_err(|_| InvalidTraceId(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl Serialize for TraceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TraceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

/// Lightweight projection of one recorded unit of work, as returned by point
/// queries. Immutable value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracePoint {
    pub id: TraceId,
    /// Wall-clock capture time in milliseconds since the UNIX epoch.
    pub capture_time_ms: u64,
    pub duration: Duration,
    pub error: bool,
}

/// Persisted snapshot of a completed transaction: the durable store's value
/// format, and the shape accepted by `vigil ingest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceRecord {
    pub id: TraceId,
    /// Wall-clock capture time in milliseconds since the UNIX epoch.
    pub capture_time_ms: u64,
    pub duration_nanos: u64,
    pub transaction_type: String,
    pub headline: String,
    pub transaction_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Custom attribute name -> values, as set by the instrumented code.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub custom_attributes: HashMap<String, Vec<String>>,
    /// Whether the collector judged this transaction slow at store time.
    #[serde(default)]
    pub slow: bool,
}

impl TraceRecord {
    pub fn error(&self) -> bool {
        self.error_message.is_some()
    }

    pub fn duration(&self) -> Duration {
        Duration::from_nanos(self.duration_nanos)
    }

    pub fn point(&self) -> TracePoint {
        TracePoint {
            id: self.id,
            capture_time_ms: self.capture_time_ms,
            duration: self.duration(),
            error: self.error(),
        }
    }
}
