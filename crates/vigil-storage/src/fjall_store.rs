use std::fmt::Display;

use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use vigil_core::error::StorageError;
use vigil_core::point::{TraceId, TraceRecord};
use vigil_core::query::{PointQuery, matches_custom_attribute, matches_string_filter};
use vigil_core::store::{PointQueryResult, TraceStore};

pub struct FjallTraceStore {
    keyspace: Keyspace,
    records: PartitionHandle,
    by_time: PartitionHandle,
}

impl FjallTraceStore {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, StorageError> {
        let keyspace = Config::new(path)
            .open()
            .map_err(|e| StorageError::Open(e.to_string()))?;

        let kv_sep_opts = PartitionCreateOptions::default()
            .with_kv_separation(fjall::KvSeparationOptions::default());

        let records = keyspace
            .open_partition("records", kv_sep_opts)
            .map_err(|e| StorageError::Open(e.to_string()))?;

        let by_time = keyspace
            .open_partition("by_time", PartitionCreateOptions::default())
            .map_err(|e| StorageError::Open(e.to_string()))?;

        Ok(Self {
            keyspace,
            records,
            by_time,
        })
    }

    /// Walk a `by_time` index range, resolve each entry to its record and keep
    /// the ones matching `query`.
    fn matching_records<I, K, V, E>(
        &self,
        entries: I,
        query: &PointQuery,
    ) -> Result<Vec<TraceRecord>, StorageError>
    where
        I: Iterator<Item = Result<(K, V), E>>,
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
        E: Display,
    {
        let mut matches = Vec::new();
        for entry in entries {
            let (_key, value) = entry.map_err(|e| StorageError::Read(e.to_string()))?;
            let id_bytes: [u8; 16] = value
                .as_ref()
                .try_into()
                .map_err(|_| StorageError::CorruptIndex("invalid trace id in index".into()))?;
            if let Some(record) = self.get(&TraceId(id_bytes))?
                && record_matches(query, &record)
            {
                matches.push(record);
            }
        }
        Ok(matches)
    }
}

/// Build the `by_time` key: `{capture_time_ms_be (8B)}{id (16B)}`.
fn time_key(capture_time_ms: u64, id: &TraceId) -> [u8; 24] {
    let mut key = [0u8; 24];
    key[..8].copy_from_slice(&capture_time_ms.to_be_bytes());
    key[8..].copy_from_slice(id.as_bytes());
    key
}

/// Record-level equivalent of the query's filter criteria. Slow/error
/// eligibility was decided at store time and is read back off the record.
fn record_matches(query: &PointQuery, record: &TraceRecord) -> bool {
    query.matches_duration(record.duration_nanos)
        && query.matches_transaction_type(&record.transaction_type)
        && (!query.slow_only || record.slow)
        && (!query.error_only || record.error())
        && matches_string_filter(
            query.headline_comparator,
            query.headline.as_deref(),
            Some(record.headline.as_str()),
        )
        && matches_string_filter(
            query.transaction_name_comparator,
            query.transaction_name.as_deref(),
            Some(record.transaction_name.as_str()),
        )
        && matches_string_filter(
            query.error_comparator,
            query.error.as_deref(),
            record.error_message.as_deref(),
        )
        && matches_string_filter(
            query.user_comparator,
            query.user.as_deref(),
            record.user.as_deref(),
        )
        && matches_custom_attribute(
            query.custom_attribute_name.as_deref(),
            query.custom_attribute_value_comparator,
            query.custom_attribute_value.as_deref(),
            &record.custom_attributes,
        )
}

impl TraceStore for FjallTraceStore {
    fn insert(&self, record: &TraceRecord) -> Result<(), StorageError> {
        let serialized =
            serde_json::to_vec(record).map_err(|e| StorageError::Serialization(e.to_string()))?;

        let record_key = record.id.as_bytes();
        let time_k = time_key(record.capture_time_ms, &record.id);

        let mut batch = self.keyspace.batch();
        batch.insert(&self.records, record_key, &serialized);
        batch.insert(&self.by_time, time_k, record_key);
        batch
            .commit()
            .map_err(|e| StorageError::Write(e.to_string()))?;

        Ok(())
    }

    fn get(&self, id: &TraceId) -> Result<Option<TraceRecord>, StorageError> {
        let Some(value) = self
            .records
            .get(id.as_bytes())
            .map_err(|e| StorageError::Read(e.to_string()))?
        else {
            return Ok(None);
        };
        let record: TraceRecord = serde_json::from_slice(&value)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        Ok(Some(record))
    }

    fn read_points(&self, query: &PointQuery) -> Result<PointQueryResult, StorageError> {
        let start = query.from.to_be_bytes().to_vec();
        let mut matches = if query.to == 0 || query.to == u64::MAX {
            self.matching_records(self.by_time.range(start..), query)?
        } else {
            // End key is exclusive on the millisecond after `to`, so every id
            // suffix at `to` itself is still included.
            let end = (query.to + 1).to_be_bytes().to_vec();
            self.matching_records(self.by_time.range(start..end), query)?
        };

        matches.sort_by(|a, b| b.duration_nanos.cmp(&a.duration_nanos));

        let mut more_available = false;
        if query.limit != 0 && matches.len() > query.limit {
            matches.truncate(query.limit);
            more_available = true;
        }

        Ok(PointQueryResult {
            points: matches.iter().map(TraceRecord::point).collect(),
            more_available,
        })
    }

    fn count(&self) -> Result<u64, StorageError> {
        Ok(self.records.approximate_len() as u64)
    }
}
