//! In-memory data sources for testing without network calls.

use super::{
    DataSourceError, IndexerPosition, IndexerSource, PositionQuery, UnderlyingAmount,
    UnderlyingRequest, UnderlyingResolver,
};
use alloy::primitives::U256;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Indexing endpoint serving predefined records, filtered and paged like the real one.
#[derive(Debug, Clone, Default)]
pub struct MockIndexer {
    records: Vec<IndexerPosition>,
    failure: Option<DataSourceError>,
    calls: Arc<AtomicUsize>,
}

impl MockIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(mut self, record: IndexerPosition) -> Self {
        self.records.push(record);
        self
    }

    pub fn with_records(mut self, records: Vec<IndexerPosition>) -> Self {
        self.records.extend(records);
        self
    }

    /// Make every request fail with `error`.
    pub fn failing(mut self, error: DataSourceError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Number of page requests served so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IndexerSource for MockIndexer {
    async fn fetch_positions(
        &self,
        query: &PositionQuery,
        first: usize,
        skip: usize,
    ) -> Result<Vec<IndexerPosition>, DataSourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }

        let statuses = query.status_tags();
        Ok(self
            .records
            .iter()
            .filter(|r| {
                r.user.to_lowercase() == query.address && statuses.contains(&r.status.as_str())
            })
            .skip(skip)
            .take(first)
            .cloned()
            .collect())
    }
}

/// Resolver answering from a fixed `key -> amount` table.
#[derive(Debug, Clone, Default)]
pub struct MockUnderlyingResolver {
    entries: HashMap<String, U256>,
    failure: Option<DataSourceError>,
    calls: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<UnderlyingRequest>>>,
}

impl MockUnderlyingResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, key: impl Into<String>, underlying_amount: U256) -> Self {
        self.entries.insert(key.into(), underlying_amount);
        self
    }

    pub fn failing(mut self, error: DataSourceError) -> Self {
        self.failure = Some(error);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request item received, across all calls.
    pub fn received(&self) -> Vec<UnderlyingRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl UnderlyingResolver for MockUnderlyingResolver {
    async fn resolve(
        &self,
        requests: &[UnderlyingRequest],
    ) -> Result<HashMap<String, UnderlyingAmount>, DataSourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut received) = self.requests.lock() {
            received.extend_from_slice(requests);
        }
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }

        Ok(requests
            .iter()
            .filter_map(|r| {
                let key = r.key();
                self.entries
                    .get(&key)
                    .map(|amount| (key, UnderlyingAmount { underlying_amount: *amount }))
            })
            .collect())
    }
}
