//! In-memory store backend.
//!
//! Mirrors the DynamoDB key layout over a `HashMap` keyed by `(PK, SK)`.
//! Used by tests and local development; the instrumentation hooks (query
//! counter, injected failures, unprocessed residuals) exist so the matching
//! engine and batch writer can be exercised without a network.

use crate::error::{Result, StoreError};
use crate::row::{status_cell_key, DriverRow};
use crate::store::{BatchBackend, LocationStore};
use async_trait::async_trait;
use hail_core::{unix_now, DriverStatus};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};

/// HashMap-backed [`LocationStore`] and [`BatchBackend`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: RwLock<HashMap<(String, String), DriverRow>>,
    /// Cell queries served (including failed ones).
    query_count: AtomicU64,
    /// Batch submissions accepted.
    batch_count: AtomicU64,
    /// GSI hash keys whose queries fail, for partial-failure tests.
    failing_keys: RwLock<HashSet<String>>,
    /// Next batch submissions report this many trailing rows unprocessed.
    unprocessed_plan: Mutex<Vec<usize>>,
    /// When set, every batch submission errors out entirely.
    reject_batches: RwLock<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cell queries issued so far.
    pub fn queries_issued(&self) -> u64 {
        self.query_count.load(Ordering::Relaxed)
    }

    /// Number of batch submissions accepted so far.
    pub fn batches_written(&self) -> u64 {
        self.batch_count.load(Ordering::Relaxed)
    }

    /// Total rows currently stored.
    pub fn row_count(&self) -> usize {
        self.rows.read().unwrap().len()
    }

    /// Fetch a stored row by its primary key pair.
    pub fn get(&self, pk: &str, sk: &str) -> Option<DriverRow> {
        self.rows
            .read()
            .unwrap()
            .get(&(pk.to_string(), sk.to_string()))
            .cloned()
    }

    /// Make queries against the given GSI hash key fail.
    pub fn fail_queries_for(&self, key: &str) {
        self.failing_keys.write().unwrap().insert(key.to_string());
    }

    /// Schedule unprocessed-row counts for upcoming batch submissions.
    pub fn plan_unprocessed(&self, counts: &[usize]) {
        let mut plan = self.unprocessed_plan.lock().unwrap();
        plan.extend_from_slice(counts);
    }

    /// Reject every batch submission until cleared.
    pub fn set_reject_batches(&self, reject: bool) {
        *self.reject_batches.write().unwrap() = reject;
    }

    fn gsi_key<'a>(row: &'a DriverRow, res: u8) -> &'a str {
        match res {
            9 => &row.gsi1pk,
            8 => &row.gsi2pk,
            _ => &row.gsi3pk,
        }
    }
}

#[async_trait]
impl LocationStore for MemoryStore {
    async fn upsert(&self, row: &DriverRow) -> Result<()> {
        self.rows
            .write()
            .unwrap()
            .insert((row.pk.clone(), row.sk.clone()), row.clone());
        Ok(())
    }

    async fn query_cell(
        &self,
        res: u8,
        prefix: &str,
        status: DriverStatus,
    ) -> Result<Vec<DriverRow>> {
        self.query_count.fetch_add(1, Ordering::Relaxed);
        let key = status_cell_key(status, res, prefix);
        if self.failing_keys.read().unwrap().contains(&key) {
            return Err(StoreError::Query(format!("injected failure for {key}")));
        }
        let now = unix_now();
        Ok(self
            .rows
            .read()
            .unwrap()
            .values()
            .filter(|row| Self::gsi_key(row, res) == key && row.expires_at > now)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl BatchBackend for MemoryStore {
    async fn write_batch(&self, mut rows: Vec<DriverRow>) -> Result<Vec<DriverRow>> {
        if *self.reject_batches.read().unwrap() {
            return Err(StoreError::Write("injected batch rejection".to_string()));
        }
        self.batch_count.fetch_add(1, Ordering::Relaxed);
        let unprocessed_count = {
            let mut plan = self.unprocessed_plan.lock().unwrap();
            if plan.is_empty() {
                0
            } else {
                plan.remove(0)
            }
        };
        let keep = rows.len().saturating_sub(unprocessed_count);
        let unprocessed = rows.split_off(keep);
        let mut stored = self.rows.write().unwrap();
        for row in rows {
            stored.insert((row.pk.clone(), row.sk.clone()), row);
        }
        Ok(unprocessed)
    }
}
