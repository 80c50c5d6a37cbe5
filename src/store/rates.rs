//! Durable rate cache: current snapshot plus append-only history.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::core::error::CoreError;
use crate::core::rates::{HistoryMeta, HistoryRecord, ProviderBatch, RatesSnapshot};

pub const RATES_FILE: &str = "rates.json";
pub const HISTORY_FILE: &str = "rate_history.json";

/// Retained history records, oldest dropped first.
pub const DEFAULT_MAX_HISTORY: usize = 10_000;

/// Owns the persisted rate documents. The updater is the only writer; all
/// readers get point-in-time snapshots.
pub struct RatesStore {
    rates_path: PathBuf,
    history_path: PathBuf,
    max_history: usize,
    lock: Mutex<()>,
}

impl RatesStore {
    pub fn new(data_dir: &Path, max_history: usize) -> Self {
        RatesStore {
            rates_path: data_dir.join(RATES_FILE),
            history_path: data_dir.join(HISTORY_FILE),
            max_history,
            lock: Mutex::new(()),
        }
    }

    /// Current snapshot; missing or corrupt data yields the empty snapshot.
    pub fn load(&self) -> RatesSnapshot {
        let _guard = self.lock.lock().unwrap();
        self.load_locked()
    }

    fn load_locked(&self) -> RatesSnapshot {
        super::read_json_or(&self.rates_path, RatesSnapshot::default)
    }

    /// Persists a full snapshot, stamping `last_refresh` with the current
    /// time if the caller left it unset.
    pub fn save(&self, mut snapshot: RatesSnapshot) -> Result<(), CoreError> {
        let _guard = self.lock.lock().unwrap();
        if snapshot.last_refresh.is_none() {
            snapshot.last_refresh = Some(Utc::now());
        }
        super::write_json_atomic(&self.rates_path, &snapshot)
    }

    pub fn history(&self) -> Vec<HistoryRecord> {
        let _guard = self.lock.lock().unwrap();
        super::read_json_or(&self.history_path, Vec::new)
    }

    /// Appends records and truncates to the newest `max_history`.
    pub fn append_history(&self, records: &[HistoryRecord]) -> Result<(), CoreError> {
        let _guard = self.lock.lock().unwrap();
        self.append_history_locked(records)
    }

    fn append_history_locked(&self, records: &[HistoryRecord]) -> Result<(), CoreError> {
        let mut history: Vec<HistoryRecord> = super::read_json_or(&self.history_path, Vec::new);
        history.extend_from_slice(records);
        if history.len() > self.max_history {
            let excess = history.len() - self.max_history;
            history.drain(..excess);
            debug!(dropped = excess, "history bound reached, dropped oldest records");
        }
        super::write_json_atomic(&self.history_path, &history)
    }

    /// Merges one aggregation run into the cache under a single lock: loads
    /// the snapshot, overwrites pairs per provider in order, stamps
    /// `last_refresh` with the run start, persists, and records history for
    /// every updated pair. Returns the updated pair keys.
    ///
    /// Called even when every provider failed so a partial run still commits
    /// what it obtained and the refresh time moves forward.
    pub fn commit_run(
        &self,
        batches: &[ProviderBatch],
        started_at: DateTime<Utc>,
    ) -> Result<Vec<String>, CoreError> {
        let _guard = self.lock.lock().unwrap();
        let mut snapshot = self.load_locked();
        let mut updated = Vec::new();
        let mut records = Vec::new();

        for batch in batches {
            let mut keys: Vec<&String> = batch.rates.keys().collect();
            keys.sort();
            for key in keys {
                let entry = &batch.rates[key];
                snapshot.pairs.insert(key.clone(), entry.clone());
                updated.push(key.clone());

                let (from, to) = key.split_once('_').unwrap_or((key.as_str(), ""));
                records.push(HistoryRecord {
                    id: format!("{key}_{}", entry.updated_at.to_rfc3339()),
                    from_currency: from.to_string(),
                    to_currency: to.to_string(),
                    rate: entry.rate,
                    timestamp: entry.updated_at,
                    source: entry.source.clone(),
                    meta: HistoryMeta {
                        client: batch.client.clone(),
                    },
                });
            }
        }

        snapshot.last_refresh = Some(started_at);
        super::write_json_atomic(&self.rates_path, &snapshot)?;
        if !records.is_empty() {
            self.append_history_locked(&records)?;
        }
        info!(pairs = updated.len(), "committed rates run");
        Ok(updated)
    }

    /// True iff the cache refreshed within the TTL. Corrupt or absent data is
    /// treated as stale, never as an error.
    pub fn is_fresh(&self, ttl_seconds: u64) -> bool {
        self.load().is_fresh_at(ttl_seconds, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rates::RateEntry;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::tempdir;

    fn entry(rate: f64, source: &str) -> RateEntry {
        RateEntry {
            rate,
            updated_at: Utc::now(),
            source: source.to_string(),
        }
    }

    fn record(id: &str) -> HistoryRecord {
        HistoryRecord {
            id: id.to_string(),
            from_currency: "BTC".to_string(),
            to_currency: "USD".to_string(),
            rate: 1.0,
            timestamp: Utc::now(),
            source: "test".to_string(),
            meta: HistoryMeta {
                client: "TestClient".to_string(),
            },
        }
    }

    #[test]
    fn missing_store_loads_empty_snapshot() {
        let dir = tempdir().unwrap();
        let store = RatesStore::new(dir.path(), DEFAULT_MAX_HISTORY);
        let snapshot = store.load();
        assert!(snapshot.pairs.is_empty());
        assert!(snapshot.last_refresh.is_none());
        assert!(!store.is_fresh(300));
    }

    #[test]
    fn corrupt_store_loads_empty_snapshot() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(RATES_FILE), "{broken").unwrap();
        let store = RatesStore::new(dir.path(), DEFAULT_MAX_HISTORY);
        assert!(store.load().pairs.is_empty());
        assert!(!store.is_fresh(300));
    }

    #[test]
    fn save_stamps_missing_last_refresh() {
        let dir = tempdir().unwrap();
        let store = RatesStore::new(dir.path(), DEFAULT_MAX_HISTORY);

        let mut snapshot = RatesSnapshot::default();
        snapshot.pairs.insert("BTC_USD".to_string(), entry(59337.21, "test"));
        store.save(snapshot).unwrap();

        let loaded = store.load();
        assert!(loaded.last_refresh.is_some());
        assert_eq!(loaded.pairs["BTC_USD"].rate, 59337.21);
    }

    #[test]
    fn history_is_bounded_fifo() {
        let dir = tempdir().unwrap();
        let store = RatesStore::new(dir.path(), 5);

        for i in 0..8 {
            store.append_history(&[record(&format!("r{i}"))]).unwrap();
        }
        let history = store.history();
        assert_eq!(history.len(), 5);
        // Oldest three dropped, newest kept in order.
        assert_eq!(history.first().unwrap().id, "r3");
        assert_eq!(history.last().unwrap().id, "r7");
    }

    #[test]
    fn commit_run_merges_stamps_and_records_history() {
        let dir = tempdir().unwrap();
        let store = RatesStore::new(dir.path(), DEFAULT_MAX_HISTORY);

        // Pre-existing pair from an earlier run survives the merge.
        let mut existing = RatesSnapshot::default();
        existing.pairs.insert("EUR_USD".to_string(), entry(1.07, "old"));
        store.save(existing).unwrap();

        let mut rates = HashMap::new();
        rates.insert("BTC_USD".to_string(), entry(59337.21, "CoinGecko"));
        rates.insert("ETH_USD".to_string(), entry(3720.0, "CoinGecko"));
        let started = Utc::now();
        let updated = store
            .commit_run(
                &[ProviderBatch {
                    client: "CoinGeckoProvider".to_string(),
                    rates,
                }],
                started,
            )
            .unwrap();

        assert_eq!(updated, vec!["BTC_USD".to_string(), "ETH_USD".to_string()]);

        let snapshot = store.load();
        assert_eq!(snapshot.pairs.len(), 3);
        assert_eq!(snapshot.last_refresh, Some(started));
        assert!(store.is_fresh(300));

        let history = store.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].from_currency, "BTC");
        assert_eq!(history[0].to_currency, "USD");
        assert_eq!(history[0].meta.client, "CoinGeckoProvider");
    }

    #[test]
    fn commit_run_with_no_batches_still_stamps_refresh() {
        let dir = tempdir().unwrap();
        let store = RatesStore::new(dir.path(), DEFAULT_MAX_HISTORY);

        let started = Utc::now();
        let updated = store.commit_run(&[], started).unwrap();
        assert!(updated.is_empty());
        assert_eq!(store.load().last_refresh, Some(started));
        assert!(store.history().is_empty());
    }
}
