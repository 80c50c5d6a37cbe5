//! Rate cache data model and pair resolution.
//!
//! A snapshot maps canonical pair keys ("BASE_QUOTE") to the most recently
//! observed rate; the resolver derives a rate between any two tracked
//! currencies from that sparse set.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::error::CoreError;

/// Anchor currency used for triangulated lookups unless configured otherwise.
pub const DEFAULT_ANCHOR: &str = "USD";

/// Canonical key for a directional currency pair. A rate stored under
/// `pair_key(base, quote)` means quote units per one base unit.
pub fn pair_key(base: &str, quote: &str) -> String {
    format!("{base}_{quote}")
}

/// One cached observation for a pair. A newer fetch replaces the whole entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateEntry {
    pub rate: f64,
    pub updated_at: DateTime<Utc>,
    pub source: String,
}

/// Point-in-time view of the cache. `last_refresh` is stamped once per
/// aggregation run, not per pair.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RatesSnapshot {
    #[serde(default)]
    pub pairs: HashMap<String, RateEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_refresh: Option<DateTime<Utc>>,
}

impl RatesSnapshot {
    /// True iff the snapshot was refreshed less than `ttl_seconds` before
    /// `now`. A snapshot that never refreshed is stale by definition.
    pub fn is_fresh_at(&self, ttl_seconds: u64, now: DateTime<Utc>) -> bool {
        match self.last_refresh {
            Some(last) => {
                let age = now.signed_duration_since(last);
                age >= chrono::Duration::zero()
                    && age < chrono::Duration::seconds(ttl_seconds as i64)
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryMeta {
    pub client: String,
}

/// Append-only record of one pair update in one aggregation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: String,
    pub from_currency: String,
    pub to_currency: String,
    pub rate: f64,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub meta: HistoryMeta,
}

/// Rates returned by one provider in one run, tagged with the client name
/// recorded in history.
#[derive(Debug, Clone)]
pub struct ProviderBatch {
    pub client: String,
    pub rates: HashMap<String, RateEntry>,
}

/// Pure rate lookup over a snapshot's pairs.
///
/// Resolution prefers the most directly observed rate and only falls back to
/// derived ones, in a fixed order: direct pair, inverse pair, triangulation
/// through the anchor when one side is the anchor, then double triangulation
/// through the anchor. Conflicting paths are never averaged.
pub struct RateResolver<'a> {
    pairs: &'a HashMap<String, RateEntry>,
    anchor: &'a str,
}

impl<'a> RateResolver<'a> {
    pub fn new(snapshot: &'a RatesSnapshot, anchor: &'a str) -> Self {
        RateResolver {
            pairs: &snapshot.pairs,
            anchor,
        }
    }

    pub fn anchor(&self) -> &str {
        self.anchor
    }

    fn cached(&self, base: &str, quote: &str) -> Option<f64> {
        self.pairs.get(&pair_key(base, quote)).map(|e| e.rate)
    }

    /// Rate that converts an amount in `from` into an amount in `to`.
    pub fn resolve(&self, from: &str, to: &str) -> Result<f64, CoreError> {
        if from == to {
            return Ok(1.0);
        }
        if let Some(rate) = self.cached(from, to) {
            return Ok(rate);
        }
        if let Some(rate) = self.cached(to, from) {
            return Ok(1.0 / rate);
        }
        if from == self.anchor {
            if let Some(rate) = self.cached(to, self.anchor) {
                return Ok(1.0 / rate);
            }
        } else if to == self.anchor {
            if let Some(rate) = self.cached(from, self.anchor) {
                return Ok(rate);
            }
        }
        if let (Some(from_anchor), Some(to_anchor)) = (
            self.cached(from, self.anchor),
            self.cached(to, self.anchor),
        ) {
            return Ok(from_anchor / to_anchor);
        }
        Err(CoreError::RateNotFound {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}
