//! Multi-provider rate refresh runs.

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use crate::core::error::CoreError;
use crate::core::rates::ProviderBatch;
use crate::providers::RateProvider;
use crate::store::rates::RatesStore;

/// Summary of one refresh run. `success` is true iff no provider errored;
/// a partially failed run still commits the rates it obtained.
#[derive(Debug)]
pub struct UpdateReport {
    pub success: bool,
    pub updated_pairs: Vec<String>,
    pub errors: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Orchestrates an ordered list of providers and merges their output into
/// the rate store.
pub struct RatesUpdater<'a> {
    providers: Vec<Box<dyn RateProvider>>,
    store: &'a RatesStore,
}

impl<'a> RatesUpdater<'a> {
    pub fn new(store: &'a RatesStore) -> Self {
        RatesUpdater {
            providers: Vec::new(),
            store,
        }
    }

    pub fn add_provider(&mut self, provider: Box<dyn RateProvider>) {
        self.providers.push(provider);
    }

    /// Runs a refresh, optionally filtered to a single named source.
    ///
    /// Providers are polled in order; a failing provider is recorded in the
    /// report and never blocks the others. Whatever was fetched is committed
    /// in one locked merge, with `last_refresh` stamped to the run start. A
    /// filter that matches no configured provider is an error, not a silent
    /// no-op.
    #[instrument(name = "RatesUpdate", skip(self))]
    pub async fn run(&self, source: Option<&str>) -> Result<UpdateReport, CoreError> {
        let started_at = Utc::now();

        let selected: Vec<&dyn RateProvider> = match source {
            None => self.providers.iter().map(AsRef::as_ref).collect(),
            Some(name) => {
                let matched: Vec<&dyn RateProvider> = self
                    .providers
                    .iter()
                    .map(AsRef::as_ref)
                    .filter(|p| p.name().eq_ignore_ascii_case(name))
                    .collect();
                if matched.is_empty() {
                    return Err(CoreError::UnknownSource(name.to_string()));
                }
                matched
            }
        };

        let mut batches = Vec::new();
        let mut errors = Vec::new();
        for provider in selected {
            info!(provider = provider.name(), "fetching rates");
            match provider.fetch_rates().await {
                Ok(rates) => {
                    info!(
                        provider = provider.name(),
                        count = rates.len(),
                        "provider succeeded"
                    );
                    batches.push(ProviderBatch {
                        client: provider.name().to_string(),
                        rates,
                    });
                }
                Err(e) => {
                    let message = format!("failed to fetch rates from {}: {e}", provider.name());
                    warn!(provider = provider.name(), error = %e, "provider failed");
                    errors.push(message);
                }
            }
        }

        let updated_pairs = self.store.commit_run(&batches, started_at)?;
        info!(
            updated = updated_pairs.len(),
            errors = errors.len(),
            "rates update completed"
        );

        Ok(UpdateReport {
            success: errors.is_empty(),
            updated_pairs,
            errors,
            timestamp: started_at,
        })
    }
}
