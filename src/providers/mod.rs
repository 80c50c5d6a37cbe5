pub mod coingecko;
pub mod exchangerate;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::core::error::ProviderError;
use crate::core::rates::RateEntry;

/// Uniform interface over heterogeneous external rate sources.
///
/// Implementations normalize their responses into canonical
/// `{pair_key: RateEntry}` form, rate meaning quote units per one base unit.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Source name, used for `--source` filtering and run reports.
    fn name(&self) -> &str;

    async fn fetch_rates(&self) -> Result<HashMap<String, RateEntry>, ProviderError>;
}

pub use coingecko::CoinGeckoProvider;
pub use exchangerate::ExchangeRateApiProvider;
