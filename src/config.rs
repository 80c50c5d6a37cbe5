use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CoinGeckoProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExchangeRateProviderConfig {
    pub base_url: String,
    /// Overridden by the EXCHANGERATE_API_KEY environment variable.
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub coingecko: Option<CoinGeckoProviderConfig>,
    pub exchangerate: Option<ExchangeRateProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            coingecko: Some(CoinGeckoProviderConfig {
                base_url: "https://api.coingecko.com/api/v3".to_string(),
            }),
            exchangerate: Some(ExchangeRateProviderConfig {
                base_url: "https://v6.exchangerate-api.com/v6".to_string(),
                api_key: None,
            }),
        }
    }
}

fn default_currency() -> String {
    crate::core::rates::DEFAULT_ANCHOR.to_string()
}

fn default_fiat_currencies() -> Vec<String> {
    ["EUR", "GBP", "RUB", "JPY", "CHF", "CAD", "AUD"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_crypto_currencies() -> Vec<String> {
    ["BTC", "ETH", "SOL", "XRP", "ADA", "DOGE", "DOT"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_crypto_id_map() -> HashMap<String, String> {
    [
        ("BTC", "bitcoin"),
        ("ETH", "ethereum"),
        ("SOL", "solana"),
        ("XRP", "ripple"),
        ("ADA", "cardano"),
        ("DOGE", "dogecoin"),
        ("DOT", "polkadot"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_rates_ttl_secs() -> u64 {
    300
}

fn default_max_history() -> usize {
    10_000
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Anchor currency for triangulation and default valuations.
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_fiat_currencies")]
    pub fiat_currencies: Vec<String>,
    #[serde(default = "default_crypto_currencies")]
    pub crypto_currencies: Vec<String>,
    /// Internal code to CoinGecko coin id.
    #[serde(default = "default_crypto_id_map")]
    pub crypto_id_map: HashMap<String, String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_rates_ttl_secs")]
    pub rates_ttl_secs: u64,
    #[serde(default = "default_max_history")]
    pub max_history: usize,
    #[serde(default)]
    pub providers: ProvidersConfig,
    pub data_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            currency: default_currency(),
            fiat_currencies: default_fiat_currencies(),
            crypto_currencies: default_crypto_currencies(),
            crypto_id_map: default_crypto_id_map(),
            request_timeout_secs: default_request_timeout_secs(),
            rates_ttl_secs: default_rates_ttl_secs(),
            max_history: default_max_history(),
            providers: ProvidersConfig::default(),
            data_path: None,
        }
    }
}

impl AppConfig {
    /// Loads the default config file, falling back to built-in defaults when
    /// none exists yet.
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!("No config file found, using defaults");
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "valutahub", "valutahub")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("io", "valutahub", "valutahub")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// API key for ExchangeRate-API; the environment wins over the file.
    pub fn exchangerate_api_key(&self) -> Option<String> {
        std::env::var("EXCHANGERATE_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .or_else(|| {
                self.providers
                    .exchangerate
                    .as_ref()
                    .and_then(|p| p.api_key.clone())
            })
    }
}
