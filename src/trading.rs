//! Use-case layer: registration, trading, valuation and rate refresh.
//!
//! Every operation reloads a fresh rate snapshot instead of holding one in
//! memory, so a concurrent refresh is picked up on the next call.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use crate::config::AppConfig;
use crate::core::currency::CurrencyRegistry;
use crate::core::error::CoreError;
use crate::core::rates::{RateEntry, RateResolver};
use crate::core::wallet::{PortfolioValuation, validate_amount};
use crate::providers::{CoinGeckoProvider, ExchangeRateApiProvider};
use crate::store::portfolios::PortfolioStore;
use crate::store::rates::RatesStore;
use crate::store::users::{UserRecord, UserStore};
use crate::updater::{RatesUpdater, UpdateReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeSide {
    Buy,
    Sell,
}

/// Outcome of a completed buy or sell. Pricing in the anchor currency is
/// best effort: `rate`/`anchor_value` are `None` when no rate resolved, but
/// the trade itself is already persisted.
#[derive(Debug)]
pub struct TradeReceipt {
    pub side: TradeSide,
    pub currency: String,
    pub amount: f64,
    pub new_balance: f64,
    pub anchor: String,
    pub rate: Option<f64>,
    pub anchor_value: Option<f64>,
}

#[derive(Debug)]
pub struct RateQuote {
    pub from: String,
    pub to: String,
    pub rate: f64,
    pub reverse_rate: Option<f64>,
    pub last_refresh: Option<DateTime<Utc>>,
}

/// Cached pairs prepared for listing, plus the snapshot's freshness so the
/// renderer can warn about outdated data.
#[derive(Debug)]
pub struct RatesListing {
    pub pairs: Vec<(String, RateEntry)>,
    pub last_refresh: Option<DateTime<Utc>>,
    pub is_fresh: bool,
}

#[derive(Debug)]
pub struct CacheInfo {
    pub last_refresh: Option<DateTime<Utc>>,
    pub pairs_count: usize,
    pub ttl_seconds: u64,
    pub is_fresh: bool,
}

/// Application context: configuration, the immutable currency registry and
/// one handle per persisted store, owned here and passed by reference.
pub struct App {
    pub config: AppConfig,
    pub registry: CurrencyRegistry,
    pub users: UserStore,
    pub portfolios: PortfolioStore,
    pub rates: RatesStore,
}

impl App {
    pub fn new(config: AppConfig) -> Result<Self> {
        let data_dir = config
            .default_data_path()
            .context("Could not determine data directory")?;
        Ok(App {
            registry: CurrencyRegistry::builtin(),
            users: UserStore::new(&data_dir),
            portfolios: PortfolioStore::new(&data_dir),
            rates: RatesStore::new(&data_dir, config.max_history),
            config,
        })
    }

    #[instrument(skip(self, password))]
    pub fn register_user(&self, username: &str, password: &str) -> Result<UserRecord, CoreError> {
        if password.len() < 4 {
            return Err(CoreError::InvalidPassword);
        }
        let user = self.users.create(username, password)?;
        self.portfolios.create_empty(user.user_id)?;
        info!(user_id = user.user_id, "user registered");
        Ok(user)
    }

    #[instrument(skip(self, password))]
    pub fn authenticate(&self, username: &str, password: &str) -> Result<UserRecord, CoreError> {
        let user = self
            .users
            .find_by_username(username)
            .ok_or_else(|| CoreError::UserNotFound(username.to_string()))?;
        if !user.verify_password(password) {
            return Err(CoreError::Authentication);
        }
        info!(user_id = user.user_id, "user authenticated");
        Ok(user)
    }

    fn user_id(&self, username: &str) -> Result<i64, CoreError> {
        self.users
            .find_by_username(username)
            .map(|u| u.user_id)
            .ok_or_else(|| CoreError::UserNotFound(username.to_string()))
    }

    /// Best-effort anchor pricing for a completed trade.
    fn price_in_anchor(&self, currency_code: &str, amount: f64) -> (Option<f64>, Option<f64>) {
        let snapshot = self.rates.load();
        let resolver = RateResolver::new(&snapshot, &self.config.currency);
        match resolver.resolve(currency_code, &self.config.currency) {
            Ok(rate) => (Some(rate), Some(amount * rate)),
            Err(e) => {
                warn!(currency = currency_code, error = %e, "trade left unpriced");
                (None, None)
            }
        }
    }

    /// Buys `amount` of a currency: the wallet is created on first buy, the
    /// deposit is persisted under the portfolio lock, and only then is the
    /// trade priced.
    #[instrument(skip(self), fields(currency = %currency_code))]
    pub fn buy(
        &self,
        username: &str,
        currency_code: &str,
        amount: f64,
    ) -> Result<TradeReceipt, CoreError> {
        let code = self.registry.validate(currency_code)?;
        let amount = validate_amount(amount)?;
        let user_id = self.user_id(username)?;

        let new_balance = self.portfolios.update(user_id, |portfolio| {
            let wallet = portfolio.ensure_wallet(&self.registry, &code)?;
            wallet.deposit(amount)?;
            Ok(wallet.balance())
        })?;

        let (rate, anchor_value) = self.price_in_anchor(&code, amount);
        info!(user_id, amount, new_balance, "buy completed");
        Ok(TradeReceipt {
            side: TradeSide::Buy,
            currency: code,
            amount,
            new_balance,
            anchor: self.config.currency.clone(),
            rate,
            anchor_value,
        })
    }

    /// Sells `amount` of a currency the user already holds. Selling a
    /// never-held currency fails before any balance check.
    #[instrument(skip(self), fields(currency = %currency_code))]
    pub fn sell(
        &self,
        username: &str,
        currency_code: &str,
        amount: f64,
    ) -> Result<TradeReceipt, CoreError> {
        let code = self.registry.validate(currency_code)?;
        let amount = validate_amount(amount)?;
        let user_id = self.user_id(username)?;

        let new_balance = self.portfolios.update(user_id, |portfolio| {
            let wallet = portfolio.wallet_mut(&code)?;
            wallet.withdraw(amount)?;
            Ok(wallet.balance())
        })?;

        let (rate, anchor_value) = self.price_in_anchor(&code, amount);
        info!(user_id, amount, new_balance, "sell completed");
        Ok(TradeReceipt {
            side: TradeSide::Sell,
            currency: code,
            amount,
            new_balance,
            anchor: self.config.currency.clone(),
            rate,
            anchor_value,
        })
    }

    /// Values the user's portfolio in `anchor` (configured anchor when
    /// `None`). Unpriced wallets stay in the breakdown with a zero
    /// contribution.
    #[instrument(skip(self))]
    pub fn portfolio_view(
        &self,
        username: &str,
        anchor: Option<&str>,
    ) -> Result<PortfolioValuation, CoreError> {
        let anchor = match anchor {
            Some(code) => self.registry.validate(code)?,
            None => self.config.currency.clone(),
        };
        let user_id = self.user_id(username)?;
        let portfolio = self.portfolios.load(user_id)?;
        let snapshot = self.rates.load();
        let resolver = RateResolver::new(&snapshot, &anchor);
        Ok(portfolio.value_in(&resolver))
    }

    /// Resolves a pair from the cached snapshot, with a best-effort reverse
    /// rate and the snapshot's refresh time.
    #[instrument(skip(self))]
    pub fn exchange_rate_view(&self, from: &str, to: &str) -> Result<RateQuote, CoreError> {
        let from = self.registry.validate(from)?;
        let to = self.registry.validate(to)?;
        let snapshot = self.rates.load();
        let resolver = RateResolver::new(&snapshot, &self.config.currency);
        let rate = resolver.resolve(&from, &to)?;
        let reverse_rate = resolver.resolve(&to, &from).ok();
        Ok(RateQuote {
            from,
            to,
            rate,
            reverse_rate,
            last_refresh: snapshot.last_refresh,
        })
    }

    /// Lists cached pairs sorted by key. An optional currency filter keeps
    /// pairs with that code on either side; `top` narrows to the N highest
    /// anchor-quoted rates.
    #[instrument(skip(self))]
    pub fn cached_rates(
        &self,
        currency: Option<&str>,
        top: Option<usize>,
    ) -> Result<RatesListing, CoreError> {
        let filter = match currency {
            Some(code) => Some(self.registry.validate(code)?),
            None => None,
        };
        let snapshot = self.rates.load();

        let mut pairs: Vec<(String, RateEntry)> = snapshot
            .pairs
            .iter()
            .filter(|(key, _)| match &filter {
                Some(code) => key
                    .split_once('_')
                    .is_some_and(|(from, to)| from == code || to == code),
                None => true,
            })
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));

        if let Some(top) = top {
            let anchor_suffix = format!("_{}", self.config.currency);
            pairs.retain(|(key, _)| key.ends_with(&anchor_suffix));
            pairs.sort_by(|a, b| b.1.rate.total_cmp(&a.1.rate));
            pairs.truncate(top);
        }

        Ok(RatesListing {
            is_fresh: snapshot.is_fresh_at(self.config.rates_ttl_secs, Utc::now()),
            last_refresh: snapshot.last_refresh,
            pairs,
        })
    }

    pub fn cache_info(&self) -> CacheInfo {
        let snapshot = self.rates.load();
        let is_fresh = snapshot.is_fresh_at(self.config.rates_ttl_secs, Utc::now());
        CacheInfo {
            last_refresh: snapshot.last_refresh,
            pairs_count: snapshot.pairs.len(),
            ttl_seconds: self.config.rates_ttl_secs,
            is_fresh,
        }
    }

    /// Refreshes the rate cache from the configured providers, optionally
    /// filtered to one named source.
    pub async fn update_rates(&self, source: Option<&str>) -> Result<UpdateReport, CoreError> {
        let mut updater = RatesUpdater::new(&self.rates);
        if let Some(cfg) = &self.config.providers.coingecko {
            updater.add_provider(Box::new(CoinGeckoProvider::new(
                &cfg.base_url,
                &self.config.currency,
                &self.config.crypto_currencies,
                &self.config.crypto_id_map,
                self.config.request_timeout(),
            )));
        }
        if let Some(cfg) = &self.config.providers.exchangerate {
            updater.add_provider(Box::new(ExchangeRateApiProvider::new(
                &cfg.base_url,
                self.config.exchangerate_api_key(),
                &self.config.currency,
                &self.config.fiat_currencies,
                self.config.request_timeout(),
            )));
        }
        updater.run(source).await
    }
}
