//! Wallet ledger and per-user portfolio.
//!
//! Balances never go negative and are only ever changed through
//! `deposit`/`withdraw`; the load path re-checks the invariant on persisted
//! values.

use std::collections::BTreeMap;

use crate::core::currency::CurrencyRegistry;
use crate::core::error::CoreError;
use crate::core::rates::RateResolver;

/// Rejects non-positive or non-finite amounts.
pub fn validate_amount(amount: f64) -> Result<f64, CoreError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(CoreError::InvalidAmount(amount));
    }
    Ok(amount)
}

/// A single-currency balance.
#[derive(Debug, Clone, PartialEq)]
pub struct Wallet {
    currency_code: String,
    balance: f64,
}

impl Wallet {
    pub fn new(currency_code: &str) -> Self {
        Wallet {
            currency_code: currency_code.to_string(),
            balance: 0.0,
        }
    }

    /// Reconstructs a wallet from persisted state. The stored balance must
    /// already satisfy the invariant; anything else means a corrupt document.
    pub fn from_parts(currency_code: &str, balance: f64) -> Result<Self, CoreError> {
        if !balance.is_finite() || balance < 0.0 {
            return Err(CoreError::Storage(format!(
                "persisted {currency_code} wallet has invalid balance {balance}"
            )));
        }
        Ok(Wallet {
            currency_code: currency_code.to_string(),
            balance,
        })
    }

    pub fn currency_code(&self) -> &str {
        &self.currency_code
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn deposit(&mut self, amount: f64) -> Result<(), CoreError> {
        let amount = validate_amount(amount)?;
        self.balance += amount;
        Ok(())
    }

    pub fn withdraw(&mut self, amount: f64) -> Result<(), CoreError> {
        let amount = validate_amount(amount)?;
        if amount > self.balance {
            return Err(CoreError::InsufficientFunds {
                currency: self.currency_code.clone(),
                available: self.balance,
                requested: amount,
            });
        }
        self.balance -= amount;
        Ok(())
    }
}

/// Valuation of one wallet in the anchor currency. `rate` is `None` when no
/// rate to the anchor could be resolved; such wallets contribute zero to the
/// total but stay visible in the breakdown.
#[derive(Debug, Clone)]
pub struct WalletValuation {
    pub currency_code: String,
    pub balance: f64,
    pub rate: Option<f64>,
    pub value: Option<f64>,
}

impl WalletValuation {
    pub fn is_unpriced(&self) -> bool {
        self.rate.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct PortfolioValuation {
    pub user_id: i64,
    pub anchor: String,
    pub total: f64,
    pub wallets: Vec<WalletValuation>,
}

/// All wallets held by one user, at most one per currency code.
#[derive(Debug, Clone)]
pub struct Portfolio {
    user_id: i64,
    wallets: BTreeMap<String, Wallet>,
}

impl Portfolio {
    pub fn new(user_id: i64) -> Self {
        Portfolio {
            user_id,
            wallets: BTreeMap::new(),
        }
    }

    pub fn from_wallets(user_id: i64, wallets: BTreeMap<String, Wallet>) -> Self {
        Portfolio { user_id, wallets }
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub fn wallets(&self) -> impl Iterator<Item = &Wallet> {
        self.wallets.values()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }

    pub fn has_wallet(&self, currency_code: &str) -> bool {
        self.wallets.contains_key(currency_code)
    }

    /// Returns the wallet for `currency_code`, creating a zero-balance one if
    /// the user has never held that currency. The code is validated against
    /// the registry first.
    pub fn ensure_wallet(
        &mut self,
        registry: &CurrencyRegistry,
        currency_code: &str,
    ) -> Result<&mut Wallet, CoreError> {
        let code = registry.validate(currency_code)?;
        Ok(self
            .wallets
            .entry(code.clone())
            .or_insert_with(|| Wallet::new(&code)))
    }

    /// Fails for never-held currencies. Distinct from a zero balance: selling
    /// out of a wallet the user never owned is rejected up front.
    pub fn wallet(&self, currency_code: &str) -> Result<&Wallet, CoreError> {
        self.wallets
            .get(currency_code)
            .ok_or_else(|| CoreError::WalletNotFound(currency_code.to_string()))
    }

    pub fn wallet_mut(&mut self, currency_code: &str) -> Result<&mut Wallet, CoreError> {
        self.wallets
            .get_mut(currency_code)
            .ok_or_else(|| CoreError::WalletNotFound(currency_code.to_string()))
    }

    /// Values every wallet in the resolver's anchor currency. Wallets with no
    /// resolvable rate are flagged as unpriced and contribute zero.
    pub fn value_in(&self, resolver: &RateResolver<'_>) -> PortfolioValuation {
        let anchor = resolver.anchor().to_string();
        let mut total = 0.0;
        let mut wallets = Vec::with_capacity(self.wallets.len());

        for wallet in self.wallets.values() {
            let (rate, value) = match resolver.resolve(wallet.currency_code(), &anchor) {
                Ok(rate) => {
                    let value = wallet.balance() * rate;
                    total += value;
                    (Some(rate), Some(value))
                }
                Err(_) => (None, None),
            };
            wallets.push(WalletValuation {
                currency_code: wallet.currency_code().to_string(),
                balance: wallet.balance(),
                rate,
                value,
            });
        }

        PortfolioValuation {
            user_id: self.user_id,
            anchor,
            total,
            wallets,
        }
    }
}
