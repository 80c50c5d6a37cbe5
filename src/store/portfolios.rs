//! Persisted per-user portfolios.
//!
//! One document holds every user's portfolio as
//! `[{user_id, wallets: {code: {balance}}}]`. A portfolio that has never been
//! written loads as empty, so first reference costs nothing.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::error::CoreError;
use crate::core::wallet::{Portfolio, Wallet};

pub const PORTFOLIOS_FILE: &str = "portfolios.json";

#[derive(Debug, Serialize, Deserialize)]
struct WalletDoc {
    balance: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct PortfolioDoc {
    user_id: i64,
    wallets: BTreeMap<String, WalletDoc>,
}

pub struct PortfolioStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl PortfolioStore {
    pub fn new(data_dir: &Path) -> Self {
        PortfolioStore {
            path: data_dir.join(PORTFOLIOS_FILE),
            lock: Mutex::new(()),
        }
    }

    /// Loads a user's portfolio, or an empty one if none was ever saved.
    /// Persisted balances that violate the non-negative invariant fail the
    /// load instead of being repaired silently.
    pub fn load(&self, user_id: i64) -> Result<Portfolio, CoreError> {
        let _guard = self.lock.lock().unwrap();
        self.load_locked(user_id)
    }

    fn load_locked(&self, user_id: i64) -> Result<Portfolio, CoreError> {
        let docs: Vec<PortfolioDoc> = super::read_json_or(&self.path, Vec::new);
        match docs.into_iter().find(|d| d.user_id == user_id) {
            None => Ok(Portfolio::new(user_id)),
            Some(doc) => {
                let mut wallets = BTreeMap::new();
                for (code, wallet) in doc.wallets {
                    wallets.insert(code.clone(), Wallet::from_parts(&code, wallet.balance)?);
                }
                Ok(Portfolio::from_wallets(user_id, wallets))
            }
        }
    }

    fn save_locked(&self, portfolio: &Portfolio) -> Result<(), CoreError> {
        let mut docs: Vec<PortfolioDoc> = super::read_json_or(&self.path, Vec::new);
        let doc = PortfolioDoc {
            user_id: portfolio.user_id(),
            wallets: portfolio
                .wallets()
                .map(|w| {
                    (
                        w.currency_code().to_string(),
                        WalletDoc {
                            balance: w.balance(),
                        },
                    )
                })
                .collect(),
        };
        match docs.iter_mut().find(|d| d.user_id == portfolio.user_id()) {
            Some(existing) => *existing = doc,
            None => docs.push(doc),
        }
        super::write_json_atomic(&self.path, &docs)
    }

    /// Runs `f` against the user's portfolio and persists the result, all
    /// under the store lock so concurrent updates never interleave their
    /// read-modify-write.
    pub fn update<T>(
        &self,
        user_id: i64,
        f: impl FnOnce(&mut Portfolio) -> Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        let _guard = self.lock.lock().unwrap();
        let mut portfolio = self.load_locked(user_id)?;
        let out = f(&mut portfolio)?;
        self.save_locked(&portfolio)?;
        debug!(user_id, "portfolio persisted");
        Ok(out)
    }

    /// Writes an empty portfolio for a new user unless one already exists.
    pub fn create_empty(&self, user_id: i64) -> Result<(), CoreError> {
        let _guard = self.lock.lock().unwrap();
        let docs: Vec<PortfolioDoc> = super::read_json_or(&self.path, Vec::new);
        if docs.iter().any(|d| d.user_id == user_id) {
            return Ok(());
        }
        self.save_locked(&Portfolio::new(user_id))
    }
}
