//! Registered currencies and the process-wide registry.
//!
//! The registry is built once at startup and never mutated afterwards; every
//! component that needs currency validation takes it by reference.

use std::collections::BTreeMap;

use crate::core::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrencyKind {
    Fiat,
    Crypto,
}

/// A registered currency with its static metadata.
#[derive(Debug, Clone, PartialEq)]
pub enum Currency {
    Fiat {
        name: String,
        code: String,
        issuing_country: String,
    },
    Crypto {
        name: String,
        code: String,
        algorithm: String,
        market_cap_usd: f64,
    },
}

impl Currency {
    pub fn fiat(name: &str, code: &str, issuing_country: &str) -> Result<Self, CoreError> {
        Ok(Currency::Fiat {
            name: name.to_string(),
            code: normalize_code(code)?,
            issuing_country: issuing_country.to_string(),
        })
    }

    pub fn crypto(
        name: &str,
        code: &str,
        algorithm: &str,
        market_cap_usd: f64,
    ) -> Result<Self, CoreError> {
        Ok(Currency::Crypto {
            name: name.to_string(),
            code: normalize_code(code)?,
            algorithm: algorithm.to_string(),
            market_cap_usd,
        })
    }

    pub fn code(&self) -> &str {
        match self {
            Currency::Fiat { code, .. } | Currency::Crypto { code, .. } => code,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Currency::Fiat { name, .. } | Currency::Crypto { name, .. } => name,
        }
    }

    pub fn kind(&self) -> CurrencyKind {
        match self {
            Currency::Fiat { .. } => CurrencyKind::Fiat,
            Currency::Crypto { .. } => CurrencyKind::Crypto,
        }
    }

    /// One-line description for listings.
    pub fn display_info(&self) -> String {
        match self {
            Currency::Fiat {
                name,
                code,
                issuing_country,
            } => format!("[FIAT] {code}: {name} (Issuing: {issuing_country})"),
            Currency::Crypto {
                name,
                code,
                algorithm,
                market_cap_usd,
            } => {
                let mcap = if *market_cap_usd >= 1e9 {
                    format!("{market_cap_usd:.2e}")
                } else {
                    format!("{market_cap_usd:.2}")
                };
                format!("[CRYPTO] {code}: {name} (Algo: {algorithm}, MCAP: {mcap})")
            }
        }
    }
}

/// Upper-cases and validates a currency code: 2-5 alphanumeric or hyphen
/// characters, no surrounding whitespace.
pub fn normalize_code(code: &str) -> Result<String, CoreError> {
    let code = code.trim().to_uppercase();
    let stripped: String = code.chars().filter(|c| *c != '-').collect();
    if code.len() < 2
        || code.len() > 5
        || stripped.is_empty()
        || !stripped.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return Err(CoreError::InvalidCurrencyCode(code));
    }
    Ok(code)
}

/// Immutable lookup table of known currencies, keyed by upper-cased code.
#[derive(Debug, Clone, Default)]
pub struct CurrencyRegistry {
    by_code: BTreeMap<String, Currency>,
}

impl CurrencyRegistry {
    /// Registry with the built-in fiat and crypto set the providers track.
    pub fn builtin() -> Self {
        let mut registry = CurrencyRegistry::default();

        let fiat = [
            ("US Dollar", "USD", "United States"),
            ("Euro", "EUR", "Eurozone"),
            ("British Pound", "GBP", "United Kingdom"),
            ("Russian Ruble", "RUB", "Russia"),
            ("Japanese Yen", "JPY", "Japan"),
            ("Swiss Franc", "CHF", "Switzerland"),
            ("Canadian Dollar", "CAD", "Canada"),
            ("Australian Dollar", "AUD", "Australia"),
        ];
        let crypto = [
            ("Bitcoin", "BTC", "SHA-256", 1.12e12),
            ("Ethereum", "ETH", "Ethash", 2.85e11),
            ("Solana", "SOL", "Proof of History", 7.85e10),
            ("Ripple", "XRP", "RPCA", 3.1e10),
            ("Cardano", "ADA", "Ouroboros", 1.6e10),
            ("Dogecoin", "DOGE", "Scrypt", 1.8e10),
            ("Polkadot", "DOT", "NPoS", 9.5e9),
        ];

        for (name, code, country) in fiat {
            // Built-in codes are statically valid.
            if let Ok(currency) = Currency::fiat(name, code, country) {
                registry.insert(currency);
            }
        }
        for (name, code, algorithm, market_cap) in crypto {
            if let Ok(currency) = Currency::crypto(name, code, algorithm, market_cap) {
                registry.insert(currency);
            }
        }
        registry
    }

    fn insert(&mut self, currency: Currency) {
        self.by_code.insert(currency.code().to_string(), currency);
    }

    pub fn get(&self, code: &str) -> Result<&Currency, CoreError> {
        let code = normalize_code(code)
            .map_err(|_| CoreError::UnknownCurrency(code.trim().to_uppercase()))?;
        self.by_code
            .get(&code)
            .ok_or(CoreError::UnknownCurrency(code))
    }

    /// Validates a code against the registry and returns its canonical form.
    pub fn validate(&self, code: &str) -> Result<String, CoreError> {
        Ok(self.get(code)?.code().to_string())
    }

    pub fn all(&self) -> impl Iterator<Item = &Currency> {
        self.by_code.values()
    }

    pub fn codes(&self) -> Vec<&str> {
        self.by_code.keys().map(String::as_str).collect()
    }
}
