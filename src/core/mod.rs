//! Core business logic: currencies, rates, resolution and the wallet ledger.

pub mod currency;
pub mod error;
pub mod rates;
pub mod wallet;

// Re-export main types for cleaner imports
pub use currency::{Currency, CurrencyKind, CurrencyRegistry};
pub use error::{CoreError, ProviderError};
pub use rates::{RateEntry, RateResolver, RatesSnapshot, pair_key};
pub use wallet::{Portfolio, Wallet};
