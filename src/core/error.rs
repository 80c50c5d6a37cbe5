use thiserror::Error;

/// Failure talking to a single external rate source.
///
/// Recoverable by design: the updater records the message in the run report
/// and continues with the remaining providers instead of aborting the run.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("unexpected response: {0}")]
    Malformed(String),

    #[error("missing credential: {0}")]
    MissingCredential(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        // Strip query strings so API keys never end up in reports or logs.
        let msg = e.to_string();
        let sanitized = match msg.find('?') {
            Some(idx) => format!("{}?<query redacted>", &msg[..idx]),
            None => msg,
        };
        if e.is_decode() {
            ProviderError::Malformed(sanitized)
        } else {
            ProviderError::Network(sanitized)
        }
    }
}

/// Error taxonomy for the resolver, ledger and use-case layer.
///
/// Everything here propagates unchanged to the application boundary, where it
/// is translated into a user-facing message. Provider failures are the one
/// exception: they are folded into the update run report, not raised.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("no exchange rate available from {from} to {to}")]
    RateNotFound { from: String, to: String },

    #[error("unknown currency '{0}'")]
    UnknownCurrency(String),

    #[error("invalid currency code '{0}': expected 2-5 alphanumeric or hyphen characters")]
    InvalidCurrencyCode(String),

    #[error("no {0} wallet; one is created on the first buy of that currency")]
    WalletNotFound(String),

    #[error(
        "insufficient funds: available {available:.4} {currency}, requested {requested:.4} {currency}"
    )]
    InsufficientFunds {
        currency: String,
        available: f64,
        requested: f64,
    },

    #[error("amount must be a positive number, got {0}")]
    InvalidAmount(f64),

    #[error("unknown rate source '{0}'")]
    UnknownSource(String),

    #[error("user '{0}' not found")]
    UserNotFound(String),

    #[error("username must not be empty")]
    InvalidUsername,

    #[error("username '{0}' is already taken")]
    DuplicateUsername(String),

    #[error("password must be at least 4 characters")]
    InvalidPassword,

    #[error("wrong password")]
    Authentication,

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Storage(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_funds_message_carries_amounts() {
        let err = CoreError::InsufficientFunds {
            currency: "BTC".to_string(),
            available: 0.5,
            requested: 0.6,
        };
        assert_eq!(
            err.to_string(),
            "insufficient funds: available 0.5000 BTC, requested 0.6000 BTC"
        );
    }

    #[test]
    fn wallet_not_found_names_the_currency() {
        let err = CoreError::WalletNotFound("ETH".to_string());
        assert!(err.to_string().contains("ETH"));
    }
}
