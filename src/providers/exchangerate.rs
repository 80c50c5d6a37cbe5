use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::core::error::ProviderError;
use crate::core::rates::{RateEntry, pair_key};
use crate::providers::RateProvider;

pub const SOURCE: &str = "ExchangeRate-API";

/// Fiat rate table scoped to the base currency, from ExchangeRate-API.
///
/// The API reports "1 base = X quote"; entries are inverted so the stored
/// rate follows the canonical quote-per-base convention for the
/// `{code}_{base}` pair.
pub struct ExchangeRateApiProvider {
    base_url: String,
    api_key: Option<String>,
    base_currency: String,
    tracked: Vec<String>,
    timeout: Duration,
}

impl ExchangeRateApiProvider {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        base_currency: &str,
        tracked: &[String],
        timeout: Duration,
    ) -> Self {
        ExchangeRateApiProvider {
            base_url: base_url.to_string(),
            api_key,
            base_currency: base_currency.to_uppercase(),
            tracked: tracked.to_vec(),
            timeout,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LatestResponse {
    result: String,
    #[serde(rename = "error-type")]
    error_type: Option<String>,
    time_last_update_utc: Option<String>,
    #[serde(default)]
    conversion_rates: HashMap<String, f64>,
}

#[async_trait]
impl RateProvider for ExchangeRateApiProvider {
    fn name(&self) -> &str {
        SOURCE
    }

    #[instrument(name = "ExchangeRateFetch", skip(self))]
    async fn fetch_rates(&self) -> Result<HashMap<String, RateEntry>, ProviderError> {
        let key = self
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                ProviderError::MissingCredential("ExchangeRate-API key".to_string())
            })?;

        let url = format!("{}/{}/latest/{}", self.base_url, key, self.base_currency);
        // Key never appears in logs or errors.
        let display_url = format!("{}/<key>/latest/{}", self.base_url, self.base_currency);
        debug!(url = %display_url, "requesting fiat rates");

        let client = reqwest::Client::builder()
            .user_agent("valutahub/0.1")
            .timeout(self.timeout)
            .build()?;
        // The key sits in the URL path, so reqwest errors must drop the URL.
        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::from(e.without_url()))?;

        if !response.status().is_success() {
            return Err(ProviderError::Status {
                status: response.status().as_u16(),
                url: display_url,
            });
        }

        let data: LatestResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.without_url().to_string()))?;
        if data.result != "success" {
            return Err(ProviderError::Malformed(format!(
                "API returned error: {}",
                data.error_type.as_deref().unwrap_or("unknown")
            )));
        }

        let updated_at = data
            .time_last_update_utc
            .as_deref()
            .and_then(|ts| DateTime::parse_from_rfc2822(ts).ok())
            .map(|ts| ts.with_timezone(&Utc))
            .ok_or_else(|| {
                ProviderError::Malformed("missing or unparseable time_last_update_utc".to_string())
            })?;

        let mut rates = HashMap::new();
        for code in &self.tracked {
            if let Some(quote_per_base) = data.conversion_rates.get(code) {
                if *quote_per_base <= 0.0 {
                    continue;
                }
                rates.insert(
                    pair_key(code, &self.base_currency),
                    RateEntry {
                        rate: 1.0 / quote_per_base,
                        updated_at,
                        source: SOURCE.to_string(),
                    },
                );
            }
        }

        info!(count = rates.len(), "fetched fiat rates");
        Ok(rates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(base_url: &str, api_key: Option<&str>) -> ExchangeRateApiProvider {
        let tracked = vec!["EUR".to_string(), "GBP".to_string()];
        ExchangeRateApiProvider::new(
            base_url,
            api_key.map(String::from),
            "USD",
            &tracked,
            Duration::from_secs(10),
        )
    }

    const BODY: &str = r#"{
        "result": "success",
        "time_last_update_utc": "Fri, 27 Mar 2026 00:00:01 +0000",
        "conversion_rates": {"EUR": 0.8, "GBP": 0.5, "JPY": 150.2}
    }"#;

    #[tokio::test]
    async fn test_rates_are_inverted_to_quote_per_base() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/test-key/latest/USD"))
            .respond_with(ResponseTemplate::new(200).set_body_string(BODY))
            .mount(&mock_server)
            .await;

        let rates = provider(&mock_server.uri(), Some("test-key"))
            .fetch_rates()
            .await
            .unwrap();

        // 1 USD = 0.8 EUR, so EUR_USD = 1.25 USD per EUR.
        assert_eq!(rates.len(), 2);
        assert!((rates["EUR_USD"].rate - 1.25).abs() < 1e-12);
        assert!((rates["GBP_USD"].rate - 2.0).abs() < 1e-12);
        assert_eq!(rates["EUR_USD"].source, "ExchangeRate-API");
        // JPY is not tracked, so it is not emitted.
        assert!(!rates.contains_key("JPY_USD"));
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let result = provider("http://127.0.0.1:9", None).fetch_rates().await;
        assert!(matches!(result, Err(ProviderError::MissingCredential(_))));

        let result = provider("http://127.0.0.1:9", Some("")).fetch_rates().await;
        assert!(matches!(result, Err(ProviderError::MissingCredential(_))));
    }

    #[tokio::test]
    async fn test_api_level_error_result() {
        let mock_server = MockServer::start().await;
        let body = r#"{"result": "error", "error-type": "invalid-key"}"#;
        Mock::given(method("GET"))
            .and(path("/test-key/latest/USD"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&mock_server)
            .await;

        let result = provider(&mock_server.uri(), Some("test-key"))
            .fetch_rates()
            .await;
        match result {
            Err(ProviderError::Malformed(msg)) => assert!(msg.contains("invalid-key")),
            other => panic!("expected Malformed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_http_error_hides_the_key() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/test-key/latest/USD"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let result = provider(&mock_server.uri(), Some("test-key"))
            .fetch_rates()
            .await;
        match result {
            Err(ProviderError::Status { status: 500, url }) => {
                assert!(!url.contains("test-key"));
                assert!(url.contains("<key>"));
            }
            other => panic!("expected Status, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unparseable_update_time_is_malformed() {
        let mock_server = MockServer::start().await;
        let body = r#"{"result": "success", "time_last_update_utc": "whenever", "conversion_rates": {"EUR": 0.8}}"#;
        Mock::given(method("GET"))
            .and(path("/test-key/latest/USD"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&mock_server)
            .await;

        let result = provider(&mock_server.uri(), Some("test-key"))
            .fetch_rates()
            .await;
        assert!(matches!(result, Err(ProviderError::Malformed(_))));
    }
}
