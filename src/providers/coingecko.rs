use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::core::error::ProviderError;
use crate::core::rates::{RateEntry, pair_key};
use crate::providers::RateProvider;

pub const SOURCE: &str = "CoinGecko";

/// Bulk crypto price query against CoinGecko's simple-price endpoint.
///
/// Internal currency codes are translated to CoinGecko coin ids through the
/// configured map; codes without a mapping are skipped, not errors.
pub struct CoinGeckoProvider {
    base_url: String,
    base_currency: String,
    tracked: Vec<String>,
    id_map: HashMap<String, String>,
    timeout: Duration,
}

impl CoinGeckoProvider {
    pub fn new(
        base_url: &str,
        base_currency: &str,
        tracked: &[String],
        id_map: &HashMap<String, String>,
        timeout: Duration,
    ) -> Self {
        CoinGeckoProvider {
            base_url: base_url.to_string(),
            base_currency: base_currency.to_uppercase(),
            tracked: tracked.to_vec(),
            id_map: id_map.clone(),
            timeout,
        }
    }
}

/// Response shape: `{"bitcoin": {"usd": 59337.21}, ...}`.
type SimplePriceResponse = HashMap<String, HashMap<String, f64>>;

#[async_trait]
impl RateProvider for CoinGeckoProvider {
    fn name(&self) -> &str {
        SOURCE
    }

    #[instrument(name = "CoinGeckoFetch", skip(self))]
    async fn fetch_rates(&self) -> Result<HashMap<String, RateEntry>, ProviderError> {
        let ids: Vec<&str> = self
            .tracked
            .iter()
            .filter_map(|code| self.id_map.get(code).map(String::as_str))
            .collect();
        if ids.is_empty() {
            warn!("no mapped cryptocurrency ids to request");
            return Ok(HashMap::new());
        }

        let url = format!("{}/simple/price", self.base_url);
        debug!(%url, count = ids.len(), "requesting crypto prices");

        let client = reqwest::Client::builder()
            .user_agent("valutahub/0.1")
            .timeout(self.timeout)
            .build()?;
        let response = client
            .get(&url)
            .query(&[
                ("ids", ids.join(",")),
                ("vs_currencies", self.base_currency.to_lowercase()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::Status {
                status: response.status().as_u16(),
                url,
            });
        }

        let data: SimplePriceResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        let updated_at = Utc::now();
        let vs = self.base_currency.to_lowercase();
        let mut rates = HashMap::new();
        for code in &self.tracked {
            let Some(id) = self.id_map.get(code) else {
                continue;
            };
            if let Some(rate) = data.get(id).and_then(|prices| prices.get(&vs)) {
                rates.insert(
                    pair_key(code, &self.base_currency),
                    RateEntry {
                        rate: *rate,
                        updated_at,
                        source: SOURCE.to_string(),
                    },
                );
            }
        }

        info!(count = rates.len(), "fetched cryptocurrency rates");
        Ok(rates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn id_map() -> HashMap<String, String> {
        [("BTC", "bitcoin"), ("ETH", "ethereum")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn provider(base_url: &str, tracked: &[&str]) -> CoinGeckoProvider {
        let tracked: Vec<String> = tracked.iter().map(|s| s.to_string()).collect();
        CoinGeckoProvider::new(base_url, "USD", &tracked, &id_map(), Duration::from_secs(10))
    }

    #[tokio::test]
    async fn test_successful_fetch_normalizes_pairs() {
        let mock_server = MockServer::start().await;
        let body = r#"{"bitcoin": {"usd": 59337.21}, "ethereum": {"usd": 3720.0}}"#;
        Mock::given(method("GET"))
            .and(path("/simple/price"))
            .and(query_param("ids", "bitcoin,ethereum"))
            .and(query_param("vs_currencies", "usd"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&mock_server)
            .await;

        let rates = provider(&mock_server.uri(), &["BTC", "ETH"])
            .fetch_rates()
            .await
            .unwrap();

        assert_eq!(rates.len(), 2);
        let btc = &rates["BTC_USD"];
        assert_eq!(btc.rate, 59337.21);
        assert_eq!(btc.source, "CoinGecko");
    }

    #[tokio::test]
    async fn test_unmapped_codes_are_skipped() {
        let mock_server = MockServer::start().await;
        let body = r#"{"bitcoin": {"usd": 59337.21}}"#;
        Mock::given(method("GET"))
            .and(path("/simple/price"))
            .and(query_param("ids", "bitcoin"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&mock_server)
            .await;

        // NOPE has no CoinGecko id; the request only carries bitcoin.
        let rates = provider(&mock_server.uri(), &["BTC", "NOPE"])
            .fetch_rates()
            .await
            .unwrap();
        assert_eq!(rates.len(), 1);
        assert!(rates.contains_key("BTC_USD"));
    }

    #[tokio::test]
    async fn test_no_mapped_ids_is_an_empty_result() {
        // Server never hit: no mapped ids means no request.
        let rates = provider("http://127.0.0.1:9", &["NOPE"])
            .fetch_rates()
            .await
            .unwrap();
        assert!(rates.is_empty());
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/simple/price"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&mock_server)
            .await;

        let result = provider(&mock_server.uri(), &["BTC"]).fetch_rates().await;
        assert!(matches!(
            result,
            Err(ProviderError::Status { status: 429, .. })
        ));
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/simple/price"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&mock_server)
            .await;

        let result = provider(&mock_server.uri(), &["BTC"]).fetch_rates().await;
        assert!(matches!(result, Err(ProviderError::Malformed(_))));
    }
}
