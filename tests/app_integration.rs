use tracing::info;

use valutahub::config::{
    AppConfig, CoinGeckoProviderConfig, ExchangeRateProviderConfig, ProvidersConfig,
};
use valutahub::core::error::CoreError;
use valutahub::trading::App;

mod test_utils {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub const COINGECKO_BODY: &str = r#"{
        "bitcoin": {"usd": 59337.21},
        "ethereum": {"usd": 2674.51}
    }"#;

    pub const EXCHANGERATE_BODY: &str = r#"{
        "result": "success",
        "time_last_update_utc": "Fri, 27 Mar 2026 00:00:01 +0000",
        "conversion_rates": {"EUR": 0.8, "GBP": 0.5}
    }"#;

    pub async fn coingecko_server(response: ResponseTemplate) -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/simple/price"))
            .respond_with(response)
            .mount(&mock_server)
            .await;
        mock_server
    }

    pub async fn exchangerate_server(response: ResponseTemplate) -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/test-key/latest/USD"))
            .respond_with(response)
            .mount(&mock_server)
            .await;
        mock_server
    }
}

fn test_config(data_dir: &std::path::Path, coingecko_url: &str, exchangerate_url: &str) -> AppConfig {
    AppConfig {
        crypto_currencies: vec!["BTC".to_string(), "ETH".to_string()],
        fiat_currencies: vec!["EUR".to_string(), "GBP".to_string()],
        providers: ProvidersConfig {
            coingecko: Some(CoinGeckoProviderConfig {
                base_url: coingecko_url.to_string(),
            }),
            exchangerate: Some(ExchangeRateProviderConfig {
                base_url: exchangerate_url.to_string(),
                api_key: Some("test-key".to_string()),
            }),
        },
        data_path: Some(data_dir.to_string_lossy().into_owned()),
        ..AppConfig::default()
    }
}

#[test_log::test(tokio::test)]
async fn test_update_trade_and_valuation_flow() {
    use wiremock::ResponseTemplate;

    let crypto_server =
        test_utils::coingecko_server(ResponseTemplate::new(200).set_body_string(test_utils::COINGECKO_BODY))
            .await;
    let fiat_server = test_utils::exchangerate_server(
        ResponseTemplate::new(200).set_body_string(test_utils::EXCHANGERATE_BODY),
    )
    .await;

    let data_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = test_config(data_dir.path(), &crypto_server.uri(), &fiat_server.uri());
    let app = App::new(config).expect("Failed to build app");

    // Refresh pulls both providers into one snapshot.
    let report = app.update_rates(None).await.expect("Update failed");
    info!(?report.updated_pairs, "update completed");
    assert!(report.success, "unexpected errors: {:?}", report.errors);
    assert_eq!(report.updated_pairs.len(), 4);

    let info = app.cache_info();
    assert_eq!(info.pairs_count, 4);
    assert!(info.is_fresh);

    app.register_user("alice", "hunter2").expect("Register failed");
    let receipt = app.buy("alice", "btc", 0.5).expect("Buy failed");
    assert_eq!(receipt.currency, "BTC");
    let value = receipt.anchor_value.expect("Trade should be priced");
    assert!((value - 29668.605).abs() < 1e-6, "got {value}");

    // The portfolio values the wallet with the cached rate.
    let valuation = app.portfolio_view("alice", None).expect("Valuation failed");
    assert_eq!(valuation.anchor, "USD");
    assert!((valuation.total - 29668.605).abs() < 1e-6);

    // EUR_USD was inverted from the fiat table: 1 EUR = 1.25 USD.
    let quote = app.exchange_rate_view("EUR", "USD").expect("Quote failed");
    assert!((quote.rate - 1.25).abs() < 1e-12);
    assert!(quote.last_refresh.is_some());

    // Triangulation through the anchor prices BTC in EUR.
    let quote = app.exchange_rate_view("BTC", "EUR").expect("Quote failed");
    assert!((quote.rate - 59337.21 / 1.25).abs() < 1e-6);

    // Overselling reports both sides of the shortfall.
    match app.sell("alice", "BTC", 0.6) {
        Err(CoreError::InsufficientFunds {
            available,
            requested,
            ..
        }) => {
            assert_eq!(available, 0.5);
            assert_eq!(requested, 0.6);
        }
        other => panic!("expected InsufficientFunds, got {other:?}"),
    }
}

#[test_log::test(tokio::test)]
async fn test_partial_provider_failure_still_commits() {
    use wiremock::ResponseTemplate;

    let crypto_server =
        test_utils::coingecko_server(ResponseTemplate::new(200).set_body_string(test_utils::COINGECKO_BODY))
            .await;
    let fiat_server = test_utils::exchangerate_server(ResponseTemplate::new(500)).await;

    let data_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = test_config(data_dir.path(), &crypto_server.uri(), &fiat_server.uri());
    let app = App::new(config).expect("Failed to build app");

    let report = app.update_rates(None).await.expect("Update failed");
    assert!(!report.success);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("ExchangeRate-API"));

    // Crypto pairs landed despite the fiat failure, and the cache is stamped.
    assert_eq!(report.updated_pairs.len(), 2);
    let info = app.cache_info();
    assert_eq!(info.pairs_count, 2);
    assert!(info.is_fresh);
}

#[test_log::test(tokio::test)]
async fn test_single_source_update_and_unknown_source() {
    use wiremock::ResponseTemplate;

    let crypto_server =
        test_utils::coingecko_server(ResponseTemplate::new(200).set_body_string(test_utils::COINGECKO_BODY))
            .await;

    let data_dir = tempfile::tempdir().expect("Failed to create temp dir");
    // The fiat endpoint is unreachable on purpose; filtering must never touch it.
    let config = test_config(data_dir.path(), &crypto_server.uri(), "http://127.0.0.1:9");
    let app = App::new(config).expect("Failed to build app");

    let report = app
        .update_rates(Some("coingecko"))
        .await
        .expect("Update failed");
    assert!(report.success);
    assert_eq!(report.updated_pairs.len(), 2);

    let result = app.update_rates(Some("nonesuch")).await;
    assert!(matches!(
        result,
        Err(CoreError::UnknownSource(name)) if name == "nonesuch"
    ));
}

#[test_log::test(tokio::test)]
async fn test_full_app_flow_via_config_file() {
    use wiremock::ResponseTemplate;

    let crypto_server =
        test_utils::coingecko_server(ResponseTemplate::new(200).set_body_string(test_utils::COINGECKO_BODY))
            .await;

    let data_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config_file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    let config_content = format!(
        r#"
        currency: "USD"
        crypto_currencies: [BTC, ETH]
        providers:
          coingecko:
            base_url: {}
        data_path: {}
    "#,
        crypto_server.uri(),
        data_dir.path().display()
    );
    std::fs::write(config_file.path(), &config_content).expect("Failed to write config file");
    let config_path = config_file.path().to_str().unwrap();

    let result = valutahub::run_command(
        valutahub::AppCommand::Update { source: None },
        Some(config_path),
    )
    .await;
    assert!(result.is_ok(), "Update failed with: {:?}", result.err());

    let result = valutahub::run_command(
        valutahub::AppCommand::Register {
            username: "bob".to_string(),
            password: "hunter2".to_string(),
        },
        Some(config_path),
    )
    .await;
    assert!(result.is_ok(), "Register failed with: {:?}", result.err());

    let result = valutahub::run_command(
        valutahub::AppCommand::Buy {
            username: "bob".to_string(),
            currency: "ETH".to_string(),
            amount: 2.0,
        },
        Some(config_path),
    )
    .await;
    assert!(result.is_ok(), "Buy failed with: {:?}", result.err());

    let result = valutahub::run_command(
        valutahub::AppCommand::Portfolio {
            username: "bob".to_string(),
            currency: None,
        },
        Some(config_path),
    )
    .await;
    assert!(result.is_ok(), "Portfolio failed with: {:?}", result.err());
}
