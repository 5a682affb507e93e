//! HTTP rate client against a mock exchangerate-api server.

use fx_bot::currency::{CurrencyCatalog, CurrencyCode};
use fx_bot::dialogue::{DialogueController, DialogueEvent};
use fx_bot::error::RateError;
use fx_bot::rates::{ExchangeRateApi, RateProvider};
use fx_bot::session::MemorySessionStore;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn code(s: &str) -> CurrencyCode {
    CurrencyCode::parse(s).unwrap()
}

fn client(server: &MockServer) -> ExchangeRateApi {
    ExchangeRateApi::new()
        .with_base_url(format!("{}/v4/latest", server.uri()))
        .with_timeout(Duration::from_millis(500))
}

async fn serve_usd(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/v4/latest/USD"))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn fetches_target_rate() {
    let server = MockServer::start().await;
    serve_usd(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({
            "base": "USD",
            "date": "2026-10-17",
            "rates": { "USD": 1, "EUR": 0.9, "GBP": 0.78 }
        })),
    )
    .await;

    let api = client(&server);
    assert_eq!(api.try_fetch_rate(code("USD"), code("EUR")).await.unwrap(), 0.9);
    assert_eq!(api.fetch_rate(code("USD"), code("GBP")).await, Some(0.78));
}

#[tokio::test]
async fn server_error_is_unavailable() {
    let server = MockServer::start().await;
    serve_usd(&server, ResponseTemplate::new(500).set_body_string("boom")).await;

    let api = client(&server);
    let err = api.try_fetch_rate(code("USD"), code("EUR")).await.unwrap_err();
    assert!(matches!(err, RateError::Status { status: 500, .. }));
    assert_eq!(api.fetch_rate(code("USD"), code("EUR")).await, None);
}

#[tokio::test]
async fn missing_target_is_unavailable() {
    let server = MockServer::start().await;
    serve_usd(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({ "rates": { "GBP": 0.78 } })),
    )
    .await;

    let err = client(&server)
        .try_fetch_rate(code("USD"), code("EUR"))
        .await
        .unwrap_err();
    assert!(matches!(err, RateError::Missing { .. }));
}

#[tokio::test]
async fn unusable_rate_is_unavailable() {
    let server = MockServer::start().await;
    serve_usd(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({ "rates": { "EUR": 0 } })),
    )
    .await;

    assert_eq!(client(&server).fetch_rate(code("USD"), code("EUR")).await, None);
}

#[tokio::test]
async fn malformed_body_is_unavailable() {
    let server = MockServer::start().await;
    serve_usd(&server, ResponseTemplate::new(200).set_body_string("<html>")).await;

    let err = client(&server)
        .try_fetch_rate(code("USD"), code("EUR"))
        .await
        .unwrap_err();
    assert!(matches!(err, RateError::Decode(_)));
}

#[tokio::test]
async fn slow_server_times_out() {
    let server = MockServer::start().await;
    serve_usd(
        &server,
        ResponseTemplate::new(200)
            .set_body_json(json!({ "rates": { "EUR": 0.9 } }))
            .set_delay(Duration::from_secs(3)),
    )
    .await;

    let err = client(&server)
        .try_fetch_rate(code("USD"), code("EUR"))
        .await
        .unwrap_err();
    assert!(matches!(err, RateError::Request(_)));
}

#[tokio::test]
async fn dialogue_reports_upstream_failure() {
    let server = MockServer::start().await;
    serve_usd(&server, ResponseTemplate::new(503)).await;

    let store = Arc::new(MemorySessionStore::new());
    let controller = DialogueController::new(
        store.clone(),
        Arc::new(client(&server)),
        Arc::new(CurrencyCatalog::builtin()),
    );

    for input in ["/manual", "usd", "eur"] {
        controller.handle("cli:direct", DialogueEvent::text(input)).await;
    }
    let out = controller
        .handle("cli:direct", DialogueEvent::text("12.5"))
        .await;

    assert_eq!(out.len(), 1);
    assert_eq!(
        out[0].text(),
        "⚠️ Failed to fetch exchange rate. Please try again later."
    );
    assert!(store.is_empty().await);
}
