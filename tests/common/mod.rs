use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request},
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;
use tower_http::cors::CorsLayer;
use wiremock::MockServer;

use ldr_api::{
    app_router,
    config::AppConfig,
    events::{self, EventSender},
    stripe::webhook,
    AppState,
};

pub const TEST_SITE_URL: &str = "https://luggagedepositrome.com";
pub const TEST_WEBHOOK_SECRET: &str = "whsec_test_secret";

/// Reference used across fixtures; stays within the crockford-style
/// alphabet the generator emits.
pub const TEST_REFERENCE: &str = "LDR-7XKQ2MNP";

/// Helper harness wiring the full router against wiremock doubles for the
/// payment provider, the mail API, and the Google Wallet API.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub stripe: MockServer,
    pub mail: MockServer,
    pub google: MockServer,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a test application with wallet passes left unconfigured.
    pub async fn new() -> Self {
        Self::build(None).await
    }

    /// Construct a test application able to sign wallet passes with the
    /// given RSA private key.
    #[allow(dead_code)]
    pub async fn with_wallet(private_key_pem: &str) -> Self {
        Self::build(Some(private_key_pem)).await
    }

    async fn build(wallet_key: Option<&str>) -> Self {
        let stripe = MockServer::start().await;
        let mail = MockServer::start().await;
        let google = MockServer::start().await;

        // Minimal configuration suitable for tests; every outbound base URL
        // points at a local mock server.
        let mut cfg = AppConfig::new(
            TEST_SITE_URL.to_string(),
            "sk_test_abc123".to_string(),
            TEST_WEBHOOK_SECRET.to_string(),
            "re_test_key".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.stripe_api_base = stripe.uri();
        cfg.mail_api_base = mail.uri();
        cfg.wallet_token_url = format!("{}/token", google.uri());
        cfg.wallet_objects_base = format!("{}/walletobjects/v1", google.uri());
        if let Some(pem) = wallet_key {
            cfg.wallet_issuer_id = Some(TEST_WALLET_ISSUER.to_string());
            cfg.wallet_service_account_email =
                Some("passes@ldr-test.iam.gserviceaccount.com".to_string());
            cfg.wallet_private_key_pem = Some(pem.to_string());
        }

        let (event_tx, event_rx) = mpsc::channel(64);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let event_task = tokio::spawn(events::process_events(event_rx));

        let state = AppState::build(cfg, reqwest::Client::new(), Some(event_sender));
        let router = app_router(state.clone(), CorsLayer::permissive());

        Self {
            router,
            state,
            stripe,
            mail,
            google,
            _event_task: event_task,
        }
    }

    /// Send a request against the router.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    #[allow(dead_code)]
    pub async fn get(&self, uri: &str) -> axum::response::Response {
        self.request(Method::GET, uri, None, &[]).await
    }

    #[allow(dead_code)]
    pub async fn post_json(&self, uri: &str, body: Value) -> axum::response::Response {
        self.request(Method::POST, uri, Some(body), &[]).await
    }

    /// Deliver a raw webhook payload, optionally carrying a signature header.
    #[allow(dead_code)]
    pub async fn post_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/webhooks/stripe")
            .header("content-type", "application/json");
        if let Some(value) = signature {
            builder = builder.header(webhook::SIGNATURE_HEADER, value);
        }

        let request = builder
            .body(Body::from(payload.to_vec()))
            .expect("failed to build webhook request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub const TEST_WALLET_ISSUER: &str = "3388000000012345678";

/// Reads a response body as JSON.
pub async fn response_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    serde_json::from_slice(&bytes).expect("response body was not valid json")
}

/// Reads a response body as text.
#[allow(dead_code)]
pub async fn response_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    String::from_utf8(bytes.to_vec()).expect("response body was not utf-8")
}

/// A completed checkout session carrying the full booking metadata, as the
/// provider returns it after payment. Three billable days at 2 small + 1
/// large bag: (2*5 + 7) * 3 = 51 EUR.
#[allow(dead_code)]
pub fn paid_session_json(session_id: &str) -> Value {
    json!({
        "id": session_id,
        "object": "checkout.session",
        "url": null,
        "payment_status": "paid",
        "status": "complete",
        "amount_total": 5100,
        "currency": "eur",
        "created": 1_710_000_000,
        "customer_details": {
            "email": "ada@example.com",
            "name": "Ada Lovelace"
        },
        "metadata": {
            "schemaVersion": "1",
            "bookingReference": TEST_REFERENCE,
            "customerName": "Ada Lovelace",
            "customerEmail": "ada@example.com",
            "customerPhone": "+39 333 123 4567",
            "dropOffDate": "2024-03-10",
            "dropOffTime": "09:30",
            "pickUpDate": "2024-03-12",
            "pickUpTime": "18:00",
            "quantities": "{\"Small\":2,\"Medium\":0,\"Large\":1}",
            "billableDays": "3",
            "perDaySubtotal": "17",
            "totalPrice": "51",
            "siteUrl": TEST_SITE_URL
        }
    })
}

/// Wraps a checkout session into a `checkout.session.completed` event body.
#[allow(dead_code)]
pub fn completed_event_body(event_id: &str, session: &Value) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "id": event_id,
        "object": "event",
        "type": "checkout.session.completed",
        "data": { "object": session }
    }))
    .expect("failed to serialize event body")
}

/// Signs a payload the way the provider does, using the test endpoint secret.
#[allow(dead_code)]
pub fn signed_header(payload: &[u8]) -> String {
    webhook::header_value(TEST_WEBHOOK_SECRET, Utc::now().timestamp(), payload)
}
