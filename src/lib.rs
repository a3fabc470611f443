//! Luggage Deposit Rome booking API
//!
//! Pricing, checkout session creation, payment verification, webhook-driven
//! booking reconciliation, receipts and wallet passes for the storage point
//! near Termini Station.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod booking_reference;
pub mod cache;
pub mod config;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod middleware_helpers;
pub mod models;
pub mod notifications;
pub mod openapi;
pub mod pricing;
pub mod recovery;
pub mod services;
pub mod stripe;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::cache::{CacheBackend, InMemoryCache};
use crate::config::AppConfig;
use crate::events::EventSender;
use crate::notifications::{BookingNotifier, Mailer, ResendMailer};
use crate::services::bookings::{BookingStore, InMemoryBookingStore};
use crate::services::checkout::CheckoutService;
use crate::services::receipts::ReceiptService;
use crate::services::verification::VerificationService;
use crate::services::wallet::WalletService;
use crate::services::webhook::WebhookProcessor;
use crate::stripe::StripeClient;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub checkout: Arc<CheckoutService>,
    pub verification: Arc<VerificationService>,
    pub webhook: Arc<WebhookProcessor>,
    pub receipts: Arc<ReceiptService>,
    pub wallet: Arc<WalletService>,
    pub store: Arc<dyn BookingStore>,
}

impl AppState {
    /// Wires every service from the configuration. The HTTP client is shared
    /// across all outbound integrations so they pool connections together.
    pub fn build(
        config: AppConfig,
        http_client: reqwest::Client,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        let stripe = Arc::new(StripeClient::new(
            http_client.clone(),
            &config.stripe_api_base,
            &config.stripe_secret_key,
        ));

        let mailer: Arc<dyn Mailer> = Arc::new(ResendMailer::new(
            http_client.clone(),
            &config.mail_api_base,
            &config.mail_api_key,
        ));
        let notifier = BookingNotifier::new(mailer, &config.mail_from, &config.operator_email);

        let cache: Arc<dyn CacheBackend> = Arc::new(InMemoryCache::new());
        let store: Arc<dyn BookingStore> = Arc::new(InMemoryBookingStore::new());

        let checkout = Arc::new(CheckoutService::new(
            stripe.clone(),
            &config.site_url,
            event_sender.clone(),
        ));
        let verification = Arc::new(VerificationService::new(
            stripe.clone(),
            event_sender.clone(),
        ));
        let webhook = Arc::new(WebhookProcessor::new(
            &config.stripe_webhook_secret,
            config.stripe_webhook_tolerance_secs,
            Duration::from_secs(config.webhook_dedupe_ttl_secs),
            &config.site_url,
            cache,
            store.clone(),
            notifier,
            event_sender,
        ));
        let receipts = Arc::new(ReceiptService::new(stripe));
        let wallet = Arc::new(WalletService::new(
            http_client,
            config.wallet(),
            config.missing_wallet_settings(),
        ));

        Self {
            config,
            checkout,
            verification,
            webhook,
            receipts,
            wallet,
            store,
        }
    }
}

/// Versioned API surface
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/checkout/sessions",
            post(handlers::checkout::create_checkout_session),
        )
        .route("/checkout/verify", get(handlers::sessions::verify_session))
        .route("/webhooks/stripe", post(handlers::webhooks::stripe_webhook))
        .route("/receipts", get(handlers::receipts::download_receipt))
        .route("/wallet/passes", post(handlers::wallet::create_wallet_pass))
        .route("/status", get(handlers::health::api_status))
}

/// Full application router, shared by the binary and the integration tests
pub fn app_router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .merge(openapi::swagger_ui())
        .nest("/api/v1", api_v1_routes())
        .route("/health", get(handlers::health::liveness))
        .route("/r", get(handlers::redirect::success_bridge))
        .layer(middleware_helpers::configure_http_tracing())
        .layer(tower_http::compression::CompressionLayer::new())
        .layer(tower_http::timeout::TimeoutLayer::new(Duration::from_secs(
            30,
        )))
        .layer(cors)
        // Outermost layer, so the id exists before the trace span opens
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
        .with_state(state)
}
