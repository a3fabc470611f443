//! Webhook Event Handler: the only place bookings are persisted and emails
//! go out. Signature verification gates everything; after that the handler
//! acks every delivery, so each fan-out branch has to fail on its own.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, instrument, warn};

use crate::cache::CacheBackend;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::notifications::BookingNotifier;
use crate::services::bookings::BookingStore;
use crate::services::receipts;
use crate::services::verification::booking_from_session;
use crate::stripe::webhook::{self, CHECKOUT_SESSION_COMPLETED};
use crate::stripe::CheckoutSession;

/// Why a signature-verified delivery produced no booking
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    IgnoredEventType(String),
    NotPaid,
    Duplicate,
    /// Paid session whose payload could not be reconciled into a booking
    Malformed,
}

/// What one delivery amounted to; every variant is acked with 200
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Processed { booking_reference: String },
    Skipped(SkipReason),
}

pub struct WebhookProcessor {
    webhook_secret: String,
    tolerance_secs: u64,
    dedupe_ttl: Duration,
    /// Fallback origin for receipt links when the session metadata has none
    site_url: String,
    cache: Arc<dyn CacheBackend>,
    store: Arc<dyn BookingStore>,
    notifier: BookingNotifier,
    event_sender: Option<Arc<EventSender>>,
}

impl WebhookProcessor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        webhook_secret: impl Into<String>,
        tolerance_secs: u64,
        dedupe_ttl: Duration,
        site_url: impl Into<String>,
        cache: Arc<dyn CacheBackend>,
        store: Arc<dyn BookingStore>,
        notifier: BookingNotifier,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            webhook_secret: webhook_secret.into(),
            tolerance_secs,
            dedupe_ttl,
            site_url: site_url.into(),
            cache,
            store,
            notifier,
            event_sender,
        }
    }

    /// Runs one raw delivery through signature check, filters, dedupe and
    /// fan-out. Errors are only returned for signature or payload problems;
    /// everything after that is contained and logged.
    #[instrument(skip(self, payload, signature_header), fields(payload_bytes = payload.len()))]
    pub async fn process(
        &self,
        payload: &[u8],
        signature_header: Option<&str>,
    ) -> Result<WebhookOutcome, ServiceError> {
        let header = signature_header.ok_or_else(|| {
            ServiceError::WebhookSignature("Missing Stripe-Signature header".to_string())
        })?;

        let event =
            webhook::construct_event(payload, header, &self.webhook_secret, self.tolerance_secs)?;

        if event.event_type != CHECKOUT_SESSION_COMPLETED {
            info!(
                event_id = %event.id,
                event_type = %event.event_type,
                "Ignoring webhook event type"
            );
            return Ok(WebhookOutcome::Skipped(SkipReason::IgnoredEventType(
                event.event_type,
            )));
        }

        let session: CheckoutSession = serde_json::from_value(event.data.object)
            .map_err(|e| ServiceError::InvalidInput(format!("checkout session object: {}", e)))?;

        if !session.is_paid() {
            info!(
                event_id = %event.id,
                session_id = %session.id,
                payment_status = %session.payment_status,
                "Completed session is not paid; skipping"
            );
            return Ok(WebhookOutcome::Skipped(SkipReason::NotPaid));
        }

        let dedupe_key = format!("stripe:event:{}", event.id);
        let first_delivery = match self
            .cache
            .set_nx(&dedupe_key, "1", Some(self.dedupe_ttl))
            .await
        {
            Ok(stored) => stored,
            Err(e) => {
                // Losing dedupe only risks repeat notifications; the store
                // upsert stays idempotent either way.
                warn!(error = %e, event_id = %event.id, "Dedupe check failed; processing anyway");
                true
            }
        };
        if !first_delivery {
            info!(event_id = %event.id, "Duplicate webhook delivery; skipping");
            return Ok(WebhookOutcome::Skipped(SkipReason::Duplicate));
        }

        let booking = match booking_from_session(&session) {
            Ok(booking) => booking,
            Err(e) => {
                error!(
                    event_id = %event.id,
                    session_id = %session.id,
                    error = %e,
                    "Paid session could not be reconciled; nothing processed"
                );
                return Ok(WebhookOutcome::Skipped(SkipReason::Malformed));
            }
        };

        let site_url = session
            .metadata
            .get("siteUrl")
            .cloned()
            .unwrap_or_else(|| self.site_url.clone());
        let receipt_html = receipts::render_receipt(&booking);

        let (stored, customer_mail, operator_mail) = tokio::join!(
            self.store.upsert(booking.clone()),
            self.notifier
                .send_customer_confirmation(&booking, &site_url, &receipt_html),
            self.notifier.send_operator_alert(&booking, &site_url),
        );

        match stored {
            Ok(outcome) => {
                info!(
                    booking_reference = %booking.booking_reference,
                    created = outcome.created(),
                    "Booking stored"
                );
                if let Some(event_sender) = &self.event_sender {
                    event_sender
                        .send_or_log(Event::BookingUpserted {
                            booking_reference: booking.booking_reference.clone(),
                            created: outcome.created(),
                        })
                        .await;
                }
            }
            Err(e) => {
                error!(
                    booking_reference = %booking.booking_reference,
                    error = %e,
                    "Booking store upsert failed"
                );
            }
        }
        if let Err(e) = customer_mail {
            error!(
                booking_reference = %booking.booking_reference,
                error = %e,
                "Customer confirmation mail failed"
            );
        }
        if let Err(e) = operator_mail {
            error!(
                booking_reference = %booking.booking_reference,
                error = %e,
                "Operator alert mail failed"
            );
        }

        if let Some(event_sender) = &self.event_sender {
            event_sender
                .send_or_log(Event::PaymentCompleted {
                    session_id: session.id.clone(),
                    booking_reference: booking.booking_reference.clone(),
                    amount_total_minor: session.amount_total.unwrap_or(0),
                })
                .await;
        }

        Ok(WebhookOutcome::Processed {
            booking_reference: booking.booking_reference,
        })
    }
}
