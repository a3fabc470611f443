//! Transactional mail for paid bookings.
//!
//! Delivery goes through the [`Mailer`] trait so the webhook processor can be
//! exercised in tests without a live mail provider. The production
//! implementation talks to the Resend HTTP API.

pub mod templates;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, instrument, warn};

use crate::models::Booking;
use crate::services::receipts::RECEIPT_FILENAME;

/// Attempts made against the mail API before a send is abandoned
const MAX_SEND_ATTEMPTS: u32 = 3;

/// Mail delivery errors
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Mail transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Mail API rejected the message with status {status}: {body}")]
    Rejected { status: StatusCode, body: String },
    #[error("Mail delivery failed after {0} attempts")]
    RetriesExhausted(u32),
}

/// File attached to an outgoing email; `content` is base64-encoded
#[derive(Debug, Clone, Serialize)]
pub struct EmailAttachment {
    pub filename: String,
    pub content: String,
}

impl EmailAttachment {
    pub fn from_bytes(filename: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            filename: filename.into(),
            content: general_purpose::STANDARD.encode(bytes),
        }
    }
}

/// One outgoing email, already in the shape the mail API accepts
#[derive(Debug, Clone, Serialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<EmailAttachment>,
}

/// Outbound mail delivery
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), NotificationError>;
}

/// Mailer backed by the Resend HTTP API
#[derive(Clone)]
pub struct ResendMailer {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl fmt::Debug for ResendMailer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResendMailer")
            .field("api_base", &self.api_base)
            .field("api_key", &"[redacted]")
            .finish()
    }
}

impl ResendMailer {
    pub fn new(client: reqwest::Client, api_base: &str, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    #[instrument(skip(self, message), fields(subject = %message.subject, attachments = message.attachments.len()))]
    async fn send(&self, message: EmailMessage) -> Result<(), NotificationError> {
        let endpoint = format!("{}/emails", self.api_base);

        for attempt in 1..=MAX_SEND_ATTEMPTS {
            let result = self
                .client
                .post(&endpoint)
                .bearer_auth(&self.api_key)
                .json(&message)
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    return Ok(());
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    // A client error other than rate limiting will not improve
                    // on a resend of the same payload.
                    if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
                        return Err(NotificationError::Rejected { status, body });
                    }
                    warn!(
                        "Mail API answered {} (attempt {}/{})",
                        status, attempt, MAX_SEND_ATTEMPTS
                    );
                }
                Err(e) => {
                    warn!(
                        "Mail send error: {} (attempt {}/{})",
                        e, attempt, MAX_SEND_ATTEMPTS
                    );
                }
            }

            // Exponential backoff: 1s, 2s
            if attempt < MAX_SEND_ATTEMPTS {
                let backoff = Duration::from_secs(2_u64.pow(attempt - 1));
                tokio::time::sleep(backoff).await;
            }
        }

        error!("Mail delivery failed after {} attempts", MAX_SEND_ATTEMPTS);
        Err(NotificationError::RetriesExhausted(MAX_SEND_ATTEMPTS))
    }
}

/// Builds and sends the two emails that follow a paid booking: the customer
/// confirmation and the operator alert.
#[derive(Clone)]
pub struct BookingNotifier {
    mailer: Arc<dyn Mailer>,
    from: String,
    operator_email: String,
}

impl fmt::Debug for BookingNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BookingNotifier")
            .field("from", &self.from)
            .field("operator_email", &self.operator_email)
            .finish()
    }
}

impl BookingNotifier {
    pub fn new(
        mailer: Arc<dyn Mailer>,
        from: impl Into<String>,
        operator_email: impl Into<String>,
    ) -> Self {
        Self {
            mailer,
            from: from.into(),
            operator_email: operator_email.into(),
        }
    }

    /// Confirmation for the customer, with the receipt attached as an HTML
    /// file. Quietly a no-op when the checkout captured no customer email.
    #[instrument(skip(self, booking, receipt_html), fields(booking_reference = %booking.booking_reference))]
    pub async fn send_customer_confirmation(
        &self,
        booking: &Booking,
        site_url: &str,
        receipt_html: &str,
    ) -> Result<(), NotificationError> {
        let Some(to) = booking.customer.email.clone() else {
            warn!("Booking has no customer email; skipping confirmation mail");
            return Ok(());
        };

        let receipt_url = templates::receipt_url(site_url, &booking.provider_session_id);
        let message = EmailMessage {
            from: self.from.clone(),
            to,
            subject: templates::customer_subject(&booking.booking_reference),
            html: templates::customer_confirmation_html(booking, &receipt_url),
            attachments: vec![EmailAttachment::from_bytes(
                RECEIPT_FILENAME,
                receipt_html.as_bytes(),
            )],
        };
        self.mailer.send(message).await
    }

    /// Heads-up for the storage operator
    #[instrument(skip(self, booking), fields(booking_reference = %booking.booking_reference))]
    pub async fn send_operator_alert(
        &self,
        booking: &Booking,
        site_url: &str,
    ) -> Result<(), NotificationError> {
        let receipt_url = templates::receipt_url(site_url, &booking.provider_session_id);
        let message = EmailMessage {
            from: self.from.clone(),
            to: self.operator_email.clone(),
            subject: templates::operator_subject(
                &booking.booking_reference,
                &booking.customer.name,
            ),
            html: templates::operator_alert_html(booking, &receipt_url),
            attachments: Vec::new(),
        };
        self.mailer.send(message).await
    }
}
