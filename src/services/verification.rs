//! Session Verifier: reads payment state straight from the provider and
//! rebuilds the booking from session metadata. Read-only and idempotent;
//! verifying the same paid session twice yields identical records and
//! writes nothing locally.

use std::sync::Arc;

use chrono::DateTime;
use rust_decimal::Decimal;
use tracing::{instrument, warn};

use crate::booking_reference;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{Booking, Customer, PaymentStatus, SessionMetadata};
use crate::pricing;
use crate::stripe::{CheckoutSession, StripeClient};

/// Outcome of verifying one provider session
#[derive(Debug, Clone)]
pub enum VerifiedSession {
    Paid(Booking),
    /// Pending or failed payment; a normal answer, not an error
    Unpaid,
}

#[derive(Debug, Clone)]
pub struct VerificationService {
    stripe: Arc<StripeClient>,
    event_sender: Option<Arc<EventSender>>,
}

impl VerificationService {
    pub fn new(stripe: Arc<StripeClient>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            stripe,
            event_sender,
        }
    }

    /// Fetches the session and, when paid, reconstructs the booking.
    /// Unknown session ids surface as NotFound; transient provider trouble
    /// as ExternalServiceError after the client's single retry.
    #[instrument(skip(self))]
    pub async fn verify_session(&self, session_id: &str) -> Result<VerifiedSession, ServiceError> {
        if session_id.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Missing session ID".to_string(),
            ));
        }

        let session = self.stripe.retrieve_checkout_session(session_id).await?;
        if !session.is_paid() {
            return Ok(VerifiedSession::Unpaid);
        }

        let booking = booking_from_session(&session)?;

        if let Some(event_sender) = &self.event_sender {
            let event = Event::PaymentVerified {
                session_id: session.id.clone(),
                booking_reference: booking.booking_reference.clone(),
            };
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, "Failed to send payment verified event");
            }
        }

        Ok(VerifiedSession::Paid(booking))
    }
}

/// Rebuilds the booking a paid session describes.
///
/// Billable days and the per-day subtotal are recomputed from the stored
/// dates and quantities; the metadata's own copies are cross-checked and
/// logged on drift, never trusted. The total comes from what the provider
/// actually charged.
pub fn booking_from_session(session: &CheckoutSession) -> Result<Booking, ServiceError> {
    let metadata = SessionMetadata::from_map(&session.metadata)
        .map_err(|e| ServiceError::Reconciliation(format!("session {}: {}", session.id, e)))?;

    let billable_days = pricing::billable_days(
        &metadata.schedule.drop_off_date,
        &metadata.schedule.pick_up_date,
    );
    let per_day_subtotal = pricing::per_day_subtotal(&metadata.quantities);

    if let Some(stored) = metadata.billable_days {
        if stored != billable_days {
            warn!(
                session_id = %session.id,
                stored,
                recomputed = billable_days,
                "Stored billable days disagree with recomputed value"
            );
        }
    }
    if let Some(stored) = metadata.per_day_subtotal {
        if stored != per_day_subtotal {
            warn!(
                session_id = %session.id,
                %stored,
                recomputed = %per_day_subtotal,
                "Stored per-day subtotal disagrees with recomputed value"
            );
        }
    }

    let total_price = match session.amount_total {
        Some(minor) => pricing::minor_to_eur(minor),
        None => per_day_subtotal * Decimal::from(billable_days),
    };
    if let Some(stored) = metadata.total_price {
        if stored != total_price {
            warn!(
                session_id = %session.id,
                %stored,
                charged = %total_price,
                "Stored total disagrees with the amount charged"
            );
        }
    }

    let booking_reference = metadata
        .booking_reference
        .unwrap_or_else(|| booking_reference::from_session_id(&session.id));

    let email = session
        .customer_details
        .as_ref()
        .and_then(|details| details.email.clone())
        .or(metadata.customer_email);

    Ok(Booking {
        booking_reference,
        customer: Customer {
            name: metadata.customer_name,
            email,
            phone: metadata.customer_phone,
        },
        schedule: metadata.schedule,
        quantities: metadata.quantities,
        billable_days,
        per_day_subtotal,
        total_price,
        payment_status: PaymentStatus::Paid,
        provider_session_id: session.id.clone(),
        // The provider's creation instant, so repeat verification rebuilds
        // an identical record.
        created_at: DateTime::from_timestamp(session.created, 0).unwrap_or_default(),
    })
}
