//! Checkout Session Builder: validates a booking request, prices it, and
//! opens exactly one hosted payment session carrying the whole booking as
//! session metadata. Nothing is persisted locally before payment.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{instrument, warn};
use validator::Validate;

use crate::booking_reference;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{BookingRequest, CheckoutSessionResponse, DateRange, SessionMetadata};
use crate::pricing::{self, MAX_BAGS_PER_SIZE};
use crate::stripe::{CreateSessionParams, LineItem, StripeClient};

#[derive(Debug, Clone)]
pub struct CheckoutService {
    stripe: Arc<StripeClient>,
    /// Fallback origin for redirect URLs when the request carries none
    site_url: String,
    event_sender: Option<Arc<EventSender>>,
}

impl CheckoutService {
    pub fn new(
        stripe: Arc<StripeClient>,
        site_url: impl Into<String>,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            stripe,
            site_url: site_url.into(),
            event_sender,
        }
    }

    /// Validates the request fail-closed, then creates one provider session.
    /// `origin` is the caller's origin when the frontend is served from a
    /// different host than the configured site URL.
    #[instrument(skip(self, request), fields(drop_off = %request.drop_off_date, pick_up = %request.pick_up_date))]
    pub async fn create_session(
        &self,
        request: BookingRequest,
        origin: Option<&str>,
    ) -> Result<CheckoutSessionResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let quote = pricing::quote(
            &request.drop_off_date,
            &request.pick_up_date,
            &request.bag_quantities,
        );
        if quote.billable_days < 1 {
            return Err(ServiceError::ValidationError(
                "Invalid storage dates selected".to_string(),
            ));
        }
        if request.bag_quantities.total_bags() == 0 {
            return Err(ServiceError::ValidationError(
                "Please select at least one bag".to_string(),
            ));
        }
        for (size, quantity) in request.bag_quantities.iter() {
            if quantity > MAX_BAGS_PER_SIZE {
                return Err(ServiceError::ValidationError(format!(
                    "Invalid quantity for {}",
                    size
                )));
            }
        }

        let reference = booking_reference::generate();
        let site = origin.unwrap_or(&self.site_url).trim_end_matches('/');
        let success_url = format!("{}/#/success?session_id={{CHECKOUT_SESSION_ID}}", site);
        let cancel_url = format!("{}/#/", site);

        let description = format!("Booking {} ({} days)", reference, quote.billable_days);
        let line_items: Vec<LineItem> = request
            .bag_quantities
            .iter()
            .filter(|(_, quantity)| *quantity > 0)
            .map(|(size, quantity)| LineItem {
                name: format!("{} Luggage Storage ({} days)", size, quote.billable_days),
                description: Some(description.clone()),
                unit_amount_minor: pricing::eur_to_minor(
                    size.rate_per_day() * Decimal::from(quote.billable_days),
                ),
                quantity,
            })
            .collect();

        let metadata = SessionMetadata {
            booking_reference: Some(reference.clone()),
            customer_name: request.customer_name.clone(),
            customer_email: Some(request.customer_email.clone()),
            customer_phone: request.customer_phone.clone(),
            schedule: DateRange {
                drop_off_date: request.drop_off_date.clone(),
                drop_off_time: request.drop_off_time.clone(),
                pick_up_date: request.pick_up_date.clone(),
                pick_up_time: request.pick_up_time.clone(),
            },
            quantities: request.bag_quantities,
            billable_days: Some(quote.billable_days),
            per_day_subtotal: Some(quote.per_day_subtotal),
            total_price: Some(quote.total_price),
            site_url: Some(site.to_string()),
        }
        .to_map()
        .map_err(|e| ServiceError::SerializationError(e.to_string()))?;

        let params = CreateSessionParams {
            success_url,
            cancel_url,
            customer_email: request.customer_email.clone(),
            line_items,
            metadata,
        };

        let session = self.stripe.create_checkout_session(&params).await?;
        let redirect_url = session.url.clone().ok_or_else(|| {
            ServiceError::ExternalServiceError(
                "Checkout session came back without a redirect URL".to_string(),
            )
        })?;

        if let Some(event_sender) = &self.event_sender {
            let event = Event::CheckoutSessionCreated {
                session_id: session.id.clone(),
                booking_reference: reference,
                total_minor: pricing::eur_to_minor(quote.total_price),
            };
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, "Failed to send checkout created event");
            }
        }

        Ok(CheckoutSessionResponse {
            redirect_url,
            session_id: session.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::BagQuantities;

    fn request(quantities: BagQuantities) -> BookingRequest {
        BookingRequest {
            bag_quantities: quantities,
            drop_off_date: "2024-03-10".to_string(),
            drop_off_time: Some("09:30".to_string()),
            pick_up_date: "2024-03-12".to_string(),
            pick_up_time: None,
            customer_name: "Ada Rossi".to_string(),
            customer_email: "ada@example.com".to_string(),
            customer_phone: Some("+39 333 1234567".to_string()),
        }
    }

    fn service() -> CheckoutService {
        let stripe = Arc::new(StripeClient::new(
            reqwest::Client::new(),
            "http://127.0.0.1:1",
            "sk_test_x",
        ));
        CheckoutService::new(stripe, "https://luggagedepositrome.com", None)
    }

    #[tokio::test]
    async fn zero_bags_fails_before_any_provider_call() {
        // The provider base points at a closed port; reaching it would fail
        // with a different error than the validation one asserted here.
        let err = service()
            .create_session(request(BagQuantities::new(0, 0, 0)), None)
            .await
            .unwrap_err();

        match err {
            ServiceError::ValidationError(message) => {
                assert_eq!(message, "Please select at least one bag");
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn inverted_dates_are_rejected() {
        let mut req = request(BagQuantities::new(1, 0, 0));
        req.drop_off_date = "2024-03-12".to_string();
        req.pick_up_date = "2024-03-10".to_string();

        let err = service().create_session(req, None).await.unwrap_err();
        match err {
            ServiceError::ValidationError(message) => {
                assert_eq!(message, "Invalid storage dates selected");
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn oversized_quantity_is_rejected() {
        let err = service()
            .create_session(request(BagQuantities::new(1, 51, 0)), None)
            .await
            .unwrap_err();

        match err {
            ServiceError::ValidationError(message) => {
                assert_eq!(message, "Invalid quantity for Medium");
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn invalid_email_is_rejected() {
        let mut req = request(BagQuantities::new(1, 0, 0));
        req.customer_email = "not-an-email".to_string();

        let err = service().create_session(req, None).await.unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }
}
