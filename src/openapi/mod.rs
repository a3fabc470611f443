use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Luggage Deposit Rome API",
        version = env!("CARGO_PKG_VERSION"),
        description = r#"
# Luggage Deposit Rome Booking API

Booking and payments backend for the Luggage Deposit Rome storage point near
Termini Station.

## Flow

1. **Create a checkout session** with the bag counts, dates and customer
   details; the response carries the hosted payment page to redirect to.
2. The payment provider sends the browser back with a `session_id`, which
   **verify** turns back into the booking.
3. Independently, the provider delivers a `checkout.session.completed`
   **webhook**; the backend records the booking and sends the confirmation
   and operator emails.
4. **Receipts** and **wallet passes** are available for paid bookings.

## Pricing

Per bag per day: Small 5.00 EUR, Medium 6.00 EUR, Large 7.00 EUR. A storage
window is billed per calendar day started, so same-day drop-off and pick-up
counts as one day.

## Errors

Failing endpoints answer with a JSON envelope:

```json
{
  "error": "Bad Request",
  "message": "Validation error: please select at least one bag",
  "request_id": "req-abc123xyz",
  "timestamp": "2025-06-09T10:30:00.000Z"
}
```
        "#,
        contact(
            name = "Luggage Deposit Rome",
            email = "valigeriagioberti@gmail.com",
            url = "https://luggagedepositrome.com"
        ),
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "https://luggagedepositrome.com", description = "Production"),
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Checkout", description = "Checkout session creation and verification"),
        (name = "Webhooks", description = "Inbound payment provider events"),
        (name = "Receipts", description = "Booking confirmation documents"),
        (name = "Wallet", description = "Google Wallet pass issuance"),
        (name = "Status", description = "Service status")
    ),
    paths(
        crate::handlers::checkout::create_checkout_session,
        crate::handlers::sessions::verify_session,
        crate::handlers::webhooks::stripe_webhook,
        crate::handlers::receipts::download_receipt,
        crate::handlers::wallet::create_wallet_pass,
        crate::handlers::health::api_status,
    ),
    components(
        schemas(
            crate::models::BookingRequest,
            crate::models::CheckoutSessionResponse,
            crate::models::VerifySessionResponse,
            crate::models::WebhookAck,
            crate::models::Booking,
            crate::models::Customer,
            crate::models::DateRange,
            crate::models::PaymentStatus,
            crate::pricing::BagQuantities,
            crate::pricing::BagSize,
            crate::services::wallet::WalletPassRequest,
            crate::services::wallet::WalletPassResponse,
            crate::errors::ErrorResponse,
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
