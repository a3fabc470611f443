use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use tracing::debug;

use crate::{
    errors::ServiceError,
    models::WebhookAck,
    services::webhook::WebhookOutcome,
    stripe::webhook::SIGNATURE_HEADER,
    AppState,
};

// POST /api/v1/webhooks/stripe
//
// The provider retries on any non-2xx, so once the signature checks out the
// answer is always `{"received": true}` no matter how the fan-out went.
#[utoipa::path(
    post,
    path = "/api/v1/webhooks/stripe",
    request_body = String,
    responses(
        (status = 200, description = "Event acknowledged", body = WebhookAck),
        (status = 400, description = "Signature verification failed or malformed payload", body = crate::errors::ErrorResponse)
    ),
    tag = "Webhooks"
)]
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ServiceError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let outcome = state.webhook.process(&body, signature).await?;
    if let WebhookOutcome::Skipped(reason) = &outcome {
        debug!(?reason, "Webhook delivery skipped");
    }

    Ok(Json(WebhookAck { received: true }))
}
