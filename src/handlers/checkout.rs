use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::IntoResponse,
    Json,
};
use tracing::info;

use crate::{
    errors::ServiceError,
    models::{BookingRequest, CheckoutSessionResponse},
    AppState,
};

// POST /api/v1/checkout/sessions
#[utoipa::path(
    post,
    path = "/api/v1/checkout/sessions",
    request_body = BookingRequest,
    responses(
        (status = 200, description = "Hosted payment session created", body = CheckoutSessionResponse),
        (status = 400, description = "Invalid booking request", body = crate::errors::ErrorResponse),
        (status = 502, description = "Payment provider unavailable", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn create_checkout_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<BookingRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let origin = request_origin(&headers);
    let response = state
        .checkout
        .create_session(request, origin.as_deref())
        .await?;
    info!(session_id = %response.session_id, "Checkout session created");
    Ok(Json(response))
}

/// Origin the success and cancel URLs should point back at. The browser's
/// Origin header wins; behind a proxy the forwarded proto and host are used;
/// otherwise the caller falls back to the configured site URL.
fn request_origin(headers: &HeaderMap) -> Option<String> {
    let origin = headers
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok())
        .filter(|origin| !origin.is_empty() && *origin != "null");
    if let Some(origin) = origin {
        return Some(origin.to_string());
    }

    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())?;
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())?;
    Some(format!("{}://{}", proto, host))
}
