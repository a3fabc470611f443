use axum::{extract::Query, extract::State, Json};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    errors::ServiceError,
    models::VerifySessionResponse,
    services::verification::VerifiedSession,
    AppState,
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct VerifyParams {
    /// Provider checkout session id from the success redirect
    pub session_id: Option<String>,
}

// GET /api/v1/checkout/verify
#[utoipa::path(
    get,
    path = "/api/v1/checkout/verify",
    params(VerifyParams),
    responses(
        (status = 200, description = "Payment status, with the booking when paid", body = VerifySessionResponse),
        (status = 400, description = "Missing session id", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown session", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn verify_session(
    State(state): State<AppState>,
    Query(params): Query<VerifyParams>,
) -> Result<Json<VerifySessionResponse>, ServiceError> {
    let session_id = params.session_id.unwrap_or_default();
    let response = match state.verification.verify_session(&session_id).await? {
        VerifiedSession::Paid(booking) => VerifySessionResponse {
            payment_status: "paid".to_string(),
            booking: Some(booking),
        },
        VerifiedSession::Unpaid => VerifySessionResponse {
            payment_status: "unpaid".to_string(),
            booking: None,
        },
    };
    Ok(Json(response))
}
