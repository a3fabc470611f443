use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{errors::ServiceError, services::receipts::RECEIPT_FILENAME, AppState};

#[derive(Debug, Deserialize, IntoParams)]
pub struct ReceiptParams {
    /// Provider checkout session id the receipt belongs to
    pub session_id: Option<String>,
}

// GET /api/v1/receipts
#[utoipa::path(
    get,
    path = "/api/v1/receipts",
    params(ReceiptParams),
    responses(
        (status = 200, description = "Booking confirmation as a downloadable HTML document", content_type = "text/html"),
        (status = 400, description = "Missing session id", body = crate::errors::ErrorResponse),
        (status = 403, description = "Session exists but was never paid", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown session", body = crate::errors::ErrorResponse)
    ),
    tag = "Receipts"
)]
pub async fn download_receipt(
    State(state): State<AppState>,
    Query(params): Query<ReceiptParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let session_id = params.session_id.unwrap_or_default();
    let html = state.receipts.receipt_for_session(&session_id).await?;

    Ok((
        [
            (
                header::CONTENT_TYPE,
                "text/html; charset=utf-8".to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", RECEIPT_FILENAME),
            ),
        ],
        html,
    ))
}
