use axum::{extract::State, Json};

use crate::{
    errors::ServiceError,
    services::wallet::{WalletPassRequest, WalletPassResponse},
    AppState,
};

// POST /api/v1/wallet/passes
#[utoipa::path(
    post,
    path = "/api/v1/wallet/passes",
    request_body = WalletPassRequest,
    responses(
        (status = 200, description = "Save-to-wallet link for the booking", body = WalletPassResponse),
        (status = 400, description = "Invalid pass request", body = crate::errors::ErrorResponse),
        (status = 502, description = "Google Wallet API failure", body = crate::errors::ErrorResponse),
        (status = 503, description = "Wallet issuing not configured", body = crate::errors::ErrorResponse)
    ),
    tag = "Wallet"
)]
pub async fn create_wallet_pass(
    State(state): State<AppState>,
    Json(request): Json<WalletPassRequest>,
) -> Result<Json<WalletPassResponse>, ServiceError> {
    let response = state.wallet.issue_pass(request).await?;
    Ok(Json(response))
}
