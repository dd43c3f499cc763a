use super::{AppError, AppState, parse_body};
use crate::kaspi::cookies::{CookieStatus, cookie_status as read_cookie_status};
use axum::{Json, body::Bytes, extract::State};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CookieStatusRequest {
    #[serde(default)]
    merchant_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CookieStatusResponse {
    ok: bool,
    #[serde(flatten)]
    status: CookieStatus,
}

/// Whether a merchant cabinet cookie file is on disk and how old it is.
///
/// - Method: `POST`
/// - Path: `/api/auth/cookie-status`
/// - Body: `{merchantId?}`
pub async fn cookie_status(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<CookieStatusResponse>, AppError> {
    crate::metrics::inc_requests("/api/auth/cookie-status");
    let request: CookieStatusRequest = parse_body(&body)?;
    let merchant_id = state.resolve_merchant(request.merchant_id.as_deref())?;
    let status = read_cookie_status(&state.data_dir, &merchant_id)
        .await
        .map_err(|err| AppError::internal(err.to_string()))?;
    Ok(Json(CookieStatusResponse { ok: true, status }))
}
