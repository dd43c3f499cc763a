use crate::models::ApiError;
use axum::{
    Json,
    body::Body,
    extract::State,
    http::{self, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{collections::HashSet, env, sync::Arc};
use tracing::info;

/// Optional shared-key guard for `/api/*`. With no keys configured every
/// request passes.
#[derive(Clone, Default)]
pub struct AuthState {
    keys: Arc<HashSet<String>>,
}

impl AuthState {
    pub fn from_env() -> Self {
        let raw = env::var("PRICEBOT_API_KEYS").unwrap_or_default();
        let state = Self::with_keys(raw.split(','));
        if state.keys.is_empty() {
            info!(
                target = "pricebot.api",
                "PRICEBOT_API_KEYS not set; api is open"
            );
        } else {
            info!(
                target = "pricebot.api",
                key_count = state.keys.len(),
                "loaded API keys from env"
            );
        }
        state
    }

    pub fn with_keys<'a>(keys: impl IntoIterator<Item = &'a str>) -> Self {
        let keys = keys
            .into_iter()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .collect();
        Self {
            keys: Arc::new(keys),
        }
    }

    fn is_open(&self) -> bool {
        self.keys.is_empty()
    }
}

pub async fn require_api_key(
    State(state): State<AuthState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if state.is_open() {
        return next.run(request).await;
    }
    match extract_api_key(request.headers()) {
        None => unauthorized_response("Provide X-Pricebot-Key or Bearer token"),
        Some(presented) if !state.keys.contains(&presented) => {
            unauthorized_response("Key not recognized")
        }
        Some(_) => next.run(request).await,
    }
}

fn extract_api_key(headers: &http::HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(http::header::AUTHORIZATION)
        && let Ok(raw) = value.to_str()
        && raw.len() >= 7
        && raw[..6].eq_ignore_ascii_case("bearer")
    {
        return Some(raw[6..].trim().to_string());
    }
    headers
        .get("X-Pricebot-Key")
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn unauthorized_response(message: &str) -> Response {
    let payload = ApiError::new("UNAUTHORIZED", Some(message.to_string()));
    (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
}
