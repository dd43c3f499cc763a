use super::{AppError, AppState, parse_body};
use axum::{Json, body::Bytes, extract::State};
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Serialize)]
pub struct StateResponse {
    ok: bool,
    state: Map<String, Value>,
}

pub async fn get_state(State(state): State<AppState>) -> Result<Json<StateResponse>, AppError> {
    crate::metrics::inc_requests("/api/debug/state");
    let current = state.state_store.read().await?;
    Ok(Json(StateResponse {
        ok: true,
        state: current,
    }))
}

/// Shallow-merges the posted object into the state file.
pub async fn post_state(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<StateResponse>, AppError> {
    crate::metrics::inc_requests("/api/debug/state");
    let patch = match parse_body::<Value>(&body)? {
        Value::Object(map) => map,
        _ => return Err(AppError::bad_request("state patch must be a JSON object")),
    };
    let merged = state.state_store.merge(patch).await?;
    Ok(Json(StateResponse {
        ok: true,
        state: merged,
    }))
}
