pub mod auth;
pub mod debug;
pub mod merchant;
pub mod pricebot;

use crate::{
    jobs::BulkJobs,
    kaspi::{KaspiConfig, KaspiError, MerchantClient, ShopClient},
    logbuf::LogBuffer,
    models::{ApiError, safe_id},
    security::{AuthState, require_api_key},
    settings::{SettingsError, SettingsStore},
    state_file::{StateError, StateStore},
};
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::{path::PathBuf, sync::Arc};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::error;

pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const MAX_PAGE_LIMIT: u32 = 100;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<KaspiConfig>,
    pub data_dir: PathBuf,
    pub merchant: MerchantClient,
    pub shop: ShopClient,
    pub settings: SettingsStore,
    pub state_store: StateStore,
    pub jobs: BulkJobs,
    pub logs: LogBuffer,
    pub prometheus_handle: PrometheusHandle,
}

impl AppState {
    pub fn new(config: KaspiConfig, data_dir: PathBuf, prometheus_handle: PrometheusHandle) -> Self {
        let config = Arc::new(config);
        let settings = SettingsStore::new(&data_dir);
        let logs = LogBuffer::new();
        Self {
            merchant: MerchantClient::new(config.clone(), data_dir.clone()),
            shop: ShopClient::new(config.clone()),
            state_store: StateStore::new(&data_dir),
            jobs: BulkJobs::new(settings.clone(), logs.clone()),
            settings,
            logs,
            config,
            data_dir,
            prometheus_handle,
        }
    }

    /// Explicit id, else `KASPI_MERCHANT_ID`; must be safe to use in a file name.
    pub fn resolve_merchant(&self, explicit: Option<&str>) -> Result<String, AppError> {
        let raw = explicit
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .or(self.config.merchant_id.as_deref())
            .ok_or_else(|| AppError::bad_request("merchantId is required"))?;
        safe_id(raw)
            .map(str::to_string)
            .ok_or_else(|| AppError::bad_request(format!("invalid id `{raw}`")))
    }
}

pub fn router(state: AppState, auth: AuthState) -> Router {
    let cors = CorsLayer::new()
        .allow_headers(Any)
        .allow_methods(Any)
        .allow_origin(Any);

    let api = Router::new()
        .route("/auth/cookie-status", post(auth::cookie_status))
        .route(
            "/debug/state",
            get(debug::get_state).post(debug::post_state),
        )
        .nest(
            "/merchant",
            Router::new()
                .route("/offers", get(merchant::offers))
                .route("/offer/stock", get(merchant::offer_stock))
                .route("/sale-items", get(merchant::sale_items)),
        )
        .nest(
            "/pricebot",
            Router::new()
                .route(
                    "/bulk",
                    post(pricebot::start_bulk).get(pricebot::bulk_status),
                )
                .route("/logs", get(pricebot::logs))
                .route("/offers", get(pricebot::offers))
                .route(
                    "/settings",
                    get(pricebot::get_settings).post(pricebot::put_settings),
                ),
        )
        .route_layer(middleware::from_fn_with_state(auth, require_api_key));

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .nest("/api", api)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Health and readiness check.
///
/// - Method: `GET`
/// - Path: `/health`
/// - Auth: none
async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "kaspi-pricebot-rs",
    }))
}

async fn metrics_endpoint(State(state): State<AppState>, headers: axum::http::HeaderMap) -> Response {
    if let Ok(secret) = std::env::var("METRICS_KEY") {
        let presented = headers
            .get("X-Metrics-Key")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if presented != secret {
            return (StatusCode::UNAUTHORIZED, "unauthorized").into_response();
        }
    }
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4",
        )],
        state.prometheus_handle.render(),
    )
        .into_response()
}

/// Route-level failure rendered as `{ok: false, error, detail}`.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    detail: Option<String>,
}

impl AppError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "BAD_REQUEST",
            detail: Some(detail.into()),
        }
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: "NOT_FOUND",
            detail: Some(detail.into()),
        }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "INTERNAL",
            detail: Some(detail.into()),
        }
    }

    #[cfg(test)]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[cfg(test)]
    pub fn code(&self) -> &'static str {
        self.code
    }
}

impl From<KaspiError> for AppError {
    fn from(err: KaspiError) -> Self {
        let detail = Some(err.to_string());
        match err {
            KaspiError::MissingToken => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "MISSING_TOKEN",
                detail,
            },
            other => Self {
                status: StatusCode::BAD_GATEWAY,
                code: other.code().as_str(),
                detail,
            },
        }
    }
}

impl From<SettingsError> for AppError {
    fn from(err: SettingsError) -> Self {
        Self::internal(err.to_string())
    }
}

impl From<StateError> for AppError {
    fn from(err: StateError) -> Self {
        Self::internal(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(
                target = "pricebot.api",
                code = self.code,
                detail = self.detail.as_deref().unwrap_or(""),
                "request failed"
            );
        }
        (self.status, Json(ApiError::new(self.code, self.detail))).into_response()
    }
}

/// Parses a JSON request body; an empty body reads as `{}`.
pub(crate) fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, AppError> {
    let raw: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}"
    } else {
        &body[..]
    };
    serde_json::from_slice(raw).map_err(|err| AppError::bad_request(format!("invalid body: {err}")))
}

/// `p` (default 0) and `l` (default 20, clamped to 1..=100).
pub(crate) fn page_params(p: Option<&str>, l: Option<&str>) -> Result<(u32, u32), AppError> {
    let page = match p.map(str::trim).filter(|v| !v.is_empty()) {
        Some(raw) => raw
            .parse::<u32>()
            .map_err(|_| AppError::bad_request(format!("invalid page `{raw}`")))?,
        None => 0,
    };
    let limit = match l.map(str::trim).filter(|v| !v.is_empty()) {
        Some(raw) => raw
            .parse::<u32>()
            .map_err(|_| AppError::bad_request(format!("invalid limit `{raw}`")))?
            .clamp(1, MAX_PAGE_LIMIT),
        None => DEFAULT_PAGE_LIMIT,
    };
    Ok((page, limit))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use axum::{
        body::Body,
        extract::Query,
        http::{HeaderMap, Request},
    };
    use http_body_util::BodyExt;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use serde_json::Value;
    use std::{collections::HashMap, path::Path};
    use tower::ServiceExt;

    pub const MERCHANT: &str = "30123";
    pub const COOKIE_HEADER: &str = "mc-session=abc";
    pub const TOKEN: &str = "shop-token";

    pub fn test_config(base: &str) -> KaspiConfig {
        KaspiConfig {
            merchant_api_base: base.to_string(),
            merchant_id: Some(MERCHANT.to_string()),
            shop_api_base: base.to_string(),
            token: Some(TOKEN.to_string()),
            fallback_cookie: None,
            tz_offset_hours: 5,
        }
    }

    pub fn test_state(data_dir: &Path, config: KaspiConfig) -> AppState {
        let handle = PrometheusBuilder::new().build_recorder().handle();
        AppState::new(config, data_dir.to_path_buf(), handle)
    }

    pub fn test_app(state: AppState) -> Router {
        router(state, AuthState::default())
    }

    pub fn write_cookie(data_dir: &Path, merchant: &str) {
        let path = crate::kaspi::cookies::cookie_path(data_dir, merchant);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, r#"[{"name":"mc-session","value":"abc"}]"#).unwrap();
    }

    pub async fn call(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn has_cookie(headers: &HeaderMap) -> bool {
        headers
            .get("cookie")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == COOKIE_HEADER)
    }

    async fn offer_list(
        headers: HeaderMap,
        Query(params): Query<HashMap<String, String>>,
    ) -> Response {
        if !has_cookie(&headers) {
            return (StatusCode::UNAUTHORIZED, "login required").into_response();
        }
        let mut rows = vec![
            json!({"merchantSku": "SKU-1", "masterProduct": {"id": "p1", "name": "Boots"}, "price": 15990, "stockCount": 7, "sellersCount": 3}),
            json!({"offerSku": "SKU-2", "title": "Scarf", "currentPrice": "4500", "availabilities": [{"stockCount": 1}, {"stockCount": 2}]}),
            json!({"name": "no sku row"}),
            json!({"sku": "SKU-3", "name": "Hidden by details"}),
        ];
        if let Some(text) = params.get("t") {
            rows.retain(|row| row.to_string().contains(text.as_str()));
        }
        Json(json!({"data": {"content": rows, "total": 3}, "page": params.get("p")})).into_response()
    }

    async fn offer_details(
        headers: HeaderMap,
        Query(params): Query<HashMap<String, String>>,
    ) -> Response {
        if !has_cookie(&headers) {
            return (StatusCode::FORBIDDEN, "forbidden").into_response();
        }
        match params.get("s").map(String::as_str) {
            Some("SKU-1") => Json(json!({"data": {"offer": {"stockCount": 7}}})).into_response(),
            Some("SKU-3") => Json(json!({"data": {"offer": {"stock": 0}}})).into_response(),
            _ => (StatusCode::NOT_FOUND, "no such offer").into_response(),
        }
    }

    async fn orders(headers: HeaderMap, Query(params): Query<HashMap<String, String>>) -> Response {
        let token_ok = headers
            .get("x-auth-token")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == TOKEN);
        if !token_ok {
            return (StatusCode::UNAUTHORIZED, "bad token").into_response();
        }
        let ge = params
            .get("filter[orders][creationDate][$ge]")
            .cloned()
            .unwrap_or_default();
        Json(json!({
            "data": [
                {"id": "o1", "attributes": {"code": "1001", "state": "ARCHIVE", "totalPrice": 12000, "creationDate": 1754000000000i64}},
                {"id": "o2", "attributes": {"code": "1002", "state": "NEW", "totalPrice": 3000, "creationDate": 1754000100000i64}},
                {"id": "o3", "attributes": {"code": "1003", "state": "NEW", "totalPrice": 500, "creationDate": 1754000200000i64}}
            ],
            "meta": {"ge": ge}
        }))
        .into_response()
    }

    /// Serves a fake merchant cabinet and shop API on an ephemeral port.
    pub async fn mock_upstream() -> String {
        let app = Router::new()
            .route("/bff/offer-view/list", get(offer_list))
            .route("/bff/offer-view/details", get(offer_details))
            .route("/orders", get(orders));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn page_params_defaults_and_clamps() {
        assert_eq!(page_params(None, None).unwrap(), (0, DEFAULT_PAGE_LIMIT));
        assert_eq!(page_params(Some("2"), Some("500")).unwrap(), (2, MAX_PAGE_LIMIT));
        assert_eq!(page_params(Some(""), Some("0")).unwrap(), (0, 1));
        assert_eq!(
            page_params(Some("-1"), None).unwrap_err().status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn kaspi_errors_map_to_gateway_codes() {
        let err = AppError::from(KaspiError::MissingCookie("1".into()));
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.code(), "MISSING_COOKIE");
        let err = AppError::from(KaspiError::MissingToken);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "MISSING_TOKEN");
        let err = AppError::from(KaspiError::Request("HTTP 404 from proxy".into()));
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn health_is_open() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(test_state(dir.path(), test_config("http://127.0.0.1:9")));
        let (status, body) = call(app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn api_keys_guard_api_routes_only() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path(), test_config("http://127.0.0.1:9"));
        let app = router(state, AuthState::with_keys(["secret"]));

        let (status, body) = call(app.clone(), "GET", "/api/pricebot/logs", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["ok"], false);

        let (status, _) = call(app.clone(), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);

        let request = axum::http::Request::builder()
            .uri("/api/pricebot/logs")
            .header("X-Pricebot-Key", "secret")
            .body(axum::body::Body::empty())
            .unwrap();
        let response = tower::ServiceExt::oneshot(app, request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
