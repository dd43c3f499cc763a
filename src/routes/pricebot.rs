use super::{AppError, AppState, page_params, parse_body};
use crate::{
    jobs::BulkJob,
    kaspi::OfferListQuery,
    logbuf::LOG_TAIL,
    models::OfferRow,
    settings::{SettingsMap, SkuSettings},
    shape::{normalize_offers, parse_lenient, pick_array},
};
use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreRef {
    #[serde(default)]
    store_id: Option<String>,
    #[serde(default)]
    merchant_id: Option<String>,
}

impl StoreRef {
    fn resolve(&self, state: &AppState) -> Result<String, AppError> {
        state.resolve_merchant(self.store_id.as_deref().or(self.merchant_id.as_deref()))
    }
}

#[derive(Debug, Default, Deserialize)]
struct BulkRequest {
    #[serde(flatten)]
    store: StoreRef,
    #[serde(default)]
    skus: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkStarted {
    ok: bool,
    job_id: String,
}

/// Starts a bulk pricing pass and returns before it runs.
///
/// - Method: `POST`
/// - Path: `/api/pricebot/bulk`
/// - Body: `{storeId|merchantId, skus?}`
pub async fn start_bulk(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<BulkStarted>, AppError> {
    crate::metrics::inc_requests("/api/pricebot/bulk");
    let request: BulkRequest = parse_body(&body)?;
    let store_id = request.store.resolve(&state)?;
    let (id, _detached) = state.jobs.start(store_id, request.skus).await;
    Ok(Json(BulkStarted {
        ok: true,
        job_id: id.to_string(),
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobQuery {
    job_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct JobResponse {
    ok: bool,
    job: BulkJob,
}

pub async fn bulk_status(
    State(state): State<AppState>,
    Query(query): Query<JobQuery>,
) -> Result<Json<JobResponse>, AppError> {
    crate::metrics::inc_requests("/api/pricebot/bulk");
    let raw = query
        .job_id
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::bad_request("jobId is required"))?;
    let id = Uuid::parse_str(raw).map_err(|_| AppError::bad_request("invalid jobId"))?;
    let job = state
        .jobs
        .get(id)
        .await
        .ok_or_else(|| AppError::not_found(format!("job {id} not found")))?;
    Ok(Json(JobResponse { ok: true, job }))
}

#[derive(Debug, Serialize)]
pub struct LogsResponse {
    ok: bool,
    logs: Vec<String>,
}

pub async fn logs(State(state): State<AppState>) -> Json<LogsResponse> {
    crate::metrics::inc_requests("/api/pricebot/logs");
    Json(LogsResponse {
        ok: true,
        logs: state.logs.tail(LOG_TAIL).await,
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricebotOffersQuery {
    store_id: Option<String>,
    merchant_id: Option<String>,
    p: Option<String>,
    l: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricebotOffer {
    #[serde(flatten)]
    offer: OfferRow,
    min_price: Option<f64>,
    max_price: Option<f64>,
    source: &'static str,
}

#[skip_serializing_none]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricebotOffersResponse {
    ok: bool,
    store_id: String,
    count: usize,
    items: Vec<PricebotOffer>,
    upstream_error: Option<&'static str>,
}

fn enrich(offer: OfferRow, settings: &SettingsMap, source: &'static str) -> PricebotOffer {
    let bounds = settings.get(&offer.sku).copied().unwrap_or_default();
    PricebotOffer {
        offer,
        min_price: bounds.min_price,
        max_price: bounds.max_price,
        source,
    }
}

/// Merchant offers merged with the store's price bounds.
///
/// When the merchant cabinet is unreachable the rows come from the settings
/// file alone and `upstreamError` carries the failure code.
pub async fn offers(
    State(state): State<AppState>,
    Query(query): Query<PricebotOffersQuery>,
) -> Result<Json<PricebotOffersResponse>, AppError> {
    crate::metrics::inc_requests("/api/pricebot/offers");
    let store_id =
        state.resolve_merchant(query.store_id.as_deref().or(query.merchant_id.as_deref()))?;
    let (page, limit) = page_params(query.p.as_deref(), query.l.as_deref())?;
    let settings = state.settings.load(&store_id).await?;

    let listing = OfferListQuery {
        page,
        limit,
        text: None,
    };
    let (items, upstream_error) = match state.merchant.fetch_offers(&store_id, &listing).await {
        Ok(text) => {
            let rows = normalize_offers(&pick_array(&parse_lenient(&text)).arr);
            let items = rows
                .into_iter()
                .map(|row| enrich(row, &settings, "upstream"))
                .collect::<Vec<_>>();
            (items, None)
        }
        Err(err) => {
            let code = err.code().as_str();
            warn!(
                target = "pricebot.api",
                store_id = %store_id,
                error = %err,
                "offers unavailable; serving settings only"
            );
            state
                .logs
                .push(format!("offers for store {store_id} unavailable: {code}"))
                .await;
            let items = settings
                .keys()
                .map(|sku| enrich(OfferRow::bare(sku.as_str()), &settings, "settings"))
                .collect::<Vec<_>>();
            (items, Some(code))
        }
    };

    Ok(Json(PricebotOffersResponse {
        ok: true,
        store_id,
        count: items.len(),
        items,
        upstream_error,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsResponse {
    ok: bool,
    store_id: String,
    settings: SettingsMap,
}

pub async fn get_settings(
    State(state): State<AppState>,
    Query(query): Query<PricebotOffersQuery>,
) -> Result<Json<SettingsResponse>, AppError> {
    crate::metrics::inc_requests("/api/pricebot/settings");
    let store_id =
        state.resolve_merchant(query.store_id.as_deref().or(query.merchant_id.as_deref()))?;
    let settings = state.settings.load(&store_id).await?;
    Ok(Json(SettingsResponse {
        ok: true,
        store_id,
        settings,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsUpdate {
    #[serde(flatten)]
    store: StoreRef,
    #[serde(default)]
    sku: Option<String>,
    #[serde(default)]
    min_price: Option<f64>,
    #[serde(default)]
    max_price: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdated {
    ok: bool,
    store_id: String,
    sku: String,
    settings: SkuSettings,
}

/// Replaces the bounds of one SKU.
pub async fn put_settings(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SettingsUpdated>, AppError> {
    crate::metrics::inc_requests("/api/pricebot/settings");
    let update: SettingsUpdate = parse_body(&body)?;
    let store_id = update.store.resolve(&state)?;
    let sku = update
        .sku
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::bad_request("sku is required"))?
        .to_string();
    for (field, value) in [("minPrice", update.min_price), ("maxPrice", update.max_price)] {
        if let Some(v) = value
            && (!v.is_finite() || v < 0.0)
        {
            return Err(AppError::bad_request(format!("{field} must be a non-negative number")));
        }
    }
    if let (Some(min), Some(max)) = (update.min_price, update.max_price)
        && min > max
    {
        return Err(AppError::bad_request("minPrice must not exceed maxPrice"));
    }
    let settings = SkuSettings {
        min_price: update.min_price,
        max_price: update.max_price,
    };
    state.settings.upsert(&store_id, &sku, settings).await?;
    state
        .logs
        .push(format!("settings for {store_id}/{sku} updated"))
        .await;
    Ok(Json(SettingsUpdated {
        ok: true,
        store_id,
        sku,
        settings,
    }))
}
