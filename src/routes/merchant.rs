use super::{AppError, AppState, DEFAULT_PAGE_LIMIT, page_params};
use crate::{
    kaspi::{DateWindow, OfferListQuery, UpstreamCode},
    models::{OfferRow, SaleItem},
    shape::{find_stock, normalize_offers, normalize_sale_item, parse_lenient, pick_array},
};
use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OffersQuery {
    p: Option<String>,
    l: Option<String>,
    merchant_id: Option<String>,
    q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OffersResponse {
    ok: bool,
    key: Option<String>,
    page: u32,
    limit: u32,
    count: usize,
    items: Vec<OfferRow>,
}

/// Normalized offer list from the merchant cabinet.
///
/// - Method: `GET`
/// - Path: `/api/merchant/offers?p=&l=&merchantId=&q=`
pub async fn offers(
    State(state): State<AppState>,
    Query(query): Query<OffersQuery>,
) -> Result<Json<OffersResponse>, AppError> {
    crate::metrics::inc_requests("/api/merchant/offers");
    let merchant_id = state.resolve_merchant(query.merchant_id.as_deref())?;
    let (page, limit) = page_params(query.p.as_deref(), query.l.as_deref())?;
    let text = state
        .merchant
        .fetch_offers(
            &merchant_id,
            &OfferListQuery {
                page,
                limit,
                text: query.q,
            },
        )
        .await?;
    let picked = pick_array(&parse_lenient(&text));
    let items = normalize_offers(&picked.arr);
    debug!(
        target = "pricebot.api",
        merchant_id = %merchant_id,
        key = picked.key.as_deref().unwrap_or("-"),
        raw = picked.arr.len(),
        kept = items.len(),
        "offers normalized"
    );
    Ok(Json(OffersResponse {
        ok: true,
        key: picked.key,
        page,
        limit,
        count: items.len(),
        items,
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockQuery {
    sku: Option<String>,
    merchant_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StockResponse {
    ok: bool,
    sku: String,
    stock: Option<i64>,
    found: bool,
    source: Option<&'static str>,
}

/// Stock for one SKU: the details endpoint first, then the filtered list.
///
/// - Method: `GET`
/// - Path: `/api/merchant/offer/stock?sku=&merchantId=`
pub async fn offer_stock(
    State(state): State<AppState>,
    Query(query): Query<StockQuery>,
) -> Result<Json<StockResponse>, AppError> {
    crate::metrics::inc_requests("/api/merchant/offer/stock");
    let sku = query
        .sku
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::bad_request("sku is required"))?
        .to_string();
    let merchant_id = state.resolve_merchant(query.merchant_id.as_deref())?;

    match state.merchant.fetch_offer_details(&merchant_id, &sku).await {
        Ok(text) => {
            if let Some(stock) = find_stock(&parse_lenient(&text)) {
                return Ok(Json(StockResponse {
                    ok: true,
                    sku,
                    stock: Some(stock),
                    found: true,
                    source: Some("details"),
                }));
            }
        }
        Err(err) if err.code() == UpstreamCode::NotFound => {}
        Err(err) => return Err(err.into()),
    }

    let text = state
        .merchant
        .fetch_offers(
            &merchant_id,
            &OfferListQuery {
                page: 0,
                limit: DEFAULT_PAGE_LIMIT,
                text: Some(sku.clone()),
            },
        )
        .await?;
    let row = normalize_offers(&pick_array(&parse_lenient(&text)).arr)
        .into_iter()
        .find(|row| row.sku == sku);
    let stock = row.and_then(|row| row.stock);
    Ok(Json(StockResponse {
        ok: true,
        found: stock.is_some(),
        source: stock.map(|_| "list"),
        stock,
        sku,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct SaleItemsQuery {
    from: Option<String>,
    to: Option<String>,
    l: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SaleItemsResponse {
    ok: bool,
    from: i64,
    to: i64,
    count: usize,
    items: Vec<SaleItem>,
}

/// Sample of recent orders from the token-authenticated shop API.
///
/// - Method: `GET`
/// - Path: `/api/merchant/sale-items?from=&to=&l=`
pub async fn sale_items(
    State(state): State<AppState>,
    Query(query): Query<SaleItemsQuery>,
) -> Result<Json<SaleItemsResponse>, AppError> {
    crate::metrics::inc_requests("/api/merchant/sale-items");
    let window = DateWindow::resolve(
        query.from.as_deref(),
        query.to.as_deref(),
        state.config.tz_offset_hours,
    )
    .map_err(AppError::bad_request)?;
    let (_, limit) = page_params(None, query.l.as_deref())?;
    let text = state.shop.fetch_orders(window, limit).await?;
    let items: Vec<SaleItem> = pick_array(&parse_lenient(&text))
        .arr
        .iter()
        .take(limit as usize)
        .map(normalize_sale_item)
        .collect();
    Ok(Json(SaleItemsResponse {
        ok: true,
        from: window.from,
        to: window.to,
        count: items.len(),
        items,
    }))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn offers_are_normalized_from_nested_content() {
        let base = mock_upstream().await;
        let dir = tempfile::tempdir().unwrap();
        write_cookie(dir.path(), MERCHANT);
        let app = test_app(test_state(dir.path(), test_config(&base)));

        let (status, body) = call(app, "GET", "/api/merchant/offers?p=1&l=5", None).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["key"], "data.content");
        assert_eq!(body["page"], 1);
        assert_eq!(body["limit"], 5);
        assert_eq!(body["count"], 3);
        let first = &body["items"][0];
        assert_eq!(first["sku"], "SKU-1");
        assert_eq!(first["productId"], "p1");
        assert_eq!(first["name"], "Boots");
        assert_eq!(first["stock"], 7);
        assert_eq!(first["opponents"], 3);
        assert_eq!(body["items"][1]["stock"], 3);
    }

    #[tokio::test]
    async fn missing_cookie_is_a_classified_gateway_error() {
        let base = mock_upstream().await;
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(test_state(dir.path(), test_config(&base)));
        let (status, body) = call(app, "GET", "/api/merchant/offers", None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "MISSING_COOKIE");
    }

    #[tokio::test]
    async fn rejected_cookie_is_unauthorized() {
        let base = mock_upstream().await;
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(&base);
        config.fallback_cookie = Some("stale=1".into());
        let app = test_app(test_state(dir.path(), config));
        let (status, body) = call(app, "GET", "/api/merchant/offers", None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn stock_comes_from_details_when_available() {
        let base = mock_upstream().await;
        let dir = tempfile::tempdir().unwrap();
        write_cookie(dir.path(), MERCHANT);
        let app = test_app(test_state(dir.path(), test_config(&base)));
        let (status, body) = call(app, "GET", "/api/merchant/offer/stock?sku=SKU-1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stock"], 7);
        assert_eq!(body["source"], "details");
    }

    #[tokio::test]
    async fn stock_falls_back_to_list_on_404() {
        let base = mock_upstream().await;
        let dir = tempfile::tempdir().unwrap();
        write_cookie(dir.path(), MERCHANT);
        let app = test_app(test_state(dir.path(), test_config(&base)));

        let (_, body) = call(app.clone(), "GET", "/api/merchant/offer/stock?sku=SKU-2", None).await;
        assert_eq!(body["found"], true);
        assert_eq!(body["stock"], 3);
        assert_eq!(body["source"], "list");

        let (status, body) = call(app, "GET", "/api/merchant/offer/stock?sku=NOPE", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["found"], false);
        assert!(body["stock"].is_null());
    }

    #[tokio::test]
    async fn stock_requires_sku() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(test_state(dir.path(), test_config("http://127.0.0.1:9")));
        let (status, _) = call(app, "GET", "/api/merchant/offer/stock?sku=%20", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn sale_items_use_token_and_limit() {
        let base = mock_upstream().await;
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(test_state(dir.path(), test_config(&base)));
        let (status, body) = call(
            app,
            "GET",
            "/api/merchant/sale-items?from=2025-08-01&to=2025-08-01&l=2",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["from"], 1_753_988_400_000i64);
        assert_eq!(body["count"], 2);
        assert_eq!(body["items"][0]["code"], "1001");
        assert_eq!(body["items"][0]["totalPrice"], 12000.0);
    }

    #[tokio::test]
    async fn sale_items_without_token_fail() {
        let base = mock_upstream().await;
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(&base);
        config.token = None;
        let app = test_app(test_state(dir.path(), config));
        let (status, body) = call(app, "GET", "/api/merchant/sale-items", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "MISSING_TOKEN");
    }

    #[tokio::test]
    async fn sale_items_reject_inverted_window() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(test_state(dir.path(), test_config("http://127.0.0.1:9")));
        let (status, _) = call(
            app,
            "GET",
            "/api/merchant/sale-items?from=2025-08-03&to=2025-08-01",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
