use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// Normalized merchant offer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OfferRow {
    pub sku: String,
    pub product_id: Option<String>,
    pub name: Option<String>,
    pub price: Option<f64>,
    pub stock: Option<i64>,
    pub opponents: Option<i64>,
}

impl OfferRow {
    pub fn bare(sku: impl Into<String>) -> Self {
        Self {
            sku: sku.into(),
            product_id: None,
            name: None,
            price: None,
            stock: None,
            opponents: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SaleItem {
    pub id: Option<String>,
    pub code: Option<String>,
    pub state: Option<String>,
    pub total_price: Option<f64>,
    pub creation_date: Option<i64>,
}

#[skip_serializing_none]
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub ok: bool,
    pub error: String,
    pub detail: Option<String>,
}

impl ApiError {
    pub fn new(error: impl Into<String>, detail: Option<String>) -> Self {
        Self {
            ok: false,
            error: error.into(),
            detail,
        }
    }
}

/// Ids end up in file names, so only `[A-Za-z0-9_-]` is accepted.
pub fn safe_id(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    let valid = !trimmed.is_empty()
        && trimmed.len() <= 128
        && trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    valid.then_some(trimmed)
}
