//! Best-effort readers for upstream JSON whose shape varies between
//! endpoints and releases of the merchant cabinet.

use crate::models::{OfferRow, SaleItem};
use serde_json::Value;

/// Probed in order; the first path that resolves to an array wins.
pub const CANDIDATE_KEYS: &[&str] = &[
    "items",
    "content",
    "data",
    "offers",
    "result",
    "data.items",
    "data.content",
    "data.offers",
    "result.items",
    "result.content",
    "payload.items",
];

const SKU_KEYS: &[&str] = &["merchantSku", "sku", "offerSku", "id"];
const PRODUCT_ID_KEYS: &[&str] = &[
    "productId",
    "masterProductId",
    "productCode",
    "masterProduct.id",
];
const NAME_KEYS: &[&str] = &["name", "title", "productName", "masterProduct.name"];
const PRICE_KEYS: &[&str] = &["price", "currentPrice", "salePrice", "priceMin"];
const STOCK_KEYS: &[&str] = &["stock", "stockCount", "availableAmount", "quantity"];
const OPPONENT_KEYS: &[&str] = &["opponents", "sellersCount", "merchantCount", "competitors"];

#[derive(Debug, Clone, PartialEq)]
pub struct Picked {
    pub key: Option<String>,
    pub arr: Vec<Value>,
}

impl Picked {
    fn empty() -> Self {
        Self {
            key: None,
            arr: Vec::new(),
        }
    }
}

pub fn pick_array(doc: &Value) -> Picked {
    if let Value::Array(items) = doc {
        return Picked {
            key: Some("$".to_string()),
            arr: items.clone(),
        };
    }
    if !doc.is_object() {
        return Picked::empty();
    }
    CANDIDATE_KEYS
        .iter()
        .find_map(|key| match lookup(doc, key) {
            Some(Value::Array(items)) => Some(Picked {
                key: Some((*key).to_string()),
                arr: items.clone(),
            }),
            _ => None,
        })
        .unwrap_or_else(Picked::empty)
}

/// Resolves a dotted path through nested objects.
pub fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(doc, |current, segment| current.as_object()?.get(segment))
}

/// Upstream bodies are JSON most of the time; anything else is kept as a string.
pub fn parse_lenient(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// First truthy scalar among `keys`, stringified.
pub fn pick_str(obj: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match lookup(obj, key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) if n.as_f64().is_some_and(|v| v != 0.0) => Some(n.to_string()),
        _ => None,
    })
}

/// First value among `keys` that is a number or a numeric string.
pub fn pick_number(obj: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .find_map(|key| lookup(obj, key).and_then(as_number))
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(' ', "").parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

fn stock_of(obj: &Value) -> Option<i64> {
    if let Some(stock) = pick_number(obj, STOCK_KEYS) {
        return Some(stock.round() as i64);
    }
    let availabilities = obj.get("availabilities")?.as_array()?;
    let total: f64 = availabilities
        .iter()
        .filter_map(|a| pick_number(a, &["stockCount", "stock"]))
        .sum();
    Some(total.round() as i64)
}

pub fn normalize_offer(item: &Value) -> Option<OfferRow> {
    if !item.is_object() {
        return None;
    }
    let sku = pick_str(item, SKU_KEYS)?;
    Some(OfferRow {
        sku,
        product_id: pick_str(item, PRODUCT_ID_KEYS),
        name: pick_str(item, NAME_KEYS),
        price: pick_number(item, PRICE_KEYS),
        stock: stock_of(item),
        opponents: pick_number(item, OPPONENT_KEYS).map(|v| v.round() as i64),
    })
}

pub fn normalize_offers(items: &[Value]) -> Vec<OfferRow> {
    items.iter().filter_map(normalize_offer).collect()
}

/// Stock value from an offer-details document, checking the usual wrappers.
pub fn find_stock(doc: &Value) -> Option<i64> {
    ["", "data", "offer", "data.offer", "result"]
        .iter()
        .filter_map(|path| {
            if path.is_empty() {
                Some(doc)
            } else {
                lookup(doc, path)
            }
        })
        .filter(|candidate| candidate.is_object())
        .find_map(stock_of)
}

pub fn normalize_sale_item(entry: &Value) -> SaleItem {
    let attrs = entry
        .get("attributes")
        .filter(|a| a.is_object())
        .unwrap_or(entry);
    SaleItem {
        id: pick_str(entry, &["id"]),
        code: pick_str(attrs, &["code", "orderCode"]),
        state: pick_str(attrs, &["state", "status"]),
        total_price: pick_number(attrs, &["totalPrice", "price"]),
        creation_date: pick_number(attrs, &["creationDate"]).map(|v| v as i64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn picks_top_level_items() {
        let picked = pick_array(&json!({"items": [1, 2]}));
        assert_eq!(picked.key.as_deref(), Some("items"));
        assert_eq!(picked.arr, vec![json!(1), json!(2)]);
    }

    #[test]
    fn picks_nested_data_content() {
        let picked = pick_array(&json!({"data": {"content": [1]}}));
        assert_eq!(picked.key.as_deref(), Some("data.content"));
        assert_eq!(picked.arr, vec![json!(1)]);
    }

    #[test]
    fn empty_object_yields_null_key() {
        let picked = pick_array(&json!({}));
        assert_eq!(picked.key, None);
        assert!(picked.arr.is_empty());
    }

    #[test]
    fn first_candidate_in_list_order_wins() {
        let picked = pick_array(&json!({"offers": [3], "content": [2], "data": {"items": [1]}}));
        assert_eq!(picked.key.as_deref(), Some("content"));
    }

    #[test]
    fn non_array_candidates_are_skipped() {
        let picked = pick_array(&json!({"items": "nope", "data": {"offers": [7]}}));
        assert_eq!(picked.key.as_deref(), Some("data.offers"));
    }

    #[test]
    fn raw_strings_and_root_arrays() {
        assert_eq!(pick_array(&parse_lenient("<html>")).key, None);
        let picked = pick_array(&parse_lenient("[1]"));
        assert_eq!(picked.key.as_deref(), Some("$"));
        assert_eq!(picked.arr.len(), 1);
    }

    #[test]
    fn normalizes_alternative_field_names() {
        let row = normalize_offer(&json!({
            "offerSku": "A-1",
            "masterProduct": {"id": "mp-9", "name": "Sneakers"},
            "currentPrice": "12 990",
            "availabilities": [{"stockCount": 2}, {"stockCount": "3"}],
            "sellersCount": 4
        }))
        .unwrap();
        assert_eq!(row.sku, "A-1");
        assert_eq!(row.product_id.as_deref(), Some("mp-9"));
        assert_eq!(row.name.as_deref(), Some("Sneakers"));
        assert_eq!(row.price, Some(12990.0));
        assert_eq!(row.stock, Some(5));
        assert_eq!(row.opponents, Some(4));
    }

    #[test]
    fn merchant_sku_takes_precedence_and_numbers_are_stringified() {
        let row = normalize_offer(&json!({"merchantSku": "M-1", "sku": "S-1"})).unwrap();
        assert_eq!(row.sku, "M-1");
        let row = normalize_offer(&json!({"merchantSku": "", "id": 4411})).unwrap();
        assert_eq!(row.sku, "4411");
    }

    #[test]
    fn rows_without_truthy_sku_are_dropped() {
        let rows = normalize_offers(&[
            json!({"sku": ""}),
            json!({"id": 0, "name": "ghost"}),
            json!({"name": "no sku"}),
            json!(5),
            json!({"sku": "KEEP", "stock": 0}),
        ]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].sku, "KEEP");
        assert_eq!(rows[0].stock, Some(0));
    }

    #[test]
    fn find_stock_looks_through_wrappers() {
        assert_eq!(find_stock(&json!({"stockCount": 3})), Some(3));
        assert_eq!(find_stock(&json!({"data": {"offer": {"stock": "8"}}})), Some(8));
        assert_eq!(find_stock(&json!({"data": {"name": "x"}})), None);
        assert_eq!(find_stock(&json!("raw")), None);
    }

    #[test]
    fn sale_item_reads_json_api_attributes() {
        let item = normalize_sale_item(&json!({
            "id": "b3J=",
            "attributes": {"code": "123", "state": "ARCHIVE", "totalPrice": 5000, "creationDate": 1760572800000i64}
        }));
        assert_eq!(item.id.as_deref(), Some("b3J="));
        assert_eq!(item.code.as_deref(), Some("123"));
        assert_eq!(item.state.as_deref(), Some("ARCHIVE"));
        assert_eq!(item.total_price, Some(5000.0));
        assert_eq!(item.creation_date, Some(1760572800000));
    }
}
