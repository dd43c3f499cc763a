use crate::settings::SkuSettings;
use serde::{Deserialize, Serialize, Serializer};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Proposal {
    pub sku: String,
    #[serde(serialize_with = "whole_as_integer")]
    pub target: f64,
}

/// Prices in tenge are whole numbers; write them without a fraction.
fn whole_as_integer<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 {
        serializer.serialize_i64(*value as i64)
    } else {
        serializer.serialize_f64(*value)
    }
}

/// `minPrice`, clamped above by `maxPrice` when one is set.
///
/// Current and competitor prices are not consulted.
pub fn target_price(settings: &SkuSettings) -> Option<f64> {
    let min = settings.min_price.filter(|v| v.is_finite())?;
    Some(match settings.max_price.filter(|v| v.is_finite()) {
        Some(max) => max.min(min),
        None => min,
    })
}

pub fn propose(sku: &str, settings: Option<&SkuSettings>) -> Option<Proposal> {
    let target = target_price(settings?)?;
    Some(Proposal {
        sku: sku.to_string(),
        target,
    })
}
