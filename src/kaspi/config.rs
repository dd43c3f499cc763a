use once_cell::sync::Lazy;
use std::env;

pub const DEFAULT_MERCHANT_API_BASE: &str = "https://mc.shop.kaspi.kz";
pub const DEFAULT_SHOP_API_BASE: &str = "https://kaspi.kz/shop/api/v2";

/// Almaty, UTC+5.
pub const DEFAULT_TZ_OFFSET_HOURS: i32 = 5;

pub static MC_USER_AGENT: Lazy<String> = Lazy::new(|| {
    env_stripped("MC_USER_AGENT").unwrap_or_else(|| {
        "Mozilla/5.0 (Macintosh; Intel Mac OS X) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126 Safari/537.36"
            .to_string()
    })
});

#[derive(Debug, Clone)]
pub struct KaspiConfig {
    pub merchant_api_base: String,
    pub merchant_id: Option<String>,
    pub shop_api_base: String,
    pub token: Option<String>,
    /// Raw `Cookie` header used when a merchant has no cookie file.
    pub fallback_cookie: Option<String>,
    pub tz_offset_hours: i32,
}

impl KaspiConfig {
    pub fn from_env() -> Self {
        Self {
            merchant_api_base: env_stripped("KASPI_MERCHANT_API_BASE")
                .unwrap_or_else(|| DEFAULT_MERCHANT_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            merchant_id: env_stripped("KASPI_MERCHANT_ID"),
            shop_api_base: env_stripped("KASPI_SHOP_API_BASE")
                .unwrap_or_else(|| DEFAULT_SHOP_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            token: env_stripped("KASPI_TOKEN"),
            fallback_cookie: env_stripped("KASPI_MERCHANT_COOKIE"),
            tz_offset_hours: env_stripped("KASPI_TZ_OFFSET_HOURS")
                .and_then(|v| v.parse::<i32>().ok())
                .filter(|v| (-12..=14).contains(v))
                .unwrap_or(DEFAULT_TZ_OFFSET_HOURS),
        }
    }
}

/// Reads an env var, trimming whitespace and one pair of surrounding quotes.
/// Empty values count as unset.
pub fn env_stripped(name: &str) -> Option<String> {
    env::var(name).ok().and_then(|raw| strip_quotes(&raw))
}

fn strip_quotes(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let unquoted = if trimmed.len() >= 2
        && ((trimmed.starts_with('"') && trimmed.ends_with('"'))
            || (trimmed.starts_with('\'') && trimmed.ends_with('\'')))
    {
        trimmed[1..trimmed.len() - 1].trim()
    } else {
        trimmed
    };
    if unquoted.is_empty() {
        None
    } else {
        Some(unquoted.to_string())
    }
}
