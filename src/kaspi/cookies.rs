use crate::kaspi::error::KaspiError;
use serde::Serialize;
use serde_json::Value;
use serde_with::skip_serializing_none;
use std::{
    io,
    path::{Path, PathBuf},
    time::SystemTime,
};

pub fn cookie_path(data_dir: &Path, merchant_id: &str) -> PathBuf {
    data_dir.join("cookies").join(format!("{merchant_id}.json"))
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CookieStatus {
    pub exists: bool,
    pub path: Option<String>,
    pub age_seconds: Option<u64>,
}

/// Presence and age of the merchant's cookie file. Contents are not read.
pub async fn cookie_status(data_dir: &Path, merchant_id: &str) -> io::Result<CookieStatus> {
    let path = cookie_path(data_dir, merchant_id);
    let meta = match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => meta,
        Ok(_) => {
            return Ok(CookieStatus {
                exists: false,
                path: None,
                age_seconds: None,
            });
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Ok(CookieStatus {
                exists: false,
                path: None,
                age_seconds: None,
            });
        }
        Err(err) => return Err(err),
    };
    let age_seconds = meta
        .modified()
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .map(|age| age.as_secs())
        .unwrap_or(0);
    Ok(CookieStatus {
        exists: true,
        path: Some(path.display().to_string()),
        age_seconds: Some(age_seconds),
    })
}

/// Builds a `Cookie` header from a saved cookie file.
///
/// Accepts a browser export (`[{"name": .., "value": ..}]`), a single such
/// object, an object with a `cookie` string, or a raw header line. JSON that
/// does not parse yields `None`.
pub fn cookie_header_from_text(text: &str) -> Option<String> {
    header_text(text).and_then(header_safe)
}

fn header_text(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        let doc = serde_json::from_str::<Value>(trimmed).ok()?;
        if let Some(raw) = doc.get("cookie").and_then(Value::as_str) {
            let raw = raw.trim();
            return (!raw.is_empty()).then(|| raw.to_string());
        }
        let entries = match &doc {
            Value::Array(items) => items.iter().collect::<Vec<_>>(),
            other => vec![other],
        };
        let parts: Vec<String> = entries
            .into_iter()
            .filter_map(|entry| {
                let name = entry.get("name")?.as_str()?.trim();
                let value = entry.get("value")?.as_str()?.trim();
                (!name.is_empty() && !value.is_empty()).then(|| format!("{name}={value}"))
            })
            .collect();
        return (!parts.is_empty()).then(|| parts.join("; "));
    }
    Some(trimmed.to_string())
}

fn header_safe(header: String) -> Option<String> {
    (!header.chars().any(char::is_control)).then_some(header)
}

/// Cookie file first, then the configured fallback header.
pub async fn load_cookie_header(
    data_dir: &Path,
    merchant_id: &str,
    fallback: Option<&str>,
) -> Result<String, KaspiError> {
    let path = cookie_path(data_dir, merchant_id);
    match tokio::fs::read_to_string(&path).await {
        Ok(text) => {
            if let Some(header) = cookie_header_from_text(&text) {
                return Ok(header);
            }
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            tracing::warn!(
                target = "pricebot.cookies",
                path = %path.display(),
                error = %err,
                "cookie file unreadable"
            );
        }
    }
    fallback
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .and_then(|raw| header_safe(raw.to_string()))
        .ok_or_else(|| KaspiError::MissingCookie(merchant_id.to_string()))
}
