use crate::http::build_client;
use crate::kaspi::config::KaspiConfig;
use crate::kaspi::error::KaspiError;
use chrono::{FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use reqwest::{Client, header::ACCEPT};
use serde::Serialize;
use std::{sync::Arc, time::Instant};

const JSON_API: &str = "application/vnd.api+json;charset=UTF-8";

/// Token-authenticated shop API (`kaspi.kz/shop/api/v2`).
#[derive(Clone)]
pub struct ShopClient {
    http: Client,
    config: Arc<KaspiConfig>,
}

/// Inclusive creation-date window in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateWindow {
    pub from: i64,
    pub to: i64,
}

impl DateWindow {
    /// Today in the shop time zone, `[00:00:00.000, 23:59:59.999]`.
    pub fn today(offset_hours: i32) -> Result<Self, String> {
        let offset = fixed_offset(offset_hours)?;
        let today = Utc::now().with_timezone(&offset).date_naive();
        Ok(Self {
            from: day_bound(today, &offset, false)?,
            to: day_bound(today, &offset, true)?,
        })
    }

    /// Accepts `YYYY-MM-DD` or epoch milliseconds for each bound; a missing
    /// bound falls back to today's.
    pub fn resolve(
        from: Option<&str>,
        to: Option<&str>,
        offset_hours: i32,
    ) -> Result<Self, String> {
        let offset = fixed_offset(offset_hours)?;
        let today = Self::today(offset_hours)?;
        let from = match from.map(str::trim).filter(|v| !v.is_empty()) {
            Some(raw) => parse_bound(raw, &offset, false)?,
            None => today.from,
        };
        let to = match to.map(str::trim).filter(|v| !v.is_empty()) {
            Some(raw) => parse_bound(raw, &offset, true)?,
            None => today.to,
        };
        if from > to {
            return Err(format!("`from` ({from}) is after `to` ({to})"));
        }
        Ok(Self { from, to })
    }
}

fn fixed_offset(hours: i32) -> Result<FixedOffset, String> {
    FixedOffset::east_opt(hours * 3600).ok_or_else(|| format!("invalid utc offset {hours}"))
}

fn parse_bound(raw: &str, offset: &FixedOffset, end: bool) -> Result<i64, String> {
    if raw.chars().all(|c| c.is_ascii_digit()) {
        return raw
            .parse::<i64>()
            .map_err(|_| format!("invalid timestamp `{raw}`"));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| format!("expected YYYY-MM-DD or epoch ms, got `{raw}`"))?;
    day_bound(date, offset, end)
}

fn day_bound(date: NaiveDate, offset: &FixedOffset, end: bool) -> Result<i64, String> {
    let time = if end {
        NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)
    }
    .ok_or_else(|| "invalid time".to_string())?;
    offset
        .from_local_datetime(&date.and_time(time))
        .single()
        .map(|dt| dt.timestamp_millis())
        .ok_or_else(|| format!("ambiguous local time for {date}"))
}

impl ShopClient {
    pub fn new(config: Arc<KaspiConfig>) -> Self {
        Self {
            http: build_client(),
            config,
        }
    }

    pub async fn fetch_orders(
        &self,
        window: DateWindow,
        page_size: u32,
    ) -> Result<String, KaspiError> {
        let token = self
            .config
            .token
            .as_deref()
            .ok_or(KaspiError::MissingToken)?;
        let url = format!("{}/orders", self.config.shop_api_base);
        let params = [
            ("page[number]", "0".to_string()),
            ("page[size]", page_size.to_string()),
            ("filter[orders][creationDate][$ge]", window.from.to_string()),
            ("filter[orders][creationDate][$le]", window.to.to_string()),
        ];
        let started = Instant::now();
        let response = self
            .http
            .get(url)
            .query(&params)
            .header("X-Auth-Token", token)
            .header(ACCEPT, JSON_API)
            .send()
            .await
            .map_err(|err| KaspiError::Request(err.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| KaspiError::Request(err.to_string()))?;
        crate::metrics::upstream_elapsed("/orders", started.elapsed().as_millis());
        if !status.is_success() {
            return Err(KaspiError::status(status, &body));
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates_expand_to_day_bounds_in_offset() {
        let window = DateWindow::resolve(Some("2025-08-01"), Some("2025-08-01"), 5).unwrap();
        // 2025-08-01T00:00:00+05:00
        assert_eq!(window.from, 1_753_988_400_000);
        assert_eq!(window.to - window.from, 86_399_999);
    }

    #[test]
    fn epoch_millis_pass_through() {
        let window = DateWindow::resolve(Some("1000"), Some("2000"), 5).unwrap();
        assert_eq!(window, DateWindow { from: 1000, to: 2000 });
    }

    #[test]
    fn inverted_or_garbage_windows_are_rejected() {
        assert!(DateWindow::resolve(Some("2025-08-02"), Some("2025-08-01"), 5).is_err());
        assert!(DateWindow::resolve(Some("yesterday"), None, 5).is_err());
    }

    #[test]
    fn missing_bounds_default_to_today() {
        let today = DateWindow::today(5).unwrap();
        let window = DateWindow::resolve(None, None, 5).unwrap();
        assert_eq!(window, today);
        assert!(window.from < window.to);
    }
}
