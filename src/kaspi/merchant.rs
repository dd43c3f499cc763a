use crate::http::build_client;
use crate::kaspi::config::{KaspiConfig, MC_USER_AGENT};
use crate::kaspi::cookies::load_cookie_header;
use crate::kaspi::error::KaspiError;
use reqwest::{
    Client,
    header::{COOKIE, REFERER, USER_AGENT},
};
use std::{path::PathBuf, sync::Arc, time::Instant};
use tracing::debug;

/// Merchant cabinet (`mc.shop.kaspi.kz`) client, authenticated by the
/// session cookie saved per merchant.
#[derive(Clone)]
pub struct MerchantClient {
    http: Client,
    config: Arc<KaspiConfig>,
    data_dir: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct OfferListQuery {
    pub page: u32,
    pub limit: u32,
    pub text: Option<String>,
}

impl MerchantClient {
    pub fn new(config: Arc<KaspiConfig>, data_dir: PathBuf) -> Self {
        Self {
            http: build_client(),
            config,
            data_dir,
        }
    }

    pub async fn fetch_offers(
        &self,
        merchant_id: &str,
        query: &OfferListQuery,
    ) -> Result<String, KaspiError> {
        let mut params = vec![
            ("m", merchant_id.to_string()),
            ("p", query.page.to_string()),
            ("l", query.limit.to_string()),
            ("a", "true".to_string()),
        ];
        if let Some(text) = query.text.as_deref().filter(|t| !t.trim().is_empty()) {
            params.push(("t", text.trim().to_string()));
        }
        self.get_text(merchant_id, "/bff/offer-view/list", &params)
            .await
    }

    pub async fn fetch_offer_details(
        &self,
        merchant_id: &str,
        sku: &str,
    ) -> Result<String, KaspiError> {
        let params = [("m", merchant_id.to_string()), ("s", sku.to_string())];
        self.get_text(merchant_id, "/bff/offer-view/details", &params)
            .await
    }

    async fn get_text(
        &self,
        merchant_id: &str,
        path: &'static str,
        params: &[(&str, String)],
    ) -> Result<String, KaspiError> {
        let cookie = load_cookie_header(
            &self.data_dir,
            merchant_id,
            self.config.fallback_cookie.as_deref(),
        )
        .await?;
        let base = self.config.merchant_api_base.as_str();
        let url = format!("{base}{path}");
        let referer = format!(
            "{base}/mc/#/offers?_m={}",
            urlencoding::encode(merchant_id)
        );
        let started = Instant::now();
        let response = self
            .http
            .get(url)
            .query(params)
            .header(COOKIE, cookie)
            .header(USER_AGENT, MC_USER_AGENT.as_str())
            .header(REFERER, referer)
            .header("X-Requested-With", "XMLHttpRequest")
            .send()
            .await
            .map_err(|err| KaspiError::Request(err.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| KaspiError::Request(err.to_string()))?;
        crate::metrics::upstream_elapsed(path, started.elapsed().as_millis());
        debug!(
            target = "pricebot.kaspi",
            path,
            status = status.as_u16(),
            bytes = body.len(),
            "merchant cabinet response"
        );
        if !status.is_success() {
            return Err(KaspiError::status(status, &body));
        }
        Ok(body)
    }
}
