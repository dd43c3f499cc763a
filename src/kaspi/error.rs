use thiserror::Error;

const BODY_PREVIEW_CHARS: usize = 300;

#[derive(Debug, Error)]
pub enum KaspiError {
    #[error("MISSING_COOKIE: no merchant cabinet cookie for merchant {0}")]
    MissingCookie(String),
    #[error("KASPI_TOKEN is not set")]
    MissingToken,
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("request failed: {0}")]
    Request(String),
}

/// Coarse failure class reported to API callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamCode {
    MissingCookie,
    Unauthorized,
    NotFound,
    UpstreamError,
}

impl UpstreamCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpstreamCode::MissingCookie => "MISSING_COOKIE",
            UpstreamCode::Unauthorized => "UNAUTHORIZED",
            UpstreamCode::NotFound => "NOT_FOUND",
            UpstreamCode::UpstreamError => "UPSTREAM_ERROR",
        }
    }
}

impl KaspiError {
    pub fn status(status: reqwest::StatusCode, body: &str) -> Self {
        KaspiError::Status {
            status: status.as_u16(),
            body: body.chars().take(BODY_PREVIEW_CHARS).collect(),
        }
    }

    pub fn code(&self) -> UpstreamCode {
        match self {
            KaspiError::MissingCookie(_) => UpstreamCode::MissingCookie,
            KaspiError::MissingToken => UpstreamCode::Unauthorized,
            KaspiError::Status { status: 401 | 403, .. } => UpstreamCode::Unauthorized,
            KaspiError::Status { status: 404, .. } => UpstreamCode::NotFound,
            KaspiError::Status { .. } => UpstreamCode::UpstreamError,
            KaspiError::Request(message) => classify_message(message),
        }
    }
}

/// Substring classification for failures that only carry a message.
pub fn classify_message(message: &str) -> UpstreamCode {
    if message.contains("MISSING_COOKIE") {
        UpstreamCode::MissingCookie
    } else if message.contains("401") || message.contains("403") {
        UpstreamCode::Unauthorized
    } else if message.contains("404") {
        UpstreamCode::NotFound
    } else {
        UpstreamCode::UpstreamError
    }
}
