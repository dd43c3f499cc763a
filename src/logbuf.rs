use chrono::{SecondsFormat, Utc};
use std::{collections::VecDeque, sync::Arc};
use tokio::sync::Mutex;
use tracing::info;

pub const LOG_CAPACITY: usize = 200;
pub const LOG_TAIL: usize = 100;

/// Pricebot activity lines served by `/api/pricebot/logs`.
#[derive(Clone, Default)]
pub struct LogBuffer {
    lines: Arc<Mutex<VecDeque<String>>>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        info!(target = "pricebot.log", "{message}");
        let line = format!(
            "{} {message}",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
        );
        let mut guard = self.lines.lock().await;
        guard.push_back(line);
        while guard.len() > LOG_CAPACITY {
            guard.pop_front();
        }
    }

    /// The newest `n` lines, oldest first.
    pub async fn tail(&self, n: usize) -> Vec<String> {
        let guard = self.lines.lock().await;
        let skip = guard.len().saturating_sub(n);
        guard.iter().skip(skip).cloned().collect()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.lines.lock().await.len()
    }
}
