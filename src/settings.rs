use crate::state_file::write_atomic;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::{
    collections::BTreeMap,
    io,
    path::{Path, PathBuf},
};
use thiserror::Error;

/// Price bounds for one SKU.
#[skip_serializing_none]
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SkuSettings {
    #[serde(default)]
    pub min_price: Option<f64>,
    #[serde(default)]
    pub max_price: Option<f64>,
}

pub type SettingsMap = BTreeMap<String, SkuSettings>;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings io: {0}")]
    Io(#[from] io::Error),
    #[error("settings file {path} is not valid: {message}")]
    Parse { path: String, message: String },
}

/// One JSON file per store under `<data_dir>/settings/`.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    root: PathBuf,
}

impl SettingsStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            root: data_dir.join("settings"),
        }
    }

    /// Callers pass ids already checked with [`crate::models::safe_id`].
    pub fn path_for(&self, store_id: &str) -> PathBuf {
        self.root.join(format!("{store_id}.json"))
    }

    pub async fn load(&self, store_id: &str) -> Result<SettingsMap, SettingsError> {
        let path = self.path_for(store_id);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(SettingsMap::new()),
            Err(err) => return Err(err.into()),
        };
        if text.trim().is_empty() {
            return Ok(SettingsMap::new());
        }
        serde_json::from_str(&text).map_err(|err| SettingsError::Parse {
            path: path.display().to_string(),
            message: err.to_string(),
        })
    }

    pub async fn save(&self, store_id: &str, settings: &SettingsMap) -> Result<(), SettingsError> {
        let bytes = serde_json::to_vec_pretty(settings).map_err(io::Error::other)?;
        write_atomic(&self.path_for(store_id), &bytes).await?;
        Ok(())
    }

    /// Replaces the bounds of one SKU. Not guarded against concurrent writers.
    pub async fn upsert(
        &self,
        store_id: &str,
        sku: &str,
        settings: SkuSettings,
    ) -> Result<SettingsMap, SettingsError> {
        let mut all = self.load(store_id).await?;
        all.insert(sku.to_string(), settings);
        self.save(store_id, &all).await?;
        Ok(all)
    }
}
