use serde_json::{Map, Value};
use std::{
    io,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("state io: {0}")]
    Io(#[from] io::Error),
    #[error("state file {path} is not a JSON object: {message}")]
    Parse { path: String, message: String },
}

/// Shared dashboard state kept in a single JSON object on disk.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join("state.json"),
        }
    }

    pub async fn read(&self) -> Result<Map<String, Value>, StateError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(err) => return Err(err.into()),
        };
        if text.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(StateError::Parse {
                path: self.path.display().to_string(),
                message: format!("found {}", json_kind(&other)),
            }),
            Err(err) => Err(StateError::Parse {
                path: self.path.display().to_string(),
                message: err.to_string(),
            }),
        }
    }

    /// Shallow merge: top-level keys in `patch` replace existing ones.
    pub async fn merge(&self, patch: Map<String, Value>) -> Result<Map<String, Value>, StateError> {
        let mut state = self.read().await?;
        state.extend(patch);
        let bytes = serde_json::to_vec_pretty(&state).map_err(io::Error::other)?;
        write_atomic(&self.path, &bytes).await?;
        Ok(state)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Writes `<path>.tmp` then renames it over `path`.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await
}
