use crate::worker_pool::default_worker_count;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_POINT_LOAD_LIMIT: u64 = 10_000_000_000;
pub const DEFAULT_MAX_NODES_LOAD_GPU_FRAME: usize = 20;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
}

/// Process-wide streaming limits. Missing fields fall back to the defaults.
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct StreamingConfig {
    /// Cap on concurrent node loads, consulted before each `load`.
    pub max_nodes_loading: usize,
    /// Resident point budget of the LRU cache.
    pub point_load_limit: u64,
    /// How many freshly decoded nodes the renderer uploads per frame.
    #[serde(rename = "maxNodesLoadGPUFrame")]
    pub max_nodes_load_gpu_frame: usize,
    pub worker_count: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            max_nodes_loading: default_worker_count(),
            point_load_limit: DEFAULT_POINT_LOAD_LIMIT,
            max_nodes_load_gpu_frame: DEFAULT_MAX_NODES_LOAD_GPU_FRAME,
            worker_count: default_worker_count(),
        }
    }
}

impl StreamingConfig {
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, ConfigError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let bytes = std::fs::read(path)?;
        Self::from_json_slice(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            StreamingConfig::from_json_slice(br#"{ "pointLoadLimit": 500, "maxNodesLoadGPUFrame": 4 }"#)
                .unwrap();

        assert_eq!(config.point_load_limit, 500);
        assert_eq!(config.max_nodes_load_gpu_frame, 4);
        assert_eq!(config.max_nodes_loading, default_worker_count());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(
            StreamingConfig::from_json_slice(b"{ maxNodesLoading: 2 }"),
            Err(ConfigError::Json(_))
        ));
    }
}
