#[cfg(feature = "ehttp")]
pub mod ehttp;

#[cfg(feature = "fs")]
pub mod file;

#[cfg(feature = "reqwest")]
pub mod reqwest;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Source of raw resource bytes.
///
/// Implementations must hand back the body exactly as received: no text
/// decoding, no charset translation.
#[async_trait]
pub trait ResourceClient: Send + Sync {
    async fn get(
        &self,
        url: &str,
        headers: Option<BTreeMap<String, String>>,
    ) -> Result<Vec<u8>, ResourceError>;

    async fn get_json<T: DeserializeOwned + Send>(
        &self,
        url: &str,
        headers: Option<BTreeMap<String, String>>,
    ) -> Result<T, ResourceError> {
        let bytes = self.get(url, headers).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl<C: ResourceClient> ResourceClient for Arc<C> {
    async fn get(
        &self,
        url: &str,
        headers: Option<BTreeMap<String, String>>,
    ) -> Result<Vec<u8>, ResourceError> {
        (**self).get(url, headers).await
    }

    async fn get_json<T: DeserializeOwned + Send>(
        &self,
        url: &str,
        headers: Option<BTreeMap<String, String>>,
    ) -> Result<T, ResourceError> {
        (**self).get_json(url, headers).await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unexpected HTTP status code: {0}")]
    Status(u16),

    #[error("File error: {0}")]
    File(#[from] std::io::Error),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Unsupported scheme: {0}")]
    Unsupported(String),
}

#[cfg(feature = "reqwest")]
impl From<::reqwest::Error> for ResourceError {
    fn from(error: ::reqwest::Error) -> Self {
        ResourceError::Network(error.to_string())
    }
}

/// The error an HTTP status maps to, `None` for success.
#[cfg_attr(not(any(feature = "reqwest", feature = "ehttp")), allow(dead_code))]
pub(crate) fn status_error(url: &str, status: u16) -> Option<ResourceError> {
    match status {
        200..=299 => None,
        404 => Some(ResourceError::NotFound(url.to_string())),
        _ => Some(ResourceError::Status(status)),
    }
}
