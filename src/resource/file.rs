use super::{ResourceClient, ResourceError};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Reads `file://` urls from the local file system.
#[derive(Clone, Debug, Default)]
pub struct FileClient;

#[async_trait]
impl ResourceClient for FileClient {
    async fn get(
        &self,
        url: &str,
        _headers: Option<BTreeMap<String, String>>,
    ) -> Result<Vec<u8>, ResourceError> {
        if let Some(path) = url.strip_prefix("file://") {
            match tokio::fs::read(path).await {
                Ok(bytes) => Ok(bytes),
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                    Err(ResourceError::NotFound(url.to_string()))
                }
                Err(error) => Err(error.into()),
            }
        } else {
            Err(ResourceError::Unsupported(
                "This client supports only file:// urls.".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_exact_bytes() {
        let path = std::env::temp_dir().join(format!("potree-file-client-{}.bin", std::process::id()));
        let payload = vec![0xff, 0x00, 0xfe, 0x80, 0x0a, 0x0d];
        tokio::fs::write(&path, &payload).await.unwrap();

        let url = format!("file://{}", path.display());
        assert_eq!(FileClient.get(&url, None).await.unwrap(), payload);

        tokio::fs::remove_file(&path).await.unwrap();
        assert!(matches!(
            FileClient.get(&url, None).await,
            Err(ResourceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn rejects_other_schemes() {
        assert!(matches!(
            FileClient.get("http://localhost/cloud.js", None).await,
            Err(ResourceError::Unsupported(_))
        ));
    }
}
