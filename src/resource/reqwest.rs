use super::{status_error, ResourceClient, ResourceError};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// HTTP client backed by `reqwest`. Cloning shares the connection pool.
#[derive(Clone, Debug, Default)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceClient for ReqwestClient {
    async fn get(
        &self,
        url: &str,
        headers: Option<BTreeMap<String, String>>,
    ) -> Result<Vec<u8>, ResourceError> {
        let request = headers
            .into_iter()
            .flatten()
            .fold(self.client.get(url), |request, (name, value)| {
                request.header(name, value)
            });

        let response = request.send().await?;
        if let Some(error) = status_error(url, response.status().as_u16()) {
            return Err(error);
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn refused_connection_is_a_network_error() {
        // bind and release a port so nothing is listening on it
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();

        let result = ReqwestClient::new()
            .get(&format!("http://127.0.0.1:{port}/cloud.js"), None)
            .await;
        assert!(matches!(result, Err(ResourceError::Network(_))));
    }
}
