use super::{status_error, ResourceClient, ResourceError};
use async_trait::async_trait;
use futures::channel::oneshot;
use std::collections::BTreeMap;

/// Client for hosts that already run `ehttp`, native or in the browser.
#[derive(Clone, Debug, Default)]
pub struct EhttpClient;

#[async_trait]
impl ResourceClient for EhttpClient {
    async fn get(
        &self,
        url: &str,
        headers: Option<BTreeMap<String, String>>,
    ) -> Result<Vec<u8>, ResourceError> {
        let mut request = ehttp::Request::get(url);
        for (name, value) in headers.into_iter().flatten() {
            request.headers.insert(name, value);
        }

        let (sender, receiver) = oneshot::channel();
        ehttp::fetch(request, move |result| {
            let _ = sender.send(result);
        });

        let response = receiver
            .await
            .map_err(|_| ResourceError::Network("request dropped before completion".to_string()))?
            .map_err(ResourceError::Network)?;

        match status_error(url, response.status) {
            Some(error) => Err(error),
            None => Ok(response.bytes),
        }
    }
}
