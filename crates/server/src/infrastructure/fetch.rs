//! Remote asset fetcher.
//!
//! Plain GET against a previously-known asset URL (catalog cdn urls or a
//! pre-resolved reference). The origin is trusted catalog data, so there is
//! no hard upload ceiling here, only a sanity bound on the response size.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::infrastructure::ports::{FetchError, FetchedBytes, RemoteFetchPort};

/// Sanity bound for fetched reference images.
const MAX_FETCH_BYTES: usize = 32 * 1024 * 1024;

#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteFetchPort for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedBytes, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;
        if bytes.len() > MAX_FETCH_BYTES {
            return Err(FetchError::TooLarge {
                limit: MAX_FETCH_BYTES,
            });
        }

        Ok(FetchedBytes {
            mime,
            bytes: bytes.to_vec(),
        })
    }
}
