use log::debug;
use reqwest::Client;

use crate::error::{ProwLensError, Result};

/// Source of raw artifact text.
///
/// Every request is a single attempt: errors are returned as-is and never retried.
#[allow(async_fn_in_trait)]
pub trait Fetch {
    async fn get_text(&self, url: &str) -> Result<String>;
}

/// Fetches artifacts over HTTP(S).
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("prowlens/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProwLensError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    async fn get_text(&self, url: &str) -> Result<String> {
        debug!("GET {url}");
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProwLensError::Upstream {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text().await?;
        debug!("Fetched {} bytes from {url}", body.len());
        Ok(body)
    }
}
