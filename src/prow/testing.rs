use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::client::Fetch;
use crate::error::{ProwLensError, Result};

/// In-memory fetcher serving canned bodies; unknown URLs answer 404.
#[derive(Default)]
pub struct StaticFetcher {
    bodies: HashMap<String, String>,
    requests: AtomicUsize,
}

impl StaticFetcher {
    pub fn with(mut self, url: &str, body: &str) -> Self {
        self.bodies.insert(url.to_string(), body.to_string());
        self
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Fetch for StaticFetcher {
    async fn get_text(&self, url: &str) -> Result<String> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.bodies
            .get(url)
            .cloned()
            .ok_or_else(|| ProwLensError::Upstream {
                status: 404,
                url: url.to_string(),
            })
    }
}
