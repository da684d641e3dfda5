//! Feed fetching. Failures are logged and absorbed here so one broken source never aborts a run.

use anyhow::{anyhow, Result};
use reqwest::header;
use tracing::{debug, error, info, warn};

use super::client::create_http_client;
use super::parser::parse_feed;
use super::types::{FeedEntry, FEED_ACCEPT, REQUEST_TIMEOUT};
use super::util::is_valid_url;
use crate::TARGET_WEB_REQUEST;

#[derive(Clone)]
pub struct FeedFetcher {
    client: reqwest::Client,
}

impl FeedFetcher {
    pub fn new() -> Result<Self> {
        Ok(Self::with_client(create_http_client(REQUEST_TIMEOUT)?))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Fetch and parse one feed.
    ///
    /// Returns `None` on any network, status or parse failure; the cause is logged.
    pub async fn fetch(&self, url: &str) -> Option<Vec<FeedEntry>> {
        if url.trim().is_empty() {
            warn!(target: TARGET_WEB_REQUEST, "Skipping empty feed URL");
            return None;
        }

        if !is_valid_url(url) {
            warn!(target: TARGET_WEB_REQUEST, "Skipping invalid feed URL: {}", url);
            return None;
        }

        debug!(target: TARGET_WEB_REQUEST, "Loading feed from {}", url);
        match self.try_fetch(url).await {
            Ok(entries) => {
                info!(target: TARGET_WEB_REQUEST, "Loaded {} entries from {}", entries.len(), url);
                Some(entries)
            }
            Err(err) => {
                error!(target: TARGET_WEB_REQUEST, "Failed to load feed {}: {:#}", url, err);
                None
            }
        }
    }

    async fn try_fetch(&self, url: &str) -> Result<Vec<FeedEntry>> {
        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, FEED_ACCEPT)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    anyhow!("request timed out after {} seconds", REQUEST_TIMEOUT.as_secs())
                } else {
                    anyhow!("request failed: {}", err)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("non-success status {}", status));
        }

        debug!(target: TARGET_WEB_REQUEST, "Response Content-Type for {}: {:?}", url, response.headers().get(header::CONTENT_TYPE));

        let body = response
            .bytes()
            .await
            .map_err(|err| anyhow!("failed to read response body: {}", err))?;

        parse_feed(&body, url)
    }
}
