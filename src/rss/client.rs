//! HTTP client creation shared by the feed fetcher and the article extractor.

use anyhow::Result;
use tokio::time::Duration;
use tracing::debug;

use super::types::USER_AGENT;
use crate::TARGET_WEB_REQUEST;

/// Create a client whose every request, body included, is bounded by `timeout`.
pub fn create_http_client(timeout: Duration) -> Result<reqwest::Client> {
    debug!(target: TARGET_WEB_REQUEST, "Creating HTTP client with {:?} timeout", timeout);

    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .gzip(true)
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))
}
