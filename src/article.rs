//! Best-effort full-text extraction for article pages.

use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use reqwest::header;
use scraper::{ElementRef, Html, Selector};
use tokio::time::Duration;
use tracing::{debug, warn};

use crate::rss::create_http_client;
use crate::TARGET_WEB_REQUEST;

pub const ARTICLE_TIMEOUT: Duration = Duration::from_secs(10);
pub const MAX_ARTICLE_TOKENS: usize = 500;

const HTML_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Subtrees that never contribute readable text.
const STRIPPED_TAGS: [&str; 4] = ["script", "style", "nav", "footer"];

static ARTICLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("article").expect("valid article selector"));
static CONTENT_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("div.content, div.article, div.post").expect("valid content selector")
});
static BODY_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("body").expect("valid body selector"));

#[derive(Clone)]
pub struct ArticleExtractor {
    client: reqwest::Client,
    max_tokens: usize,
}

impl ArticleExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self::with_client(create_http_client(ARTICLE_TIMEOUT)?))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            max_tokens: MAX_ARTICLE_TOKENS,
        }
    }

    /// Fetches `url` and returns its main text, or `None` when anything goes wrong.
    pub async fn extract(&self, url: &str) -> Option<String> {
        debug!(target: TARGET_WEB_REQUEST, "Extracting article text from {}", url);

        let html = match self.fetch_html(url).await {
            Ok(html) => html,
            Err(err) => {
                warn!(target: TARGET_WEB_REQUEST, "Failed to load article {}: {:#}", url, err);
                return None;
            }
        };

        let text = extract_main_text(&html, self.max_tokens);
        if text.is_empty() {
            warn!(target: TARGET_WEB_REQUEST, "Extracted empty article from URL: {}", url);
            return None;
        }

        debug!(target: TARGET_WEB_REQUEST, "Extracted {} words from {}", text.split(' ').count(), url);
        Some(text)
    }

    async fn fetch_html(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, HTML_ACCEPT)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    anyhow!("operation timed out after {} seconds", ARTICLE_TIMEOUT.as_secs())
                } else {
                    anyhow!("request failed: {}", err)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("non-success status {}", status));
        }

        if let Some(content_type) = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|ct| ct.to_str().ok())
            .map(|ct| ct.to_lowercase())
        {
            if !content_type.contains("html") {
                return Err(anyhow!("not an HTML page ({})", content_type));
            }
        }

        response
            .text()
            .await
            .map_err(|err| anyhow!("failed to read response body: {}", err))
    }
}

/// Picks the main content container of a page and returns its text, whitespace collapsed and
/// cut to the first `max_tokens` words.
pub fn extract_main_text(html: &str, max_tokens: usize) -> String {
    let document = Html::parse_document(html);
    let root = select_main_content(&document);
    truncate_tokens(&collect_text(root), max_tokens)
}

/// `<article>`, then a content/article/post classed `<div>`, then `<body>`.
fn select_main_content(document: &Html) -> ElementRef<'_> {
    document
        .select(&ARTICLE_SELECTOR)
        .find(|el| !inside_stripped(el))
        .or_else(|| {
            document
                .select(&CONTENT_SELECTOR)
                .find(|el| !inside_stripped(el))
        })
        .or_else(|| document.select(&BODY_SELECTOR).next())
        .unwrap_or_else(|| document.root_element())
}

fn is_stripped(name: &str) -> bool {
    STRIPPED_TAGS.contains(&name)
}

fn inside_stripped(element: &ElementRef<'_>) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| is_stripped(ancestor.value().name()))
}

/// Text of every node under `root`, skipping stripped subtrees. Iterative, so deeply nested
/// markup cannot overflow the stack.
fn collect_text(root: ElementRef<'_>) -> String {
    let mut chunks: Vec<&str> = Vec::new();
    let mut stack = vec![*root];

    while let Some(node) = stack.pop() {
        if let Some(text) = node.value().as_text() {
            let text: &str = text;
            if !text.trim().is_empty() {
                chunks.push(text);
            }
            continue;
        }

        if let Some(element) = node.value().as_element() {
            if is_stripped(element.name()) {
                continue;
            }
        }

        let children: Vec<_> = node.children().collect();
        stack.extend(children.into_iter().rev());
    }

    chunks.join(" ")
}

pub fn truncate_tokens(text: &str, max_tokens: usize) -> String {
    text.split_whitespace()
        .take(max_tokens)
        .collect::<Vec<_>>()
        .join(" ")
}
