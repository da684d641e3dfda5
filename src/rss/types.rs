//! Type definitions for the RSS module.

use chrono::{DateTime, Utc};
use tokio::time::Duration;

/// Placeholder used when a feed entry carries no title.
pub const NO_TITLE: &str = "No title";

/// One item of a syndication feed. Entries without a link never make it this far.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    pub title: Option<String>,
    pub link: String,
    pub summary: String,
    pub published: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
}

impl FeedEntry {
    pub fn title_or_placeholder(&self) -> &str {
        match self.title.as_deref() {
            Some(title) if !title.trim().is_empty() => title,
            _ => NO_TITLE,
        }
    }

    /// Publication time, falling back to the last update.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.published.or(self.updated)
    }

    /// Title and summary joined by a single space; the text keywords are matched against.
    pub fn match_text(&self) -> String {
        format!("{} {}", self.title_or_placeholder(), self.summary)
    }
}

// Constants
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const USER_AGENT: &str = concat!("edufeed/", env!("CARGO_PKG_VERSION"));
pub const FEED_ACCEPT: &str = "application/rss+xml, application/atom+xml, application/feed+json, application/xml, text/xml, application/json, */*;q=0.9";
