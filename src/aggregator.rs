//! Per-category collection: fetch, filter, deduplicate and enrich feed entries.

use anyhow::Result;
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashSet;
use tracing::{debug, error, info};

use crate::article::ArticleExtractor;
use crate::db::Database;
use crate::filter::{default_recency_window, is_recent, matches_keywords};
use crate::rss::{FeedEntry, FeedFetcher};
use crate::TARGET_PIPELINE;

/// A normalized item ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentItem {
    pub title: String,
    pub url: String,
    pub summary: String,
    pub full_content: Option<String>,
    pub category: String,
}

impl ContentItem {
    fn from_entry(entry: FeedEntry, full_content: Option<String>, category: &str) -> Self {
        Self {
            title: entry.title_or_placeholder().to_string(),
            url: entry.link,
            summary: entry.summary,
            full_content,
            category: category.to_string(),
        }
    }
}

pub struct Aggregator {
    db: Database,
    fetcher: FeedFetcher,
    extractor: ArticleExtractor,
    recency_window: ChronoDuration,
    fetch_full_text: bool,
}

impl Aggregator {
    pub fn new(db: Database) -> Result<Self> {
        Ok(Self::with_parts(
            db,
            FeedFetcher::new()?,
            ArticleExtractor::new()?,
        ))
    }

    pub fn with_parts(db: Database, fetcher: FeedFetcher, extractor: ArticleExtractor) -> Self {
        Self {
            db,
            fetcher,
            extractor,
            recency_window: default_recency_window(),
            fetch_full_text: true,
        }
    }

    /// Disables article extraction; items then carry only the feed summary.
    pub fn with_full_text(mut self, enabled: bool) -> Self {
        self.fetch_full_text = enabled;
        self
    }

    pub fn with_recency_window(mut self, window: ChronoDuration) -> Self {
        self.recency_window = window;
        self
    }

    /// Collects new, relevant items for one category.
    ///
    /// Sources are processed in order, each one completely (extraction included) before the next.
    /// A failing source contributes nothing; it never aborts the category. Items come back in
    /// processing order and a url is emitted at most once per call.
    pub async fn collect<S: AsRef<str>, K: AsRef<str>>(
        &self,
        category: &str,
        sources: &[S],
        keywords: &[K],
    ) -> Vec<ContentItem> {
        let mut items = Vec::new();
        let mut emitted: HashSet<String> = HashSet::new();

        for source in sources {
            let source = source.as_ref();
            let Some(entries) = self.fetcher.fetch(source).await else {
                debug!(target: TARGET_PIPELINE, "[{}] skipping source {}", category, source);
                continue;
            };

            let before = items.len();
            for entry in entries {
                if emitted.contains(&entry.link) {
                    continue;
                }

                if let Some(item) = self.process_entry(entry, category, keywords).await {
                    emitted.insert(item.url.clone());
                    items.push(item);
                }
            }

            debug!(target: TARGET_PIPELINE, "[{}] {} new items from {}", category, items.len() - before, source);
        }

        info!(target: TARGET_PIPELINE, "[{}] collected {} items from {} sources", category, items.len(), sources.len());
        items
    }

    async fn process_entry<K: AsRef<str>>(
        &self,
        entry: FeedEntry,
        category: &str,
        keywords: &[K],
    ) -> Option<ContentItem> {
        if !is_recent(&entry, self.recency_window, Utc::now()) {
            debug!(target: TARGET_PIPELINE, "[{}] skipping stale entry: {}", category, entry.link);
            return None;
        }

        // Checked against the live store so acknowledgments made earlier in this run count.
        match self.db.is_posted(&entry.link).await {
            Ok(false) => {}
            Ok(true) => {
                debug!(target: TARGET_PIPELINE, "[{}] skipping already posted entry: {}", category, entry.link);
                return None;
            }
            Err(err) => {
                error!(target: TARGET_PIPELINE, "[{}] failed to check history for {}, skipping: {}", category, entry.link, err);
                return None;
            }
        }

        if !matches_keywords(&entry.match_text(), keywords) {
            debug!(target: TARGET_PIPELINE, "[{}] no keyword match: {}", category, entry.link);
            return None;
        }

        let full_content = if self.fetch_full_text {
            self.extractor.extract(&entry.link).await
        } else {
            None
        };

        Some(ContentItem::from_entry(entry, full_content, category))
    }
}
