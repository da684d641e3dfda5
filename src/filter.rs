//! Freshness and relevance checks applied to feed entries before they become content items.

use chrono::{DateTime, Duration as ChronoDuration, Utc};

use crate::rss::FeedEntry;

pub const RECENCY_WINDOW_DAYS: i64 = 7;

pub fn default_recency_window() -> ChronoDuration {
    ChronoDuration::days(RECENCY_WINDOW_DAYS)
}

/// An entry is recent when it is strictly younger than `window`.
///
/// Undated entries count as recent: dropping them silently is worse than a stale post.
pub fn is_recent(entry: &FeedEntry, window: ChronoDuration, now: DateTime<Utc>) -> bool {
    match entry.timestamp() {
        Some(timestamp) => now.signed_duration_since(timestamp) < window,
        None => true,
    }
}

/// Case-insensitive substring match of any keyword against `text`.
/// No keywords means no match; blank keywords are ignored.
pub fn matches_keywords<S: AsRef<str>>(text: &str, keywords: &[S]) -> bool {
    let text = text.to_lowercase();
    keywords
        .iter()
        .map(AsRef::as_ref)
        .filter(|keyword| !keyword.trim().is_empty())
        .any(|keyword| text.contains(&keyword.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_at(published: Option<DateTime<Utc>>, updated: Option<DateTime<Utc>>) -> FeedEntry {
        FeedEntry {
            title: Some("Entry".to_string()),
            link: "https://example.com/entry".to_string(),
            summary: String::new(),
            published,
            updated,
        }
    }

    #[test]
    fn test_recency_boundary_is_exclusive() {
        let now = Utc::now();
        let window = default_recency_window();

        let at_boundary = entry_at(Some(now - ChronoDuration::days(7)), None);
        assert!(!is_recent(&at_boundary, window, now));

        let just_inside = entry_at(
            Some(now - ChronoDuration::days(7) + ChronoDuration::seconds(1)),
            None,
        );
        assert!(is_recent(&just_inside, window, now));

        let yesterday = entry_at(Some(now - ChronoDuration::days(1)), None);
        assert!(is_recent(&yesterday, window, now));

        let future = entry_at(Some(now + ChronoDuration::hours(3)), None);
        assert!(is_recent(&future, window, now));
    }

    #[test]
    fn test_recency_falls_back_to_updated() {
        let now = Utc::now();
        let window = default_recency_window();

        let stale_update = entry_at(None, Some(now - ChronoDuration::days(30)));
        assert!(!is_recent(&stale_update, window, now));

        // Published wins over updated.
        let republished = entry_at(
            Some(now - ChronoDuration::days(30)),
            Some(now - ChronoDuration::hours(1)),
        );
        assert!(!is_recent(&republished, window, now));
    }

    #[test]
    fn test_undated_entry_is_recent() {
        assert!(is_recent(
            &entry_at(None, None),
            default_recency_window(),
            Utc::now()
        ));
    }

    #[test]
    fn test_keyword_matching() {
        assert!(matches_keywords("Learning Python Basics", &["python"]));
        assert!(matches_keywords("learning python basics", &["PYTHON"]));
        assert!(matches_keywords("Intro to C++ templates", &["java", "c++"]));
        assert!(matches_keywords("A Modern History of Europe", &["modern history"]));
        // Substring semantics: "java" occurs inside "javascript".
        assert!(matches_keywords("JavaScript closures", &["java"]));
        assert!(matches_keywords("Über Grammatik", &["über"]));

        assert!(!matches_keywords("Cooking Recipes", &["python"]));
        assert!(!matches_keywords("Learning Python Basics", &[] as &[&str]));
        assert!(!matches_keywords("Learning Python Basics", &["", "  "]));
    }
}
