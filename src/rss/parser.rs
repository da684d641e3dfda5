//! Feed parsing for RSS, Atom and JSON formats.

use anyhow::{anyhow, Result};
use feed_rs::model::Entry;
use feed_rs::parser;
use std::io::Cursor;
use tracing::{debug, warn};

use super::types::FeedEntry;
use super::util::{cleanup_xml, html_to_text, looks_like_xml_feed};
use crate::TARGET_WEB_REQUEST;

/// Parse a fetched payload into entries, in feed order.
///
/// A payload that fails to parse but still looks like RSS/Atom is cleaned up and parsed once more.
/// Entries without a usable link are dropped.
pub fn parse_feed(body: &[u8], source_url: &str) -> Result<Vec<FeedEntry>> {
    let feed = match parser::parse(Cursor::new(body)) {
        Ok(feed) => feed,
        Err(first_err) => {
            let text = String::from_utf8_lossy(body);
            if !looks_like_xml_feed(&text) {
                let preview = if text
                    .chars()
                    .all(|c| !c.is_control() || c.is_whitespace())
                {
                    text.chars().take(100).collect::<String>()
                } else {
                    "[binary data]".to_string()
                };
                return Err(anyhow!(
                    "Content is not an RSS, Atom or JSON feed ({}). Content preview: {}",
                    first_err,
                    preview
                ));
            }

            debug!(target: TARGET_WEB_REQUEST, "Retrying {} after XML cleanup: {}", source_url, first_err);
            let cleaned = cleanup_xml(&text);
            let feed = parser::parse(Cursor::new(cleaned.as_bytes())).map_err(|second_err| {
                anyhow!(
                    "Failed to parse feed even after cleanup. First error: {}. Second error: {}",
                    first_err,
                    second_err
                )
            })?;
            warn!(target: TARGET_WEB_REQUEST, "Feed {} parsed only after XML cleanup", source_url);
            feed
        }
    };

    let total = feed.entries.len();
    let entries: Vec<FeedEntry> = feed.entries.into_iter().filter_map(convert_entry).collect();
    debug!(target: TARGET_WEB_REQUEST, "Parsed {} entries from {} ({} without a link)", entries.len(), source_url, total - entries.len());

    Ok(entries)
}

fn convert_entry(entry: Entry) -> Option<FeedEntry> {
    let link = entry
        .links
        .iter()
        .map(|link| link.href.trim())
        .find(|href| !href.is_empty())?
        .to_string();

    let title = entry
        .title
        .map(|t| html_to_text(&t.content))
        .filter(|t| !t.is_empty());

    let summary = entry
        .summary
        .map(|s| s.content)
        .or_else(|| entry.content.and_then(|c| c.body))
        .map(|s| html_to_text(&s))
        .unwrap_or_default();

    Some(FeedEntry {
        title,
        link,
        summary,
        published: entry.published,
        updated: entry.updated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Example</title>
    <link>https://example.com/</link>
    <description>Example feed</description>
    <item>
      <title>Learning Python Basics</title>
      <link>https://example.com/python</link>
      <description>&lt;p&gt;Variables and &lt;b&gt;loops&lt;/b&gt;&lt;/p&gt;</description>
      <pubDate>Mon, 05 Oct 2026 10:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Entry without link</title>
      <description>Unusable</description>
    </item>
    <item>
      <link>https://example.com/untitled</link>
    </item>
  </channel>
</rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom example</title>
  <id>urn:example</id>
  <updated>2026-10-10T12:00:00Z</updated>
  <entry>
    <title>Medieval castles</title>
    <id>urn:example:1</id>
    <link href="https://example.com/castles"/>
    <updated>2026-10-10T12:00:00Z</updated>
    <content type="html">&lt;p&gt;Stone walls&lt;/p&gt;</content>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_rss_skips_entries_without_link() {
        let entries = parse_feed(RSS.as_bytes(), "https://example.com/rss").unwrap();
        assert_eq!(entries.len(), 2);

        assert_eq!(entries[0].title.as_deref(), Some("Learning Python Basics"));
        assert_eq!(entries[0].link, "https://example.com/python");
        assert_eq!(entries[0].summary, "Variables and loops");
        assert_eq!(
            entries[0].published,
            Some(Utc.with_ymd_and_hms(2026, 10, 5, 10, 0, 0).unwrap())
        );

        assert_eq!(entries[1].title, None);
        assert_eq!(entries[1].title_or_placeholder(), "No title");
        assert_eq!(entries[1].summary, "");
        assert_eq!(entries[1].timestamp(), None);
    }

    #[test]
    fn test_parse_atom_uses_content_and_updated() {
        let entries = parse_feed(ATOM.as_bytes(), "https://example.com/atom").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].link, "https://example.com/castles");
        assert_eq!(entries[0].summary, "Stone walls");
        assert_eq!(entries[0].published, None);
        assert_eq!(
            entries[0].timestamp(),
            Some(Utc.with_ymd_and_hms(2026, 10, 10, 12, 0, 0).unwrap())
        );
        assert_eq!(entries[0].match_text(), "Medieval castles Stone walls");
    }

    #[test]
    fn test_parse_json_feed() {
        let json = r#"{
            "version": "https://jsonfeed.org/version/1.1",
            "title": "JSON example",
            "items": [
                {"id": "1", "url": "https://example.com/json-item", "title": "Grammar tips", "content_text": "Articles and nouns"}
            ]
        }"#;
        let entries = parse_feed(json.as_bytes(), "https://example.com/feed.json").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].link, "https://example.com/json-item");
        assert_eq!(entries[0].title.as_deref(), Some("Grammar tips"));
    }

    #[test]
    fn test_parse_recovers_after_cleanup() {
        let dirty = format!("\u{FEFF}\n\n{}", RSS.replace("Example feed", "Example&nbsp;feed"));
        let entries = parse_feed(dirty.as_bytes(), "https://example.com/dirty").unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_parse_rejects_non_feed() {
        let html = "<html><body><p>Not a feed</p></body></html>";
        assert!(parse_feed(html.as_bytes(), "https://example.com/page").is_err());
        assert!(parse_feed(b"", "https://example.com/empty").is_err());
    }
}
