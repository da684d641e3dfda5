//! Syndication feed retrieval for edufeed.
//!
//! This module fetches RSS, Atom and JSON feeds and turns them into [`FeedEntry`] values.

mod client;
mod fetcher;
mod parser;
mod types;
mod util;

pub use self::client::create_http_client;
pub use self::fetcher::FeedFetcher;
pub use self::parser::parse_feed;
pub use self::types::*;
pub use self::util::{cleanup_xml, html_to_text, is_valid_url};
