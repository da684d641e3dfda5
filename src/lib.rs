pub mod aggregator;
pub mod article;
pub mod db;
pub mod dispatcher;
pub mod environment;
pub mod filter;
pub mod logging;
pub mod rss;
pub mod telegram;

pub const TARGET_WEB_REQUEST: &str = "web_request";
pub const TARGET_DB: &str = "db_query";
pub const TARGET_PIPELINE: &str = "pipeline";
