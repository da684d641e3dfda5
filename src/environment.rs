//! Runtime configuration read from the process environment.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use tokio::time::Duration;

const DEFAULT_DATABASE_PATH: &str = "content.db";
const DEFAULT_POST_INTERVAL_HOURS: u64 = 6;
const DEFAULT_POST_DELAY_SECS: u64 = 2;

/// Retrieves an environment variable and splits it into a vector of strings based on a delimiter.
///
/// Empty segments are dropped, so an unset variable yields an empty vector.
pub fn get_env_var_as_vec(var: &str, delimiter: char) -> Vec<String> {
    env::var(var)
        .unwrap_or_default()
        .split(delimiter)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn get_env_var_as_u64(var: &str, default: u64) -> Result<u64> {
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .with_context(|| format!("{} must be a non-negative integer, got {:?}", var, value)),
        _ => Ok(default),
    }
}

fn get_env_var_as_bool(var: &str, default: bool) -> bool {
    match env::var(var) {
        Ok(value) => !matches!(value.trim().to_lowercase().as_str(), "0" | "false" | "no" | "off"),
        Err(_) => default,
    }
}

/// A topic bucket with its own feeds and keyword list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Category {
    pub name: String,
    pub sources: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl Category {
    pub fn new(name: &str, sources: &[&str], keywords: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            sources: sources.iter().map(|s| s.to_string()).collect(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// The categories the bot shipped with.
pub fn default_categories() -> Vec<Category> {
    vec![
        Category::new(
            "programming",
            &[
                "https://habr.com/ru/rss/all/all/",
                "https://stackoverflow.blog/feed/",
                "https://realpython.com/atom.xml",
            ],
            &["python", "javascript", "java", "c++"],
        ),
        Category::new(
            "languages",
            &[
                "https://www.fluentu.com/blog/feed/",
                "https://www.duolingo.com/feed",
            ],
            &["english", "spanish", "french", "german", "grammar"],
        ),
        Category::new(
            "history",
            &[
                "https://www.history.com/news/feed",
                "https://www.historians.org/news/feed",
            ],
            &["ancient", "medieval", "modern history", "world war"],
        ),
    ]
}

/// Parses a JSON array of categories. Order in the file is processing order.
pub fn parse_categories(json: &str) -> Result<Vec<Category>> {
    let categories: Vec<Category> =
        serde_json::from_str(json).context("Failed to parse categories JSON")?;

    if let Some(unnamed) = categories.iter().position(|c| c.name.trim().is_empty()) {
        return Err(anyhow!("Category #{} has an empty name", unnamed + 1));
    }

    Ok(categories)
}

/// Keeps only the categories listed in `enabled`, preserving configured order.
/// An empty `enabled` list keeps everything.
pub fn filter_categories(categories: Vec<Category>, enabled: &[String]) -> Vec<Category> {
    if enabled.is_empty() {
        return categories;
    }
    categories
        .into_iter()
        .filter(|c| enabled.iter().any(|name| name == &c.name))
        .collect()
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub categories: Vec<Category>,
    pub post_interval: Duration,
    pub post_delay: Duration,
    pub fetch_full_text: bool,
}

impl Config {
    /// Reads `DATABASE_PATH`, `SOURCES_PATH`, `ENABLED_CATEGORIES`, `POST_INTERVAL_HOURS`,
    /// `POST_DELAY_SECS` and `FETCH_FULL_TEXT`.
    pub fn from_env() -> Result<Self> {
        let database_path =
            env::var("DATABASE_PATH").unwrap_or_else(|_| DEFAULT_DATABASE_PATH.to_string());

        let categories = match env::var("SOURCES_PATH") {
            Ok(path) if !path.trim().is_empty() => {
                let json = fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read sources file {}", path))?;
                parse_categories(&json)?
            }
            _ => default_categories(),
        };
        let categories =
            filter_categories(categories, &get_env_var_as_vec("ENABLED_CATEGORIES", ';'));

        let post_interval_hours =
            get_env_var_as_u64("POST_INTERVAL_HOURS", DEFAULT_POST_INTERVAL_HOURS)?;
        if post_interval_hours == 0 {
            return Err(anyhow!("POST_INTERVAL_HOURS must be at least 1"));
        }

        Ok(Self {
            database_path,
            categories,
            post_interval: Duration::from_secs(post_interval_hours * 3600),
            post_delay: Duration::from_secs(get_env_var_as_u64(
                "POST_DELAY_SECS",
                DEFAULT_POST_DELAY_SECS,
            )?),
            fetch_full_text: get_env_var_as_bool("FETCH_FULL_TEXT", true),
        })
    }
}

/// Credentials for the delivery channel.
#[derive(Debug, Clone)]
pub struct TelegramSettings {
    pub bot_token: String,
    pub channel_id: String,
}

impl TelegramSettings {
    pub fn from_env() -> Result<Self> {
        let bot_token = env::var("BOT_TOKEN")
            .map_err(|_| anyhow!("BOT_TOKEN environment variable required"))?;
        let channel_id = env::var("CHANNEL_ID")
            .map_err(|_| anyhow!("CHANNEL_ID environment variable required"))?;
        Ok(Self {
            bot_token,
            channel_id,
        })
    }
}
