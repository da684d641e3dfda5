use anyhow::{anyhow, Result};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, error, info};

use crate::aggregator::ContentItem;
use crate::environment::TelegramSettings;
use crate::rss::{create_http_client, REQUEST_TIMEOUT};
use crate::TARGET_WEB_REQUEST;

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Telegram rejects longer messages. Measured in UTF-16 code units.
pub const MAX_MESSAGE_CHARS: usize = 4096;

const READ_MORE: &str = "Читать полностью";

pub fn category_emoji(category: &str) -> &'static str {
    match category {
        "programming" => "💻",
        "languages" => "🌍",
        "history" => "📚",
        _ => "📖",
    }
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Formats an item as a Telegram HTML message: emoji and bold title, the full text (or the
/// summary), a link and a category tag. The body is shortened so the whole message fits.
pub fn render_message(item: &ContentItem) -> String {
    let header = format!(
        "{} <b>{}</b>\n\n",
        category_emoji(&item.category),
        escape_html(&item.title)
    );
    let footer = format!(
        "🔗 <a href=\"{}\">{}</a>\n🏷️ #{}",
        escape_html(&item.url),
        READ_MORE,
        escape_html(&item.category)
    );

    let body = item
        .full_content
        .as_deref()
        .filter(|text| !text.trim().is_empty())
        .unwrap_or(item.summary.as_str())
        .trim();

    if body.is_empty() {
        return format!("{}{}", header, footer);
    }

    let budget =
        MAX_MESSAGE_CHARS.saturating_sub(utf16_len(&header) + utf16_len(&footer) + 2);
    format!("{}{}\n\n{}", header, fit_escaped(body, budget), footer)
}

/// Message length as Telegram counts it.
pub fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count()
}

/// Escapes `text`, cutting it on a character boundary so the escaped result stays within
/// `budget` UTF-16 code units (ellipsis included).
fn fit_escaped(text: &str, budget: usize) -> String {
    let escaped = escape_html(text);
    if utf16_len(&escaped) <= budget {
        return escaped;
    }

    let mut fitted = String::new();
    let mut used = 0;
    for c in text.chars() {
        let piece = escape_html(&c.to_string());
        let len = utf16_len(&piece);
        if used + len + 1 > budget {
            break;
        }
        fitted.push_str(&piece);
        used += len;
    }
    fitted.push('…');
    fitted
}

#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    api_base: String,
    bot_token: String,
    channel_id: String,
}

impl TelegramClient {
    pub fn new(settings: &TelegramSettings) -> Result<Self> {
        Self::with_api_base(settings, TELEGRAM_API_BASE)
    }

    pub fn with_api_base(settings: &TelegramSettings, api_base: &str) -> Result<Self> {
        Ok(Self {
            client: create_http_client(REQUEST_TIMEOUT)?,
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token: settings.bot_token.clone(),
            channel_id: settings.channel_id.clone(),
        })
    }

    /// Posts one item to the configured channel.
    pub async fn send_to_channel(&self, item: &ContentItem) -> Result<()> {
        let payload = json!({
            "chat_id": self.channel_id,
            "text": render_message(item),
            "parse_mode": "HTML",
            "disable_web_page_preview": false,
        });

        debug!(target: TARGET_WEB_REQUEST, "Sending Telegram message for {}", item.url);
        let response = self
            .client
            .post(format!("{}/bot{}/sendMessage", self.api_base, self.bot_token))
            .json(&payload)
            .send()
            .await
            .map_err(|err| anyhow!("Telegram request failed: {}", err.without_url()))?;

        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);

        if status.is_success() && body["ok"].as_bool().unwrap_or(false) {
            info!(target: TARGET_WEB_REQUEST, "Telegram message sent: {}", item.url);
            Ok(())
        } else {
            let description = body["description"].as_str().unwrap_or("no description");
            error!(target: TARGET_WEB_REQUEST, "Error sending Telegram message ({}): {}", status, description);
            Err(anyhow!("Telegram API error {}: {}", status, description))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(full_content: Option<&str>, summary: &str) -> ContentItem {
        ContentItem {
            title: "Rust & <Python>".to_string(),
            url: "https://example.com/a?x=1&y=2".to_string(),
            summary: summary.to_string(),
            full_content: full_content.map(str::to_string),
            category: "programming".to_string(),
        }
    }

    #[test]
    fn test_render_prefers_full_content() {
        let message = render_message(&item(Some("Full text"), "Summary"));
        assert!(message.starts_with("💻 <b>Rust &amp; &lt;Python&gt;</b>\n\nFull text\n\n"));
        assert!(message.contains("<a href=\"https://example.com/a?x=1&amp;y=2\">"));
        assert!(message.ends_with("#programming"));
        assert!(!message.contains("Summary"));
    }

    #[test]
    fn test_render_falls_back_to_summary() {
        let message = render_message(&item(None, "Summary"));
        assert!(message.contains("\n\nSummary\n\n"));

        let bare = render_message(&item(None, ""));
        assert!(bare.starts_with("💻 <b>"));
        assert!(bare.contains("🔗"));
    }

    #[test]
    fn test_render_respects_message_limit() {
        let long = "<&> ".repeat(3000);
        let message = render_message(&item(Some(&long), ""));
        assert!(utf16_len(&message) <= MAX_MESSAGE_CHARS);
        assert!(message.contains('…'));
        // Entities are never cut in half.
        assert!(!message.contains("&am\n") && !message.contains("&l…"));
    }

    #[test]
    fn test_message_limit_counts_utf16_units() {
        // Each of these takes two UTF-16 code units.
        let emoji = "📚🏛️🗿".repeat(1500);
        let message = render_message(&item(Some(&emoji), ""));
        assert!(message.chars().count() < MAX_MESSAGE_CHARS);
        assert!(utf16_len(&message) <= MAX_MESSAGE_CHARS);
        assert!(message.contains('…'));
        assert!(message.ends_with("#programming"));
    }

    #[test]
    fn test_category_emoji() {
        assert_eq!(category_emoji("history"), "📚");
        assert_eq!(category_emoji("cooking"), "📖");
    }

    #[tokio::test]
    async fn test_send_to_channel() {
        let mut server = mockito::Server::new_async().await;
        let ok = server
            .mock("POST", "/bottoken/sendMessage")
            .match_body(mockito::Matcher::PartialJson(json!({
                "chat_id": "@channel",
                "parse_mode": "HTML",
            })))
            .with_status(200)
            .with_body(r#"{"ok": true, "result": {}}"#)
            .create_async()
            .await;

        let settings = TelegramSettings {
            bot_token: "token".to_string(),
            channel_id: "@channel".to_string(),
        };
        let client = TelegramClient::with_api_base(&settings, &server.url()).unwrap();
        client.send_to_channel(&item(None, "Summary")).await.unwrap();
        ok.assert_async().await;
    }

    #[tokio::test]
    async fn test_send_to_channel_reports_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/bottoken/sendMessage")
            .with_status(400)
            .with_body(r#"{"ok": false, "description": "Bad Request: chat not found"}"#)
            .create_async()
            .await;

        let settings = TelegramSettings {
            bot_token: "token".to_string(),
            channel_id: "@missing".to_string(),
        };
        let client = TelegramClient::with_api_base(&settings, &server.url()).unwrap();
        let err = client
            .send_to_channel(&item(None, "Summary"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("chat not found"));
    }
}
