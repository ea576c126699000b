//! Telegram Bot API notifier.
//!
//! Posts each payload to `sendMessage` with `parse_mode = "HTML"`, one request per
//! chat, stopping at the first chat that does not accept it.

use crate::config::TelegramConfig;
use crate::error::{Error, Result};
use crate::notify::{NotificationPayload, Notifier};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

/// Parse mode matching the markup produced by [`format_notification`](crate::notify::format_notification).
const PARSE_MODE: &str = "HTML";

/// Sends notifications through a Telegram bot.
pub struct TelegramNotifier {
    config: TelegramConfig,
    client: reqwest::Client,
}

/// Error envelope returned by the Bot API.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
}

impl TelegramNotifier {
    /// Creates a notifier for `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the HTTP client cannot be built.
    pub fn new(config: TelegramConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::InvalidConfig {
                message: format!("cannot build HTTP client: {}", e.without_url()),
            })?;

        Ok(Self { config, client })
    }

    /// Returns the destinations configured for this bot.
    #[must_use]
    pub fn chat_ids(&self) -> &[String] {
        &self.config.chat_ids
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.config.api_base,
            self.config.bot_token()
        )
    }

    #[instrument(name = "TelegramNotifier::send_message", skip(self, payload))]
    async fn send_message(&self, chat_id: &str, payload: &NotificationPayload) -> Result<()> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": payload.as_str(),
            "parse_mode": PARSE_MODE,
        });

        let response = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::NotifyRequest {
                chat_id: chat_id.to_string(),
                source: e.without_url(),
            })?;

        let status = response.status();
        if status.is_success() {
            debug!(status = status.as_u16(), "Message delivered");
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        Err(Error::NotifyRejected {
            chat_id: chat_id.to_string(),
            status: status.as_u16(),
            description: rejection_description(&text),
        })
    }
}

/// Extracts the human-readable reason from a Bot API error body.
fn rejection_description(body: &str) -> String {
    match serde_json::from_str::<ApiResponse>(body) {
        Ok(ApiResponse {
            ok: false,
            description: Some(description),
        }) => description,
        _ if body.trim().is_empty() => "no response body".to_string(),
        _ => body.trim().to_string(),
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, payload: &NotificationPayload, destinations: &[String]) -> Result<()> {
        for chat_id in destinations {
            self.send_message(chat_id, payload).await?;
        }
        Ok(())
    }

    fn description(&self) -> &str {
        "telegram"
    }
}

impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
