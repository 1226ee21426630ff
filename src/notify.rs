//! Outbound alerts
//!
//! Signals are pushed through a [`Notifier`]. The Telegram implementation
//! calls the Bot API `sendMessage` method directly; the log implementation is
//! used when no bot token is configured.

use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Usually supplied through TELEGRAM_BOT_TOKEN
    #[serde(default)]
    pub bot_token: Option<String>,

    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Chats subscribed on first start, in addition to stored subscribers
    #[serde(default)]
    pub default_chat_ids: Vec<i64>,
}

fn default_enabled() -> bool {
    true
}
fn default_api_base() -> String {
    TELEGRAM_API_BASE.to_string()
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            bot_token: None,
            api_base: default_api_base(),
            default_chat_ids: Vec::new(),
        }
    }
}

pub trait Notifier: Send + Sync {
    fn send(&self, chat_id: i64, text: &str) -> impl Future<Output = Result<()>> + Send;
}

#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    token: String,
}

impl TelegramNotifier {
    pub fn new(token: impl Into<String>, api_base: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }
}

impl Notifier for TelegramNotifier {
    async fn send(&self, chat_id: i64, text: &str) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.token);
        let body = json!({
            "chat_id": chat_id,
            "text": text,
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to reach Telegram for chat {}", chat_id))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            bail!("Telegram sendMessage to {} failed ({}): {}", chat_id, status, detail);
        }

        debug!("Delivered alert to chat {}", chat_id);
        Ok(())
    }
}

/// Writes alerts to the log instead of a chat
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn send(&self, chat_id: i64, text: &str) -> Result<()> {
        info!("Alert for chat {}:\n{}", chat_id, text);
        Ok(())
    }
}

/// Telegram when enabled with a token, otherwise the log
#[derive(Debug, Clone)]
pub enum AlertSink {
    Telegram(TelegramNotifier),
    Log(LogNotifier),
}

impl AlertSink {
    pub fn from_config(config: &TelegramConfig) -> Result<Self> {
        match (&config.bot_token, config.enabled) {
            (Some(token), true) => Ok(AlertSink::Telegram(TelegramNotifier::new(
                token.clone(),
                &config.api_base,
            )?)),
            _ => Ok(AlertSink::Log(LogNotifier)),
        }
    }
}

impl Notifier for AlertSink {
    async fn send(&self, chat_id: i64, text: &str) -> Result<()> {
        match self {
            AlertSink::Telegram(n) => n.send(chat_id, text).await,
            AlertSink::Log(n) => n.send(chat_id, text).await,
        }
    }
}
