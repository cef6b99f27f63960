//! Discord sink — verbose notifications, failure diagnostics with a
//! screenshot attachment, and the `!status` channel command.
//!
//! Talks to the Discord REST API directly over `reqwest`; no gateway
//! connection is needed for a bot that only writes to one channel and answers
//! one command.

use async_trait::async_trait;
use backoff::ExponentialBackoff;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::monitor::StatusBoard;
use crate::types::NotificationEvent;

use super::format::verbose_message;
use super::{NotificationSink, SinkError};

const API_BASE: &str = "https://discord.com/api/v10";
const COMMAND_POLL_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Clone)]
pub struct DiscordSink {
    http: reqwest::Client,
    token: String,
    channel_id: String,
}

impl DiscordSink {
    pub fn new(http: reqwest::Client, token: String, channel_id: String) -> Self {
        Self {
            http,
            token,
            channel_id,
        }
    }

    fn auth(&self) -> String {
        format!("Bot {}", self.token)
    }

    fn messages_url(&self) -> String {
        format!("{API_BASE}/channels/{}/messages", self.channel_id)
    }

    /// Classify an HTTP status: 4xx means the channel/token is wrong and
    /// retrying is pointless; everything else is worth a short retry.
    fn classify(status: reqwest::StatusCode, body: String) -> backoff::Error<SinkError> {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            backoff::Error::transient(SinkError::Delivery(format!("{status}: {body}")))
        } else if status.is_client_error() {
            backoff::Error::permanent(SinkError::Channel(format!("{status}: {body}")))
        } else {
            backoff::Error::permanent(SinkError::Delivery(format!("{status}: {body}")))
        }
    }

    fn retry_policy() -> ExponentialBackoff {
        ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(15)),
            ..Default::default()
        }
    }

    /// Send a plain text message, retrying transient failures briefly.
    pub async fn send_text(&self, content: &str) -> Result<(), SinkError> {
        let body = serde_json::json!({ "content": content });
        let body = &body;
        backoff::future::retry(Self::retry_policy(), || async move {
            let resp = self
                .http
                .post(self.messages_url())
                .header("Authorization", self.auth())
                .json(&body)
                .send()
                .await
                .map_err(|e| backoff::Error::transient(SinkError::Delivery(e.to_string())))?;

            let status = resp.status();
            if status.is_success() {
                Ok(())
            } else {
                let text = resp.text().await.unwrap_or_default();
                Err(Self::classify(status, text))
            }
        })
        .await
    }

    /// Send a message with a PNG attachment (the failure-diagnostic
    /// screenshot). Not retried — diagnostics are best effort.
    pub async fn send_with_attachment(
        &self,
        content: &str,
        bytes: Vec<u8>,
        filename: &str,
    ) -> Result<(), SinkError> {
        let payload = serde_json::json!({
            "content": content,
            "attachments": [{ "id": 0, "filename": filename }],
        });
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str("image/png")
            .map_err(|e| SinkError::Delivery(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .text("payload_json", payload.to_string())
            .part("files[0]", part);

        let resp = self
            .http
            .post(self.messages_url())
            .header("Authorization", self.auth())
            .multipart(form)
            .send()
            .await
            .map_err(|e| SinkError::Delivery(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            let text = resp.text().await.unwrap_or_default();
            if status.is_client_error() {
                Err(SinkError::Channel(format!("{status}: {text}")))
            } else {
                Err(SinkError::Delivery(format!("{status}: {text}")))
            }
        }
    }

    async fn fetch_messages(&self, after: Option<&str>) -> Result<Vec<serde_json::Value>, SinkError> {
        let mut req = self
            .http
            .get(self.messages_url())
            .header("Authorization", self.auth());
        req = match after {
            Some(id) => req.query(&[("after", id), ("limit", "25")]),
            None => req.query(&[("limit", "1")]),
        };
        let resp = req
            .send()
            .await
            .map_err(|e| SinkError::Delivery(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(SinkError::Channel(format!("{status}: {text}")));
        }
        resp.json::<Vec<serde_json::Value>>()
            .await
            .map_err(|e| SinkError::Delivery(e.to_string()))
    }
}

#[async_trait]
impl NotificationSink for DiscordSink {
    fn name(&self) -> &'static str {
        "discord"
    }

    async fn deliver(&self, event: &NotificationEvent) -> Result<(), SinkError> {
        self.send_text(&verbose_message(event)).await
    }
}

/// Polls the channel for `!status` and answers with the last check time.
///
/// Runs as its own task with its own interval; a dead channel only produces
/// warnings, never a crash.
pub struct StatusCommandPoller {
    sink: DiscordSink,
    admin_id: Option<String>,
    status: StatusBoard,
}

impl StatusCommandPoller {
    pub fn new(sink: DiscordSink, admin_id: Option<String>, status: StatusBoard) -> Self {
        Self {
            sink,
            admin_id,
            status,
        }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        // Skip channel history: start from the newest message at boot.
        let mut last_seen: Option<String> = match self.sink.fetch_messages(None).await {
            Ok(msgs) => msgs
                .first()
                .and_then(|m| m.get("id").and_then(|v| v.as_str()))
                .map(|s| s.to_string()),
            Err(e) => {
                warn!("status poller: initial fetch failed ({}), starting blind", e);
                None
            }
        };

        info!("status poller: watching channel for !status");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(COMMAND_POLL_INTERVAL) => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        debug!("status poller: shutdown");
                        return;
                    }
                }
            }

            let msgs = match self.sink.fetch_messages(last_seen.as_deref()).await {
                Ok(m) => m,
                Err(e) => {
                    debug!("status poller: fetch failed: {}", e);
                    continue;
                }
            };

            // API returns newest first; handle oldest first.
            for msg in msgs.iter().rev() {
                if let Some(id) = msg.get("id").and_then(|v| v.as_str()) {
                    last_seen = Some(id.to_string());
                }
                let content = msg
                    .get("content")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .trim();
                if content != "!status" {
                    continue;
                }
                let author = msg
                    .pointer("/author/id")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();

                let reply = if self
                    .admin_id
                    .as_deref()
                    .is_some_and(|admin| admin != author)
                {
                    "❌ Nicht berechtigt.".to_string()
                } else {
                    match self.status.last_check() {
                        Some(t) => format!("✅ Letzte Prüfung: {}", t.format("%d.%m.%Y %H:%M:%S")),
                        None => "⏳ Noch keine Prüfung.".to_string(),
                    }
                };
                if let Err(e) = self.sink.send_text(&reply).await {
                    warn!("status poller: reply failed: {}", e);
                }
            }
        }
    }
}
