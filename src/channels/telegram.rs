//! Telegram transport — long-polls the Bot API for channel posts and
//! delivers accepted listings via `sendMessage`.
//!
//! One instance serves both directions: it is the [`Listener`] for the
//! configured source channels and the [`Publisher`] for the destination
//! chat.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::channels::{
    Listener, MessageStream, PublishOptions, Publisher, RawInboundMessage,
};
use crate::config::{TelegramConfig, normalize_channel};
use crate::error::ChannelError;

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

/// Long-poll timeout passed to getUpdates, seconds.
const POLL_TIMEOUT_SECS: u64 = 30;

/// Telegram channel — connects to the Bot API via long-polling.
pub struct TelegramChannel {
    session: SecretString,
    source_channels: Vec<String>,
    client: reqwest::Client,
    connected: Arc<AtomicBool>,
}

impl TelegramChannel {
    pub fn new(config: &TelegramConfig) -> Self {
        Self {
            session: config.session.clone(),
            source_channels: config.source_channels.clone(),
            client: reqwest::Client::new(),
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shared flag the status surface reads. True while polling succeeds.
    pub fn connected_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.connected)
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "https://api.telegram.org/bot{}/{method}",
            self.session.expose_secret()
        )
    }

    /// Send a single message chunk (≤4096 chars), HTML-first with a plain
    /// text fallback for payloads Telegram refuses to parse.
    async fn send_chunk(
        &self,
        chat_id: &str,
        text: &str,
        options: &PublishOptions,
    ) -> Result<(), ChannelError> {
        let mut html_body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": options.disable_link_preview,
        });
        if !options.inline_buttons.is_empty() {
            let rows: Vec<Vec<serde_json::Value>> = options
                .inline_buttons
                .iter()
                .map(|b| vec![serde_json::json!({"text": b.text, "url": b.url})])
                .collect();
            html_body["reply_markup"] = serde_json::json!({ "inline_keyboard": rows });
        }

        let html_resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&html_body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if html_resp.status().is_success() {
            return Ok(());
        }

        let html_status = html_resp.status();
        tracing::warn!(
            status = ?html_status,
            "Telegram sendMessage with HTML failed; retrying without parse_mode"
        );

        let plain_body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "disable_web_page_preview": options.disable_link_preview,
        });
        let plain_resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&plain_body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if !plain_resp.status().is_success() {
            let plain_err = plain_resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed {
                name: "telegram".into(),
                reason: format!("sendMessage failed (html: {html_status}, plain: {plain_err})"),
            });
        }

        Ok(())
    }
}

// ── Listener ────────────────────────────────────────────────────────

#[async_trait]
impl Listener for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let url = self.api_url("getUpdates");
        let sources = self.source_channels.clone();
        let client = self.client.clone();
        let connected = Arc::clone(&self.connected);

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!(channels = sources.len(), "Telegram listener polling for updates");

            loop {
                let body = serde_json::json!({
                    "offset": offset,
                    "timeout": POLL_TIMEOUT_SECS,
                    "allowed_updates": ["message", "channel_post"],
                });

                let resp = match client.post(&url).json(&body).send().await {
                    Ok(r) => r,
                    Err(e) => {
                        connected.store(false, Ordering::Relaxed);
                        tracing::warn!("Telegram poll error: {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                // getUpdates answers 409 when a second process is polling
                // the same session token. Two live processes must never
                // share one session, so this ends the stream for good.
                if resp.status() == reqwest::StatusCode::CONFLICT {
                    connected.store(false, Ordering::Relaxed);
                    tracing::error!(
                        "Telegram session is already polled by another process; stopping listener"
                    );
                    return;
                }

                let data: serde_json::Value = match resp.json().await {
                    Ok(d) => d,
                    Err(e) => {
                        connected.store(false, Ordering::Relaxed);
                        tracing::warn!("Telegram parse error: {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                connected.store(true, Ordering::Relaxed);

                if let Some(results) = data.get("result").and_then(serde_json::Value::as_array) {
                    for update in results {
                        if let Some(uid) =
                            update.get("update_id").and_then(serde_json::Value::as_i64)
                        {
                            offset = uid + 1;
                        }

                        let Some(incoming) = update_to_inbound(update, &sources) else {
                            continue;
                        };

                        if tx.send(incoming).is_err() {
                            tracing::info!("Telegram listener channel closed");
                            return;
                        }
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: format!("getMe returned {}", resp.status()),
            })
        }
    }
}

// ── Publisher ───────────────────────────────────────────────────────

#[async_trait]
impl Publisher for TelegramChannel {
    async fn publish(
        &self,
        channel_ref: &str,
        html_body: &str,
        options: &PublishOptions,
    ) -> Result<(), ChannelError> {
        for chunk in split_message(html_body, TELEGRAM_MAX_MESSAGE_LENGTH) {
            self.send_chunk(channel_ref, &chunk, options).await?;
        }
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Pull a usable inbound message out of one getUpdates entry.
///
/// Accepts `message` and `channel_post` updates, drops anything without
/// text or from a channel that is not subscribed.
fn update_to_inbound(
    update: &serde_json::Value,
    sources: &[String],
) -> Option<RawInboundMessage> {
    let message = update.get("channel_post").or_else(|| update.get("message"))?;

    let text = message.get("text").and_then(serde_json::Value::as_str)?;
    if text.is_empty() {
        return None;
    }

    let username = message
        .get("chat")
        .and_then(|c| c.get("username"))
        .and_then(serde_json::Value::as_str)?;

    let normalized = normalize_channel(username);
    if !sources.iter().any(|s| s == &normalized) {
        return None;
    }

    Some(RawInboundMessage {
        channel_id: format!("@{normalized}"),
        text: text.to_string(),
    })
}

/// Split a message into chunks that fit Telegram's character limit.
/// Tries to split on newlines, then spaces, then hard-cuts.
///
/// The limit is in characters, not bytes: listings are Cyrillic HTML
/// with emoji, so byte positions are not safe cut points.
fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.chars().count() <= max_chars {
            chunks.push(remaining.to_string());
            break;
        }

        // Byte offset just past the max_chars-th character.
        let window_end = remaining
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(remaining.len());
        let window = &remaining[..window_end];

        // Newline and space are ASCII, so their byte offsets are valid
        // cut points. A split at position 0 would loop forever; hard-cut
        // in that case.
        let split_at = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .filter(|&i| i > 0)
            .unwrap_or(window_end);

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

// ── Tests ───────────────────────────────────────────────────────────
