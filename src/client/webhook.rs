//! Chat webhook pushes (Feishu / Lark bot protocol)
//!
//! Messages are sent as `{"msg_type":"text","content":{"text":...}}`. The bot
//! answers `{"code":0}` on success; any other code is a failure carrying the
//! bot's `msg`.

use crate::batch::BatchProgress;
use crate::client::http::classify_send_error;
use crate::client::message::{
    fit_message, format_summary, format_video_message, MessageOptions, PushSummary,
};
use crate::config::{validate_webhook_url, WebhookConfig};
use crate::model::{Comment, Video};
use crate::{FetchError, FetchOutcome};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use url::Url;

/// Delivery counters of one webhook client
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushStats {
    pub total_sent: u64,
    pub successful: u64,
    pub failed: u64,
    pub last_sent_time: Option<DateTime<Utc>>,
}

/// Progress of a multi-video push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushProgress {
    pub current: usize,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub percentage: u8,
}

/// Outcome of a multi-video push
#[derive(Debug, Clone, Default)]
pub struct PushReport {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    /// Video id and error for every failed message
    pub errors: Vec<(String, String)>,
    pub summary_sent: bool,
}

#[derive(Debug, Serialize)]
struct TextMessage<'a> {
    msg_type: &'static str,
    content: TextContent<'a>,
}

#[derive(Debug, Serialize)]
struct TextContent<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct BotResponse {
    #[serde(default)]
    code: Option<i64>,
    /// Older bot versions answer with `StatusCode` instead of `code`
    #[serde(default, rename = "StatusCode")]
    status_code: Option<i64>,
    #[serde(default)]
    msg: Option<String>,
}

impl BotResponse {
    fn into_outcome(self) -> FetchOutcome<()> {
        match self.code.or(self.status_code) {
            Some(0) => Ok(()),
            code => Err(FetchError::Api(self.msg.unwrap_or_else(|| match code {
                Some(c) => format!("webhook returned code {}", c),
                None => "webhook response carried no code".to_string(),
            }))),
        }
    }
}

/// Sends text messages to one validated webhook URL
pub struct WebhookClient {
    client: Client,
    url: Url,
    max_message_length: usize,
    send_interval: Duration,
    stats: Mutex<PushStats>,
}

impl WebhookClient {
    /// Creates a client for `url`
    ///
    /// # Arguments
    ///
    /// * `client` - Shared HTTP client
    /// * `url` - Webhook URL, checked against `config.allowed_hosts`
    /// * `config` - Message size and pacing settings
    ///
    /// # Returns
    ///
    /// * `Ok(WebhookClient)` - The URL passed validation
    /// * `Err(FetchError::Validation)` - Malformed URL or host not allowed
    pub fn new(client: Client, url: &str, config: &WebhookConfig) -> FetchOutcome<Self> {
        let url = validate_webhook_url(url, &config.allowed_hosts)?;
        Ok(Self {
            client,
            url,
            max_message_length: config.max_message_length,
            send_interval: Duration::from_millis(config.send_interval),
            stats: Mutex::new(PushStats::default()),
        })
    }

    /// Creates a client from the configured URL, if any
    pub fn from_config(client: Client, config: &WebhookConfig) -> FetchOutcome<Self> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| FetchError::Validation("no webhook url configured".to_string()))?;
        Self::new(client, url, config)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    fn update_stats(&self, f: impl FnOnce(&mut PushStats)) {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut stats);
    }

    /// Posts one text message
    ///
    /// Text beyond the configured length is truncated with a notice.
    pub async fn send_text(&self, text: &str) -> FetchOutcome<()> {
        let (text, truncated) = fit_message(text, self.max_message_length);
        if truncated {
            tracing::warn!(
                "Webhook message exceeds {} characters, truncated",
                self.max_message_length
            );
        }

        let result = self.post(&text).await;
        self.update_stats(|s| {
            s.total_sent += 1;
            match &result {
                Ok(()) => {
                    s.successful += 1;
                    s.last_sent_time = Some(Utc::now());
                }
                Err(_) => s.failed += 1,
            }
        });
        if let Err(e) = &result {
            tracing::warn!("Webhook push failed: {}", e);
        }
        result
    }

    async fn post(&self, text: &str) -> FetchOutcome<()> {
        let message = TextMessage {
            msg_type: "text",
            content: TextContent { text },
        };
        let response = self
            .client
            .post(self.url.clone())
            .json(&message)
            .send()
            .await
            .map_err(classify_send_error)?;

        let status = response.status();
        let body = response.text().await.map_err(classify_send_error)?;
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: BotResponse =
            serde_json::from_str(&body).map_err(|e| FetchError::Parse(e.to_string()))?;
        parsed.into_outcome()
    }

    /// Sends a short probe message
    pub async fn test_connection(&self) -> FetchOutcome<()> {
        let text = format!(
            "tube-harvest webhook test\n\nSent at {}",
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
        );
        self.send_text(&text).await
    }

    /// Formats and sends one video with its comments
    pub async fn send_video(
        &self,
        video: &Video,
        comments: &[Comment],
        options: &MessageOptions,
    ) -> FetchOutcome<()> {
        let text = format_video_message(video, comments, options);
        self.send_text(&text).await?;
        tracing::info!("Pushed {} to webhook", video.id);
        Ok(())
    }

    /// Sends each video in order, pausing between messages
    ///
    /// A failed message is recorded and the push moves on. When more than one
    /// video was sent and `send_summary` is set, a summary message follows.
    pub async fn send_batch(
        &self,
        items: &[(Video, Vec<Comment>)],
        options: &MessageOptions,
        send_summary: bool,
        mut on_progress: impl FnMut(PushProgress),
    ) -> PushReport {
        let started = Instant::now();
        let mut report = PushReport {
            total: items.len(),
            ..PushReport::default()
        };

        for (index, (video, comments)) in items.iter().enumerate() {
            match self.send_video(video, comments, options).await {
                Ok(()) => report.successful += 1,
                Err(e) => {
                    report.failed += 1;
                    report.errors.push((video.id.clone(), e.to_string()));
                }
            }

            let current = index + 1;
            on_progress(PushProgress {
                current,
                total: items.len(),
                successful: report.successful,
                failed: report.failed,
                percentage: BatchProgress::percentage_of(current, items.len()),
            });

            if current < items.len() {
                tokio::time::sleep(self.send_interval).await;
            }
        }

        if send_summary && items.len() > 1 {
            tokio::time::sleep(self.send_interval).await;
            let summary = summarize_push(items, &report, started.elapsed());
            report.summary_sent = self.send_text(&format_summary(&summary)).await.is_ok();
        }

        report
    }

    pub fn stats(&self) -> PushStats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn summarize_push(
    items: &[(Video, Vec<Comment>)],
    report: &PushReport,
    elapsed: Duration,
) -> PushSummary {
    let comments = items.iter().flat_map(|(_, c)| c.iter());
    let authors: HashSet<&str> = comments.clone().map(|c| c.author.as_str()).collect();
    PushSummary {
        total_videos: report.total,
        successful: report.successful,
        failed: report.failed,
        skipped: 0,
        total_comments: comments.clone().count(),
        total_likes: comments.map(|c| c.likes).sum(),
        unique_authors: authors.len(),
        duration: Some(elapsed),
    }
}
