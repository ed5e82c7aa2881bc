//! Domain records collected from the external services

mod text;

pub use text::{analyze_sentiment, detect_language, tokenize};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Processing status of a tracked video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// A video with its snippet, statistics and content details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: String,
    pub title: String,
    pub channel: String,
    pub channel_id: String,
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub description: String,
    pub published_at: DateTime<Utc>,
    /// ISO-8601 duration such as `PT4M13S`
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub comments: u64,
    pub url: String,
    #[serde(default)]
    pub status: VideoStatus,
    pub added_at: DateTime<Utc>,
}

impl Video {
    /// Watch URL for a video id
    pub fn watch_url(id: &str) -> String {
        format!("https://www.youtube.com/watch?v={}", id)
    }

    /// (likes + comments) / views as a percentage, zero without views
    pub fn engagement_rate(&self) -> f64 {
        if self.views == 0 {
            return 0.0;
        }
        (self.likes + self.comments) as f64 / self.views as f64 * 100.0
    }
}

/// Heuristic tone of a comment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    #[default]
    Neutral,
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Neutral => "neutral",
        };
        write!(f, "{}", s)
    }
}

/// A machine translation of one text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Translation {
    pub original_text: String,
    pub translated_text: String,
    pub source_lang: String,
    pub target_lang: String,
    /// Provider match quality, 0 when unknown
    #[serde(default)]
    pub confidence: f64,
    pub provider: String,
    pub timestamp: DateTime<Utc>,
    /// Number of segments for texts translated piecewise
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segments: Option<usize>,
}

/// A top-level comment or a reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub video_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Display text (may contain markup)
    pub text: String,
    pub text_original: String,
    pub author: String,
    #[serde(default)]
    pub author_channel: Option<String>,
    #[serde(default)]
    pub author_image: Option<String>,
    #[serde(default)]
    pub likes: u64,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_reply: bool,
    #[serde(default)]
    pub reply_count: u64,
    #[serde(default)]
    pub sentiment: Sentiment,
    /// Heuristic language code (`zh`, `ja`, `ko` or `en`)
    #[serde(default)]
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<Translation>,
}

impl Comment {
    pub fn has_replies(&self) -> bool {
        self.reply_count > 0
    }

    /// True if the comment already carries a translation into `target_lang`
    pub fn is_translated_to(&self, target_lang: &str) -> bool {
        self.translation
            .as_ref()
            .is_some_and(|t| t.target_lang == target_lang)
    }
}

/// Extracts a video id from a watch URL, a short link or a bare id
///
/// # Example
///
/// ```
/// use tube_harvest::model::extract_video_id;
///
/// assert_eq!(
///     extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
///     Some("dQw4w9WgXcQ".to_string())
/// );
/// assert_eq!(extract_video_id("https://youtu.be/dQw4w9WgXcQ"), Some("dQw4w9WgXcQ".to_string()));
/// assert_eq!(extract_video_id("dQw4w9WgXcQ"), Some("dQw4w9WgXcQ".to_string()));
/// ```
pub fn extract_video_id(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(url) = url::Url::parse(input) {
        let host = url.host_str()?.trim_start_matches("www.").trim_start_matches("m.");
        let candidate = match host {
            "youtu.be" => url.path_segments()?.next().map(str::to_string),
            "youtube.com" => {
                let mut segments = url.path_segments()?;
                match segments.next() {
                    Some("watch") => url
                        .query_pairs()
                        .find(|(k, _)| k == "v")
                        .map(|(_, v)| v.into_owned()),
                    Some("embed") | Some("shorts") | Some("live") => {
                        segments.next().map(str::to_string)
                    }
                    _ => None,
                }
            }
            _ => None,
        };
        return candidate.filter(|id| is_video_id(id));
    }

    if is_video_id(input) {
        Some(input.to_string())
    } else {
        None
    }
}

fn is_video_id(s: &str) -> bool {
    s.len() == 11
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
