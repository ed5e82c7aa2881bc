//! Plain-text message templates for webhook pushes

use crate::analytics::{format_duration, format_number};
use crate::model::{Comment, Video};
use std::time::Duration;

/// Characters kept from a video description
const DESCRIPTION_LIMIT: usize = 300;

/// Characters kept from a comment in the full template
const COMMENT_LIMIT: usize = 200;

/// Characters kept from a comment in the simple template
const SIMPLE_COMMENT_LIMIT: usize = 100;

/// Headroom reserved for the truncation notice
const TRUNCATION_HEADROOM: usize = 100;

/// Layout of a video message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageTemplate {
    /// Description, statistics and up to `max_comments` comments
    #[default]
    Full,
    /// Title, channel, link and three comments
    Simple,
}

impl std::str::FromStr for MessageTemplate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(Self::Full),
            "simple" => Ok(Self::Simple),
            other => Err(format!("unknown template '{}'", other)),
        }
    }
}

/// Options for rendering a video message
#[derive(Debug, Clone)]
pub struct MessageOptions {
    pub template: MessageTemplate,
    pub max_comments: usize,
}

impl Default for MessageOptions {
    fn default() -> Self {
        Self {
            template: MessageTemplate::Full,
            max_comments: 50,
        }
    }
}

/// Counters shown in a batch summary message
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PushSummary {
    pub total_videos: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total_comments: usize,
    pub total_likes: u64,
    pub unique_authors: usize,
    pub duration: Option<Duration>,
}

/// Cuts `text` to `max_chars` characters, appending an ellipsis when cut
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push_str("...");
    cut
}

/// Enforces the webhook's message size limit
///
/// Messages over `max_chars` keep their first `max_chars - 100` characters
/// followed by a notice.
///
/// # Returns
///
/// The message to send and whether it was truncated
pub fn fit_message(text: &str, max_chars: usize) -> (String, bool) {
    if text.chars().count() <= max_chars {
        return (text.to_string(), false);
    }
    let keep = max_chars.saturating_sub(TRUNCATION_HEADROOM);
    let mut cut: String = text.chars().take(keep).collect();
    cut.push_str("\n\n...(message too long, truncated)");
    (cut, true)
}

fn format_timestamp(ts: &chrono::DateTime<chrono::Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M").to_string()
}

/// Top-level comments ordered by likes, ties in collection order
fn top_comments(comments: &[Comment]) -> Vec<&Comment> {
    let mut top: Vec<&Comment> = comments.iter().filter(|c| !c.is_reply).collect();
    top.sort_by(|a, b| b.likes.cmp(&a.likes));
    top
}

/// Renders one video and its comments
pub fn format_video_message(video: &Video, comments: &[Comment], options: &MessageOptions) -> String {
    match options.template {
        MessageTemplate::Full => format_full(video, comments, options.max_comments),
        MessageTemplate::Simple => format_simple(video, comments),
    }
}

fn format_full(video: &Video, comments: &[Comment], max_comments: usize) -> String {
    let mut message = format!("Title: {}\n\n", video.title);

    if !video.description.trim().is_empty() {
        message.push_str(&format!(
            "Description:\n{}\n\n",
            truncate_text(video.description.trim(), DESCRIPTION_LIMIT)
        ));
    }

    message.push_str(&format!("Link: {}\n", video.url));
    message.push_str(&format!("Channel: {}\n", video.channel));
    if video.views > 0 {
        message.push_str(&format!("Views: {}\n", format_number(video.views)));
    }
    if video.comments > 0 {
        message.push_str(&format!("Comments: {}\n", format_number(video.comments)));
    }
    message.push_str(&format!("Published: {}\n", format_timestamp(&video.published_at)));

    let top = top_comments(comments);
    if !top.is_empty() {
        message.push_str("\nComments\n\n");
        for (i, comment) in top.iter().take(max_comments).enumerate() {
            let body = match &comment.translation {
                Some(t) => format!(
                    "{}\n   [{}] {}",
                    truncate_text(&comment.text_original, COMMENT_LIMIT),
                    t.target_lang,
                    truncate_text(&t.translated_text, COMMENT_LIMIT)
                ),
                None => truncate_text(&comment.text_original, COMMENT_LIMIT),
            };
            message.push_str(&format!(
                "{}. [{}] (likes {}) - {}\n   {}\n\n",
                i + 1,
                comment.author,
                comment.likes,
                format_timestamp(&comment.published_at),
                body
            ));
        }
        if top.len() > max_comments {
            message.push_str(&format!(
                "... {} more comments not shown\n",
                top.len() - max_comments
            ));
        }
    }

    message
}

fn format_simple(video: &Video, comments: &[Comment]) -> String {
    let mut message = format!("{}\n\n", video.title);
    message.push_str(&format!("{}\n", video.channel));
    message.push_str(&format!("{}\n", video.url));
    if video.views > 0 {
        message.push_str(&format!("{} views\n", format_number(video.views)));
    }

    let top = top_comments(comments);
    if !top.is_empty() {
        message.push_str("\nTop comments:\n");
        for (i, comment) in top.iter().take(3).enumerate() {
            message.push_str(&format!(
                "{}. {}: {}\n",
                i + 1,
                comment.author,
                truncate_text(&comment.text_original, SIMPLE_COMMENT_LIMIT)
            ));
        }
    }

    message
}

/// Renders the summary sent after a multi-video push or batch
pub fn format_summary(summary: &PushSummary) -> String {
    let mut text = String::from("Batch finished\n\n");
    text.push_str(&format!("Videos: {}\n", summary.total_videos));
    text.push_str(&format!("Successful: {}\n", summary.successful));
    text.push_str(&format!("Failed: {}\n", summary.failed));
    text.push_str(&format!("Skipped: {}\n", summary.skipped));
    text.push_str(&format!("Comments collected: {}\n", summary.total_comments));
    text.push_str(&format!("Total likes: {}\n", format_number(summary.total_likes)));
    text.push_str(&format!("Unique authors: {}\n", summary.unique_authors));
    if let Some(duration) = summary.duration {
        text.push_str(&format!("Duration: {}\n", format_duration(duration)));
    }
    text
}

/// Renders a failure notice for a video that could not be processed
pub fn format_error_message(video: &Video, error: &str) -> String {
    format!(
        "Failed to process video\n\nTitle: {}\nLink: {}\n\nError: {}",
        video.title, video.url, error
    )
}
