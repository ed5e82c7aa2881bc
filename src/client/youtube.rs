//! YouTube Data API v3 client
//!
//! Covers the three calls the harvester needs:
//! - `search` (paginated, 50 results per request)
//! - `videos` details for a list of ids
//! - `commentThreads` with inline replies
//!
//! Every call passes through the client's rate limiter and is charged to the
//! quota ledger when one is attached.

use crate::client::http::send_json;
use crate::config::YoutubeConfig;
use crate::model::{analyze_sentiment, detect_language, Comment, Video, VideoStatus};
use crate::state::{QuotaLedger, RateLimiter};
use crate::{FetchError, FetchOutcome};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Largest page the search and videos endpoints accept
pub const MAX_PAGE_SIZE: u32 = 50;

/// Quota units charged for one search request
pub const SEARCH_COST: u64 = 100;

/// Quota units charged for one list request (videos, commentThreads)
pub const LIST_COST: u64 = 1;

/// Result ordering accepted by the search endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchOrder {
    #[default]
    Relevance,
    Date,
    Rating,
    ViewCount,
    Title,
}

impl SearchOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Relevance => "relevance",
            Self::Date => "date",
            Self::Rating => "rating",
            Self::ViewCount => "viewCount",
            Self::Title => "title",
        }
    }
}

impl fmt::Display for SearchOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "relevance" => Ok(Self::Relevance),
            "date" => Ok(Self::Date),
            "rating" => Ok(Self::Rating),
            "viewCount" | "views" => Ok(Self::ViewCount),
            "title" => Ok(Self::Title),
            other => Err(format!("unknown search order '{}'", other)),
        }
    }
}

/// Parameters of a video search
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub query: String,
    pub max_results: u32,
    pub order: SearchOrder,
    pub published_after: Option<DateTime<Utc>>,
    pub published_before: Option<DateTime<Utc>>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>, max_results: u32) -> Self {
        Self {
            query: query.into(),
            max_results,
            order: SearchOrder::default(),
            published_after: None,
            published_before: None,
        }
    }
}

// ===== Wire types =====

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    snippet: VideoSnippet,
    #[serde(default)]
    statistics: Option<VideoStatistics>,
    #[serde(default)]
    content_details: Option<ContentDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoSnippet {
    title: String,
    #[serde(default)]
    channel_title: String,
    #[serde(default)]
    channel_id: String,
    published_at: DateTime<Utc>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    thumbnails: Option<Thumbnails>,
}

#[derive(Debug, Deserialize)]
struct Thumbnails {
    medium: Option<Thumbnail>,
    high: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

/// Counters arrive as decimal strings
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoStatistics {
    view_count: Option<String>,
    like_count: Option<String>,
    comment_count: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommentThreadResponse {
    #[serde(default)]
    items: Vec<CommentThread>,
}

#[derive(Debug, Deserialize)]
struct CommentThread {
    id: String,
    snippet: ThreadSnippet,
    #[serde(default)]
    replies: Option<ThreadReplies>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreadSnippet {
    top_level_comment: RawComment,
    #[serde(default)]
    total_reply_count: u64,
}

#[derive(Debug, Deserialize)]
struct ThreadReplies {
    #[serde(default)]
    comments: Vec<RawComment>,
}

#[derive(Debug, Deserialize)]
struct RawComment {
    id: String,
    snippet: CommentSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentSnippet {
    video_id: Option<String>,
    text_display: Option<String>,
    text_original: Option<String>,
    author_display_name: Option<String>,
    author_channel_url: Option<String>,
    author_profile_image_url: Option<String>,
    #[serde(default)]
    like_count: u64,
    published_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

fn parse_count(raw: &Option<String>) -> u64 {
    raw.as_deref()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

fn to_video(item: VideoItem, added_at: DateTime<Utc>) -> Video {
    let thumbnail = item.snippet.thumbnails.and_then(|t| {
        t.medium
            .or(t.high)
            .or(t.default)
            .map(|thumb| thumb.url)
    });
    let (views, likes, comments) = match &item.statistics {
        Some(stats) => (
            parse_count(&stats.view_count),
            parse_count(&stats.like_count),
            parse_count(&stats.comment_count),
        ),
        None => (0, 0, 0),
    };

    Video {
        url: Video::watch_url(&item.id),
        id: item.id,
        title: item.snippet.title,
        channel: item.snippet.channel_title,
        channel_id: item.snippet.channel_id,
        thumbnail,
        description: item.snippet.description,
        published_at: item.snippet.published_at,
        duration: item
            .content_details
            .and_then(|d| d.duration)
            .unwrap_or_default(),
        views,
        likes,
        comments,
        status: VideoStatus::Pending,
        added_at,
    }
}

fn to_comment(
    raw: RawComment,
    video_id: &str,
    parent_id: Option<&str>,
    reply_count: u64,
) -> Comment {
    let snippet = raw.snippet;
    let text_original = snippet
        .text_original
        .clone()
        .or_else(|| snippet.text_display.clone())
        .unwrap_or_default();
    let text = snippet
        .text_display
        .unwrap_or_else(|| text_original.clone());

    Comment {
        id: raw.id,
        video_id: snippet.video_id.unwrap_or_else(|| video_id.to_string()),
        parent_id: parent_id.map(str::to_string),
        sentiment: analyze_sentiment(&text_original),
        language: detect_language(&text_original).to_string(),
        text,
        text_original,
        author: snippet.author_display_name.unwrap_or_default(),
        author_channel: snippet.author_channel_url,
        author_image: snippet.author_profile_image_url,
        likes: snippet.like_count,
        published_at: snippet.published_at,
        updated_at: snippet.updated_at,
        is_reply: parent_id.is_some(),
        reply_count,
        translation: None,
    }
}

/// Flattens comment threads into top-level comments followed by their replies
fn flatten_threads(video_id: &str, threads: Vec<CommentThread>) -> Vec<Comment> {
    let mut comments = Vec::new();
    for thread in threads {
        let thread_id = thread.id;
        comments.push(to_comment(
            thread.snippet.top_level_comment,
            video_id,
            None,
            thread.snippet.total_reply_count,
        ));

        if let Some(replies) = thread.replies {
            for reply in replies.comments {
                comments.push(to_comment(reply, video_id, Some(&thread_id), 0));
            }
        }
    }
    comments
}

/// Client for the YouTube Data API
pub struct YoutubeClient {
    client: Client,
    base_url: String,
    api_key: String,
    limiter: RateLimiter,
    quota: Option<Arc<QuotaLedger>>,
}

impl YoutubeClient {
    /// Creates a client for the configured endpoint
    ///
    /// # Arguments
    ///
    /// * `client` - Shared HTTP client
    /// * `config` - Endpoint and pacing settings
    /// * `api_key` - Key for today, see `config::select_api_key`
    pub fn new(client: Client, config: &YoutubeConfig, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            limiter: RateLimiter::from_millis(config.min_interval),
            quota: None,
        }
    }

    /// Charges every call to `ledger`
    pub fn with_quota(mut self, ledger: Arc<QuotaLedger>) -> Self {
        self.quota = Some(ledger);
        self
    }

    fn charge(&self, units: u64) {
        if let Some(ledger) = &self.quota {
            ledger.record(1, units);
        }
    }

    fn ensure_budget(&self, units: u64) -> FetchOutcome<()> {
        match &self.quota {
            Some(ledger) if !ledger.has_budget(units) => Err(FetchError::QuotaExceeded(format!(
                "{} units needed, {} left today",
                units,
                ledger.remaining()
            ))),
            _ => Ok(()),
        }
    }

    /// Searches for videos and returns them with full details, in search order
    pub async fn search(&self, query: &SearchQuery) -> FetchOutcome<Vec<Video>> {
        let ids = self.search_ids(query).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.video_details(&ids).await
    }

    /// Collects up to `max_results` video ids, following page tokens
    pub async fn search_ids(&self, query: &SearchQuery) -> FetchOutcome<Vec<String>> {
        let text = query.query.trim();
        if text.is_empty() {
            return Err(FetchError::Validation("search query cannot be empty".to_string()));
        }
        if query.max_results == 0 {
            return Ok(Vec::new());
        }

        let mut ids: Vec<String> = Vec::new();
        let mut page_token: Option<String> = None;

        while (ids.len() as u32) < query.max_results {
            let page_size = MAX_PAGE_SIZE.min(query.max_results - ids.len() as u32);

            let mut params: Vec<(&str, String)> = vec![
                ("part", "snippet".to_string()),
                ("type", "video".to_string()),
                ("q", text.to_string()),
                ("maxResults", page_size.to_string()),
                ("order", query.order.as_str().to_string()),
                ("key", self.api_key.clone()),
            ];
            if let Some(after) = query.published_after {
                params.push(("publishedAfter", after.to_rfc3339()));
            }
            if let Some(before) = query.published_before {
                params.push(("publishedBefore", before.to_rfc3339()));
            }
            if let Some(token) = &page_token {
                params.push(("pageToken", token.clone()));
            }

            self.ensure_budget(SEARCH_COST)?;
            self.limiter.wait().await;
            let request = self
                .client
                .get(format!("{}/search", self.base_url))
                .query(&params);
            let page: FetchOutcome<SearchResponse> = send_json(request).await;
            self.charge(SEARCH_COST);
            let page = page?;

            let before = ids.len();
            for item in page.items {
                if let Some(id) = item.id.video_id {
                    if !ids.contains(&id) {
                        ids.push(id);
                    }
                }
            }
            tracing::debug!(
                "Search page for '{}' added {} ids ({} total)",
                text,
                ids.len() - before,
                ids.len()
            );

            match page.next_page_token {
                Some(token) if ids.len() > before => page_token = Some(token),
                _ => break,
            }
        }

        ids.truncate(query.max_results as usize);
        Ok(ids)
    }

    /// Fetches details for `ids`, 50 per request, preserving the given order
    ///
    /// Ids the API does not return (deleted or private videos) are left out.
    pub async fn video_details(&self, ids: &[String]) -> FetchOutcome<Vec<Video>> {
        let now = Utc::now();
        let mut found: HashMap<String, Video> = HashMap::new();

        for chunk in ids.chunks(MAX_PAGE_SIZE as usize) {
            self.ensure_budget(LIST_COST)?;
            self.limiter.wait().await;
            let request = self.client.get(format!("{}/videos", self.base_url)).query(&[
                ("part", "snippet,statistics,contentDetails".to_string()),
                ("id", chunk.join(",")),
                ("key", self.api_key.clone()),
            ]);
            let response: FetchOutcome<VideoListResponse> = send_json(request).await;
            self.charge(LIST_COST);

            for item in response?.items {
                let video = to_video(item, now);
                found.insert(video.id.clone(), video);
            }
        }

        Ok(ids.iter().filter_map(|id| found.remove(id)).collect())
    }

    /// Fetches a single video
    pub async fn video(&self, id: &str) -> FetchOutcome<Video> {
        self.video_details(&[id.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::Api(format!("video {} not found", id)))
    }

    /// Fetches the most relevant comment threads of a video, replies included
    pub async fn fetch_comments(&self, video_id: &str, max_results: u32) -> FetchOutcome<Vec<Comment>> {
        if video_id.trim().is_empty() {
            return Err(FetchError::Validation("video id cannot be empty".to_string()));
        }

        self.ensure_budget(LIST_COST)?;
        self.limiter.wait().await;
        let request = self
            .client
            .get(format!("{}/commentThreads", self.base_url))
            .query(&[
                ("part", "snippet,replies".to_string()),
                ("videoId", video_id.to_string()),
                ("maxResults", max_results.clamp(1, 100).to_string()),
                ("order", "relevance".to_string()),
                ("key", self.api_key.clone()),
            ]);
        let response: FetchOutcome<CommentThreadResponse> = send_json(request).await;
        self.charge(LIST_COST);

        let comments = flatten_threads(video_id, response?.items);
        tracing::debug!("Fetched {} comments for {}", comments.len(), video_id);
        Ok(comments)
    }
}
