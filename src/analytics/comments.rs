//! Aggregates over collected comments

use super::format::round_to;
use super::{rank_counts, WordCount};
use crate::model::{tokenize, Comment, Sentiment};
use chrono::Timelike;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Commenters kept in the ranking
pub const TOP_COMMENTERS: usize = 10;

/// Words kept in the comment word cloud
pub const CLOUD_WORDS: usize = 50;

const COMMENT_STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "and", "you", "this", "that", "的", "是", "在",
    "了", "和",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SentimentCounts {
    pub positive: u64,
    pub negative: u64,
    pub neutral: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Commenter {
    pub name: String,
    pub count: u64,
    pub total_likes: u64,
    pub image: Option<String>,
}

/// Comment counts by publish time, in UTC
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CommentTimes {
    pub hourly: [u64; 24],
    /// Keyed by `YYYY-MM-DD`
    pub daily: BTreeMap<String, u64>,
    /// Keyed by `YYYY-MM`
    pub monthly: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentAnalytics {
    pub total_comments: usize,
    pub top_level_comments: usize,
    pub replies: usize,
    pub total_likes: u64,
    pub average_likes: f64,
    pub sentiment: SentimentCounts,
    pub languages: BTreeMap<String, u64>,
    pub top_commenters: Vec<Commenter>,
    pub word_cloud: Vec<WordCount>,
    pub time_distribution: CommentTimes,
    /// Share of comments that are replies or have at least one like
    pub engagement_rate: f64,
}

/// Computes comment analytics for one video or any comment set
pub fn analyze_comments(comments: &[Comment]) -> CommentAnalytics {
    let total = comments.len();
    let replies = comments.iter().filter(|c| c.is_reply).count();
    let total_likes: u64 = comments.iter().map(|c| c.likes).sum();

    let mut sentiment = SentimentCounts::default();
    let mut languages: BTreeMap<String, u64> = BTreeMap::new();
    for comment in comments {
        match comment.sentiment {
            Sentiment::Positive => sentiment.positive += 1,
            Sentiment::Negative => sentiment.negative += 1,
            Sentiment::Neutral => sentiment.neutral += 1,
        }
        *languages.entry(comment.language.clone()).or_insert(0) += 1;
    }

    let (average_likes, engagement_rate) = if total == 0 {
        (0.0, 0.0)
    } else {
        let engaged = comments.iter().filter(|c| c.likes > 0).count() + replies;
        (
            round_to(total_likes as f64 / total as f64, 2),
            round_to(engaged as f64 / total as f64 * 100.0, 2),
        )
    };

    CommentAnalytics {
        total_comments: total,
        top_level_comments: total - replies,
        replies,
        total_likes,
        average_likes,
        sentiment,
        languages,
        top_commenters: top_commenters(comments),
        word_cloud: word_cloud(comments),
        time_distribution: comment_times(comments),
        engagement_rate,
    }
}

/// Most active authors by comment count; ties keep first appearance
pub fn top_commenters(comments: &[Comment]) -> Vec<Commenter> {
    let mut order: Vec<Commenter> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for comment in comments {
        let slot = *index.entry(comment.author.as_str()).or_insert_with(|| {
            order.push(Commenter {
                name: comment.author.clone(),
                count: 0,
                total_likes: 0,
                image: comment.author_image.clone(),
            });
            order.len() - 1
        });
        order[slot].count += 1;
        order[slot].total_likes += comment.likes;
    }

    order.sort_by(|a, b| b.count.cmp(&a.count));
    order.truncate(TOP_COMMENTERS);
    order
}

/// Most frequent words longer than two characters in the original text
pub fn word_cloud(comments: &[Comment]) -> Vec<WordCount> {
    rank_counts(
        comments
            .iter()
            .flat_map(|c| tokenize(&c.text_original, 2, COMMENT_STOP_WORDS)),
        CLOUD_WORDS,
    )
}

pub fn comment_times(comments: &[Comment]) -> CommentTimes {
    let mut times = CommentTimes::default();
    for comment in comments {
        let at = comment.published_at;
        times.hourly[at.hour() as usize] += 1;
        *times
            .daily
            .entry(at.format("%Y-%m-%d").to_string())
            .or_insert(0) += 1;
        *times
            .monthly
            .entry(at.format("%Y-%m").to_string())
            .or_insert(0) += 1;
    }
    times
}
