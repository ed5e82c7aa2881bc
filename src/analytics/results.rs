//! Totals over the results of a comment batch

use crate::batch::{BatchSummary, FetchResult};
use crate::client::PushSummary;
use crate::model::Comment;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultStats {
    /// Top-level comments across successful items
    pub total_comments: usize,
    pub total_replies: usize,
    pub total_likes: u64,
    pub unique_authors: usize,
    /// Item ids per outcome, sorted
    pub successful: Vec<String>,
    pub failed: Vec<String>,
    pub skipped: Vec<String>,
}

/// Tallies comments, likes and authors over successful results
pub fn result_stats(results: &HashMap<String, FetchResult<Vec<Comment>>>) -> ResultStats {
    let mut stats = ResultStats::default();
    let mut authors: HashSet<&str> = HashSet::new();

    for (id, result) in results {
        match result {
            FetchResult::Success(comments) => {
                stats.successful.push(id.clone());
                for comment in comments {
                    if comment.is_reply {
                        stats.total_replies += 1;
                    } else {
                        stats.total_comments += 1;
                    }
                    stats.total_likes += comment.likes;
                    authors.insert(comment.author.as_str());
                }
            }
            FetchResult::Failure(_) => stats.failed.push(id.clone()),
            FetchResult::Skipped(_) => stats.skipped.push(id.clone()),
        }
    }

    stats.unique_authors = authors.len();
    stats.successful.sort();
    stats.failed.sort();
    stats.skipped.sort();
    stats
}

/// Builds the counters of a summary push from a finished comment batch
pub fn push_summary(summary: &BatchSummary<Vec<Comment>>) -> PushSummary {
    let stats = result_stats(&summary.results);
    PushSummary {
        total_videos: summary.total,
        successful: summary.successful,
        failed: summary.failed,
        skipped: summary.skipped,
        total_comments: stats.total_comments + stats.total_replies,
        total_likes: stats.total_likes,
        unique_authors: stats.unique_authors,
        duration: Some(summary.duration),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Sentiment;
    use crate::FetchError;
    use chrono::Utc;

    fn comment(author: &str, likes: u64, is_reply: bool) -> Comment {
        Comment {
            id: format!("{}{}", author, likes),
            video_id: "v".into(),
            parent_id: None,
            text: "hi".into(),
            text_original: "hi".into(),
            author: author.into(),
            author_channel: None,
            author_image: None,
            likes,
            published_at: Utc::now(),
            updated_at: None,
            is_reply,
            reply_count: 0,
            sentiment: Sentiment::Neutral,
            language: "en".into(),
            translation: None,
        }
    }

    #[test]
    fn test_result_stats() {
        let mut results = HashMap::new();
        results.insert(
            "v2".to_string(),
            FetchResult::Success(vec![comment("ann", 2, false), comment("bob", 1, true)]),
        );
        results.insert(
            "v1".to_string(),
            FetchResult::Success(vec![comment("ann", 4, false)]),
        );
        results.insert(
            "v3".to_string(),
            FetchResult::Failure(FetchError::Api("x".into())),
        );
        results.insert("v4".to_string(), FetchResult::Skipped("cached".into()));

        let stats = result_stats(&results);
        assert_eq!(stats.total_comments, 2);
        assert_eq!(stats.total_replies, 1);
        assert_eq!(stats.total_likes, 7);
        assert_eq!(stats.unique_authors, 2);
        assert_eq!(stats.successful, vec!["v1", "v2"]);
        assert_eq!(stats.failed, vec!["v3"]);
        assert_eq!(stats.skipped, vec!["v4"]);
    }
}
