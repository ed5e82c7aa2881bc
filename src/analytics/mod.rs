//! Analytics over collected videos and comments
//!
//! Every function here is pure: it reads records and returns aggregates.
//! `generate_report` bundles them, `print_report` renders a report to stdout.

mod comments;
mod format;
mod results;
mod videos;

pub use comments::{
    analyze_comments, comment_times, top_commenters, word_cloud, CommentAnalytics, CommentTimes,
    Commenter, SentimentCounts,
};
pub use format::{duration_minutes, format_duration, format_number};
pub use results::{push_summary, result_stats, ResultStats};
pub use videos::{
    channel_rollup, duration_buckets, overview, publish_times, title_words, top_by, top_videos,
    virality, ChannelRollup, ChannelStats, DurationBuckets, PublishTimes, RankedVideo, TopVideos,
    VideoOverview,
};

use crate::model::{Comment, Video};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// A word and how often it occurred
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WordCount {
    pub word: String,
    pub count: u64,
}

/// Counts words and keeps the `limit` most frequent, ties in first-seen order
pub(crate) fn rank_counts(words: impl Iterator<Item = String>, limit: usize) -> Vec<WordCount> {
    let mut ranked: Vec<WordCount> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for word in words {
        match index.get(&word) {
            Some(&i) => ranked[i].count += 1,
            None => {
                index.insert(word.clone(), ranked.len());
                ranked.push(WordCount { word, count: 1 });
            }
        }
    }

    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(limit);
    ranked
}

/// Full analytics report
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub generated_at: DateTime<Utc>,
    pub overview: VideoOverview,
    pub top_videos: TopVideos,
    pub channels: ChannelRollup,
    pub publish_times: PublishTimes,
    pub durations: DurationBuckets,
    pub title_words: Vec<WordCount>,
    pub comments: CommentAnalytics,
}

/// Runs every analytics pass over `videos` and `comments`
pub fn generate_report(videos: &[Video], comments: &[Comment]) -> AnalyticsReport {
    AnalyticsReport {
        generated_at: Utc::now(),
        overview: overview(videos),
        top_videos: top_videos(videos),
        channels: channel_rollup(videos),
        publish_times: publish_times(videos),
        durations: duration_buckets(videos),
        title_words: title_words(videos),
        comments: analyze_comments(comments),
    }
}

const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Prints a report to stdout in a formatted manner
///
/// # Arguments
///
/// * `report` - The report to display
pub fn print_report(report: &AnalyticsReport) {
    let o = &report.overview;
    println!("=== Analytics Report ===\n");

    println!("Overview:");
    println!("  Videos: {}", o.total_videos);
    println!(
        "  Views: {} (avg {})",
        format_number(o.total_views),
        format_number(o.avg_views)
    );
    println!(
        "  Likes: {} (avg {})",
        format_number(o.total_likes),
        format_number(o.avg_likes)
    );
    println!(
        "  Comments: {} (avg {})",
        format_number(o.total_comments),
        format_number(o.avg_comments)
    );
    println!("  Engagement rate: {:.2}%", o.engagement_rate);
    println!("  Virality score: {:.1}/100", o.virality_score);
    println!();

    if !report.top_videos.by_views.is_empty() {
        println!("Top Videos by Views:");
        for (i, v) in report.top_videos.by_views.iter().enumerate() {
            println!(
                "  {:>2}. {} ({}) - {}",
                i + 1,
                v.title,
                v.channel,
                format_number(v.value as u64)
            );
        }
        println!();

        println!("Top Videos by Engagement:");
        for (i, v) in report.top_videos.by_engagement.iter().enumerate() {
            println!("  {:>2}. {} - {:.2}%", i + 1, v.title, v.value);
        }
        println!();
    }

    if !report.channels.top_channels.is_empty() {
        println!("Channels ({}):", report.channels.total_channels);
        for c in report.channels.top_channels.iter().take(5) {
            println!(
                "  {}: {} videos, {} views, {:.2}% engagement",
                c.name,
                c.videos,
                format_number(c.total_views),
                c.engagement_rate
            );
        }
        println!();
    }

    let d = &report.durations;
    println!("Durations:");
    println!("  Under 5 min: {}", d.short);
    println!("  5-15 min: {}", d.medium);
    println!("  15-30 min: {}", d.long);
    println!("  30 min and over: {}", d.very_long);
    println!();

    if o.total_videos > 0 {
        // Busiest hour and weekday
        let (hour, hour_count) = busiest(&report.publish_times.hourly);
        let (day, day_count) = busiest(&report.publish_times.weekly);
        println!("Publishing (UTC):");
        println!("  Busiest hour: {:02}:00 ({} videos)", hour, hour_count);
        println!("  Busiest day: {} ({} videos)", WEEKDAYS[day], day_count);
        println!();
    }

    if !report.title_words.is_empty() {
        let words: Vec<String> = report
            .title_words
            .iter()
            .take(15)
            .map(|w| format!("{} ({})", w.word, w.count))
            .collect();
        println!("Title Words:");
        println!("  {}", words.join(", "));
        println!();
    }

    let c = &report.comments;
    if c.total_comments > 0 {
        println!("Comments:");
        println!(
            "  Total: {} ({} top-level, {} replies)",
            c.total_comments, c.top_level_comments, c.replies
        );
        println!("  Likes: {} (avg {:.2})", c.total_likes, c.average_likes);
        println!(
            "  Sentiment: {} positive, {} negative, {} neutral",
            c.sentiment.positive, c.sentiment.negative, c.sentiment.neutral
        );
        let languages: Vec<String> = c
            .languages
            .iter()
            .map(|(lang, count)| format!("{} {}", lang, count))
            .collect();
        println!("  Languages: {}", languages.join(", "));
        println!("  Engagement rate: {:.2}%", c.engagement_rate);
        if !c.top_commenters.is_empty() {
            println!("  Top commenters:");
            for commenter in &c.top_commenters {
                println!(
                    "    {} ({} comments, {} likes)",
                    commenter.name, commenter.count, commenter.total_likes
                );
            }
        }
        println!();
    }
}

fn busiest(counts: &[u64]) -> (usize, u64) {
    counts
        .iter()
        .copied()
        .enumerate()
        .fold((0, 0), |best, (i, n)| if n > best.1 { (i, n) } else { best })
}
