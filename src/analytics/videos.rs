//! Aggregates over the tracked videos

use super::format::{duration_minutes, round_to};
use super::{rank_counts, WordCount};
use crate::model::{tokenize, Video};
use chrono::{Datelike, Timelike};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// Entries kept in each top list
pub const TOP_VIDEOS: usize = 10;

/// Channels kept in the channel ranking
pub const TOP_CHANNELS: usize = 20;

/// Words kept in the title word cloud
pub const TITLE_WORDS: usize = 50;

const TITLE_STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "with", "from", "this",
    "that",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoOverview {
    pub total_videos: usize,
    pub total_views: u64,
    pub total_likes: u64,
    pub total_comments: u64,
    pub avg_views: u64,
    pub avg_likes: u64,
    pub avg_comments: u64,
    /// (likes + comments) / views over all videos, as a percentage
    pub engagement_rate: f64,
    /// Mean per-video score out of 100
    pub virality_score: f64,
}

/// A video in a ranking, with the metric it was ranked by
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedVideo {
    pub id: String,
    pub title: String,
    pub channel: String,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopVideos {
    pub by_views: Vec<RankedVideo>,
    pub by_likes: Vec<RankedVideo>,
    pub by_comments: Vec<RankedVideo>,
    pub by_engagement: Vec<RankedVideo>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStats {
    pub name: String,
    pub videos: usize,
    pub total_views: u64,
    pub total_likes: u64,
    pub total_comments: u64,
    pub avg_views: u64,
    pub avg_likes: u64,
    pub avg_comments: u64,
    pub engagement_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelRollup {
    pub total_channels: usize,
    pub top_channels: Vec<ChannelStats>,
}

/// Publish-time histograms in UTC
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PublishTimes {
    pub hourly: [u64; 24],
    /// Index 0 is Sunday
    pub weekly: [u64; 7],
    /// Keyed by `YYYY-MM`
    pub monthly: BTreeMap<String, u64>,
}

/// Video counts by length
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DurationBuckets {
    /// Under 5 minutes, unparseable durations included
    pub short: u64,
    /// 5 to 15 minutes
    pub medium: u64,
    /// 15 to 30 minutes
    pub long: u64,
    /// 30 minutes and over
    pub very_long: u64,
}

fn average(total: u64, count: usize) -> u64 {
    if count == 0 {
        0
    } else {
        (total as f64 / count as f64).round() as u64
    }
}

fn engagement(likes: u64, comments: u64, views: u64) -> f64 {
    if views == 0 {
        0.0
    } else {
        round_to((likes + comments) as f64 / views as f64 * 100.0, 2)
    }
}

/// Per-video score: views, likes and comments each capped at a reference
/// level (1M, 100K, 10K) and weighted 40/30/30
pub fn virality(video: &Video) -> f64 {
    let views = (video.views as f64 / 1_000_000.0).min(1.0) * 40.0;
    let likes = (video.likes as f64 / 100_000.0).min(1.0) * 30.0;
    let comments = (video.comments as f64 / 10_000.0).min(1.0) * 30.0;
    views + likes + comments
}

pub fn overview(videos: &[Video]) -> VideoOverview {
    let total_views: u64 = videos.iter().map(|v| v.views).sum();
    let total_likes: u64 = videos.iter().map(|v| v.likes).sum();
    let total_comments: u64 = videos.iter().map(|v| v.comments).sum();

    let virality_score = if videos.is_empty() {
        0.0
    } else {
        round_to(
            videos.iter().map(virality).sum::<f64>() / videos.len() as f64,
            1,
        )
    };

    VideoOverview {
        total_videos: videos.len(),
        total_views,
        total_likes,
        total_comments,
        avg_views: average(total_views, videos.len()),
        avg_likes: average(total_likes, videos.len()),
        avg_comments: average(total_comments, videos.len()),
        engagement_rate: engagement(total_likes, total_comments, total_views),
        virality_score,
    }
}

/// Ranks videos by `metric`, highest first; ties keep collection order
pub fn top_by(videos: &[Video], limit: usize, metric: impl Fn(&Video) -> f64) -> Vec<RankedVideo> {
    let mut ranked: Vec<RankedVideo> = videos
        .iter()
        .map(|v| RankedVideo {
            id: v.id.clone(),
            title: v.title.clone(),
            channel: v.channel.clone(),
            value: metric(v),
        })
        .collect();
    ranked.sort_by(|a, b| b.value.partial_cmp(&a.value).unwrap_or(Ordering::Equal));
    ranked.truncate(limit);
    ranked
}

pub fn top_videos(videos: &[Video]) -> TopVideos {
    TopVideos {
        by_views: top_by(videos, TOP_VIDEOS, |v| v.views as f64),
        by_likes: top_by(videos, TOP_VIDEOS, |v| v.likes as f64),
        by_comments: top_by(videos, TOP_VIDEOS, |v| v.comments as f64),
        by_engagement: top_by(videos, TOP_VIDEOS, |v| {
            engagement(v.likes, v.comments, v.views)
        }),
    }
}

/// Groups videos by channel and ranks channels by total views
pub fn channel_rollup(videos: &[Video]) -> ChannelRollup {
    let mut order: Vec<ChannelStats> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for video in videos {
        let slot = *index.entry(video.channel.as_str()).or_insert_with(|| {
            order.push(ChannelStats {
                name: video.channel.clone(),
                videos: 0,
                total_views: 0,
                total_likes: 0,
                total_comments: 0,
                avg_views: 0,
                avg_likes: 0,
                avg_comments: 0,
                engagement_rate: 0.0,
            });
            order.len() - 1
        });
        let stats = &mut order[slot];
        stats.videos += 1;
        stats.total_views += video.views;
        stats.total_likes += video.likes;
        stats.total_comments += video.comments;
    }

    for stats in &mut order {
        stats.avg_views = average(stats.total_views, stats.videos);
        stats.avg_likes = average(stats.total_likes, stats.videos);
        stats.avg_comments = average(stats.total_comments, stats.videos);
        stats.engagement_rate = engagement(stats.total_likes, stats.total_comments, stats.total_views);
    }

    let total_channels = order.len();
    order.sort_by(|a, b| b.total_views.cmp(&a.total_views));
    order.truncate(TOP_CHANNELS);

    ChannelRollup {
        total_channels,
        top_channels: order,
    }
}

pub fn publish_times(videos: &[Video]) -> PublishTimes {
    let mut times = PublishTimes::default();
    for video in videos {
        let at = video.published_at;
        times.hourly[at.hour() as usize] += 1;
        times.weekly[at.weekday().num_days_from_sunday() as usize] += 1;
        *times
            .monthly
            .entry(at.format("%Y-%m").to_string())
            .or_insert(0) += 1;
    }
    times
}

pub fn duration_buckets(videos: &[Video]) -> DurationBuckets {
    let mut buckets = DurationBuckets::default();
    for video in videos {
        let minutes = duration_minutes(&video.duration).unwrap_or(0.0);
        if minutes < 5.0 {
            buckets.short += 1;
        } else if minutes < 15.0 {
            buckets.medium += 1;
        } else if minutes < 30.0 {
            buckets.long += 1;
        } else {
            buckets.very_long += 1;
        }
    }
    buckets
}

/// Most frequent title words longer than three characters
pub fn title_words(videos: &[Video]) -> Vec<WordCount> {
    rank_counts(
        videos
            .iter()
            .flat_map(|v| tokenize(&v.title, 3, TITLE_STOP_WORDS)),
        TITLE_WORDS,
    )
}
