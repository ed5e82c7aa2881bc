//! Session orchestrator
//!
//! A `Session` owns every component for one process: storage, the HTTP
//! client, API clients, caches, the quota ledger, the history log, the batch
//! runner and the tracked video collection. Components receive their handles
//! from here; nothing is global.

use crate::analytics::{generate_report, push_summary, AnalyticsReport};
use crate::batch::{
    BatchObserver, BatchRunner, BatchSummary, CommentAdapter, TranslationAdapter, TranslationJob,
};
use crate::cache::ResultCache;
use crate::client::{
    build_http_client, MessageOptions, PushReport, PushSummary, SearchQuery, TranslationService,
    TranslationStats, WebhookClient, YoutubeClient,
};
use crate::config::{select_api_key, Config};
use crate::history::{HistoryLog, SearchKind};
use crate::model::{extract_video_id, Comment, Translation, Video, VideoStatus};
use crate::state::{QuotaLedger, UsageStats};
use crate::storage::{
    keys, load_json, open_storage, share, store_json, RunKind, RunOutcome, RunRecord, RunStatus,
    SharedStorage,
};
use crate::{HarvestError, Result};
use chrono::Utc;
use reqwest::Client;
use serde_json::json;
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, PoisonError};

/// API usage and cache sizes at a point in time
#[derive(Debug, Clone)]
pub struct UsageReport {
    pub api: UsageStats,
    pub daily_quota: u64,
    pub remaining_quota: u64,
    pub translation: TranslationStats,
    pub translation_cache_entries: usize,
    pub comment_cache_entries: usize,
}

pub struct Session {
    config: Config,
    storage: SharedStorage,
    client: Client,
    youtube: Arc<YoutubeClient>,
    translator: Arc<TranslationService>,
    comment_cache: Arc<ResultCache<Vec<Comment>>>,
    quota: Arc<QuotaLedger>,
    history: HistoryLog,
    runner: Arc<BatchRunner>,
    videos: Vec<Video>,
}

impl Session {
    /// Opens the configured database and builds every component
    ///
    /// # Returns
    ///
    /// * `Ok(Session)` - Ready to use
    /// * `Err(HarvestError)` - The database could not be opened or no API key is configured
    pub fn open(config: Config) -> Result<Self> {
        let storage = open_storage(Path::new(&config.storage.database_path))?;
        Self::with_storage(config, share(storage))
    }

    /// Builds a session on an existing storage handle
    pub fn with_storage(config: Config, storage: SharedStorage) -> Result<Self> {
        let client = build_http_client(config.translation.contact_email.as_deref())?;

        let api_key = select_api_key(&config.youtube.api_keys, Utc::now().date_naive())
            .ok_or_else(|| HarvestError::Validation("no YouTube API key configured".to_string()))?
            .to_string();

        let quota = Arc::new(QuotaLedger::load(storage.clone(), config.youtube.daily_quota));
        let youtube = Arc::new(
            YoutubeClient::new(client.clone(), &config.youtube, api_key).with_quota(quota.clone()),
        );

        let translation_cache = Arc::new(ResultCache::<Translation>::load(
            keys::TRANSLATION_CACHE,
            storage.clone(),
            &config.cache,
        ));
        let translator = Arc::new(TranslationService::new(
            client.clone(),
            &config.translation,
            translation_cache,
        ));
        let comment_cache = Arc::new(ResultCache::load(keys::COMMENTS, storage.clone(), &config.cache));

        let history = HistoryLog::load(storage.clone(), config.history.max_items);
        let runner = Arc::new(BatchRunner::from_config(&config.batch).with_quota(quota.clone()));

        let videos: Vec<Video> = {
            let guard = storage.lock().unwrap_or_else(PoisonError::into_inner);
            match load_json(&*guard, keys::VIDEOS) {
                Ok(found) => found.unwrap_or_default(),
                Err(e) => {
                    tracing::warn!("Stored video list is unreadable, starting empty: {}", e);
                    Vec::new()
                }
            }
        };
        tracing::debug!("Session opened with {} tracked videos", videos.len());

        Ok(Self {
            config,
            storage,
            client,
            youtube,
            translator,
            comment_cache,
            quota,
            history,
            runner,
            videos,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Handle to the batch runner, for pausing or cancelling from another task
    pub fn runner(&self) -> Arc<BatchRunner> {
        Arc::clone(&self.runner)
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut HistoryLog {
        &mut self.history
    }

    pub fn videos(&self) -> &[Video] {
        &self.videos
    }

    pub fn video(&self, id: &str) -> Option<&Video> {
        self.videos.iter().find(|v| v.id == id)
    }

    /// Cached comments of a video
    pub fn comments(&self, video_id: &str) -> Option<Vec<Comment>> {
        self.comment_cache.lookup(video_id)
    }

    fn save_videos(&self) -> Result<()> {
        let mut guard = self.storage.lock().unwrap_or_else(PoisonError::into_inner);
        store_json(&mut *guard, keys::VIDEOS, &self.videos)?;
        Ok(())
    }

    fn record_action(&mut self, action: &str, details: serde_json::Value) {
        if let Err(e) = self.history.record_action(action, details) {
            tracing::warn!("Failed to record action '{}': {}", action, e);
        }
    }

    /// Searches YouTube and records the query in the search history
    pub async fn search_videos(&mut self, query: &SearchQuery) -> Result<Vec<Video>> {
        let videos = self.youtube.search(query).await?;
        tracing::info!("Search '{}' returned {} videos", query.query, videos.len());
        self.history
            .record_search(&query.query, SearchKind::Keyword, videos.len())?;
        Ok(videos)
    }

    /// Adds videos by URL or id, fetching their details
    ///
    /// Inputs already tracked are ignored.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<Video>)` - The newly tracked videos
    /// * `Err(HarvestError::Validation)` - An input is neither a video URL nor an id
    pub async fn add_videos(&mut self, inputs: &[String]) -> Result<Vec<Video>> {
        let mut ids: Vec<String> = Vec::new();
        for input in inputs {
            let id = extract_video_id(input).ok_or_else(|| {
                HarvestError::Validation(format!("'{}' is not a video URL or id", input))
            })?;
            if self.video(&id).is_none() && !ids.contains(&id) {
                ids.push(id);
            }
        }
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        for input in inputs.iter().filter(|i| i.contains("://")) {
            self.history.record_search(input, SearchKind::Url, 1)?;
        }

        let fetched = self.youtube.video_details(&ids).await?;
        for id in &ids {
            if !fetched.iter().any(|v| &v.id == id) {
                tracing::warn!("Video {} was not returned by the API", id);
            }
        }
        self.track_videos(fetched.clone())?;
        Ok(fetched)
    }

    /// Tracks already fetched videos, such as search results
    ///
    /// # Returns
    ///
    /// The number of videos that were not tracked before
    pub fn track_videos(&mut self, videos: Vec<Video>) -> Result<usize> {
        let mut added = 0;
        for video in videos {
            if self.video(&video.id).is_none() {
                self.videos.push(video);
                added += 1;
            }
        }
        if added > 0 {
            self.save_videos()?;
            self.record_action("add_videos", json!({ "count": added }));
        }
        Ok(added)
    }

    /// Stops tracking a video; its cached comments are kept
    pub fn remove_video(&mut self, id: &str) -> Result<Video> {
        let index = self
            .videos
            .iter()
            .position(|v| v.id == id)
            .ok_or_else(|| HarvestError::NotFound(format!("video {}", id)))?;
        let removed = self.videos.remove(index);
        self.save_videos()?;
        self.record_action("remove_video", json!({ "id": id }));
        Ok(removed)
    }

    /// Returns a tracked video with its cached comments and records the view
    pub fn view_video(&mut self, id: &str) -> Result<(Video, Vec<Comment>)> {
        let video = self
            .video(id)
            .cloned()
            .ok_or_else(|| HarvestError::NotFound(format!("video {}", id)))?;
        self.history.record_view(&video)?;
        let comments = self.comments(id).unwrap_or_default();
        Ok((video, comments))
    }

    /// Tracked videos matching `ids`, or all of them when `ids` is empty
    fn select_videos(&self, ids: &[String]) -> Result<Vec<Video>> {
        if ids.is_empty() {
            return Ok(self.videos.clone());
        }
        ids.iter()
            .map(|id| {
                self.video(id)
                    .cloned()
                    .ok_or_else(|| HarvestError::NotFound(format!("video {}", id)))
            })
            .collect()
    }

    fn begin_run(&self, kind: RunKind, total: usize) -> Result<i64> {
        let mut guard = self.storage.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.create_run(kind, total as u64)?)
    }

    fn finish_run<P>(&self, run_id: i64, outcome: &Result<BatchSummary<P>>) -> Result<()> {
        let record = match outcome {
            Ok(summary) => RunOutcome {
                status: if summary.aborted.is_some() {
                    RunStatus::Failed
                } else if summary.cancelled {
                    RunStatus::Cancelled
                } else {
                    RunStatus::Completed
                },
                processed: summary.processed as u64,
                successful: summary.successful as u64,
                failed: summary.failed as u64,
                skipped: summary.skipped as u64,
                error_message: summary.abort_error().map(|e| e.to_string()),
            },
            Err(e) => RunOutcome {
                status: RunStatus::Failed,
                processed: 0,
                successful: 0,
                failed: 0,
                skipped: 0,
                error_message: Some(e.to_string()),
            },
        };
        let mut guard = self.storage.lock().unwrap_or_else(PoisonError::into_inner);
        guard.finish_run(run_id, &record)?;
        Ok(())
    }

    /// Collects comments for tracked videos in one paced batch
    ///
    /// # Arguments
    ///
    /// * `ids` - Videos to process; empty means every tracked video
    /// * `observer` - Receives progress and completion events
    ///
    /// Videos processed before an abort keep their updated status; the
    /// abort is returned after they are saved.
    pub async fn collect_comments(
        &mut self,
        ids: &[String],
        observer: &dyn BatchObserver<Vec<Comment>>,
    ) -> Result<BatchSummary<Vec<Comment>>> {
        let targets = self.select_videos(ids)?;
        let adapter = CommentAdapter::new(
            Arc::clone(&self.youtube),
            Arc::clone(&self.comment_cache),
            self.config.youtube.max_comments,
            self.config.batch.comment_cost,
        );

        let run_id = self.begin_run(RunKind::Comments, targets.len())?;
        let outcome = self.runner.execute(&adapter, targets, observer).await;
        self.finish_run(run_id, &outcome)?;
        let summary = outcome?;

        for video in &mut self.videos {
            match summary.results.get(&video.id) {
                Some(result) if result.is_failure() => video.status = VideoStatus::Failed,
                Some(_) => video.status = VideoStatus::Completed,
                None => {}
            }
        }
        self.save_videos()?;
        self.record_action(
            "collect_comments",
            json!({
                "run": run_id,
                "processed": summary.processed,
                "successful": summary.successful,
                "failed": summary.failed,
                "skipped": summary.skipped,
                "cancelled": summary.cancelled,
                "aborted": summary.aborted.is_some(),
            }),
        );
        summary.into_result()
    }

    /// Translates cached comments of tracked videos in one paced batch
    ///
    /// Videos without cached comments are left out. Translated comments are
    /// written back to the comment cache.
    pub async fn translate_comments(
        &mut self,
        ids: &[String],
        target_lang: Option<&str>,
        observer: &dyn BatchObserver<Vec<Comment>>,
    ) -> Result<BatchSummary<Vec<Comment>>> {
        let target = target_lang
            .unwrap_or(self.config.translation.default_target.as_str())
            .to_string();

        let jobs: Vec<TranslationJob> = self
            .select_videos(ids)?
            .into_iter()
            .filter_map(|video| match self.comment_cache.lookup(&video.id) {
                Some(comments) => Some(TranslationJob {
                    video_id: video.id,
                    title: video.title,
                    comments,
                }),
                None => {
                    tracing::info!("No cached comments for {}, not translating", video.id);
                    None
                }
            })
            .collect();

        let adapter = TranslationAdapter::new(
            Arc::clone(&self.translator),
            target.as_str(),
            self.config.translation.source_lang.as_str(),
            self.config.translation.max_comments,
        );

        let run_id = self.begin_run(RunKind::Translation, jobs.len())?;
        let outcome = self.runner.execute(&adapter, jobs, observer).await;
        self.finish_run(run_id, &outcome)?;
        let summary = outcome?;

        for (video_id, result) in &summary.results {
            if let Some(comments) = result.payload() {
                self.comment_cache.store(video_id, comments.clone());
            }
        }
        self.record_action(
            "translate_comments",
            json!({
                "run": run_id,
                "target": target,
                "successful": summary.successful,
                "failed": summary.failed,
                "aborted": summary.aborted.is_some(),
            }),
        );
        summary.into_result()
    }

    /// Translates one text, using the translation cache
    pub async fn translate_text(
        &self,
        text: &str,
        target_lang: &str,
        source_lang: Option<&str>,
    ) -> Result<Translation> {
        let source = source_lang.unwrap_or(self.config.translation.source_lang.as_str());
        Ok(self.translator.translate_text(text, target_lang, source).await?)
    }

    fn webhook(&self) -> Result<WebhookClient> {
        Ok(WebhookClient::from_config(
            self.client.clone(),
            &self.config.webhook,
        )?)
    }

    /// Pushes one tracked video and its cached comments to the webhook
    pub async fn push_video(&mut self, id: &str, options: &MessageOptions) -> Result<()> {
        let video = self
            .video(id)
            .cloned()
            .ok_or_else(|| HarvestError::NotFound(format!("video {}", id)))?;
        let comments = self.comments(id).unwrap_or_default();

        self.webhook()?.send_video(&video, &comments, options).await?;
        self.record_action("push_video", json!({ "id": id }));
        Ok(())
    }

    /// Pushes several videos, followed by a summary when more than one was sent
    pub async fn push_videos(
        &mut self,
        ids: &[String],
        options: &MessageOptions,
        send_summary: bool,
    ) -> Result<PushReport> {
        let items: Vec<(Video, Vec<Comment>)> = self
            .select_videos(ids)?
            .into_iter()
            .map(|video| {
                let comments = self.comments(&video.id).unwrap_or_default();
                (video, comments)
            })
            .collect();

        let hook = self.webhook()?;
        let report = hook
            .send_batch(&items, options, send_summary, |p| {
                tracing::info!("Pushed {}/{} ({}%)", p.current, p.total, p.percentage);
            })
            .await;

        self.record_action(
            "push_videos",
            json!({ "successful": report.successful, "failed": report.failed }),
        );
        Ok(report)
    }

    /// Pushes a batch summary message
    pub async fn push_summary(&self, summary: &PushSummary) -> Result<()> {
        let text = crate::client::format_summary(summary);
        self.webhook()?.send_text(&text).await?;
        Ok(())
    }

    /// Pushes the summary of a finished comment batch
    pub async fn push_batch_summary(&self, summary: &BatchSummary<Vec<Comment>>) -> Result<()> {
        self.push_summary(&push_summary(summary)).await
    }

    /// Analytics over every tracked video and its cached comments
    pub fn report(&self) -> AnalyticsReport {
        let comments: Vec<Comment> = self
            .videos
            .iter()
            .filter_map(|v| self.comment_cache.lookup(&v.id))
            .flatten()
            .collect();
        generate_report(&self.videos, &comments)
    }

    pub fn recent_runs(&self, limit: usize) -> Result<Vec<RunRecord>> {
        let guard = self.storage.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.list_runs(limit)?)
    }

    pub fn usage(&self) -> UsageReport {
        UsageReport {
            api: self.quota.snapshot(),
            daily_quota: self.quota.daily_quota(),
            remaining_quota: self.quota.remaining(),
            translation: self.translator.stats(),
            translation_cache_entries: self.translator.cache_size(),
            comment_cache_entries: self.comment_cache.len(),
        }
    }

    /// Ids of tracked videos that have cached comments
    pub fn videos_with_comments(&self) -> HashSet<String> {
        self.videos
            .iter()
            .filter(|v| self.comment_cache.contains(&v.id))
            .map(|v| v.id.clone())
            .collect()
    }
}
