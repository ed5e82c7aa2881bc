//! Adapters for the two batch jobs: collecting comments and translating them

use crate::batch::{BatchAdapter, WorkItem};
use crate::cache::ResultCache;
use crate::client::{TranslationService, YoutubeClient};
use crate::model::{Comment, Video};
use crate::{FetchError, FetchOutcome};
use async_trait::async_trait;
use std::sync::Arc;

impl WorkItem for Video {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn label(&self) -> String {
        self.title.clone()
    }
}

/// Fetches comment threads per video and keeps them in the comment cache
pub struct CommentAdapter {
    youtube: Arc<YoutubeClient>,
    cache: Arc<ResultCache<Vec<Comment>>>,
    max_comments: u32,
    cost: u64,
}

impl CommentAdapter {
    /// # Arguments
    ///
    /// * `youtube` - API client
    /// * `cache` - Comment cache keyed by video id
    /// * `max_comments` - Threads requested per video
    /// * `cost` - Quota units reserved per video
    pub fn new(
        youtube: Arc<YoutubeClient>,
        cache: Arc<ResultCache<Vec<Comment>>>,
        max_comments: u32,
        cost: u64,
    ) -> Self {
        Self {
            youtube,
            cache,
            max_comments,
            cost,
        }
    }
}

#[async_trait]
impl BatchAdapter for CommentAdapter {
    type Item = Video;
    type Output = Vec<Comment>;

    async fn fetch(&self, video: &Video) -> FetchOutcome<Vec<Comment>> {
        let comments = self
            .youtube
            .fetch_comments(&video.id, self.max_comments)
            .await?;
        self.cache.store(&video.id, comments.clone());
        Ok(comments)
    }

    fn is_cached(&self, video: &Video) -> bool {
        self.cache.contains(&video.id)
    }

    fn estimated_cost(&self, _video: &Video) -> u64 {
        self.cost
    }
}

/// The comments of one video, queued for translation
#[derive(Debug, Clone)]
pub struct TranslationJob {
    pub video_id: String,
    pub title: String,
    pub comments: Vec<Comment>,
}

impl WorkItem for TranslationJob {
    fn id(&self) -> String {
        self.video_id.clone()
    }

    fn label(&self) -> String {
        self.title.clone()
    }
}

/// Translates every comment of a job that lacks a translation into the target
///
/// A comment that fails to translate keeps its original text; the job fails
/// only when every attempted comment failed or the provider's quota is gone.
pub struct TranslationAdapter {
    translator: Arc<TranslationService>,
    target_lang: String,
    source_lang: String,
    max_comments: usize,
}

impl TranslationAdapter {
    pub fn new(
        translator: Arc<TranslationService>,
        target_lang: impl Into<String>,
        source_lang: impl Into<String>,
        max_comments: usize,
    ) -> Self {
        Self {
            translator,
            target_lang: target_lang.into(),
            source_lang: source_lang.into(),
            max_comments,
        }
    }

    pub fn target_lang(&self) -> &str {
        &self.target_lang
    }
}

#[async_trait]
impl BatchAdapter for TranslationAdapter {
    type Item = TranslationJob;
    type Output = Vec<Comment>;

    async fn fetch(&self, job: &TranslationJob) -> FetchOutcome<Vec<Comment>> {
        let mut comments = job.comments.clone();
        let mut attempted = 0usize;
        let mut translated = 0usize;
        let mut last_error: Option<FetchError> = None;

        for comment in comments.iter_mut().take(self.max_comments) {
            if comment.is_translated_to(&self.target_lang) || comment.text_original.trim().is_empty() {
                continue;
            }
            attempted += 1;
            match self
                .translator
                .translate_text(&comment.text_original, &self.target_lang, &self.source_lang)
                .await
            {
                Ok(translation) => {
                    comment.translation = Some(translation);
                    translated += 1;
                }
                Err(e @ FetchError::QuotaExceeded(_)) => return Err(e),
                Err(e) => {
                    tracing::debug!("Comment {} left untranslated: {}", comment.id, e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if translated == 0 && attempted > 0 => Err(e),
            _ => {
                tracing::debug!(
                    "Translated {}/{} comments of {}",
                    translated,
                    attempted,
                    job.video_id
                );
                Ok(comments)
            }
        }
    }

    fn is_cached(&self, job: &TranslationJob) -> bool {
        !job.comments.is_empty()
            && job
                .comments
                .iter()
                .take(self.max_comments)
                .all(|c| c.is_translated_to(&self.target_lang))
    }
}
