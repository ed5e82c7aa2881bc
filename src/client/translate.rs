//! Machine translation through the MyMemory API
//!
//! Requests are paced by a rate limiter and answered from the translation
//! cache when possible. Texts longer than the configured unit are split at
//! sentence or word boundaries, translated piece by piece and concatenated;
//! a piece that fails keeps its original text.

use crate::cache::{text_fingerprint, ResultCache};
use crate::client::http::send_json;
use crate::config::TranslationConfig;
use crate::model::Translation;
use crate::state::RateLimiter;
use crate::{FetchError, FetchOutcome};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

const PROVIDER: &str = "MyMemory";
const PROVIDER_SEGMENTED: &str = "MyMemory (segmented)";

/// Characters sampled when asking the provider to detect a language
const DETECTION_SAMPLE: usize = 100;

/// Language codes accepted by the provider, with display names
pub const SUPPORTED_LANGUAGES: &[(&str, &str)] = &[
    ("auto", "Auto detect"),
    ("en", "English"),
    ("zh", "中文简体"),
    ("zh-TW", "中文繁體"),
    ("ja", "日本語"),
    ("ko", "한국어"),
    ("es", "Español"),
    ("fr", "Français"),
    ("de", "Deutsch"),
    ("it", "Italiano"),
    ("pt", "Português"),
    ("ru", "Русский"),
    ("ar", "العربية"),
];

/// Usage counters of one translation service
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationStats {
    pub total_translations: u64,
    pub successful: u64,
    pub failed: u64,
    pub cached: u64,
    pub last_translation_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MyMemoryResponse {
    #[serde(default)]
    response_data: Option<MyMemoryData>,
    /// Sent as a number on success and sometimes as a string on errors
    #[serde(default)]
    response_status: serde_json::Value,
    #[serde(default)]
    response_details: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MyMemoryData {
    translated_text: String,
    /// Either a bare quality number or an object carrying `quality` and `source`
    #[serde(default, rename = "match")]
    match_info: serde_json::Value,
}

fn status_code(value: &serde_json::Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

fn match_quality(value: &serde_json::Value) -> f64 {
    let as_number = |v: &serde_json::Value| {
        v.as_f64()
            .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
    };
    as_number(value)
        .or_else(|| value.get("quality").and_then(as_number))
        .unwrap_or(0.0)
}

fn match_source(value: &serde_json::Value) -> Option<String> {
    value
        .get("source")
        .and_then(|s| s.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn is_sentence_end(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '。' | '！' | '？')
}

/// Splits `text` into pieces of at most `max_len` characters
///
/// Within each window of `max_len` characters the cut goes, in order of
/// preference, right after the last sentence-ending mark, right before the
/// last whitespace, or at the window end. Marks and whitespace only count
/// when they sit in the second half of the window. Concatenating the pieces
/// gives back `text` exactly.
pub fn split_text(text: &str, max_len: usize) -> Vec<&str> {
    let max_len = max_len.max(1);
    let mut segments = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let window_end = match rest.char_indices().nth(max_len) {
            Some((byte_idx, _)) => byte_idx,
            None => {
                segments.push(rest);
                break;
            }
        };

        let mut last_mark: Option<(usize, usize)> = None;
        let mut last_space: Option<(usize, usize)> = None;
        for (char_idx, (byte_idx, c)) in rest[..window_end].char_indices().enumerate() {
            if is_sentence_end(c) {
                last_mark = Some((char_idx, byte_idx + c.len_utf8()));
            }
            if c.is_whitespace() {
                last_space = Some((char_idx, byte_idx));
            }
        }

        let in_tail = |(char_idx, _): &(usize, usize)| char_idx * 2 > max_len;
        let cut = last_mark
            .filter(in_tail)
            .or_else(|| last_space.filter(in_tail))
            .map(|(_, byte_idx)| byte_idx)
            .unwrap_or(window_end);

        segments.push(&rest[..cut]);
        rest = &rest[cut..];
    }

    segments
}

/// Translation service backed by the MyMemory API
pub struct TranslationService {
    client: Client,
    base_url: String,
    contact_email: Option<String>,
    max_text_length: usize,
    segment_delay: Duration,
    limiter: RateLimiter,
    cache: Arc<ResultCache<Translation>>,
    stats: Mutex<TranslationStats>,
}

impl TranslationService {
    pub fn new(client: Client, config: &TranslationConfig, cache: Arc<ResultCache<Translation>>) -> Self {
        Self {
            client,
            base_url: config.base_url.clone(),
            contact_email: config.contact_email.clone(),
            max_text_length: config.max_text_length,
            segment_delay: Duration::from_millis(config.segment_delay),
            limiter: RateLimiter::from_millis(config.min_interval),
            cache,
            stats: Mutex::new(TranslationStats::default()),
        }
    }

    fn update_stats(&self, f: impl FnOnce(&mut TranslationStats)) {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut stats);
    }

    /// Returns true if a translation of `text` is cached for this language pair
    pub fn is_cached(&self, text: &str, target_lang: &str, source_lang: &str) -> bool {
        self.cache
            .contains(&text_fingerprint(text, source_lang, target_lang))
    }

    /// Translates `text` from `source_lang` into `target_lang`
    ///
    /// # Returns
    ///
    /// * `Ok(Translation)` - From the cache or the provider
    /// * `Err(FetchError::Validation)` - Empty text or language
    /// * `Err(FetchError)` - The provider call failed
    pub async fn translate_text(
        &self,
        text: &str,
        target_lang: &str,
        source_lang: &str,
    ) -> FetchOutcome<Translation> {
        let clean = text.trim();
        if clean.is_empty() {
            return Err(FetchError::Validation("text to translate cannot be empty".to_string()));
        }
        if target_lang.trim().is_empty() || source_lang.trim().is_empty() {
            return Err(FetchError::Validation("language codes cannot be empty".to_string()));
        }

        let key = text_fingerprint(clean, source_lang, target_lang);
        if let Some(hit) = self.cache.lookup(&key) {
            self.update_stats(|s| s.cached += 1);
            tracing::debug!("Translation cache hit for {}", key);
            return Ok(hit);
        }

        if clean.chars().count() > self.max_text_length {
            return self.translate_long_text(clean, target_lang, source_lang, &key).await;
        }

        let result = self.request(clean, target_lang, source_lang).await;
        match &result {
            Ok(translation) => {
                self.cache.store(&key, translation.clone());
                self.update_stats(|s| {
                    s.total_translations += 1;
                    s.successful += 1;
                    s.last_translation_time = Some(Utc::now());
                });
                tracing::debug!("Translated {} -> {}", source_lang, target_lang);
            }
            Err(e) => {
                self.update_stats(|s| {
                    s.total_translations += 1;
                    s.failed += 1;
                });
                tracing::warn!("Translation failed: {}", e);
            }
        }
        result
    }

    /// Translates a text longer than one request unit
    ///
    /// Failed pieces keep their original text. The combined result is cached
    /// only when every piece was translated; if none was, the last error is
    /// returned.
    async fn translate_long_text(
        &self,
        clean: &str,
        target_lang: &str,
        source_lang: &str,
        key: &str,
    ) -> FetchOutcome<Translation> {
        let segments = split_text(clean, self.max_text_length);
        tracing::debug!("Translating long text in {} segments", segments.len());

        let mut translated = String::with_capacity(clean.len());
        let mut degraded = 0usize;
        let mut last_error: Option<FetchError> = None;
        let mut detected_source: Option<String> = None;

        for (i, segment) in segments.iter().enumerate() {
            let segment_key = text_fingerprint(segment, source_lang, target_lang);
            let outcome = match self.cache.lookup(&segment_key) {
                Some(hit) => Ok(hit),
                None if segment.trim().is_empty() => Err(FetchError::Validation(
                    "blank segment".to_string(),
                )),
                None => {
                    let fresh = self.request(segment, target_lang, source_lang).await;
                    if let Ok(piece) = &fresh {
                        self.cache.store(&segment_key, piece.clone());
                    }
                    fresh
                }
            };

            match outcome {
                Ok(piece) => {
                    if detected_source.is_none() && piece.source_lang != source_lang {
                        detected_source = Some(piece.source_lang.clone());
                    }
                    translated.push_str(&piece.translated_text);
                }
                Err(FetchError::Validation(_)) => translated.push_str(segment),
                Err(e) => {
                    tracing::warn!("Segment {} of {} kept untranslated: {}", i + 1, segments.len(), e);
                    translated.push_str(segment);
                    degraded += 1;
                    last_error = Some(e);
                }
            }

            if i + 1 < segments.len() {
                tokio::time::sleep(self.segment_delay).await;
            }
        }

        if degraded == segments.len() {
            self.update_stats(|s| {
                s.total_translations += 1;
                s.failed += 1;
            });
            return Err(last_error
                .unwrap_or_else(|| FetchError::Api("no segment could be translated".to_string())));
        }

        let result = Translation {
            original_text: clean.to_string(),
            translated_text: translated,
            source_lang: detected_source.unwrap_or_else(|| source_lang.to_string()),
            target_lang: target_lang.to_string(),
            confidence: 0.0,
            provider: PROVIDER_SEGMENTED.to_string(),
            timestamp: Utc::now(),
            segments: Some(segments.len()),
        };

        if degraded == 0 {
            self.cache.store(key, result.clone());
        }
        self.update_stats(|s| {
            s.total_translations += 1;
            s.successful += 1;
            s.last_translation_time = Some(Utc::now());
        });
        Ok(result)
    }

    /// Performs one provider call for a text within the unit limit
    async fn request(
        &self,
        text: &str,
        target_lang: &str,
        source_lang: &str,
    ) -> FetchOutcome<Translation> {
        let mut params: Vec<(&str, String)> = vec![
            ("q", text.to_string()),
            ("langpair", format!("{}|{}", source_lang, target_lang)),
        ];
        if let Some(email) = &self.contact_email {
            params.push(("de", email.clone()));
        }

        self.limiter.wait().await;
        let request = self
            .client
            .get(&self.base_url)
            .header("Accept", "application/json")
            .query(&params);
        let body: MyMemoryResponse = send_json(request).await?;

        match (status_code(&body.response_status), body.response_data) {
            (Some(200), Some(data)) => Ok(Translation {
                original_text: text.to_string(),
                translated_text: data.translated_text,
                source_lang: match_source(&data.match_info)
                    .unwrap_or_else(|| source_lang.to_string()),
                target_lang: target_lang.to_string(),
                confidence: match_quality(&data.match_info),
                provider: PROVIDER.to_string(),
                timestamp: Utc::now(),
                segments: None,
            }),
            (status, _) => {
                let details = body
                    .response_details
                    .as_str()
                    .filter(|d| !d.is_empty())
                    .unwrap_or("translation failed")
                    .to_string();
                if status == Some(429) {
                    Err(FetchError::QuotaExceeded(details))
                } else {
                    Err(FetchError::Api(details))
                }
            }
        }
    }

    /// Asks the provider which language `text` is written in
    ///
    /// Falls back to `auto` when detection fails.
    pub async fn detect_language(&self, text: &str) -> Option<String> {
        let sample: String = text.trim().chars().take(DETECTION_SAMPLE).collect();
        if sample.is_empty() {
            return None;
        }

        match self.translate_text(&sample, "en", "auto").await {
            Ok(result) => Some(result.source_lang),
            Err(e) => {
                tracing::warn!("Language detection failed: {}", e);
                Some("auto".to_string())
            }
        }
    }

    pub fn stats(&self) -> TranslationStats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn cache_size(&self) -> usize {
        self.cache.len()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
        tracing::info!("Translation cache cleared");
    }

    /// Returns the language codes the provider accepts
    pub fn supported_languages() -> &'static [(&'static str, &'static str)] {
        SUPPORTED_LANGUAGES
    }
}
