use serde::Deserialize;

/// Main configuration structure for tube-harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub youtube: YoutubeConfig,
    #[serde(default)]
    pub translation: TranslationConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

/// YouTube Data API access
#[derive(Debug, Clone, Deserialize)]
pub struct YoutubeConfig {
    /// API keys; one is picked per day by rotation
    #[serde(rename = "api-keys")]
    pub api_keys: Vec<String>,

    /// Base URL of the Data API v3
    #[serde(rename = "base-url", default = "default_youtube_base_url")]
    pub base_url: String,

    /// Number of search results requested by default
    #[serde(rename = "max-results", default = "default_max_results")]
    pub max_results: u32,

    /// Number of comment threads fetched per video
    #[serde(rename = "max-comments", default = "default_max_comments")]
    pub max_comments: u32,

    /// Minimum spacing between API calls (milliseconds)
    #[serde(rename = "min-interval", default = "default_youtube_interval")]
    pub min_interval: u64,

    /// Daily quota units available to the key pool
    #[serde(rename = "daily-quota", default = "default_daily_quota")]
    pub daily_quota: u64,
}

/// Translation provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TranslationConfig {
    #[serde(rename = "base-url", default = "default_translation_base_url")]
    pub base_url: String,

    /// Longest text sent in a single request (characters)
    #[serde(rename = "max-text-length", default = "default_max_text_length")]
    pub max_text_length: usize,

    /// Minimum spacing between translation requests (milliseconds)
    #[serde(rename = "min-interval", default = "default_translation_interval")]
    pub min_interval: u64,

    /// Pause between the segments of a long text (milliseconds)
    #[serde(rename = "segment-delay", default = "default_segment_delay")]
    pub segment_delay: u64,

    /// Optional address passed to the provider to raise its daily limit
    #[serde(rename = "contact-email", default)]
    pub contact_email: Option<String>,

    #[serde(rename = "source-lang", default = "default_source_lang")]
    pub source_lang: String,

    #[serde(rename = "default-target", default = "default_target_lang")]
    pub default_target: String,

    /// Maximum comments translated per video in one batch
    #[serde(rename = "max-comments", default = "default_translate_max_comments")]
    pub max_comments: usize,
}

/// Sequential batch runner behavior
#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    /// Delay between items and between retry attempts (milliseconds)
    #[serde(rename = "request-interval", default = "default_request_interval")]
    pub request_interval: u64,

    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Skip items whose results are already cached
    #[serde(rename = "skip-existing", default)]
    pub skip_existing: bool,

    #[serde(rename = "continue-on-error", default = "default_true")]
    pub continue_on_error: bool,

    /// Quota units reserved for one comment fetch
    #[serde(rename = "comment-cost", default = "default_comment_cost")]
    pub comment_cost: u64,
}

/// Bounds of the persistent result caches
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(rename = "max-entries", default = "default_max_entries")]
    pub max_entries: usize,

    /// Entries kept after an eviction pass
    #[serde(rename = "retain-entries", default = "default_retain_entries")]
    pub retain_entries: usize,

    /// Optional expiry for cached entries
    #[serde(rename = "ttl-hours", default)]
    pub ttl_hours: Option<u64>,
}

/// Chat webhook push target
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub enabled: bool,

    /// Hosts a webhook URL may point at; empty allows any host
    #[serde(rename = "allowed-hosts", default = "default_allowed_hosts")]
    pub allowed_hosts: Vec<String>,

    #[serde(rename = "max-message-length", default = "default_max_message_length")]
    pub max_message_length: usize,

    /// Delay between messages of a multi-message push (milliseconds)
    #[serde(rename = "send-interval", default = "default_request_interval")]
    pub send_interval: u64,
}

/// Durable storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// History retention
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    #[serde(rename = "max-items", default = "default_history_items")]
    pub max_items: usize,
}

fn default_youtube_base_url() -> String {
    "https://www.googleapis.com/youtube/v3".to_string()
}

fn default_max_results() -> u32 {
    25
}

fn default_max_comments() -> u32 {
    100
}

fn default_youtube_interval() -> u64 {
    100
}

fn default_daily_quota() -> u64 {
    10_000
}

fn default_translation_base_url() -> String {
    "https://api.mymemory.translated.net/get".to_string()
}

fn default_max_text_length() -> usize {
    500
}

fn default_translation_interval() -> u64 {
    200
}

fn default_segment_delay() -> u64 {
    500
}

fn default_source_lang() -> String {
    "auto".to_string()
}

fn default_target_lang() -> String {
    "zh".to_string()
}

fn default_translate_max_comments() -> usize {
    50
}

fn default_request_interval() -> u64 {
    2000
}

fn default_max_retries() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_comment_cost() -> u64 {
    5
}

fn default_max_entries() -> usize {
    1000
}

fn default_retain_entries() -> usize {
    800
}

fn default_allowed_hosts() -> Vec<String> {
    vec!["open.feishu.cn".to_string(), "open.larksuite.com".to_string()]
}

fn default_max_message_length() -> usize {
    8000
}

fn default_history_items() -> usize {
    1000
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            base_url: default_translation_base_url(),
            max_text_length: default_max_text_length(),
            min_interval: default_translation_interval(),
            segment_delay: default_segment_delay(),
            contact_email: None,
            source_lang: default_source_lang(),
            default_target: default_target_lang(),
            max_comments: default_translate_max_comments(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            request_interval: default_request_interval(),
            max_retries: default_max_retries(),
            skip_existing: false,
            continue_on_error: true,
            comment_cost: default_comment_cost(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            retain_entries: default_retain_entries(),
            ttl_hours: None,
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: None,
            enabled: false,
            allowed_hosts: default_allowed_hosts(),
            max_message_length: default_max_message_length(),
            send_interval: default_request_interval(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_items: default_history_items(),
        }
    }
}
