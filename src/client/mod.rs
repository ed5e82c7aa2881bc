//! Clients for the external services
//!
//! - `youtube`: search, video details and comment threads
//! - `translate`: machine translation with caching and long-text splitting
//! - `webhook`: chat bot pushes
//! - `message`: text templates for pushes

mod http;
mod message;
mod translate;
mod webhook;
mod youtube;

pub use http::build_http_client;
pub use message::{
    fit_message, format_error_message, format_summary, format_video_message, truncate_text,
    MessageOptions, MessageTemplate, PushSummary,
};
pub use translate::{split_text, TranslationService, TranslationStats, SUPPORTED_LANGUAGES};
pub use webhook::{PushProgress, PushReport, PushStats, WebhookClient};
pub use youtube::{SearchOrder, SearchQuery, YoutubeClient, LIST_COST, MAX_PAGE_SIZE, SEARCH_COST};
