use crate::config::types::{
    BatchConfig, CacheConfig, Config, HistoryConfig, StorageConfig, TranslationConfig,
    WebhookConfig, YoutubeConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_youtube_config(&config.youtube)?;
    validate_translation_config(&config.translation)?;
    validate_batch_config(&config.batch)?;
    validate_cache_config(&config.cache)?;
    validate_webhook_config(&config.webhook)?;
    validate_storage_config(&config.storage)?;
    validate_history_config(&config.history)?;
    Ok(())
}

/// Validates a webhook URL against the allowed host list
///
/// The URL must parse, use http or https, and, when `allowed_hosts` is not
/// empty, point at one of the listed hosts.
///
/// # Arguments
///
/// * `raw` - The webhook URL as configured or supplied on the command line
/// * `allowed_hosts` - Hosts accepted as push targets
///
/// # Returns
///
/// * `Ok(Url)` - The parsed URL
/// * `Err(ConfigError)` - The URL is malformed or points somewhere unexpected
pub fn validate_webhook_url(raw: &str, allowed_hosts: &[String]) -> Result<Url, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::InvalidUrl("webhook url cannot be empty".to_string()));
    }

    let url = Url::parse(trimmed)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid webhook url '{}': {}", trimmed, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl(format!(
            "Webhook url '{}' must use http or https",
            trimmed
        )));
    }

    let host = url
        .host_str()
        .ok_or_else(|| ConfigError::InvalidUrl(format!("Webhook url '{}' has no host", trimmed)))?;

    if !allowed_hosts.is_empty() && !allowed_hosts.iter().any(|h| h.eq_ignore_ascii_case(host)) {
        return Err(ConfigError::InvalidUrl(format!(
            "Webhook host '{}' is not one of: {}",
            host,
            allowed_hosts.join(", ")
        )));
    }

    Ok(url)
}

fn validate_youtube_config(config: &YoutubeConfig) -> Result<(), ConfigError> {
    if config.api_keys.iter().all(|k| k.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "youtube.api-keys must contain at least one key".to_string(),
        ));
    }

    validate_base_url("youtube.base-url", &config.base_url)?;

    if config.max_results < 1 || config.max_results > 500 {
        return Err(ConfigError::Validation(format!(
            "youtube.max-results must be between 1 and 500, got {}",
            config.max_results
        )));
    }

    if config.max_comments < 1 || config.max_comments > 100 {
        return Err(ConfigError::Validation(format!(
            "youtube.max-comments must be between 1 and 100, got {}",
            config.max_comments
        )));
    }

    if config.daily_quota == 0 {
        return Err(ConfigError::Validation(
            "youtube.daily-quota must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_translation_config(config: &TranslationConfig) -> Result<(), ConfigError> {
    validate_base_url("translation.base-url", &config.base_url)?;

    if config.max_text_length < 10 {
        return Err(ConfigError::Validation(format!(
            "translation.max-text-length must be >= 10, got {}",
            config.max_text_length
        )));
    }

    if config.default_target.trim().is_empty() || config.source_lang.trim().is_empty() {
        return Err(ConfigError::Validation(
            "translation languages cannot be empty".to_string(),
        ));
    }

    if let Some(email) = &config.contact_email {
        validate_email(email)?;
    }

    Ok(())
}

fn validate_batch_config(config: &BatchConfig) -> Result<(), ConfigError> {
    if config.max_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "batch.max-retries must be <= 10, got {}",
            config.max_retries
        )));
    }

    Ok(())
}

fn validate_cache_config(config: &CacheConfig) -> Result<(), ConfigError> {
    if config.max_entries == 0 {
        return Err(ConfigError::Validation(
            "cache.max-entries must be >= 1".to_string(),
        ));
    }

    if config.retain_entries == 0 || config.retain_entries > config.max_entries {
        return Err(ConfigError::Validation(format!(
            "cache.retain-entries must be between 1 and max-entries ({}), got {}",
            config.max_entries, config.retain_entries
        )));
    }

    Ok(())
}

fn validate_webhook_config(config: &WebhookConfig) -> Result<(), ConfigError> {
    match &config.url {
        Some(url) => {
            validate_webhook_url(url, &config.allowed_hosts)?;
        }
        None if config.enabled => {
            return Err(ConfigError::Validation(
                "webhook.enabled requires webhook.url".to_string(),
            ));
        }
        None => {}
    }

    if config.max_message_length < 200 {
        return Err(ConfigError::Validation(format!(
            "webhook.max-message-length must be >= 200, got {}",
            config.max_message_length
        )));
    }

    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_history_config(config: &HistoryConfig) -> Result<(), ConfigError> {
    if config.max_items == 0 {
        return Err(ConfigError::Validation(
            "history.max-items must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_base_url(field: &str, raw: &str) -> Result<(), ConfigError> {
    let url =
        Url::parse(raw).map_err(|e| ConfigError::InvalidUrl(format!("Invalid {}: {}", field, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl(format!(
            "{} must use http or https, got '{}'",
            field, raw
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let (local, domain) = email.split_once('@').ok_or_else(|| {
        ConfigError::Validation(format!("Invalid email format: '{}'", email))
    })?;

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    // Domain part should contain at least one dot
    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
