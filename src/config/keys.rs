//! Daily API key rotation

use chrono::{Datelike, NaiveDate};

const PLACEHOLDER_KEY: &str = "YOUR_API_KEY_HERE";
const KEY_PREFIX: &str = "AIzaSy";
const MIN_KEY_LENGTH: usize = 20;

/// Returns the keys that look like real Data API keys
pub fn usable_keys(keys: &[String]) -> Vec<&str> {
    keys.iter()
        .map(|k| k.trim())
        .filter(|k| *k != PLACEHOLDER_KEY && k.len() > MIN_KEY_LENGTH && k.starts_with(KEY_PREFIX))
        .collect()
}

/// Picks the key for `date` by day-of-year rotation
///
/// Keys that fail the shape check are ignored unless none pass, in which case
/// every non-empty key takes part in the rotation.
///
/// # Arguments
///
/// * `keys` - Configured keys, in order
/// * `date` - Day the key will be used on
///
/// # Returns
///
/// The selected key, or None if no non-empty key is configured
pub fn select_api_key(keys: &[String], date: NaiveDate) -> Option<&str> {
    let mut pool = usable_keys(keys);
    if pool.is_empty() {
        pool = keys
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .collect();
    }

    if pool.is_empty() {
        return None;
    }

    let index = date.ordinal() as usize % pool.len();
    Some(pool[index])
}
