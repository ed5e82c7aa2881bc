//! Human-readable numbers and durations

use std::time::Duration;

/// Abbreviates large counts: `999`, `1.5K`, `2.5M`, `3.1B`
pub fn format_number(n: u64) -> String {
    match n {
        0..=999 => n.to_string(),
        1_000..=999_999 => format!("{:.1}K", n as f64 / 1_000.0),
        1_000_000..=999_999_999 => format!("{:.1}M", n as f64 / 1_000_000.0),
        _ => format!("{:.1}B", n as f64 / 1_000_000_000.0),
    }
}

/// Formats an elapsed time as `1h 5m`, `2m 3s` or `4s`
pub fn format_duration(duration: Duration) -> String {
    let seconds = duration.as_secs();
    let minutes = seconds / 60;
    let hours = minutes / 60;

    if hours > 0 {
        format!("{}h {}m", hours, minutes % 60)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds % 60)
    } else {
        format!("{}s", seconds)
    }
}

/// Converts a video duration to minutes
///
/// Accepts ISO-8601 (`PT1H2M3S`, `P1DT2H`) and clock form (`1:02:03`, `4:13`).
/// Returns `None` for anything else.
pub fn duration_minutes(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if raw.starts_with('P') {
        return iso_minutes(raw);
    }

    let parts: Vec<f64> = raw
        .split(':')
        .map(|p| p.parse::<f64>())
        .collect::<Result<_, _>>()
        .ok()?;
    match parts.as_slice() {
        [h, m, s] => Some(h * 60.0 + m + s / 60.0),
        [m, s] => Some(m + s / 60.0),
        _ => None,
    }
}

fn iso_minutes(raw: &str) -> Option<f64> {
    let mut minutes = 0.0;
    let mut number = String::new();
    let mut in_time = false;

    for c in raw.chars().skip(1) {
        match c {
            'T' => in_time = true,
            '0'..='9' | '.' => number.push(c),
            unit => {
                let value: f64 = number.parse().ok()?;
                number.clear();
                minutes += match (unit, in_time) {
                    ('W', false) => value * 7.0 * 24.0 * 60.0,
                    ('D', false) => value * 24.0 * 60.0,
                    ('H', true) => value * 60.0,
                    ('M', true) => value,
                    ('S', true) => value / 60.0,
                    _ => return None,
                };
            }
        }
    }

    if number.is_empty() {
        Some(minutes)
    } else {
        None
    }
}

/// Rounds to `places` decimal places
pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1500), "1.5K");
        assert_eq!(format_number(2_500_000), "2.5M");
        assert_eq!(format_number(3_100_000_000), "3.1B");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(4)), "4s");
        assert_eq!(format_duration(Duration::from_secs(123)), "2m 3s");
        assert_eq!(format_duration(Duration::from_secs(3900)), "1h 5m");
    }

    #[test]
    fn test_duration_minutes_iso() {
        assert_eq!(duration_minutes("PT4M30S"), Some(4.5));
        assert_eq!(duration_minutes("PT1H"), Some(60.0));
        assert_eq!(duration_minutes("P1DT1M"), Some(1441.0));
        assert_eq!(duration_minutes("PT45S"), Some(0.75));
        assert_eq!(duration_minutes("PTXS"), None);
    }

    #[test]
    fn test_duration_minutes_clock() {
        assert_eq!(duration_minutes("1:30:00"), Some(90.0));
        assert_eq!(duration_minutes("4:30"), Some(4.5));
        assert_eq!(duration_minutes("soon"), None);
        assert_eq!(duration_minutes(""), None);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(12.346, 2), 12.35);
        assert_eq!(round_to(7.25, 1), 7.3);
    }
}
