//! Keyword sentiment, script-based language guess and word tokenizing

use crate::model::Sentiment;

const POSITIVE_WORDS: &[&str] = &[
    "好", "棒", "赞", "喜欢", "优秀", "good", "great", "love", "awesome", "excellent",
];

const NEGATIVE_WORDS: &[&str] = &[
    "差", "烂", "垃圾", "讨厌", "糟糕", "bad", "terrible", "hate", "awful", "worst",
];

/// Scores text by counting positive and negative keywords it contains
pub fn analyze_sentiment(text: &str) -> Sentiment {
    let lower = text.to_lowercase();
    let positive = POSITIVE_WORDS.iter().filter(|w| lower.contains(*w)).count();
    let negative = NEGATIVE_WORDS.iter().filter(|w| lower.contains(*w)).count();

    match positive.cmp(&negative) {
        std::cmp::Ordering::Greater => Sentiment::Positive,
        std::cmp::Ordering::Less => Sentiment::Negative,
        std::cmp::Ordering::Equal => Sentiment::Neutral,
    }
}

/// Guesses the language from the scripts present in `text`
///
/// Han characters win over kana, kana over hangul; anything else is `en`.
pub fn detect_language(text: &str) -> &'static str {
    let has = |range: std::ops::RangeInclusive<char>| text.chars().any(|c| range.contains(&c));

    if has('\u{4e00}'..='\u{9fa5}') {
        "zh"
    } else if has('\u{3040}'..='\u{30ff}') {
        "ja"
    } else if has('\u{ac00}'..='\u{d7af}') {
        "ko"
    } else {
        "en"
    }
}

/// Lowercases and splits on whitespace, keeping words longer than `min_len`
/// characters that are not in `stop_words`
pub fn tokenize<'a>(
    text: &'a str,
    min_len: usize,
    stop_words: &'a [&'a str],
) -> impl Iterator<Item = String> + 'a {
    text.split_whitespace()
        .map(|w| w.to_lowercase())
        .filter(move |w| w.chars().count() > min_len && !stop_words.contains(&w.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentiment() {
        assert_eq!(analyze_sentiment("This is GREAT, love it"), Sentiment::Positive);
        assert_eq!(analyze_sentiment("worst video, terrible"), Sentiment::Negative);
        assert_eq!(analyze_sentiment("good but bad"), Sentiment::Neutral);
        assert_eq!(analyze_sentiment("just a comment"), Sentiment::Neutral);
        assert_eq!(analyze_sentiment("太棒了"), Sentiment::Positive);
    }

    #[test]
    fn test_detect_language() {
        assert_eq!(detect_language("你好世界"), "zh");
        assert_eq!(detect_language("こんにちは"), "ja");
        assert_eq!(detect_language("안녕하세요"), "ko");
        assert_eq!(detect_language("hello"), "en");
        assert_eq!(detect_language(""), "en");
    }

    #[test]
    fn test_tokenize() {
        let stop = ["the", "and"];
        let words: Vec<String> = tokenize("The Rust and THE borrow checker", 2, &stop).collect();
        assert_eq!(words, vec!["rust", "borrow", "checker"]);
    }
}
