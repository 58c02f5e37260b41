//! Canonical summary results and raw-response normalization.
//!
//! The summarization service is inconsistent about which fields it sends,
//! so every raw field is optional and normalization is total: defaults
//! absorb anything missing or malformed, and no partial result ever
//! escapes this module.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PLACEHOLDER_TEXT: &str = "No summary available";
pub const NEUTRAL_SENTIMENT: &str = "Neutral";
pub const MISSING_LINK: &str = "#";

/// Fully-populated summary record used throughout the system.
/// Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryResult {
    /// The originating user query, preserved verbatim.
    pub title: String,
    pub text: String,
    pub sentiment: String,
    pub key_mentions: Vec<String>,
    pub link: String,
}

/// Raw response shape from the summarization service.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSummary {
    pub summary: Option<String>,
    pub sentiment: Option<String>,
    /// Sometimes a JSON array of strings, sometimes absent, sometimes junk.
    /// Kept untyped so a malformed value falls into the title shim below
    /// instead of failing the whole body parse.
    pub key_mentions: Option<Value>,
    pub video_link: Option<String>,
    pub title: Option<String>,
}

/// Convert a raw response into a canonical result. Total function.
pub fn normalize(query: &str, raw: &RawSummary) -> SummaryResult {
    let text = raw
        .summary
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(PLACEHOLDER_TEXT)
        .to_string();

    let sentiment = raw
        .sentiment
        .clone()
        .unwrap_or_else(|| NEUTRAL_SENTIMENT.to_string());

    let key_mentions = match raw.key_mentions.as_ref().and_then(Value::as_array) {
        Some(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        None => mentions_from_title(raw.title.as_deref()),
    };

    let link = raw
        .video_link
        .clone()
        .unwrap_or_else(|| MISSING_LINK.to_string());

    SummaryResult {
        title: query.to_string(),
        text,
        sentiment,
        key_mentions,
        link,
    }
}

/// Compatibility shim: older service responses pack the mentions into the
/// title as `"Something - Alice, Bob"`. Second segment, comma-separated.
fn mentions_from_title(title: Option<&str>) -> Vec<String> {
    match title.and_then(|t| t.split(" - ").nth(1)) {
        Some(segment) => segment.split(", ").map(str::to_string).collect(),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawSummary {
        serde_json::from_value(value).expect("raw summary should deserialize")
    }

    #[test]
    fn missing_sentiment_defaults_to_neutral() {
        let result = normalize("rust talk", &raw(json!({ "summary": "ok" })));
        assert_eq!(result.sentiment, "Neutral");
    }

    #[test]
    fn well_formed_key_mentions_used_verbatim() {
        let result = normalize(
            "rust talk",
            &raw(json!({
                "key_mentions": ["Niko", "Ashley"],
                "title": "Talk - Alice, Bob"
            })),
        );
        assert_eq!(result.key_mentions, vec!["Niko", "Ashley"]);
    }

    #[test]
    fn key_mentions_derived_from_title_when_absent() {
        let result = normalize("q", &raw(json!({ "title": "Talk - Alice, Bob" })));
        assert_eq!(result.key_mentions, vec!["Alice", "Bob"]);
    }

    #[test]
    fn title_without_separator_yields_no_mentions() {
        let result = normalize("q", &raw(json!({ "title": "Plain title" })));
        assert!(result.key_mentions.is_empty());
    }

    #[test]
    fn malformed_key_mentions_fall_back_to_title_shim() {
        let result = normalize(
            "q",
            &raw(json!({ "key_mentions": "not a list", "title": "Talk - Carol" })),
        );
        assert_eq!(result.key_mentions, vec!["Carol"]);
    }

    #[test]
    fn missing_title_and_mentions_yield_empty() {
        let result = normalize("q", &raw(json!({})));
        assert!(result.key_mentions.is_empty());
    }

    #[test]
    fn missing_or_blank_summary_uses_placeholder() {
        assert_eq!(normalize("q", &raw(json!({}))).text, PLACEHOLDER_TEXT);
        assert_eq!(
            normalize("q", &raw(json!({ "summary": "   " }))).text,
            PLACEHOLDER_TEXT
        );
    }

    #[test]
    fn missing_link_uses_sentinel() {
        assert_eq!(normalize("q", &raw(json!({}))).link, "#");
        assert_eq!(
            normalize("q", &raw(json!({ "video_link": "https://youtu.be/x" }))).link,
            "https://youtu.be/x"
        );
    }

    #[test]
    fn title_is_the_original_query_not_the_remote_title() {
        let result = normalize(
            "what I asked",
            &raw(json!({ "title": "Remote Title - A, B" })),
        );
        assert_eq!(result.title, "what I asked");
    }

    #[test]
    fn unknown_response_fields_are_ignored() {
        let result = normalize(
            "q",
            &raw(json!({ "summary": "s", "tts_audio": "base64...", "extra": 7 })),
        );
        assert_eq!(result.text, "s");
    }
}
