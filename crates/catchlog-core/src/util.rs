//! Text and clock helpers shared by the store, remote and config layers.

/// Longest remote error body carried into an error message
pub const ERROR_BODY_LIMIT: usize = 180;

/// Trimmed text, or `None` when absent or blank.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Trimmed `value` cut to [`ERROR_BODY_LIMIT`] characters
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(ERROR_BODY_LIMIT).collect()
}

/// Milliseconds since the Unix epoch; row timestamps in the local store
pub fn unix_millis_now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_text_normalizes_to_none() {
        assert_eq!(normalize_text_option(None), None);
        assert_eq!(normalize_text_option(Some(" \t ".to_string())), None);
        assert_eq!(
            normalize_text_option(Some(" Lake Taupo ".to_string())),
            Some("Lake Taupo".to_string())
        );
    }

    #[test]
    fn only_http_schemes_are_urls() {
        assert!(is_http_url("http://127.0.0.1:8787"));
        assert!(is_http_url("https://sync.example.com"));
        assert!(!is_http_url("ftp://sync.example.com"));
        assert!(!is_http_url("sync.example.com"));
    }

    #[test]
    fn compact_text_counts_characters() {
        let body = format!("  {}  ", "é".repeat(500));
        assert_eq!(compact_text(&body).chars().count(), ERROR_BODY_LIMIT);
    }
}
