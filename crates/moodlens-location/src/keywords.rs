//! Place-name keywords in free text.

use regex::Regex;
use std::sync::LazyLock;

/// Patterns tried in order.
static PLACE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)SMK\s\w+").unwrap(),
        Regex::new(r"(?i)Mount\s\w+").unwrap(),
        Regex::new(r"(?i)Jalan\s\w+").unwrap(),
    ]
});

/// Extract place keywords from OCR text.
///
/// Matches are grouped by pattern (in pattern order) and keep their position
/// order within a pattern; repeats of an identical match are dropped.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for pattern in PLACE_PATTERNS.iter() {
        for m in pattern.find_iter(text) {
            let keyword = m.as_str().to_string();
            if !found.contains(&keyword) {
                found.push(keyword);
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_in_pattern_order() {
        let text = "Welcome to Jalan Ampang near Mount Kinabalu and SMK Seri";
        assert_eq!(
            extract_keywords(text),
            vec!["SMK Seri", "Mount Kinabalu", "Jalan Ampang"]
        );
    }

    #[test]
    fn test_case_insensitive_and_deduplicated() {
        let text = "mount Everest\nMOUNT Everest\nmount Everest";
        assert_eq!(extract_keywords(text), vec!["mount Everest", "MOUNT Everest"]);
    }

    #[test]
    fn test_requires_following_word() {
        assert!(extract_keywords("Jalan  \n SMK").is_empty());
        assert!(extract_keywords("").is_empty());
    }
}
