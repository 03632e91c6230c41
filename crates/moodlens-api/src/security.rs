//! Input validation for uploads and path parameters.

/// Maximum stored filename length.
pub const MAX_FILENAME_LENGTH: usize = 255;

/// Reduce a client-supplied filename to a safe basename.
///
/// Directory components are dropped, control characters removed, and the
/// result truncated. Returns `None` when nothing usable remains.
pub fn sanitize_filename(input: &str) -> Option<String> {
    let base = input.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_FILENAME_LENGTH)
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        return None;
    }
    Some(cleaned.to_string())
}

/// Validate analysis and job ID format.
///
/// Valid format: alphanumeric characters and hyphens only, 8-64 chars.
pub fn is_valid_id(id: &str) -> bool {
    if id.len() > 64 || id.len() < 8 {
        return false;
    }
    id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Parse a boolean form field (`true`, `1`, `on`, `yes`).
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "on" | "yes"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("photo.jpg").as_deref(), Some("photo.jpg"));
        assert_eq!(sanitize_filename("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(sanitize_filename("C:\\Users\\me\\pic.PNG").as_deref(), Some("pic.PNG"));
        assert_eq!(sanitize_filename("a\u{0}b.png").as_deref(), Some("ab.png"));
        assert_eq!(sanitize_filename("dir/"), None);
        assert_eq!(sanitize_filename(".."), None);
        assert_eq!(sanitize_filename("  "), None);
    }

    #[test]
    fn test_long_filename_truncated() {
        let long = format!("{}.png", "a".repeat(400));
        assert_eq!(sanitize_filename(&long).map(|s| s.len()), Some(MAX_FILENAME_LENGTH));
    }

    #[test]
    fn test_id_validation() {
        assert!(is_valid_id("550e8400-e29b-41d4-a716-446655440000"));
        assert!(is_valid_id("abcdef12"));
        assert!(!is_valid_id("short"));
        assert!(!is_valid_id("has/slash/inside"));
        assert!(!is_valid_id("has..dots..here"));
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" ON "));
        assert!(parse_flag("1"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
    }
}
