/// Tokens at or below this length are shown in full
const TOKEN_MASK_THRESHOLD: usize = 20;

/// Characters kept from each end of a masked token
const TOKEN_MASK_EDGE: usize = 10;

/// Characters kept by [`preview_token`]
const TOKEN_PREVIEW_LEN: usize = 15;

/// Placeholder for a missing value
pub const NOT_AVAILABLE: &str = "Not available";

/// Shorten a bearer token for display: first and last 10 characters
/// around an ellipsis. Short tokens are shown as-is.
pub fn mask_token(token: Option<&str>) -> String {
    let Some(token) = token else {
        return NOT_AVAILABLE.to_string();
    };

    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= TOKEN_MASK_THRESHOLD {
        return token.to_string();
    }

    let head: String = chars[..TOKEN_MASK_EDGE].iter().collect();
    let tail: String = chars[chars.len() - TOKEN_MASK_EDGE..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Leading part of a long token followed by an ellipsis, for the profile
/// summary. Tokens no longer than the mask threshold are shown in full.
pub fn preview_token(token: &str) -> String {
    if token.chars().count() <= TOKEN_MASK_THRESHOLD {
        return token.to_string();
    }
    truncate_string(token, TOKEN_PREVIEW_LEN + 3)
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Format a date string to a more readable format
pub fn format_date(date: &str) -> String {
    // Try to parse ISO format and convert to readable
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(date) {
        dt.format("%b %d, %Y").to_string()
    } else if date.len() >= 10 {
        // Keep the YYYY-MM-DD prefix of anything longer
        date.chars().take(10).collect()
    } else {
        date.to_string()
    }
}
