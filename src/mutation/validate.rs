use thiserror::Error;

/// Default upper bound on item content, in characters.
pub const MAX_CONTENT_LENGTH: usize = 190;

/// Reasons an edit is refused before it is ever sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Content cannot be empty")]
    Empty,

    #[error("Content is too long: {length} characters (max {max})")]
    TooLong { length: usize, max: usize },
}

/// Check draft content against the non-empty and length rules.
///
/// Emptiness is judged after trimming whitespace, matching what the server
/// persists. Length counts characters of the draft as typed.
pub fn validate_content(content: &str, max_length: usize) -> Result<(), ValidationError> {
    if content.trim().is_empty() {
        return Err(ValidationError::Empty);
    }
    let length = content.chars().count();
    if length > max_length {
        return Err(ValidationError::TooLong {
            length,
            max: max_length,
        });
    }
    Ok(())
}

/// Cut `content` down to at most `max_length` characters.
///
/// Used while typing so a draft can never grow past the limit.
pub fn clamp_content(content: &str, max_length: usize) -> &str {
    match content.char_indices().nth(max_length) {
        Some((byte_idx, _)) => &content[..byte_idx],
        None => content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_content() {
        assert!(validate_content("hello", MAX_CONTENT_LENGTH).is_ok());
    }

    #[test]
    fn test_empty_and_whitespace_rejected() {
        assert_eq!(validate_content("", 10), Err(ValidationError::Empty));
        assert_eq!(validate_content("  \n\t ", 10), Err(ValidationError::Empty));
    }

    #[test]
    fn test_too_long_rejected() {
        let err = validate_content("abcdef", 5).unwrap_err();
        assert_eq!(err, ValidationError::TooLong { length: 6, max: 5 });
        assert!(err.to_string().contains("max 5"));
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        // 5 characters, 15 bytes
        assert!(validate_content("日本語です", 5).is_ok());
    }

    #[test]
    fn test_clamp_content() {
        assert_eq!(clamp_content("hello", 10), "hello");
        assert_eq!(clamp_content("hello", 3), "hel");
        assert_eq!(clamp_content("日本語です", 2), "日本");
        assert_eq!(clamp_content("abc", 0), "");
    }
}
