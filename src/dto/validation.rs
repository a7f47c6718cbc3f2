//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest accepted username, in characters.
pub const USERNAME_MAX_CHARS: usize = 32;

/// Validates a username: non-blank once trimmed, at most
/// [`USERNAME_MAX_CHARS`] characters, no control characters.
///
/// # Examples
///
/// ```ignore
/// validate_username("alice")      // Ok
/// validate_username("   ")        // Err - blank
/// validate_username("bob\u{7}")   // Err - control character
/// ```
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let trimmed = username.trim();
    if trimmed.is_empty() {
        let mut err = ValidationError::new("username_blank");
        err.message = Some("Username must not be blank".into());
        return Err(err);
    }

    let chars = trimmed.chars().count();
    if chars > USERNAME_MAX_CHARS {
        let mut err = ValidationError::new("username_length");
        err.message = Some(
            format!("Username must be at most {USERNAME_MAX_CHARS} characters (got {chars})")
                .into(),
        );
        return Err(err);
    }

    if trimmed.chars().any(char::is_control) {
        let mut err = ValidationError::new("username_format");
        err.message = Some("Username must not contain control characters".into());
        return Err(err);
    }

    Ok(())
}

/// Rejects strings that are empty once trimmed.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value must not be blank".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_username_valid() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("  Zoé  ").is_ok());
        assert!(validate_username(&"x".repeat(USERNAME_MAX_CHARS)).is_ok());
    }

    #[test]
    fn test_validate_username_invalid_length() {
        assert!(validate_username("").is_err());
        assert!(validate_username(" \t ").is_err());
        assert!(validate_username(&"x".repeat(USERNAME_MAX_CHARS + 1)).is_err());
    }

    #[test]
    fn test_validate_username_invalid_format() {
        assert!(validate_username("bob\u{7}").is_err());
        assert!(validate_username("line\nbreak").is_err());
    }

    #[test]
    fn test_validate_not_blank() {
        assert!(validate_not_blank("soleil").is_ok());
        assert!(validate_not_blank("   ").is_err());
    }
}
