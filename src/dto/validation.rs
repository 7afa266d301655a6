//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest identifier accepted for rooms and users.
const MAX_IDENTIFIER_LEN: usize = 64;

/// Validates that a room or user identifier is non-empty, short and free of whitespace.
///
/// # Examples
///
/// ```ignore
/// validate_identifier("123456789012345678") // Ok
/// validate_identifier("")                   // Err - empty
/// validate_identifier("guild 1")            // Err - whitespace
/// ```
pub fn validate_identifier(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.len() > MAX_IDENTIFIER_LEN {
        let mut err = ValidationError::new("identifier_length");
        err.message = Some(
            format!(
                "Identifier must be between 1 and {MAX_IDENTIFIER_LEN} characters (got {})",
                id.len()
            )
            .into(),
        );
        return Err(err);
    }

    if id.chars().any(char::is_whitespace) {
        let mut err = ValidationError::new("identifier_format");
        err.message = Some("Identifier must not contain whitespace".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier_valid() {
        assert!(validate_identifier("123456789012345678").is_ok());
        assert!(validate_identifier("guild-1").is_ok());
    }

    #[test]
    fn test_validate_identifier_invalid_length() {
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier(&"x".repeat(65)).is_err());
    }

    #[test]
    fn test_validate_identifier_invalid_format() {
        assert!(validate_identifier("guild 1").is_err());
        assert!(validate_identifier("user\t").is_err());
    }
}
