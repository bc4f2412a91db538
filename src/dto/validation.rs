//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::state::room::RoomCode;

/// Longest accepted display or team name, in characters.
pub const MAX_NAME_LEN: usize = 32;
/// Longest accepted subject, type or option identifier.
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// Validates a room code: 1 to 32 letters, digits, `-` or `_`, case-insensitive.
///
/// # Examples
///
/// ```ignore
/// validate_room_code("quiz-42") // Ok
/// validate_room_code("")        // Err - empty
/// validate_room_code("a b")     // Err - space
/// ```
pub fn validate_room_code(code: &str) -> Result<(), ValidationError> {
    RoomCode::parse(code).map(|_| ()).map_err(|err| {
        let mut error = ValidationError::new("room_code");
        error.message = Some(err.to_string().into());
        error
    })
}

/// Validates a human-readable name (display name or team name).
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        let mut err = ValidationError::new("name_empty");
        err.message = Some("Name cannot be empty".into());
        return Err(err);
    }

    let len = trimmed.chars().count();
    if len > MAX_NAME_LEN {
        let mut err = ValidationError::new("name_length");
        err.message =
            Some(format!("Name must be at most {MAX_NAME_LEN} characters (got {len})").into());
        return Err(err);
    }

    if trimmed.chars().any(char::is_control) {
        let mut err = ValidationError::new("name_format");
        err.message = Some("Name cannot contain control characters".into());
        return Err(err);
    }

    Ok(())
}

/// Validates an opaque identifier coming from the question bank (subject, type, option).
pub fn validate_identifier(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.len() > MAX_IDENTIFIER_LEN {
        let mut err = ValidationError::new("identifier_length");
        err.message = Some(
            format!(
                "Identifier must be between 1 and {MAX_IDENTIFIER_LEN} bytes (got {})",
                id.len()
            )
            .into(),
        );
        return Err(err);
    }

    if id.chars().any(|c| c.is_whitespace() || c.is_control()) {
        let mut err = ValidationError::new("identifier_format");
        err.message = Some("Identifier cannot contain whitespace".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_room_code() {
        assert!(validate_room_code("quiz-42").is_ok());
        assert!(validate_room_code("ABC_def").is_ok());
        assert!(validate_room_code("").is_err());
        assert!(validate_room_code("a b").is_err());
        assert!(validate_room_code(&"x".repeat(33)).is_err());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Alice").is_ok());
        assert!(validate_name("  Bob  ").is_ok());
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"n".repeat(MAX_NAME_LEN + 1)).is_err());
        assert!(validate_name("tab\there").is_err());
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("history").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("two words").is_err());
        assert!(validate_identifier(&"i".repeat(MAX_IDENTIFIER_LEN + 1)).is_err());
    }
}
