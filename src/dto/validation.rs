//! Validation helpers for join credentials.

use validator::ValidationError;

/// Validates that a roll number is non-empty, uppercase alphanumeric.
///
/// Roll numbers act as the durable player identity, so the format is strict:
/// digits and capital letters only, as printed on the students' ID cards.
pub fn validate_roll_number(roll_number: &str) -> Result<(), ValidationError> {
    if roll_number.is_empty() {
        let mut err = ValidationError::new("roll_number_empty");
        err.message = Some("Roll Number is required".into());
        return Err(err);
    }

    if !roll_number
        .chars()
        .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
    {
        let mut err = ValidationError::new("roll_number_format");
        err.message =
            Some("Roll Number must contain only digits and uppercase letters".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that a display name carries at least one visible character.
pub fn validate_player_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        let mut err = ValidationError::new("name_empty");
        err.message = Some("Full Name is required".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_roll_number_valid() {
        assert!(validate_roll_number("21CS001").is_ok());
        assert!(validate_roll_number("A1").is_ok());
        assert!(validate_roll_number("007").is_ok());
    }

    #[test]
    fn test_validate_roll_number_invalid() {
        assert!(validate_roll_number("").is_err());
        assert!(validate_roll_number("21cs001").is_err()); // lowercase
        assert!(validate_roll_number("21 CS 001").is_err()); // spaces
        assert!(validate_roll_number("21-CS-001").is_err()); // punctuation
    }

    #[test]
    fn test_validate_player_name() {
        assert!(validate_player_name("Ada Lovelace").is_ok());
        assert!(validate_player_name("").is_err());
        assert!(validate_player_name("   ").is_err());
    }
}
