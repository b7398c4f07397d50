//! Field validators shared by the request DTOs

use once_cell::sync::Lazy;
use regex::Regex;
use validator::ValidationError;

/// Letters, digits and `@ . + - _`
static USERNAME_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\w.@+-]+$").unwrap());

/// Digits and spaces with an optional leading `+`
static PHONE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+?[0-9 ]+$").unwrap());

pub const PHONE_MAX_LEN: usize = 15;

pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if USERNAME_REGEX.is_match(username) {
        Ok(())
    } else {
        let mut err = ValidationError::new("invalid_username");
        err.message = Some("Usernames may contain only letters, digits and @/./+/-/_".into());
        Err(err)
    }
}

pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    // blank clears the number
    if phone.trim().is_empty() {
        return Ok(());
    }
    if phone.chars().count() > PHONE_MAX_LEN || !PHONE_REGEX.is_match(phone) {
        let mut err = ValidationError::new("invalid_phone");
        err.message = Some(
            format!(
                "Phone numbers are at most {} digits or spaces, optionally starting with +",
                PHONE_MAX_LEN
            )
            .into(),
        );
        return Err(err);
    }
    Ok(())
}
