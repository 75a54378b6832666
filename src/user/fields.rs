//! Normalization and validation rules shared by record construction and
//! partial updates.

use validator::{ValidateEmail, ValidationError};

const NAME_LENGTH: std::ops::RangeInclusive<usize> = 3..=100;
const PHONE_LENGTH: usize = 11;

type Result<T> = std::result::Result<T, ValidationError>;

fn error(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(message.into())
}

/// Trim and check a display name.
pub(super) fn name(value: &str) -> Result<String> {
    let value = value.trim();
    if !NAME_LENGTH.contains(&value.chars().count()) {
        return Err(error(
            "length",
            "name must be between 3 and 100 characters",
        ));
    }

    Ok(value.to_owned())
}

/// Trim, lower-case and check an email address.
pub(super) fn email(value: &str) -> Result<String> {
    let value = value.trim().to_lowercase();
    if !value.validate_email() {
        return Err(error("email", "invalid email"));
    }

    Ok(value)
}

/// Check a phone made of exactly 11 digits.
pub(super) fn phone(value: &str) -> Result<String> {
    let value = value.trim();
    if value.len() != PHONE_LENGTH
        || !value.chars().all(|c| c.is_ascii_digit())
    {
        return Err(error("phone", "phone must be exactly 11 digits"));
    }

    Ok(value.to_owned())
}
