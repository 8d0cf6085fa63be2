//! Validation error types

use std::fmt;

/// Validation error raised by the domain constructors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Required field is empty or blank
    Empty { field: &'static str },

    /// Field exceeds its column width
    TooLong { field: &'static str, max: usize },

    /// Value doesn't match the expected format
    InvalidFormat { field: &'static str, reason: &'static str },

    /// Request combines fields that cannot be used together
    Conflict { fields: &'static str },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty { field } => write!(f, "{} cannot be empty", field),
            Self::TooLong { field, max } => {
                write!(f, "{} exceeds maximum length of {} characters", field, max)
            }
            Self::InvalidFormat { field, reason } => write!(f, "{}: {}", field, reason),
            Self::Conflict { fields } => write!(f, "{} cannot be combined", fields),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Check a required text field: non-blank and within `max` characters.
pub(crate) fn required(
    field: &'static str,
    value: &str,
    max: usize,
) -> Result<String, ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Empty { field });
    }
    if value.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(value.to_owned())
}
