use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required value is empty.
    #[error("`{0}` cannot be empty")]
    EmptyField(String),
    /// A value is outside of its accepted range.
    #[error("invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
}

/// Fails with [`ValidationError::EmptyField`] if `value` is empty or only whitespace.
pub(crate) fn require_non_empty(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyField(field.to_string()));
    }

    Ok(())
}
