//! Input validation for identifiers that end up inside backend queries.

use crate::error::{Result, SourceError};

pub const MAX_FEATURE_ID_LEN: usize = 100;

/// Accept only non-empty ids of at most 100 characters drawn from
/// `[A-Za-z0-9._-]`.
pub fn validate_feature_id(feature_id: &str) -> Result<&str> {
    if feature_id.trim().is_empty() {
        return Err(SourceError::Validation(
            "feature id cannot be empty".to_string(),
        ));
    }
    if let Some(bad) = feature_id.chars().find(|c| !is_allowed(*c)) {
        return Err(SourceError::Validation(format!(
            "feature id contains invalid character {:?}; only letters, digits, '.', '-' and '_' are allowed",
            bad
        )));
    }
    if feature_id.len() > MAX_FEATURE_ID_LEN {
        return Err(SourceError::Validation(format!(
            "feature id is too long (max {} characters)",
            MAX_FEATURE_ID_LEN
        )));
    }
    Ok(feature_id)
}

fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')
}
