//! Input validation for untrusted data.
//!
//! User ids arrive in a request header and end up in storage keys and file
//! names, so they are checked before use.

use thiserror::Error;

/// Maximum length for user ids.
pub const MAX_USER_ID_LEN: usize = 64;
/// Maximum length for storage scopes.
pub const MAX_SCOPE_LEN: usize = 64;

/// Validation error types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// User id exceeds maximum length.
    #[error("user id too long (max {MAX_USER_ID_LEN} chars)")]
    UserIdTooLong,
    /// User id is empty or contains invalid characters.
    #[error("user id contains invalid characters")]
    UserIdInvalidChars,
    /// Scope exceeds maximum length.
    #[error("scope too long (max {MAX_SCOPE_LEN} chars)")]
    ScopeTooLong,
    /// Scope is empty or contains invalid characters.
    #[error("scope contains invalid characters")]
    ScopeInvalidChars,
}

impl ValidationError {
    /// Short label for metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::UserIdTooLong | Self::UserIdInvalidChars => "user_id",
            Self::ScopeTooLong | Self::ScopeInvalidChars => "scope",
        }
    }
}

/// Check if a character is valid for ids (alphanumeric, hyphen, or underscore).
fn is_valid_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// Validate a user id.
///
/// Valid user ids are 1-64 ASCII alphanumerics, hyphens or underscores.
///
/// # Errors
///
/// Returns [`ValidationError::UserIdTooLong`] if the id exceeds 64 characters.
/// Returns [`ValidationError::UserIdInvalidChars`] if the id is empty or contains invalid characters.
pub fn validate_user_id(id: &str) -> Result<(), ValidationError> {
    if id.len() > MAX_USER_ID_LEN {
        return Err(ValidationError::UserIdTooLong);
    }
    if id.is_empty() || !id.chars().all(is_valid_id_char) {
        return Err(ValidationError::UserIdInvalidChars);
    }
    Ok(())
}

/// Validate a storage scope.
///
/// # Errors
///
/// Returns [`ValidationError::ScopeTooLong`] if the scope exceeds 64 characters.
/// Returns [`ValidationError::ScopeInvalidChars`] if the scope is empty or contains invalid characters.
pub fn validate_scope(scope: &str) -> Result<(), ValidationError> {
    if scope.len() > MAX_SCOPE_LEN {
        return Err(ValidationError::ScopeTooLong);
    }
    if scope.is_empty() || !scope.chars().all(is_valid_id_char) {
        return Err(ValidationError::ScopeInvalidChars);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_user_ids() {
        assert!(validate_user_id("ash").is_ok());
        assert!(validate_user_id("t2_abc123").is_ok());
        assert!(validate_user_id("user-42").is_ok());
        assert!(validate_user_id(&"a".repeat(MAX_USER_ID_LEN)).is_ok());
    }

    #[test]
    fn test_invalid_user_ids() {
        assert_eq!(validate_user_id(""), Err(ValidationError::UserIdInvalidChars));
        assert_eq!(validate_user_id("../etc"), Err(ValidationError::UserIdInvalidChars));
        assert_eq!(validate_user_id("a b"), Err(ValidationError::UserIdInvalidChars));
        assert_eq!(validate_user_id("ash:x"), Err(ValidationError::UserIdInvalidChars));
        assert_eq!(
            validate_user_id(&"a".repeat(MAX_USER_ID_LEN + 1)),
            Err(ValidationError::UserIdTooLong)
        );
    }

    #[test]
    fn test_scope_validation() {
        assert!(validate_scope("default").is_ok());
        assert_eq!(validate_scope(""), Err(ValidationError::ScopeInvalidChars));
        assert_eq!(ValidationError::ScopeTooLong.kind(), "scope");
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn accepted_ids_are_filename_safe(id in "\\PC{0,80}") {
                if validate_user_id(&id).is_ok() {
                    prop_assert!(!id.is_empty() && id.len() <= MAX_USER_ID_LEN);
                    prop_assert!(!id.contains(['/', '\\', ':', '.']));
                }
            }

            #[test]
            fn word_ids_are_accepted(id in "[A-Za-z0-9_-]{1,64}") {
                prop_assert!(validate_user_id(&id).is_ok());
            }
        }
    }
}
