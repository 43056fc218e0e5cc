//! Top-level error wrapper types.

use crate::{
    ConfigError, ConflictError, JsonError, NotFoundError, ParseError, ProviderError, StoreError,
    ValidationError,
};

/// Every error condition the engine can report.
///
/// # Examples
///
/// ```
/// use fabulist_error::{FabulistError, ValidationError, ValidationErrorKind};
///
/// let err: FabulistError = ValidationError::new(ValidationErrorKind::BoardPublished(4)).into();
/// assert!(format!("{}", err).contains("published"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum FabulistErrorKind {
    /// Request not allowed in the current state
    #[from(ValidationError)]
    Validation(ValidationError),
    /// Referenced record absent
    #[from(NotFoundError)]
    NotFound(NotFoundError),
    /// Conflicting concurrent or duplicate state
    #[from(ConflictError)]
    Conflict(ConflictError),
    /// External generation call failed
    #[from(ProviderError)]
    Provider(ProviderError),
    /// Provider output did not decode
    #[from(ParseError)]
    Parse(ParseError),
    /// Content store failure
    #[from(StoreError)]
    Store(StoreError),
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// JSON serialization/deserialization error
    #[from(JsonError)]
    Json(JsonError),
}

/// Fabulist error with kind discrimination.
///
/// # Examples
///
/// ```
/// use fabulist_error::{FabulistResult, ProviderError, ProviderErrorKind};
///
/// fn call() -> FabulistResult<()> {
///     Err(ProviderError::new(ProviderErrorKind::EmptyResponse))?
/// }
///
/// let err = call().unwrap_err();
/// assert!(err.is_generation_failure());
/// assert_eq!(err.code(), "provider.empty_response");
/// ```
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Fabulist Error: {}", _0)]
pub struct FabulistError(Box<FabulistErrorKind>);

impl FabulistError {
    /// Create a new error from a kind.
    pub fn new(kind: FabulistErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &FabulistErrorKind {
        &self.0
    }

    /// Stable, machine-readable code for clients.
    pub fn code(&self) -> &'static str {
        match self.kind() {
            FabulistErrorKind::Validation(e) => e.kind.code(),
            FabulistErrorKind::NotFound(e) => e.kind.code(),
            FabulistErrorKind::Conflict(e) => e.kind.code(),
            FabulistErrorKind::Provider(e) => e.kind.code(),
            FabulistErrorKind::Parse(e) => e.kind.code(),
            FabulistErrorKind::Store(_) => "store",
            FabulistErrorKind::Config(_) => "config",
            FabulistErrorKind::Json(_) => "json",
        }
    }

    /// True for failures that are recorded on a generation task.
    pub fn is_generation_failure(&self) -> bool {
        matches!(
            self.kind(),
            FabulistErrorKind::Provider(_) | FabulistErrorKind::Parse(_)
        )
    }

    /// True when the caller gave up on the provider call (deadline or cancel).
    pub fn is_abandoned(&self) -> bool {
        match self.kind() {
            FabulistErrorKind::Provider(e) => e.kind.is_abandoned(),
            _ => false,
        }
    }

    /// The validation kind, if this is a validation error.
    pub fn as_validation(&self) -> Option<&crate::ValidationErrorKind> {
        match self.kind() {
            FabulistErrorKind::Validation(e) => Some(&e.kind),
            _ => None,
        }
    }

    /// The not-found kind, if this is a not-found error.
    pub fn as_not_found(&self) -> Option<&crate::NotFoundErrorKind> {
        match self.kind() {
            FabulistErrorKind::NotFound(e) => Some(&e.kind),
            _ => None,
        }
    }

    /// The conflict kind, if this is a conflict error.
    pub fn as_conflict(&self) -> Option<&crate::ConflictErrorKind> {
        match self.kind() {
            FabulistErrorKind::Conflict(e) => Some(&e.kind),
            _ => None,
        }
    }
}

// Generic From implementation for any type that converts to FabulistErrorKind
impl<T> From<T> for FabulistError
where
    T: Into<FabulistErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Fabulist operations.
pub type FabulistResult<T> = std::result::Result<T, FabulistError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ConflictErrorKind, NotFoundErrorKind, ParseErrorKind, StoreErrorKind, ValidationErrorKind,
    };

    #[test]
    fn test_codes_are_stable() {
        let err: FabulistError = ValidationError::new(ValidationErrorKind::StoryClosed(1)).into();
        assert_eq!(err.code(), "validation.story_closed");

        let err: FabulistError = NotFoundError::new(NotFoundErrorKind::Story(1)).into();
        assert_eq!(err.code(), "not_found.story");

        let err: FabulistError = ConflictError::new(ConflictErrorKind::DuplicateRoleName {
            story_id: 1,
            name: "Ada".to_string(),
        })
        .into();
        assert_eq!(err.code(), "conflict.duplicate_role_name");

        let err: FabulistError = StoreError::new(StoreErrorKind::Query("boom".into())).into();
        assert_eq!(err.code(), "store");
    }

    #[test]
    fn test_generation_failures() {
        let parse: FabulistError = ParseError::new(ParseErrorKind::InvalidJson("eof".into())).into();
        assert!(parse.is_generation_failure());
        assert!(!parse.is_abandoned());

        let cancelled: FabulistError =
            ProviderError::new(crate::ProviderErrorKind::Cancelled).into();
        assert!(cancelled.is_generation_failure());
        assert!(cancelled.is_abandoned());

        let validation: FabulistError =
            ValidationError::new(ValidationErrorKind::NoScenes(2)).into();
        assert!(!validation.is_generation_failure());
        assert_eq!(validation.as_validation(), Some(&ValidationErrorKind::NoScenes(2)));
    }

    #[test]
    fn test_location_is_tracked() {
        let err = NotFoundError::new(NotFoundErrorKind::Board(9));
        assert!(err.file.ends_with("error.rs"));
        assert!(err.line > 0);
    }
}
