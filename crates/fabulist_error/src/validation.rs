//! Validation error types.
//!
//! Raised when a request is well-formed but not allowed in the current state
//! of the story or storyboard. Never retried.

/// Specific validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum ValidationErrorKind {
    /// The story is closed; generation and branching are frozen.
    #[display("Story {} is closed", _0)]
    StoryClosed(i64),
    /// The storyboard is published and accepts no further render or fork.
    #[display("Storyboard {} is published", _0)]
    BoardPublished(i64),
    /// The storyboard was cancelled.
    #[display("Storyboard {} is cancelled", _0)]
    BoardCancelled(i64),
    /// The storyboard already carries rendered content and regeneration was not requested.
    #[display("Storyboard {} is already rendered; request regeneration to redo it", _0)]
    AlreadyRendered(i64),
    /// The storyboard has no scenes to generate media for.
    #[display("Storyboard {} has no scenes", _0)]
    NoScenes(i64),
    /// A stage transition is not permitted.
    #[display("Cannot apply '{}' to a storyboard in stage '{}'", event, from)]
    InvalidTransition {
        /// Current stage
        from: String,
        /// Requested event
        event: String,
    },
    /// A prompt could not be assembled because required context is absent.
    #[display("Missing context for prompt: {}", _0)]
    MissingContext(String),
    /// The referenced target does not belong where it was used.
    #[display("Invalid target: {}", _0)]
    InvalidTarget(String),
    /// Paging parameters out of range.
    #[display("Invalid page: {}", _0)]
    InvalidPage(String),
}

impl ValidationErrorKind {
    /// Stable, machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::StoryClosed(_) => "validation.story_closed",
            Self::BoardPublished(_) => "validation.board_published",
            Self::BoardCancelled(_) => "validation.board_cancelled",
            Self::AlreadyRendered(_) => "validation.already_rendered",
            Self::NoScenes(_) => "validation.no_scenes",
            Self::InvalidTransition { .. } => "validation.invalid_transition",
            Self::MissingContext(_) => "validation.missing_context",
            Self::InvalidTarget(_) => "validation.invalid_target",
            Self::InvalidPage(_) => "validation.invalid_page",
        }
    }
}

/// Validation error with source location tracking.
///
/// # Examples
///
/// ```
/// use fabulist_error::{ValidationError, ValidationErrorKind};
///
/// let err = ValidationError::new(ValidationErrorKind::StoryClosed(3));
/// assert!(format!("{}", err).contains("closed"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Validation Error: {} at line {} in {}", kind, line, file)]
pub struct ValidationError {
    /// The kind of error that occurred
    pub kind: ValidationErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl ValidationError {
    /// Create a new ValidationError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ValidationErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
