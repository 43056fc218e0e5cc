//! Not-found error types.

/// The kind of record that was missing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum NotFoundErrorKind {
    /// Story absent
    #[display("Story {} not found", _0)]
    Story(i64),
    /// Storyboard absent or deleted
    #[display("Storyboard {} not found", _0)]
    Board(i64),
    /// Scene absent or deleted
    #[display("Scene {} not found", _0)]
    Scene(i64),
    /// Role absent
    #[display("Role {} not found", _0)]
    Role(i64),
    /// Generation task absent
    #[display("Generation task {} not found", _0)]
    Task(i64),
}

impl NotFoundErrorKind {
    /// Stable, machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Story(_) => "not_found.story",
            Self::Board(_) => "not_found.board",
            Self::Scene(_) => "not_found.scene",
            Self::Role(_) => "not_found.role",
            Self::Task(_) => "not_found.task",
        }
    }
}

/// Not-found error with source location tracking.
///
/// # Examples
///
/// ```
/// use fabulist_error::{NotFoundError, NotFoundErrorKind};
///
/// let err = NotFoundError::new(NotFoundErrorKind::Role(12));
/// assert!(format!("{}", err).contains("not found"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Not Found: {} at line {} in {}", kind, line, file)]
pub struct NotFoundError {
    /// The kind of record that was missing
    pub kind: NotFoundErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl NotFoundError {
    /// Create a new NotFoundError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: NotFoundErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
