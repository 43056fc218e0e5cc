//! Conflict error types.

/// Conflicting-state conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum ConflictErrorKind {
    /// A generation task for the same target is already in flight.
    #[display("Generation task {} is already rendering", _0)]
    AlreadyRendering(i64),
    /// A role with this name already exists in the story.
    #[display("Role '{}' already exists in story {}", name, story_id)]
    DuplicateRoleName {
        /// Owning story
        story_id: i64,
        /// Conflicting name
        name: String,
    },
}

impl ConflictErrorKind {
    /// Stable, machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AlreadyRendering(_) => "conflict.already_rendering",
            Self::DuplicateRoleName { .. } => "conflict.duplicate_role_name",
        }
    }
}

/// Conflict error with source location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Conflict: {} at line {} in {}", kind, line, file)]
pub struct ConflictError {
    /// The kind of conflict
    pub kind: ConflictErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl ConflictError {
    /// Create a new ConflictError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ConflictErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
