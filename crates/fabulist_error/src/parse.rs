//! Result parsing error types.

/// Ways provider output can fail to decode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum ParseErrorKind {
    /// Cleaned text is not JSON at all
    #[display("Output is not valid JSON: {}", _0)]
    InvalidJson(String),
    /// JSON decoded but does not match the expected shape
    #[display("Output does not match the {} schema: {}", shape, message)]
    SchemaMismatch {
        /// Expected shape name
        shape: String,
        /// Decoder message
        message: String,
    },
}

impl ParseErrorKind {
    /// Stable, machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidJson(_) => "parse.invalid_json",
            Self::SchemaMismatch { .. } => "parse.schema_mismatch",
        }
    }
}

/// Parse error with source location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Parse Error: {} at line {} in {}", kind, line, file)]
pub struct ParseError {
    /// The kind of failure
    pub kind: ParseErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl ParseError {
    /// Create a new ParseError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ParseErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
