//! Generation provider error types.

/// Failure modes of an external generation call.
///
/// Any of these is a total failure of the call; nothing partial is kept.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum ProviderErrorKind {
    /// Network or non-success response from the provider
    #[display("Provider request failed: {}", _0)]
    Request(String),
    /// The caller-supplied deadline elapsed before the provider answered
    #[display("Provider call exceeded its deadline of {} ms", _0)]
    Timeout(u64),
    /// The caller cancelled the call
    #[display("Provider call was cancelled")]
    Cancelled,
    /// The provider answered with nothing usable
    #[display("Provider returned an empty response")]
    EmptyResponse,
    /// The provider answered with a response of the wrong shape
    #[display("Provider returned a malformed response: {}", _0)]
    Malformed(String),
}

impl ProviderErrorKind {
    /// Stable, machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Request(_) => "provider.request",
            Self::Timeout(_) => "provider.timeout",
            Self::Cancelled => "provider.cancelled",
            Self::EmptyResponse => "provider.empty_response",
            Self::Malformed(_) => "provider.malformed",
        }
    }

    /// Whether the call was abandoned by the caller rather than failed by the provider.
    pub fn is_abandoned(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Cancelled)
    }
}

/// Provider error with source location tracking.
///
/// # Examples
///
/// ```
/// use fabulist_error::{ProviderError, ProviderErrorKind};
///
/// let err = ProviderError::new(ProviderErrorKind::Timeout(30_000));
/// assert!(err.kind.is_abandoned());
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Provider Error: {} at line {} in {}", kind, line, file)]
pub struct ProviderError {
    /// The kind of failure
    pub kind: ProviderErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl ProviderError {
    /// Create a new ProviderError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ProviderErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
