//! Error types for the Fabulist storyboard engine.
//!
//! # Error Hierarchy
//!
//! Every error follows the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum names the specific condition
//! - `*Error` struct wraps the kind with source location tracking
//! - constructors use `#[track_caller]` to capture the location automatically
//!
//! The taxonomy maps onto how callers react:
//!
//! | error | reaction |
//! |---|---|
//! | [`ValidationError`], [`NotFoundError`], [`ConflictError`] | returned immediately with a stable code |
//! | [`ProviderError`], [`ParseError`] | recorded on the generation task, surfaced as a failure |
//! | [`StoreError`], [`ConfigError`], [`JsonError`] | infrastructure failures |
//!
//! # Examples
//!
//! ```
//! use fabulist_error::{FabulistResult, NotFoundError, NotFoundErrorKind};
//!
//! fn load_board() -> FabulistResult<String> {
//!     Err(NotFoundError::new(NotFoundErrorKind::Board(7)))?
//! }
//!
//! let err = load_board().unwrap_err();
//! assert_eq!(err.code(), "not_found.board");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod conflict;
mod error;
mod json;
mod not_found;
mod parse;
mod provider;
mod store;
mod validation;

pub use config::ConfigError;
pub use conflict::{ConflictError, ConflictErrorKind};
pub use error::{FabulistError, FabulistErrorKind, FabulistResult};
pub use json::JsonError;
pub use not_found::{NotFoundError, NotFoundErrorKind};
pub use parse::{ParseError, ParseErrorKind};
pub use provider::{ProviderError, ProviderErrorKind};
pub use store::{StoreError, StoreErrorKind};
pub use validation::{ValidationError, ValidationErrorKind};
