//! Paging and ordering for storyboard listings.

use fabulist_error::{ValidationError, ValidationErrorKind};
use serde::{Deserialize, Serialize};

/// Sort order for storyboard listings. Ties break on id, newest first.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BoardOrder {
    /// Newest first
    #[default]
    CreatedDesc,
    /// Most recently updated first
    UpdatedDesc,
    /// Most forked first
    ForkCountDesc,
    /// Most liked first
    LikeCountDesc,
}

/// A 1-based page of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Page {
    /// Page number, starting at 1
    pub number: u32,
    /// Items per page
    pub size: u32,
}

impl Page {
    /// Page `number` of `size` items.
    pub fn new(number: u32, size: u32) -> Self {
        Self { number, size }
    }

    /// Check the page against a maximum size.
    #[track_caller]
    pub fn validate(&self, max_size: u32) -> Result<(), ValidationError> {
        if self.number == 0 {
            return Err(ValidationError::new(ValidationErrorKind::InvalidPage(
                "page numbers start at 1".to_string(),
            )));
        }
        if self.size == 0 || self.size > max_size {
            return Err(ValidationError::new(ValidationErrorKind::InvalidPage(
                format!("page size must be between 1 and {}", max_size),
            )));
        }
        Ok(())
    }

    /// Items to skip.
    pub fn offset(&self) -> usize {
        (self.number.saturating_sub(1) as usize) * self.size as usize
    }

    /// Items to take.
    pub fn limit(&self) -> usize {
        self.size as usize
    }
}
