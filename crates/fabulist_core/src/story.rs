//! Story records.

use crate::{BoardId, StoryId};
use chrono::{DateTime, Utc};
use fabulist_error::{ValidationError, ValidationErrorKind};
use serde::{Deserialize, Serialize};

/// Lifecycle of a story.
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
pub enum StoryStatus {
    /// Being prepared; generation allowed.
    Draft,
    /// Open for branching and generation.
    #[default]
    Open,
    /// Archived; generation and branching are frozen for the whole tree.
    Closed,
}

/// Top-level narrative container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    /// Store key
    pub id: StoryId,
    /// Display title
    pub title: String,
    /// Premise the story grew from; doubles as the background given to prompts
    pub origin: String,
    /// Lifecycle status
    pub status: StoryStatus,
    /// Canonical root of the storyboard forest, once one exists
    pub root_board_id: Option<BoardId>,
    /// Number of storyboards created under this story
    pub board_num: i64,
    /// Number of roles created under this story
    pub role_num: i64,
    /// Likes
    pub like_num: i64,
    /// Followers
    pub follow_num: i64,
    /// Creating user, if known
    pub creator_id: Option<i64>,
    /// Creation time
    pub create_time: DateTime<Utc>,
    /// Last update time
    pub update_time: DateTime<Utc>,
}

impl Story {
    /// Whether the story is closed.
    pub fn is_closed(&self) -> bool {
        self.status == StoryStatus::Closed
    }

    /// Fail with `StoryClosed` if generation is frozen.
    #[track_caller]
    pub fn ensure_open(&self) -> Result<(), ValidationError> {
        if self.is_closed() {
            return Err(ValidationError::new(ValidationErrorKind::StoryClosed(
                self.id.get(),
            )));
        }
        Ok(())
    }
}

/// Fields for creating a story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewStory {
    /// Display title
    pub title: String,
    /// Premise
    pub origin: String,
    /// Initial status
    pub status: StoryStatus,
    /// Creating user
    pub creator_id: Option<i64>,
}

impl NewStory {
    /// An open story with the given title and premise.
    pub fn new(title: impl Into<String>, origin: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            origin: origin.into(),
            status: StoryStatus::Open,
            creator_id: None,
        }
    }

    /// Builder method to set the initial status.
    pub fn with_status(mut self, status: StoryStatus) -> Self {
        self.status = status;
        self
    }

    /// Builder method to set the creator.
    pub fn with_creator(mut self, creator_id: i64) -> Self {
        self.creator_id = Some(creator_id);
        self
    }
}

/// Aggregate counters kept on a story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum StoryCounter {
    /// `board_num`
    Boards,
    /// `role_num`
    Roles,
    /// `like_num`
    Likes,
    /// `follow_num`
    Follows,
}
