//! Activity records: a best-effort trail of what happened to a story.

use crate::{ActivityId, BoardId, RoleId, StoryId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActivityKind {
    /// Story synopsis generated
    StoryRendered,
    /// Storyboard continuation generated
    BoardRendered,
    /// Role detail generated
    RoleRendered,
    /// Scene images generated
    ImagesRendered,
    /// Board branched
    BoardForked,
    /// Board published
    BoardPublished,
    /// Board cancelled
    BoardCancelled,
    /// Board deleted
    BoardDeleted,
}

/// A recorded activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// Store key
    pub id: ActivityId,
    /// What happened
    pub kind: ActivityKind,
    /// Story it happened in
    pub story_id: StoryId,
    /// Board involved
    pub board_id: Option<BoardId>,
    /// Role involved
    pub role_id: Option<RoleId>,
    /// Acting user
    pub actor: Option<i64>,
    /// Free-form detail
    pub detail: String,
    /// When it was recorded
    pub create_time: DateTime<Utc>,
}

/// Fields for recording an activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewActivity {
    /// What happened
    pub kind: ActivityKind,
    /// Story it happened in
    pub story_id: StoryId,
    /// Board involved
    pub board_id: Option<BoardId>,
    /// Role involved
    pub role_id: Option<RoleId>,
    /// Acting user
    pub actor: Option<i64>,
    /// Free-form detail
    pub detail: String,
}

impl NewActivity {
    /// An activity in `story_id` with no board, role, actor or detail.
    pub fn new(kind: ActivityKind, story_id: StoryId) -> Self {
        Self {
            kind,
            story_id,
            board_id: None,
            role_id: None,
            actor: None,
            detail: String::new(),
        }
    }

    /// Builder method to set the board.
    pub fn with_board(mut self, board_id: BoardId) -> Self {
        self.board_id = Some(board_id);
        self
    }

    /// Builder method to set the role.
    pub fn with_role(mut self, role_id: RoleId) -> Self {
        self.role_id = Some(role_id);
        self
    }

    /// Builder method to set the actor.
    pub fn with_actor(mut self, actor: Option<i64>) -> Self {
        self.actor = actor;
        self
    }

    /// Builder method to set the detail.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }
}
