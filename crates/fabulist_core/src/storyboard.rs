//! Storyboard records: the nodes of a story's branch tree.

use crate::{BoardId, StoryId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Pipeline progress of a non-deleted storyboard.
///
/// `Unspecified` is the cancelled state. Deletion is tracked separately by
/// [`Lifecycle`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BoardStage {
    /// Cancelled
    Unspecified,
    /// Created, no content rendered yet
    #[default]
    Created,
    /// Narrative text rendered into scenes
    Rendered,
    /// Per-scene images being generated
    GenImage,
    /// Per-scene video being generated
    GenVideo,
    /// Per-scene audio being generated
    GenAudio,
    /// All media settled
    Finished,
    /// Published; terminal
    Published,
}

impl BoardStage {
    /// Media generation is underway.
    pub fn is_generating_media(self) -> bool {
        matches!(self, Self::GenImage | Self::GenVideo | Self::GenAudio)
    }

    /// No further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Published | Self::Unspecified)
    }
}

/// Whether a record is live or soft-deleted.
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
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Lifecycle {
    /// Live
    #[default]
    Active,
    /// Soft-deleted
    Deleted,
}

/// Generation parameters carried by a storyboard.
///
/// Stored serialized alongside the board. Unknown keys survive a round trip
/// through `extra`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardParams {
    /// Role names this chapter should feature
    pub roles: Vec<String>,
    /// Visual or narrative style hint
    pub style: Option<String>,
    /// Extra direction from the author for this chapter
    pub direction: Option<String>,
    /// Desired number of scenes
    pub scene_count: Option<u32>,
    /// Anything else the client sent
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// One node of a story's branch tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Storyboard {
    /// Store key
    pub id: BoardId,
    /// Owning story
    pub story_id: StoryId,
    /// Parent board; `None` for a root
    pub prev_id: Option<BoardId>,
    /// Chapter title
    pub title: String,
    /// Chapter description
    pub description: String,
    /// Pipeline progress
    pub stage: BoardStage,
    /// Live or soft-deleted
    pub lifecycle: Lifecycle,
    /// Number of branches grown from this board
    pub fork_num: i64,
    /// Likes
    pub like_num: i64,
    /// Generation parameters
    pub params: BoardParams,
    /// Whether the content came from generation rather than the author
    pub is_ai_gen: bool,
    /// Creating user, if known
    pub creator_id: Option<i64>,
    /// Creation time
    pub create_time: DateTime<Utc>,
    /// Last update time
    pub update_time: DateTime<Utc>,
}

impl Storyboard {
    /// Whether this board has no parent.
    pub fn is_root(&self) -> bool {
        self.prev_id.is_none()
    }

    /// Whether this board is soft-deleted.
    pub fn is_deleted(&self) -> bool {
        self.lifecycle == Lifecycle::Deleted
    }
}

/// Author-supplied content for a new board.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BoardContent {
    /// Chapter title
    pub title: String,
    /// Chapter description
    pub description: String,
    /// Generation parameters
    pub params: BoardParams,
    /// Whether the content is generated
    pub is_ai_gen: bool,
    /// Creating user
    pub creator_id: Option<i64>,
}

impl BoardContent {
    /// Content with a title and description and default parameters.
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    /// Builder method to set the parameters.
    pub fn with_params(mut self, params: BoardParams) -> Self {
        self.params = params;
        self
    }

    /// Builder method to mark the content as generated.
    pub fn with_ai_gen(mut self, is_ai_gen: bool) -> Self {
        self.is_ai_gen = is_ai_gen;
        self
    }

    /// Builder method to set the creator.
    pub fn with_creator(mut self, creator_id: i64) -> Self {
        self.creator_id = Some(creator_id);
        self
    }
}

/// Field overrides applied when forking a board.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BoardOverrides {
    /// Replacement title
    pub title: Option<String>,
    /// Replacement description
    pub description: Option<String>,
    /// Replacement parameters
    pub params: Option<BoardParams>,
    /// Replacement generated flag
    pub is_ai_gen: Option<bool>,
    /// Creator of the fork
    pub creator_id: Option<i64>,
}

impl BoardOverrides {
    /// Apply the overrides onto fields duplicated from the parent.
    pub fn apply(&self, new_board: &mut NewStoryboard) {
        if let Some(title) = &self.title {
            new_board.title = title.clone();
        }
        if let Some(description) = &self.description {
            new_board.description = description.clone();
        }
        if let Some(params) = &self.params {
            new_board.params = params.clone();
        }
        if let Some(is_ai_gen) = self.is_ai_gen {
            new_board.is_ai_gen = is_ai_gen;
        }
        if self.creator_id.is_some() {
            new_board.creator_id = self.creator_id;
        }
    }
}

/// Fields for inserting a storyboard. Identity, counters, stage and
/// timestamps are assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewStoryboard {
    /// Owning story
    pub story_id: StoryId,
    /// Parent board
    pub prev_id: Option<BoardId>,
    /// Chapter title
    pub title: String,
    /// Chapter description
    pub description: String,
    /// Generation parameters
    pub params: BoardParams,
    /// Whether the content is generated
    pub is_ai_gen: bool,
    /// Creating user
    pub creator_id: Option<i64>,
}

impl NewStoryboard {
    /// Insert fields for `content` placed under `prev_id` in `story_id`.
    pub fn from_content(story_id: StoryId, prev_id: Option<BoardId>, content: BoardContent) -> Self {
        Self {
            story_id,
            prev_id,
            title: content.title,
            description: content.description,
            params: content.params,
            is_ai_gen: content.is_ai_gen,
            creator_id: content.creator_id,
        }
    }

    /// Duplicate the user-facing fields of `parent` as a new child of it.
    pub fn duplicate_of(parent: &Storyboard) -> Self {
        Self {
            story_id: parent.story_id,
            prev_id: Some(parent.id),
            title: parent.title.clone(),
            description: parent.description.clone(),
            params: parent.params.clone(),
            is_ai_gen: parent.is_ai_gen,
            creator_id: parent.creator_id,
        }
    }
}

/// Aggregate counters kept on a storyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum BoardCounter {
    /// `fork_num`
    Forks,
    /// `like_num`
    Likes,
}
