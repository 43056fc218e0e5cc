//! Generation task records.

use crate::{BoardId, ParsedContent, RoleId, SceneId, StoryId, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a generation task.
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
pub enum TaskStatus {
    /// Recorded, provider not yet invoked
    Pending,
    /// Provider call in flight
    Running,
    /// Result stored
    Finished,
    /// Failed or abandoned; kept for diagnosis
    Error,
}

impl TaskStatus {
    /// Pending and running tasks both count toward the one-in-flight rule.
    pub fn is_in_flight(self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }
}

/// What level of the story a task generates for.
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
pub enum TaskType {
    /// Story synopsis
    Story,
    /// Storyboard continuation or scene media
    Storyboard,
    /// Role detail or continuity
    Role,
}

/// What kind of output a task asks for.
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
pub enum GenType {
    /// Narrative or structured text
    Text,
    /// Images
    Image,
    /// Audio
    Audio,
    /// Video
    Video,
}

/// The record a task generates content for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum TaskOrigin {
    /// A story
    Story(StoryId),
    /// A role
    Role(RoleId),
    /// A scene (per-scene media)
    Scene(SceneId),
}

impl std::fmt::Display for TaskOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Story(id) => write!(f, "story:{}", id),
            Self::Role(id) => write!(f, "role:{}", id),
            Self::Scene(id) => write!(f, "scene:{}", id),
        }
    }
}

/// Dedupe key half: origin plus the board it is scoped to (`None` at story level).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskTarget {
    /// Origin record
    pub origin: TaskOrigin,
    /// Board scope
    pub board_id: Option<BoardId>,
}

impl TaskTarget {
    /// Story-level target.
    pub fn story(story_id: StoryId) -> Self {
        Self {
            origin: TaskOrigin::Story(story_id),
            board_id: None,
        }
    }

    /// Storyboard-level target within a story.
    pub fn board(story_id: StoryId, board_id: BoardId) -> Self {
        Self {
            origin: TaskOrigin::Story(story_id),
            board_id: Some(board_id),
        }
    }

    /// Role target, optionally scoped to a board.
    pub fn role(role_id: RoleId, board_id: Option<BoardId>) -> Self {
        Self {
            origin: TaskOrigin::Role(role_id),
            board_id,
        }
    }

    /// Per-scene media target.
    pub fn scene(scene_id: SceneId, board_id: BoardId) -> Self {
        Self {
            origin: TaskOrigin::Scene(scene_id),
            board_id: Some(board_id),
        }
    }
}

impl std::fmt::Display for TaskTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.board_id {
            Some(board_id) => write!(f, "{}@board:{}", self.origin, board_id),
            None => write!(f, "{}", self.origin),
        }
    }
}

/// One tracked invocation of a generation provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationTask {
    /// Store key
    pub id: TaskId,
    /// What the task generates for
    pub target: TaskTarget,
    /// Level of the story
    pub task_type: TaskType,
    /// Kind of output
    pub gen_type: GenType,
    /// Status
    pub status: TaskStatus,
    /// Prompt sent to the provider
    pub positive_prompt: String,
    /// Negative prompt, if any
    pub negative_prompt: Option<String>,
    /// Raw provider output, kept even when decoding failed
    pub raw_result: Option<String>,
    /// Decoded output
    pub parsed_result: Option<ParsedContent>,
    /// Failure reason
    pub error_message: Option<String>,
    /// Started as a forced redo
    pub regen: bool,
    /// When the task was recorded
    pub start_time: DateTime<Utc>,
    /// When the task finished or failed
    pub finish_time: Option<DateTime<Utc>>,
}

impl GenerationTask {
    /// Whether the task still counts toward the one-in-flight rule.
    pub fn is_in_flight(&self) -> bool {
        self.status.is_in_flight()
    }
}

/// Fields for inserting a generation task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewGenerationTask {
    /// What the task generates for
    pub target: TaskTarget,
    /// Level of the story
    pub task_type: TaskType,
    /// Kind of output
    pub gen_type: GenType,
    /// Initial status
    pub status: TaskStatus,
    /// Prompt
    pub positive_prompt: String,
    /// Negative prompt
    pub negative_prompt: Option<String>,
    /// Forced redo
    pub regen: bool,
}
