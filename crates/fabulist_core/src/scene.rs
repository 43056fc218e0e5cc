//! Scene records.

use crate::{BoardId, RoleId, SceneId, StoryId, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a scene.
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
pub enum SceneStatus {
    /// Text present, media not yet generated
    #[default]
    Draft,
    /// Media generation in flight
    Generating,
    /// Media generated
    Ready,
    /// Soft-deleted
    Deleted,
}

/// Media generated for a scene.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SceneMedia {
    /// Image locations returned by the provider
    pub image_urls: Vec<String>,
    /// Failure reason of the last attempt
    pub error: Option<String>,
    /// Task that produced this result
    pub task_id: Option<TaskId>,
}

/// A sub-unit of a storyboard carrying its own generation prompts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    /// Store key
    pub id: SceneId,
    /// Owning board
    pub board_id: BoardId,
    /// Owning story
    pub story_id: StoryId,
    /// Position within the board, starting at 1
    pub sequence: u32,
    /// Narrative text
    pub content: String,
    /// Roles appearing in the scene
    pub character_ids: Vec<RoleId>,
    /// Prompt for image generation
    pub image_prompt: String,
    /// Prompt for audio generation
    pub audio_prompt: String,
    /// Prompt for video generation
    pub video_prompt: String,
    /// Media generation in flight
    pub is_generating: bool,
    /// Latest media result
    pub gen_result: Option<SceneMedia>,
    /// Scene status
    pub status: SceneStatus,
    /// Creation time
    pub create_time: DateTime<Utc>,
    /// Last update time
    pub update_time: DateTime<Utc>,
}

impl Scene {
    /// Whether the scene is soft-deleted.
    pub fn is_deleted(&self) -> bool {
        self.status == SceneStatus::Deleted
    }

    /// Whether `role_id` appears in this scene.
    pub fn features(&self, role_id: RoleId) -> bool {
        self.character_ids.contains(&role_id)
    }
}

/// Fields for inserting a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewScene {
    /// Owning board
    pub board_id: BoardId,
    /// Owning story
    pub story_id: StoryId,
    /// Position within the board
    pub sequence: u32,
    /// Narrative text
    pub content: String,
    /// Roles appearing in the scene
    pub character_ids: Vec<RoleId>,
    /// Prompt for image generation
    pub image_prompt: String,
    /// Prompt for audio generation
    pub audio_prompt: String,
    /// Prompt for video generation
    pub video_prompt: String,
}
