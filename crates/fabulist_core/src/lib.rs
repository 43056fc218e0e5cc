//! Core data types for the Fabulist storyboard engine.
//!
//! This crate holds the records the engine reads and writes (stories,
//! storyboards, scenes, roles, generation tasks, activities), the typed
//! content decoded from provider output, and the telemetry bootstrap.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod activity;
mod content;
mod ids;
mod role;
mod scene;
mod story;
mod storyboard;
mod task;
mod telemetry;

pub use activity::{Activity, ActivityKind, NewActivity};
pub use content::{
    ChapterDetail, ChapterOutline, ChapterSummary, ParsedContent, SceneDetail, StoryOutline,
    StoryboardDraft,
};
pub use ids::{ActivityId, BoardId, RoleId, SceneId, StoryId, TaskId};
pub use role::{NewRole, Role, RoleCounter, RoleDetail};
pub use scene::{NewScene, Scene, SceneMedia, SceneStatus};
pub use story::{NewStory, Story, StoryCounter, StoryStatus};
pub use storyboard::{
    BoardContent, BoardCounter, BoardOverrides, BoardParams, BoardStage, Lifecycle, NewStoryboard,
    Storyboard,
};
pub use task::{
    GenType, GenerationTask, NewGenerationTask, TaskOrigin, TaskStatus, TaskTarget, TaskType,
};
pub use telemetry::{TelemetrySettings, init_telemetry, shutdown_telemetry};
