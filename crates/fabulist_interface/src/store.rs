//! The content store seam.
//!
//! One trait per record type, gathered under [`ContentStore`]. Lookups return
//! `Ok(None)` for absent records; updates of absent records fail with
//! `NotFoundError`. Counter increments are atomic in the store and never
//! read-modify-write in the caller.

use crate::{BoardOrder, Page};
use async_trait::async_trait;
use fabulist_core::{
    Activity, BoardCounter, BoardId, BoardParams, BoardStage, GenType, GenerationTask, Lifecycle,
    NewActivity, NewGenerationTask, NewRole, NewScene, NewStory, NewStoryboard, ParsedContent,
    Role, RoleCounter, RoleDetail, RoleId, Scene, SceneId, SceneMedia, SceneStatus, Story,
    StoryCounter, StoryId, StoryStatus, Storyboard, TaskId, TaskStatus, TaskTarget, TaskType,
};
use fabulist_error::FabulistResult;
use serde::{Deserialize, Serialize};

/// Columns to change on a story. `None` leaves a column untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StoryUpdate {
    /// New title
    pub title: Option<String>,
    /// New premise
    pub origin: Option<String>,
    /// New status
    pub status: Option<StoryStatus>,
    /// New root; `Some(None)` clears it
    pub root_board_id: Option<Option<BoardId>>,
}

/// Columns to change on a storyboard.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BoardUpdate {
    /// New parent; `Some(None)` makes the board a root
    pub prev_id: Option<Option<BoardId>>,
    /// New title
    pub title: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New stage
    pub stage: Option<BoardStage>,
    /// New lifecycle
    pub lifecycle: Option<Lifecycle>,
    /// New parameters
    pub params: Option<BoardParams>,
    /// New generated flag
    pub is_ai_gen: Option<bool>,
}

impl BoardUpdate {
    /// Change only the stage.
    pub fn stage(stage: BoardStage) -> Self {
        Self {
            stage: Some(stage),
            ..Self::default()
        }
    }

    /// Change only the parent.
    pub fn reparent(prev_id: Option<BoardId>) -> Self {
        Self {
            prev_id: Some(prev_id),
            ..Self::default()
        }
    }
}

/// Columns to change on a scene.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SceneUpdate {
    /// New text
    pub content: Option<String>,
    /// New roles
    pub character_ids: Option<Vec<RoleId>>,
    /// New image prompt
    pub image_prompt: Option<String>,
    /// New audio prompt
    pub audio_prompt: Option<String>,
    /// New video prompt
    pub video_prompt: Option<String>,
    /// New generating flag
    pub is_generating: Option<bool>,
    /// New media result
    pub gen_result: Option<SceneMedia>,
    /// New status
    pub status: Option<SceneStatus>,
}

/// Columns to change on a role.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RoleUpdate {
    /// New description
    pub description: Option<String>,
    /// New portrait
    pub avatar_url: Option<String>,
    /// New structured detail
    pub detail: Option<RoleDetail>,
}

/// Columns to change on a generation task.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TaskUpdate {
    /// New status
    pub status: Option<TaskStatus>,
    /// Raw provider output
    pub raw_result: Option<String>,
    /// Decoded output
    pub parsed_result: Option<ParsedContent>,
    /// Failure reason
    pub error_message: Option<String>,
    /// Set the finish time to now
    pub finished: bool,
}

/// Predicate for task listings. Unset fields match everything.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TaskFilter {
    /// Origin and board scope
    pub target: Option<TaskTarget>,
    /// Task type
    pub task_type: Option<TaskType>,
    /// Output kind
    pub gen_type: Option<GenType>,
    /// Accepted statuses; empty accepts all
    pub statuses: Vec<TaskStatus>,
}

impl TaskFilter {
    /// Tasks for `target` of `task_type` that are still in flight.
    pub fn in_flight(target: TaskTarget, task_type: TaskType) -> Self {
        Self {
            target: Some(target),
            task_type: Some(task_type),
            gen_type: None,
            statuses: vec![TaskStatus::Pending, TaskStatus::Running],
        }
    }

    /// Builder method to restrict statuses.
    pub fn with_statuses(mut self, statuses: Vec<TaskStatus>) -> Self {
        self.statuses = statuses;
        self
    }

    /// Builder method to restrict the output kind.
    pub fn with_gen_type(mut self, gen_type: GenType) -> Self {
        self.gen_type = Some(gen_type);
        self
    }

    /// Whether `task` satisfies the filter.
    pub fn matches(&self, task: &GenerationTask) -> bool {
        if let Some(target) = &self.target {
            if &task.target != target {
                return false;
            }
        }
        if let Some(task_type) = self.task_type {
            if task.task_type != task_type {
                return false;
            }
        }
        if let Some(gen_type) = self.gen_type {
            if task.gen_type != gen_type {
                return false;
            }
        }
        self.statuses.is_empty() || self.statuses.contains(&task.status)
    }
}

/// Story persistence.
#[async_trait]
pub trait StoryStore: Send + Sync {
    /// Insert a story.
    async fn create_story(&self, new_story: NewStory) -> FabulistResult<Story>;

    /// Look up a story.
    async fn get_story(&self, id: StoryId) -> FabulistResult<Option<Story>>;

    /// Change columns of a story.
    async fn update_story(&self, id: StoryId, update: StoryUpdate) -> FabulistResult<Story>;

    /// Atomically add `delta` to a counter, returning the new value.
    async fn increment_story_counter(
        &self,
        id: StoryId,
        counter: StoryCounter,
        delta: i64,
    ) -> FabulistResult<i64>;
}

/// Storyboard persistence. Listings return active boards only.
#[async_trait]
pub trait StoryboardStore: Send + Sync {
    /// Insert a board in stage `Created`.
    async fn create_board(&self, new_board: NewStoryboard) -> FabulistResult<Storyboard>;

    /// Look up a board, deleted or not.
    async fn get_board(&self, id: BoardId) -> FabulistResult<Option<Storyboard>>;

    /// Change columns of a board.
    async fn update_board(&self, id: BoardId, update: BoardUpdate) -> FabulistResult<Storyboard>;

    /// Active boards whose parent is `prev_id`, oldest first.
    async fn list_boards_by_prev(
        &self,
        story_id: StoryId,
        prev_id: Option<BoardId>,
    ) -> FabulistResult<Vec<Storyboard>>;

    /// All active boards of a story, oldest first.
    async fn list_boards_by_story(&self, story_id: StoryId) -> FabulistResult<Vec<Storyboard>>;

    /// Active boards under `prev_id`, ordered and paged.
    async fn list_boards_by_story_and_prev(
        &self,
        story_id: StoryId,
        prev_id: Option<BoardId>,
        page: Page,
        order: BoardOrder,
    ) -> FabulistResult<Vec<Storyboard>>;

    /// Point every board of the story whose parent is `from`, deleted ones
    /// included, at `to`. Returns the moved ids, oldest first.
    async fn reparent_boards(
        &self,
        story_id: StoryId,
        from: BoardId,
        to: Option<BoardId>,
    ) -> FabulistResult<Vec<BoardId>>;

    /// Atomically add `delta` to a counter, returning the new value.
    async fn increment_board_counter(
        &self,
        id: BoardId,
        counter: BoardCounter,
        delta: i64,
    ) -> FabulistResult<i64>;
}

/// Scene persistence.
#[async_trait]
pub trait SceneStore: Send + Sync {
    /// Insert a scene in status `Draft`.
    async fn create_scene(&self, new_scene: NewScene) -> FabulistResult<Scene>;

    /// Look up a scene.
    async fn get_scene(&self, id: SceneId) -> FabulistResult<Option<Scene>>;

    /// Non-deleted scenes of a board in sequence order.
    async fn list_scenes_by_board(&self, board_id: BoardId) -> FabulistResult<Vec<Scene>>;

    /// Change columns of a scene.
    async fn update_scene(&self, id: SceneId, update: SceneUpdate) -> FabulistResult<Scene>;

    /// Change only the status of a scene.
    async fn update_scene_status(&self, id: SceneId, status: SceneStatus) -> FabulistResult<()>;

    /// Change the status of every non-deleted scene of a board, returning how many changed.
    async fn batch_update_scene_status(
        &self,
        board_id: BoardId,
        status: SceneStatus,
    ) -> FabulistResult<usize>;
}

/// Role persistence.
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Insert a role. Fails with `ConflictError` if the name is taken in the story.
    async fn create_role(&self, new_role: NewRole) -> FabulistResult<Role>;

    /// Look up a role.
    async fn get_role(&self, id: RoleId) -> FabulistResult<Option<Role>>;

    /// Look up a role by its name within a story.
    async fn get_role_by_name(&self, story_id: StoryId, name: &str)
    -> FabulistResult<Option<Role>>;

    /// All roles of a story, oldest first.
    async fn list_roles_by_story(&self, story_id: StoryId) -> FabulistResult<Vec<Role>>;

    /// Change columns of a role.
    async fn update_role(&self, id: RoleId, update: RoleUpdate) -> FabulistResult<Role>;

    /// Atomically add `delta` to a counter, returning the new value.
    async fn increment_role_counter(
        &self,
        id: RoleId,
        counter: RoleCounter,
        delta: i64,
    ) -> FabulistResult<i64>;

    /// Record that a role appears on a board. Idempotent; returns whether a link was added.
    async fn link_board_role(&self, board_id: BoardId, role_id: RoleId) -> FabulistResult<bool>;

    /// Roles linked to a board.
    async fn list_board_roles(&self, board_id: BoardId) -> FabulistResult<Vec<RoleId>>;
}

/// Generation task persistence.
///
/// Stores outlive any single request so abandoned tasks can be closed from
/// a background task.
#[async_trait]
pub trait TaskStore: Send + Sync + 'static {
    /// Insert a task.
    async fn create_task(&self, new_task: NewGenerationTask) -> FabulistResult<GenerationTask>;

    /// Look up a task.
    async fn get_task(&self, id: TaskId) -> FabulistResult<Option<GenerationTask>>;

    /// Tasks matching the filter, newest first.
    async fn list_tasks_by_origin_and_status(
        &self,
        filter: &TaskFilter,
    ) -> FabulistResult<Vec<GenerationTask>>;

    /// Change columns of a task.
    async fn update_task(&self, id: TaskId, update: TaskUpdate) -> FabulistResult<GenerationTask>;
}

/// Activity persistence.
#[async_trait]
pub trait ActivityStore: Send + Sync {
    /// Record an activity.
    async fn record_activity(&self, activity: NewActivity) -> FabulistResult<Activity>;

    /// Activities of a story, oldest first.
    async fn list_activities(&self, story_id: StoryId) -> FabulistResult<Vec<Activity>>;
}

/// Everything the engine needs from durable storage.
pub trait ContentStore:
    StoryStore + StoryboardStore + SceneStore + RoleStore + TaskStore + ActivityStore
{
}

impl<T> ContentStore for T where
    T: StoryStore + StoryboardStore + SceneStore + RoleStore + TaskStore + ActivityStore
{
}
