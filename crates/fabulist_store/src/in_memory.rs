//! Lock-protected in-memory implementation of the content store traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fabulist_core::{
    Activity, ActivityId, BoardCounter, BoardId, BoardStage, GenerationTask, Lifecycle,
    NewActivity, NewGenerationTask, NewRole, NewScene, NewStory, NewStoryboard, Role, RoleCounter,
    RoleId, Scene, SceneId, SceneStatus, Story, StoryCounter, StoryId, Storyboard, TaskId,
};
use fabulist_error::{
    ConflictError, ConflictErrorKind, FabulistResult, NotFoundError, NotFoundErrorKind,
    StoreError, StoreErrorKind,
};
use fabulist_interface::{
    ActivityStore, BoardOrder, BoardUpdate, Page, RoleStore, RoleUpdate, SceneStore, SceneUpdate,
    StoryStore, StoryUpdate, StoryboardStore, TaskFilter, TaskStore, TaskUpdate,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// In-memory content store.
///
/// All tables sit behind one `RwLock`, so every method (counter increments
/// included) is atomic with respect to the others. All data is lost when the
/// last clone is dropped.
///
/// # Example
/// ```no_run
/// use fabulist_core::NewStory;
/// use fabulist_interface::StoryStore;
/// use fabulist_store::InMemoryContentStore;
///
/// #[tokio::main]
/// async fn main() {
///     let store = InMemoryContentStore::new();
///     let story = store.create_story(NewStory::new("Tides", "A drowned city")).await.unwrap();
///     assert_eq!(story.board_num, 0);
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryContentStore {
    tables: Arc<RwLock<Tables>>,
    faults: Arc<Faults>,
}

#[derive(Debug, Default)]
struct Tables {
    stories: BTreeMap<StoryId, Story>,
    boards: BTreeMap<BoardId, Storyboard>,
    scenes: BTreeMap<SceneId, Scene>,
    roles: BTreeMap<RoleId, Role>,
    tasks: BTreeMap<TaskId, GenerationTask>,
    activities: Vec<Activity>,
    board_roles: BTreeSet<(BoardId, RoleId)>,
    sequences: Sequences,
}

#[derive(Debug, Default)]
struct Sequences {
    story: i64,
    board: i64,
    scene: i64,
    role: i64,
    task: i64,
    activity: i64,
}

fn next(sequence: &mut i64) -> i64 {
    *sequence += 1;
    *sequence
}

/// Injected failures for exercising best-effort bookkeeping.
#[derive(Debug, Default)]
struct Faults {
    activities: AtomicBool,
    counters: AtomicBool,
}

impl InMemoryContentStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `record_activity` call fail (for testing).
    pub fn set_activity_failure(&self, fail: bool) {
        self.faults.activities.store(fail, Ordering::SeqCst);
    }

    /// Make every counter increment fail (for testing).
    pub fn set_counter_failure(&self, fail: bool) {
        self.faults.counters.store(fail, Ordering::SeqCst);
    }

    /// Number of stored generation tasks (for testing).
    pub async fn task_count(&self) -> usize {
        self.tables.read().await.tasks.len()
    }

    /// Every board of a story, deleted ones included (for testing).
    pub async fn all_boards(&self, story_id: StoryId) -> Vec<Storyboard> {
        self.tables
            .read()
            .await
            .boards
            .values()
            .filter(|board| board.story_id == story_id)
            .cloned()
            .collect()
    }

    /// Every scene of a board, deleted ones included (for testing).
    pub async fn all_scenes(&self, board_id: BoardId) -> Vec<Scene> {
        self.tables
            .read()
            .await
            .scenes
            .values()
            .filter(|scene| scene.board_id == board_id)
            .cloned()
            .collect()
    }

    /// Clear all tables (for testing).
    pub async fn clear(&self) {
        *self.tables.write().await = Tables::default();
    }

    #[track_caller]
    fn check_counters(&self) -> Result<(), StoreError> {
        if self.faults.counters.load(Ordering::SeqCst) {
            return Err(StoreError::new(StoreErrorKind::Unavailable(
                "counter updates are failing".to_string(),
            )));
        }
        Ok(())
    }
}

fn sort_boards(boards: &mut [Storyboard], order: BoardOrder) {
    boards.sort_by(|a, b| {
        let primary = match order {
            BoardOrder::CreatedDesc => b.create_time.cmp(&a.create_time),
            BoardOrder::UpdatedDesc => b.update_time.cmp(&a.update_time),
            BoardOrder::ForkCountDesc => b.fork_num.cmp(&a.fork_num),
            BoardOrder::LikeCountDesc => b.like_num.cmp(&a.like_num),
        };
        primary.then_with(|| b.id.cmp(&a.id))
    });
}

#[async_trait]
impl StoryStore for InMemoryContentStore {
    async fn create_story(&self, new_story: NewStory) -> FabulistResult<Story> {
        let mut tables = self.tables.write().await;
        let id = StoryId(next(&mut tables.sequences.story));
        let now = Utc::now();
        let story = Story {
            id,
            title: new_story.title,
            origin: new_story.origin,
            status: new_story.status,
            root_board_id: None,
            board_num: 0,
            role_num: 0,
            like_num: 0,
            follow_num: 0,
            creator_id: new_story.creator_id,
            create_time: now,
            update_time: now,
        };
        tables.stories.insert(id, story.clone());
        tracing::debug!(story_id = %id, "Stored story");
        Ok(story)
    }

    async fn get_story(&self, id: StoryId) -> FabulistResult<Option<Story>> {
        Ok(self.tables.read().await.stories.get(&id).cloned())
    }

    async fn update_story(&self, id: StoryId, update: StoryUpdate) -> FabulistResult<Story> {
        let mut tables = self.tables.write().await;
        let story = tables
            .stories
            .get_mut(&id)
            .ok_or_else(|| NotFoundError::new(NotFoundErrorKind::Story(id.get())))?;
        if let Some(title) = update.title {
            story.title = title;
        }
        if let Some(origin) = update.origin {
            story.origin = origin;
        }
        if let Some(status) = update.status {
            story.status = status;
        }
        if let Some(root_board_id) = update.root_board_id {
            story.root_board_id = root_board_id;
        }
        story.update_time = Utc::now();
        Ok(story.clone())
    }

    async fn increment_story_counter(
        &self,
        id: StoryId,
        counter: StoryCounter,
        delta: i64,
    ) -> FabulistResult<i64> {
        self.check_counters()?;
        let mut tables = self.tables.write().await;
        let story = tables
            .stories
            .get_mut(&id)
            .ok_or_else(|| NotFoundError::new(NotFoundErrorKind::Story(id.get())))?;
        let field = match counter {
            StoryCounter::Boards => &mut story.board_num,
            StoryCounter::Roles => &mut story.role_num,
            StoryCounter::Likes => &mut story.like_num,
            StoryCounter::Follows => &mut story.follow_num,
        };
        *field += delta;
        Ok(*field)
    }
}

#[async_trait]
impl StoryboardStore for InMemoryContentStore {
    async fn create_board(&self, new_board: NewStoryboard) -> FabulistResult<Storyboard> {
        let mut tables = self.tables.write().await;
        let id = BoardId(next(&mut tables.sequences.board));
        let now = Utc::now();
        let board = Storyboard {
            id,
            story_id: new_board.story_id,
            prev_id: new_board.prev_id,
            title: new_board.title,
            description: new_board.description,
            stage: BoardStage::Created,
            lifecycle: Lifecycle::Active,
            fork_num: 0,
            like_num: 0,
            params: new_board.params,
            is_ai_gen: new_board.is_ai_gen,
            creator_id: new_board.creator_id,
            create_time: now,
            update_time: now,
        };
        tables.boards.insert(id, board.clone());
        tracing::debug!(board_id = %id, prev_id = ?board.prev_id, "Stored storyboard");
        Ok(board)
    }

    async fn get_board(&self, id: BoardId) -> FabulistResult<Option<Storyboard>> {
        Ok(self.tables.read().await.boards.get(&id).cloned())
    }

    async fn update_board(&self, id: BoardId, update: BoardUpdate) -> FabulistResult<Storyboard> {
        let mut tables = self.tables.write().await;
        let board = tables
            .boards
            .get_mut(&id)
            .ok_or_else(|| NotFoundError::new(NotFoundErrorKind::Board(id.get())))?;
        if let Some(prev_id) = update.prev_id {
            board.prev_id = prev_id;
        }
        if let Some(title) = update.title {
            board.title = title;
        }
        if let Some(description) = update.description {
            board.description = description;
        }
        if let Some(stage) = update.stage {
            board.stage = stage;
        }
        if let Some(lifecycle) = update.lifecycle {
            board.lifecycle = lifecycle;
        }
        if let Some(params) = update.params {
            board.params = params;
        }
        if let Some(is_ai_gen) = update.is_ai_gen {
            board.is_ai_gen = is_ai_gen;
        }
        board.update_time = Utc::now();
        Ok(board.clone())
    }

    async fn list_boards_by_prev(
        &self,
        story_id: StoryId,
        prev_id: Option<BoardId>,
    ) -> FabulistResult<Vec<Storyboard>> {
        let tables = self.tables.read().await;
        Ok(tables
            .boards
            .values()
            .filter(|board| {
                board.story_id == story_id && board.prev_id == prev_id && !board.is_deleted()
            })
            .cloned()
            .collect())
    }

    async fn list_boards_by_story(&self, story_id: StoryId) -> FabulistResult<Vec<Storyboard>> {
        let tables = self.tables.read().await;
        Ok(tables
            .boards
            .values()
            .filter(|board| board.story_id == story_id && !board.is_deleted())
            .cloned()
            .collect())
    }

    async fn list_boards_by_story_and_prev(
        &self,
        story_id: StoryId,
        prev_id: Option<BoardId>,
        page: Page,
        order: BoardOrder,
    ) -> FabulistResult<Vec<Storyboard>> {
        let mut boards = self.list_boards_by_prev(story_id, prev_id).await?;
        sort_boards(&mut boards, order);
        Ok(boards
            .into_iter()
            .skip(page.offset())
            .take(page.limit())
            .collect())
    }

    async fn reparent_boards(
        &self,
        story_id: StoryId,
        from: BoardId,
        to: Option<BoardId>,
    ) -> FabulistResult<Vec<BoardId>> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let mut moved: Vec<(DateTime<Utc>, BoardId)> = Vec::new();
        for board in tables
            .boards
            .values_mut()
            .filter(|board| board.story_id == story_id && board.prev_id == Some(from))
        {
            board.prev_id = to;
            board.update_time = now;
            moved.push((board.create_time, board.id));
        }
        moved.sort();
        Ok(moved.into_iter().map(|(_, id)| id).collect())
    }

    async fn increment_board_counter(
        &self,
        id: BoardId,
        counter: BoardCounter,
        delta: i64,
    ) -> FabulistResult<i64> {
        self.check_counters()?;
        let mut tables = self.tables.write().await;
        let board = tables
            .boards
            .get_mut(&id)
            .ok_or_else(|| NotFoundError::new(NotFoundErrorKind::Board(id.get())))?;
        let field = match counter {
            BoardCounter::Forks => &mut board.fork_num,
            BoardCounter::Likes => &mut board.like_num,
        };
        *field += delta;
        Ok(*field)
    }
}

#[async_trait]
impl SceneStore for InMemoryContentStore {
    async fn create_scene(&self, new_scene: NewScene) -> FabulistResult<Scene> {
        let mut tables = self.tables.write().await;
        let id = SceneId(next(&mut tables.sequences.scene));
        let now = Utc::now();
        let scene = Scene {
            id,
            board_id: new_scene.board_id,
            story_id: new_scene.story_id,
            sequence: new_scene.sequence,
            content: new_scene.content,
            character_ids: new_scene.character_ids,
            image_prompt: new_scene.image_prompt,
            audio_prompt: new_scene.audio_prompt,
            video_prompt: new_scene.video_prompt,
            is_generating: false,
            gen_result: None,
            status: SceneStatus::Draft,
            create_time: now,
            update_time: now,
        };
        tables.scenes.insert(id, scene.clone());
        Ok(scene)
    }

    async fn get_scene(&self, id: SceneId) -> FabulistResult<Option<Scene>> {
        Ok(self.tables.read().await.scenes.get(&id).cloned())
    }

    async fn list_scenes_by_board(&self, board_id: BoardId) -> FabulistResult<Vec<Scene>> {
        let tables = self.tables.read().await;
        let mut scenes: Vec<Scene> = tables
            .scenes
            .values()
            .filter(|scene| scene.board_id == board_id && !scene.is_deleted())
            .cloned()
            .collect();
        scenes.sort_by_key(|scene| (scene.sequence, scene.id));
        Ok(scenes)
    }

    async fn update_scene(&self, id: SceneId, update: SceneUpdate) -> FabulistResult<Scene> {
        let mut tables = self.tables.write().await;
        let scene = tables
            .scenes
            .get_mut(&id)
            .ok_or_else(|| NotFoundError::new(NotFoundErrorKind::Scene(id.get())))?;
        if let Some(content) = update.content {
            scene.content = content;
        }
        if let Some(character_ids) = update.character_ids {
            scene.character_ids = character_ids;
        }
        if let Some(image_prompt) = update.image_prompt {
            scene.image_prompt = image_prompt;
        }
        if let Some(audio_prompt) = update.audio_prompt {
            scene.audio_prompt = audio_prompt;
        }
        if let Some(video_prompt) = update.video_prompt {
            scene.video_prompt = video_prompt;
        }
        if let Some(is_generating) = update.is_generating {
            scene.is_generating = is_generating;
        }
        if let Some(gen_result) = update.gen_result {
            scene.gen_result = Some(gen_result);
        }
        if let Some(status) = update.status {
            scene.status = status;
        }
        scene.update_time = Utc::now();
        Ok(scene.clone())
    }

    async fn update_scene_status(&self, id: SceneId, status: SceneStatus) -> FabulistResult<()> {
        let mut tables = self.tables.write().await;
        let scene = tables
            .scenes
            .get_mut(&id)
            .ok_or_else(|| NotFoundError::new(NotFoundErrorKind::Scene(id.get())))?;
        scene.status = status;
        scene.update_time = Utc::now();
        Ok(())
    }

    async fn batch_update_scene_status(
        &self,
        board_id: BoardId,
        status: SceneStatus,
    ) -> FabulistResult<usize> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let mut changed = 0;
        for scene in tables
            .scenes
            .values_mut()
            .filter(|scene| scene.board_id == board_id && !scene.is_deleted())
        {
            scene.status = status;
            if status == SceneStatus::Deleted {
                scene.is_generating = false;
            }
            scene.update_time = now;
            changed += 1;
        }
        Ok(changed)
    }
}

#[async_trait]
impl RoleStore for InMemoryContentStore {
    async fn create_role(&self, new_role: NewRole) -> FabulistResult<Role> {
        let mut tables = self.tables.write().await;
        let taken = tables
            .roles
            .values()
            .any(|role| role.story_id == new_role.story_id && role.name == new_role.name);
        if taken {
            return Err(ConflictError::new(ConflictErrorKind::DuplicateRoleName {
                story_id: new_role.story_id.get(),
                name: new_role.name,
            })
            .into());
        }
        let id = RoleId(next(&mut tables.sequences.role));
        let now = Utc::now();
        let role = Role {
            id,
            story_id: new_role.story_id,
            name: new_role.name,
            description: new_role.description,
            avatar_url: new_role.avatar_url,
            detail: Default::default(),
            like_num: 0,
            follow_num: 0,
            storyboard_num: 0,
            create_time: now,
            update_time: now,
        };
        tables.roles.insert(id, role.clone());
        Ok(role)
    }

    async fn get_role(&self, id: RoleId) -> FabulistResult<Option<Role>> {
        Ok(self.tables.read().await.roles.get(&id).cloned())
    }

    async fn get_role_by_name(
        &self,
        story_id: StoryId,
        name: &str,
    ) -> FabulistResult<Option<Role>> {
        let tables = self.tables.read().await;
        Ok(tables
            .roles
            .values()
            .find(|role| role.story_id == story_id && role.name == name)
            .cloned())
    }

    async fn list_roles_by_story(&self, story_id: StoryId) -> FabulistResult<Vec<Role>> {
        let tables = self.tables.read().await;
        Ok(tables
            .roles
            .values()
            .filter(|role| role.story_id == story_id)
            .cloned()
            .collect())
    }

    async fn update_role(&self, id: RoleId, update: RoleUpdate) -> FabulistResult<Role> {
        let mut tables = self.tables.write().await;
        let role = tables
            .roles
            .get_mut(&id)
            .ok_or_else(|| NotFoundError::new(NotFoundErrorKind::Role(id.get())))?;
        if let Some(description) = update.description {
            role.description = description;
        }
        if let Some(avatar_url) = update.avatar_url {
            role.avatar_url = Some(avatar_url);
        }
        if let Some(detail) = update.detail {
            role.detail = detail;
        }
        role.update_time = Utc::now();
        Ok(role.clone())
    }

    async fn increment_role_counter(
        &self,
        id: RoleId,
        counter: RoleCounter,
        delta: i64,
    ) -> FabulistResult<i64> {
        self.check_counters()?;
        let mut tables = self.tables.write().await;
        let role = tables
            .roles
            .get_mut(&id)
            .ok_or_else(|| NotFoundError::new(NotFoundErrorKind::Role(id.get())))?;
        let field = match counter {
            RoleCounter::Likes => &mut role.like_num,
            RoleCounter::Follows => &mut role.follow_num,
            RoleCounter::Storyboards => &mut role.storyboard_num,
        };
        *field += delta;
        Ok(*field)
    }

    async fn link_board_role(&self, board_id: BoardId, role_id: RoleId) -> FabulistResult<bool> {
        Ok(self
            .tables
            .write()
            .await
            .board_roles
            .insert((board_id, role_id)))
    }

    async fn list_board_roles(&self, board_id: BoardId) -> FabulistResult<Vec<RoleId>> {
        let tables = self.tables.read().await;
        Ok(tables
            .board_roles
            .range((board_id, RoleId(i64::MIN))..=(board_id, RoleId(i64::MAX)))
            .map(|(_, role_id)| *role_id)
            .collect())
    }
}

#[async_trait]
impl TaskStore for InMemoryContentStore {
    async fn create_task(&self, new_task: NewGenerationTask) -> FabulistResult<GenerationTask> {
        let mut tables = self.tables.write().await;
        let id = TaskId(next(&mut tables.sequences.task));
        let task = GenerationTask {
            id,
            target: new_task.target,
            task_type: new_task.task_type,
            gen_type: new_task.gen_type,
            status: new_task.status,
            positive_prompt: new_task.positive_prompt,
            negative_prompt: new_task.negative_prompt,
            raw_result: None,
            parsed_result: None,
            error_message: None,
            regen: new_task.regen,
            start_time: Utc::now(),
            finish_time: None,
        };
        tables.tasks.insert(id, task.clone());
        tracing::debug!(task_id = %id, target = %task.target, "Stored generation task");
        Ok(task)
    }

    async fn get_task(&self, id: TaskId) -> FabulistResult<Option<GenerationTask>> {
        Ok(self.tables.read().await.tasks.get(&id).cloned())
    }

    async fn list_tasks_by_origin_and_status(
        &self,
        filter: &TaskFilter,
    ) -> FabulistResult<Vec<GenerationTask>> {
        let tables = self.tables.read().await;
        Ok(tables
            .tasks
            .values()
            .rev()
            .filter(|task| filter.matches(task))
            .cloned()
            .collect())
    }

    async fn update_task(&self, id: TaskId, update: TaskUpdate) -> FabulistResult<GenerationTask> {
        let mut tables = self.tables.write().await;
        let task = tables
            .tasks
            .get_mut(&id)
            .ok_or_else(|| NotFoundError::new(NotFoundErrorKind::Task(id.get())))?;
        if let Some(status) = update.status {
            task.status = status;
        }
        if let Some(raw_result) = update.raw_result {
            task.raw_result = Some(raw_result);
        }
        if let Some(parsed_result) = update.parsed_result {
            task.parsed_result = Some(parsed_result);
        }
        if let Some(error_message) = update.error_message {
            task.error_message = Some(error_message);
        }
        if update.finished {
            task.finish_time = Some(Utc::now());
        }
        Ok(task.clone())
    }
}

#[async_trait]
impl ActivityStore for InMemoryContentStore {
    async fn record_activity(&self, activity: NewActivity) -> FabulistResult<Activity> {
        if self.faults.activities.load(Ordering::SeqCst) {
            return Err(StoreError::new(StoreErrorKind::Unavailable(
                "activity log is failing".to_string(),
            ))
            .into());
        }
        let mut tables = self.tables.write().await;
        let id = ActivityId(next(&mut tables.sequences.activity));
        let activity = Activity {
            id,
            kind: activity.kind,
            story_id: activity.story_id,
            board_id: activity.board_id,
            role_id: activity.role_id,
            actor: activity.actor,
            detail: activity.detail,
            create_time: Utc::now(),
        };
        tables.activities.push(activity.clone());
        Ok(activity)
    }

    async fn list_activities(&self, story_id: StoryId) -> FabulistResult<Vec<Activity>> {
        let tables = self.tables.read().await;
        Ok(tables
            .activities
            .iter()
            .filter(|activity| activity.story_id == story_id)
            .cloned()
            .collect())
    }
}
