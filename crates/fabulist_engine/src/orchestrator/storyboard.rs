//! Storyboard continuation.

use super::{Orchestrator, RenderOptions, RenderOutcome};
use crate::bookkeeping;
use crate::extraction::TargetShape;
use crate::stage::{self, StageEvent};
use crate::{TaskSpec, TaskStart, TemplateContext};
use fabulist_core::{
    ActivityKind, BoardCounter, BoardId, BoardStage, GenerationTask, NewActivity, NewRole,
    NewScene, ParsedContent, Role, RoleCounter, RoleId, Scene, SceneStatus, StoryCounter, StoryId,
    Storyboard, StoryboardDraft, TaskTarget, TaskType,
};
use fabulist_error::{
    FabulistResult, NotFoundError, NotFoundErrorKind, ParseError, ParseErrorKind, ValidationError,
    ValidationErrorKind,
};
use fabulist_interface::{BoardUpdate, ContentStore, GenerationProvider};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

/// A rendered storyboard continuation.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardRender {
    /// The board after the render
    pub board: Storyboard,
    /// The finished task
    pub task: GenerationTask,
    /// Decoded draft
    pub draft: StoryboardDraft,
    /// Scenes created from the draft; empty when the result was not applied
    pub scenes: Vec<Scene>,
    /// Roles the render created
    pub new_roles: Vec<Role>,
    /// Whether the result was applied to the board. A board cancelled or
    /// deleted while its task ran keeps the task history only.
    pub applied: bool,
}

impl<S: ContentStore, P: GenerationProvider> Orchestrator<S, P> {
    /// Generate the scenes of a storyboard from its ancestor chain.
    ///
    /// # Errors
    ///
    /// `StoryClosed`, `BoardPublished`, `BoardCancelled`, `AlreadyRendered`
    /// (a rendered board without `regen`), `InvalidTransition` while media is
    /// generating, and `NotFound` for a missing or deleted board. Provider and
    /// parse failures are recorded on the task and returned.
    #[instrument(skip(self, options), fields(board_id = %board_id, regen = options.regen))]
    pub async fn render_storyboard(
        &self,
        board_id: BoardId,
        options: RenderOptions,
    ) -> FabulistResult<RenderOutcome<BoardRender>> {
        let board = self.tree.get_active_board(board_id).await?;
        let story = self.tree.get_story(board.story_id).await?;
        story.ensure_open()?;
        if board.stage == BoardStage::Published {
            return Err(
                ValidationError::new(ValidationErrorKind::BoardPublished(board.id.get())).into(),
            );
        }

        // Polling while a render runs reports that render, whatever the stage.
        let target = TaskTarget::board(story.id, board.id);
        if let Some(task) = self
            .already_rendering(target, TaskType::Storyboard, &options)
            .await?
        {
            return Ok(RenderOutcome::InProgress(task));
        }

        stage::transition(&board, StageEvent::TextRendered)?;
        if board.stage != BoardStage::Created && !options.regen {
            return Err(
                ValidationError::new(ValidationErrorKind::AlreadyRendered(board.id.get())).into(),
            );
        }

        let ancestors = self
            .tree
            .ancestors(&board, self.templates.ancestor_depth())
            .await?;
        let (existing_roles, new_names) = self
            .classify_roles(story.id, &board.params.roles)
            .await?;
        debug!(
            ancestors = ancestors.len(),
            existing = existing_roles.len(),
            new = new_names.len(),
            "Gathered continuation context"
        );

        let request = self
            .templates
            .template_for(&TemplateContext::StoryboardContinuation {
                story: &story,
                ancestors: &ancestors,
                board: &board,
                existing_roles: &existing_roles,
                new_roles: &new_names,
            })?;
        let task = match self
            .tracker
            .begin_task(
                TaskSpec::text(target, TaskType::Storyboard, request.positive().clone())
                    .with_regen(options.regen),
            )
            .await?
        {
            TaskStart::Started(task) => task,
            TaskStart::AlreadyRunning(task) => return Ok(RenderOutcome::InProgress(task)),
        };

        let raw = self
            .tracker
            .invoke(
                &task,
                self.deadline(&options),
                options.cancel.as_ref(),
                self.provider.generate_text(&request),
            )
            .await?;
        let (task, parsed) = self
            .tracker
            .complete_task(&task, &raw, TargetShape::StoryboardDraft)
            .await?;
        let ParsedContent::Storyboard(draft) = parsed else {
            return Err(ParseError::new(ParseErrorKind::SchemaMismatch {
                shape: TargetShape::StoryboardDraft.to_string(),
                message: "decoded into a different shape".to_string(),
            })
            .into());
        };

        // The board may have been cancelled or deleted while the provider ran.
        let current = match self.store.get_board(board.id).await? {
            Some(current) if !current.is_deleted() && current.stage != BoardStage::Unspecified => {
                current
            }
            Some(current) => {
                info!(
                    task_id = %task.id,
                    stage = %current.stage,
                    "Board left the pipeline; result kept in task history only"
                );
                return Ok(RenderOutcome::Completed(BoardRender {
                    board: current,
                    task,
                    draft,
                    scenes: Vec::new(),
                    new_roles: Vec::new(),
                    applied: false,
                }));
            }
            None => {
                return Err(NotFoundError::new(NotFoundErrorKind::Board(board.id.get())).into());
            }
        };
        let next = stage::transition(&current, StageEvent::TextRendered)?;

        if options.regen {
            let replaced = self
                .store
                .batch_update_scene_status(current.id, SceneStatus::Deleted)
                .await?;
            debug!(replaced, "Soft-deleted previous scenes");
        }

        let (roles, new_roles) = self
            .resolve_roles(story.id, &current.params.roles, &draft)
            .await?;
        let scenes = self.create_scenes(&current, &draft, &roles).await?;
        self.link_roles(&current, &scenes, &roles, &current.params.roles)
            .await?;

        let mut update = BoardUpdate::stage(next);
        update.is_ai_gen = Some(true);
        if current.title.trim().is_empty() && !draft.chapter_summary.title.is_empty() {
            update.title = Some(draft.chapter_summary.title.clone());
        }
        if current.description.trim().is_empty() && !draft.chapter_summary.summary.is_empty() {
            update.description = Some(draft.chapter_summary.summary.clone());
        }
        bookkeeping::settle(
            self.store
                .increment_board_counter(current.id, BoardCounter::Forks, 1)
                .await,
            "board fork count",
        );
        let board = self.store.update_board(current.id, update).await?;

        bookkeeping::record(
            self.store.as_ref(),
            NewActivity::new(ActivityKind::BoardRendered, story.id)
                .with_board(board.id)
                .with_actor(options.actor)
                .with_detail(format!("{} scenes", scenes.len())),
        )
        .await;

        info!(
            task_id = %task.id,
            scenes = scenes.len(),
            new_roles = new_roles.len(),
            stage = %board.stage,
            "Rendered storyboard"
        );
        Ok(RenderOutcome::Completed(BoardRender {
            board,
            task,
            draft,
            scenes,
            new_roles,
            applied: true,
        }))
    }

    /// Split referenced role names into roles the story already has and new names.
    async fn classify_roles(
        &self,
        story_id: StoryId,
        names: &[String],
    ) -> FabulistResult<(Vec<Role>, Vec<String>)> {
        let mut existing = Vec::new();
        let mut new_names = Vec::new();
        for name in distinct_names(names.iter().map(String::as_str)) {
            match self.store.get_role_by_name(story_id, name).await? {
                Some(role) => existing.push(role),
                None => new_names.push(name.to_string()),
            }
        }
        Ok((existing, new_names))
    }

    /// Every role the board references or the draft names, created when missing.
    async fn resolve_roles(
        &self,
        story_id: StoryId,
        params_roles: &[String],
        draft: &StoryboardDraft,
    ) -> FabulistResult<(BTreeMap<String, Role>, Vec<Role>)> {
        let names = params_roles
            .iter()
            .map(String::as_str)
            .chain(
                draft
                    .chapter_detail
                    .scenes
                    .iter()
                    .flat_map(|scene| scene.characters.iter().map(String::as_str)),
            );

        let mut roles = BTreeMap::new();
        let mut created = Vec::new();
        for name in distinct_names(names) {
            if let Some(role) = self.store.get_role_by_name(story_id, name).await? {
                roles.insert(name.to_string(), role);
                continue;
            }
            match self.store.create_role(NewRole::new(story_id, name, "")).await {
                Ok(role) => {
                    bookkeeping::settle(
                        self.store
                            .increment_story_counter(story_id, StoryCounter::Roles, 1)
                            .await,
                        "story role count",
                    );
                    info!(role_id = %role.id, name, "Created role named by storyboard");
                    created.push(role.clone());
                    roles.insert(name.to_string(), role);
                }
                // Lost a race with another render naming the same role.
                Err(e) if e.as_conflict().is_some() => {
                    if let Some(role) = self.store.get_role_by_name(story_id, name).await? {
                        roles.insert(name.to_string(), role);
                    } else {
                        return Err(e);
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Ok((roles, created))
    }

    async fn create_scenes(
        &self,
        board: &Storyboard,
        draft: &StoryboardDraft,
        roles: &BTreeMap<String, Role>,
    ) -> FabulistResult<Vec<Scene>> {
        let mut scenes = Vec::with_capacity(draft.chapter_detail.scenes.len());
        for (index, detail) in draft.chapter_detail.scenes.iter().enumerate() {
            let mut character_ids: Vec<RoleId> = Vec::new();
            for name in &detail.characters {
                if let Some(role) = roles.get(name.trim()) {
                    if !character_ids.contains(&role.id) {
                        character_ids.push(role.id);
                    }
                }
            }
            let scene = self
                .store
                .create_scene(NewScene {
                    board_id: board.id,
                    story_id: board.story_id,
                    sequence: index as u32 + 1,
                    content: detail.content.clone(),
                    character_ids,
                    image_prompt: detail.image_prompt.clone(),
                    audio_prompt: String::new(),
                    video_prompt: String::new(),
                })
                .await?;
            scenes.push(scene);
        }
        Ok(scenes)
    }

    /// Join the board to every role it touches; newly linked roles count one
    /// more storyboard.
    async fn link_roles(
        &self,
        board: &Storyboard,
        scenes: &[Scene],
        roles: &BTreeMap<String, Role>,
        params_roles: &[String],
    ) -> FabulistResult<()> {
        let mut touched: Vec<RoleId> = Vec::new();
        let referenced = distinct_names(params_roles.iter().map(String::as_str))
            .into_iter()
            .filter_map(|name| roles.get(name).map(|role| role.id));
        for role_id in referenced.chain(scenes.iter().flat_map(|s| s.character_ids.iter().copied()))
        {
            if !touched.contains(&role_id) {
                touched.push(role_id);
            }
        }

        for role_id in touched {
            if !self.store.link_board_role(board.id, role_id).await? {
                continue;
            }
            bookkeeping::settle(
                self.store
                    .increment_role_counter(role_id, RoleCounter::Storyboards, 1)
                    .await,
                "role storyboard count",
            );
        }
        Ok(())
    }
}

/// Trimmed, non-empty names in first-seen order.
fn distinct_names<'a>(names: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = Vec::new();
    for name in names.map(str::trim).filter(|name| !name.is_empty()) {
        if !seen.contains(&name) {
            seen.push(name);
        }
    }
    seen
}
