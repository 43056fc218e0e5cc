//! Role detail and role continuity.

use super::{Orchestrator, RenderOptions, RenderOutcome};
use crate::bookkeeping;
use crate::extraction::TargetShape;
use crate::{SceneHistory, TaskSpec, TaskStart, TemplateContext};
use fabulist_core::{
    ActivityKind, BoardId, GenerationTask, NewActivity, ParsedContent, Role, RoleDetail, RoleId,
    Story, TaskTarget, TaskType,
};
use fabulist_error::{
    FabulistResult, NotFoundError, NotFoundErrorKind, ParseError, ParseErrorKind, ValidationError,
    ValidationErrorKind,
};
use fabulist_interface::{ContentStore, GenerationProvider, GenerationRequest, RoleUpdate};
use tracing::{debug, info, instrument};

/// A rendered role detail.
#[derive(Debug, Clone, PartialEq)]
pub struct RoleRender {
    /// The role with its new detail
    pub role: Role,
    /// The finished task
    pub task: GenerationTask,
    /// Decoded detail
    pub detail: RoleDetail,
}

impl<S: ContentStore, P: GenerationProvider> Orchestrator<S, P> {
    /// Generate a structured profile for a role.
    ///
    /// The story premise is the background; sibling summaries keep the new
    /// profile from contradicting the rest of the cast.
    #[instrument(skip(self, options), fields(role_id = %role_id, regen = options.regen))]
    pub async fn render_role(
        &self,
        role_id: RoleId,
        options: RenderOptions,
    ) -> FabulistResult<RenderOutcome<RoleRender>> {
        let role = self.get_role(role_id).await?;
        let story = self.tree.get_story(role.story_id).await?;
        story.ensure_open()?;

        let target = TaskTarget::role(role.id, None);
        if let Some(task) = self
            .already_rendering(target, TaskType::Role, &options)
            .await?
        {
            return Ok(RenderOutcome::InProgress(task));
        }

        let siblings: Vec<Role> = self
            .store
            .list_roles_by_story(story.id)
            .await?
            .into_iter()
            .filter(|sibling| sibling.id != role.id)
            .collect();
        let request = self.templates.template_for(&TemplateContext::RoleDetail {
            story: &story,
            role: &role,
            siblings: &siblings,
        })?;

        self.run_role_task(&story, role, None, target, request, options)
            .await
    }

    /// Revise a role's profile from the scenes it appears in along a board's
    /// ancestor chain, oldest first.
    ///
    /// # Errors
    ///
    /// `InvalidTarget` if the board belongs to another story and
    /// `MissingContext` if the role appears in none of the scenes.
    #[instrument(skip(self, options), fields(role_id = %role_id, board_id = %board_id))]
    pub async fn render_role_continuity(
        &self,
        role_id: RoleId,
        board_id: BoardId,
        options: RenderOptions,
    ) -> FabulistResult<RenderOutcome<RoleRender>> {
        let role = self.get_role(role_id).await?;
        let board = self.tree.get_active_board(board_id).await?;
        if board.story_id != role.story_id {
            return Err(ValidationError::new(ValidationErrorKind::InvalidTarget(format!(
                "role {} and board {} belong to different stories",
                role.id, board.id
            )))
            .into());
        }
        let story = self.tree.get_story(role.story_id).await?;
        story.ensure_open()?;

        let target = TaskTarget::role(role.id, Some(board.id));
        if let Some(task) = self
            .already_rendering(target, TaskType::Role, &options)
            .await?
        {
            return Ok(RenderOutcome::InProgress(task));
        }

        let mut chain = self.tree.ancestors(&board, usize::MAX).await?;
        chain.push(board);
        let mut history = Vec::new();
        for step in &chain {
            for scene in self.store.list_scenes_by_board(step.id).await? {
                if scene.features(role.id) {
                    history.push(SceneHistory {
                        board_title: step.title.clone(),
                        sequence: scene.sequence,
                        content: scene.content,
                    });
                }
            }
        }
        debug!(boards = chain.len(), scenes = history.len(), "Collected role history");

        let request = self.templates.template_for(&TemplateContext::RoleContinuity {
            story: &story,
            role: &role,
            history: &history,
        })?;

        let board_id = chain.last().map(|b| b.id);
        self.run_role_task(&story, role, board_id, target, request, options)
            .await
    }

    async fn get_role(&self, role_id: RoleId) -> FabulistResult<Role> {
        self.store
            .get_role(role_id)
            .await?
            .ok_or_else(|| NotFoundError::new(NotFoundErrorKind::Role(role_id.get())).into())
    }

    /// Shared tail of both role renders: track, invoke, decode, store.
    async fn run_role_task(
        &self,
        story: &Story,
        role: Role,
        board_id: Option<BoardId>,
        target: TaskTarget,
        request: GenerationRequest,
        options: RenderOptions,
    ) -> FabulistResult<RenderOutcome<RoleRender>> {
        let task = match self
            .tracker
            .begin_task(
                TaskSpec::text(target, TaskType::Role, request.positive().clone())
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
            .complete_task(&task, &raw, TargetShape::RoleDetail)
            .await?;
        let ParsedContent::Role(detail) = parsed else {
            return Err(ParseError::new(ParseErrorKind::SchemaMismatch {
                shape: TargetShape::RoleDetail.to_string(),
                message: "decoded into a different shape".to_string(),
            })
            .into());
        };

        let mut update = RoleUpdate {
            detail: Some(detail.clone()),
            ..RoleUpdate::default()
        };
        if role.description.trim().is_empty() && !detail.personality.is_empty() {
            update.description = Some(detail.personality.clone());
        }
        let role = self.store.update_role(role.id, update).await?;

        let mut activity = NewActivity::new(ActivityKind::RoleRendered, story.id)
            .with_role(role.id)
            .with_actor(options.actor);
        if let Some(board_id) = board_id {
            activity = activity.with_board(board_id).with_detail("continuity");
        }
        bookkeeping::record(self.store.as_ref(), activity).await;

        info!(task_id = %task.id, role_id = %role.id, "Rendered role detail");
        Ok(RenderOutcome::Completed(RoleRender { role, task, detail }))
    }
}
