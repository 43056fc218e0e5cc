//! Per-scene image generation.

use super::{Orchestrator, RenderOptions, RenderOutcome};
use crate::bookkeeping;
use crate::stage::{self, StageEvent};
use crate::{TaskSpec, TaskStart, TemplateContext};
use fabulist_core::{
    ActivityKind, BoardId, BoardStage, GenType, NewActivity, ParsedContent, Role, RoleId, Scene,
    SceneId, SceneMedia, SceneStatus, Story, Storyboard, TaskId, TaskTarget, TaskType,
};
use fabulist_error::{FabulistError, FabulistResult, ValidationError, ValidationErrorKind};
use fabulist_interface::{BoardUpdate, ContentStore, GenerationProvider, SceneUpdate};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use tracing::{debug, info, instrument, warn};

/// What happened to one scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneImageOutcome {
    /// Images were generated and stored on the scene
    Generated(Vec<String>),
    /// Generation failed; the reason is stored on the scene
    Failed(String),
    /// Another task for this scene is already in flight
    InProgress,
    /// The board left the pipeline while the call ran; nothing was stored
    Discarded,
}

/// Result for one scene of the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneImageResult {
    /// Scene
    pub scene_id: SceneId,
    /// Position within the board
    pub sequence: u32,
    /// Task that generated (or is generating) the images
    pub task_id: Option<TaskId>,
    /// Outcome
    pub outcome: SceneImageOutcome,
}

/// A rendered set of scene images.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRender {
    /// The board after settling
    pub board: Storyboard,
    /// One result per scene, in scene order
    pub scenes: Vec<SceneImageResult>,
}

impl ImageRender {
    /// Scenes that received images.
    pub fn generated(&self) -> usize {
        self.scenes
            .iter()
            .filter(|s| matches!(s.outcome, SceneImageOutcome::Generated(_)))
            .count()
    }
}

impl<S: ContentStore, P: GenerationProvider> Orchestrator<S, P> {
    /// Illustrate every scene of a rendered board.
    ///
    /// Moves the board to `GEN_IMAGE`, runs one image task per scene with at
    /// most `image_concurrency` in flight, stores each result on its scene,
    /// and settles the board to `FINISHED` once no scene is generating.
    /// Scenes that fail keep their error and do not hold the board back.
    ///
    /// # Errors
    ///
    /// `NoScenes` for a board without scenes and `InvalidTransition` for a
    /// board whose text is not rendered.
    #[instrument(skip(self, options), fields(board_id = %board_id, regen = options.regen))]
    pub async fn render_scene_images(
        &self,
        board_id: BoardId,
        options: RenderOptions,
    ) -> FabulistResult<RenderOutcome<ImageRender>> {
        let board = self.tree.get_active_board(board_id).await?;
        let story = self.tree.get_story(board.story_id).await?;
        story.ensure_open()?;
        let scenes = self.store.list_scenes_by_board(board.id).await?;

        // A board already in GEN_IMAGE is either busy or was interrupted.
        let next = if board.stage == BoardStage::GenImage {
            for scene in &scenes {
                let target = TaskTarget::scene(scene.id, board.id);
                if let Some(task) = self
                    .already_rendering(target, TaskType::Storyboard, &options)
                    .await?
                {
                    return Ok(RenderOutcome::InProgress(task));
                }
            }
            BoardStage::GenImage
        } else {
            stage::transition(&board, StageEvent::MediaDispatched(GenType::Image))?
        };
        if scenes.is_empty() {
            return Err(ValidationError::new(ValidationErrorKind::NoScenes(board.id.get())).into());
        }

        let board = self
            .store
            .update_board(board.id, BoardUpdate::stage(next))
            .await?;
        for scene in &scenes {
            self.store
                .update_scene(
                    scene.id,
                    SceneUpdate {
                        is_generating: Some(true),
                        status: Some(SceneStatus::Generating),
                        ..SceneUpdate::default()
                    },
                )
                .await?;
        }

        let roles: HashMap<RoleId, Role> = self
            .store
            .list_roles_by_story(story.id)
            .await?
            .into_iter()
            .map(|role| (role.id, role))
            .collect();

        let limit = self.settings.image_concurrency.max(1);
        debug!(scenes = scenes.len(), limit, "Dispatching scene images");
        let results: Vec<FabulistResult<SceneImageResult>> = stream::iter(&scenes)
            .map(|scene| self.render_scene_image(&story, &board, scene, &roles, &options))
            .buffer_unordered(limit)
            .collect()
            .await;
        let mut results = results.into_iter().collect::<FabulistResult<Vec<_>>>()?;
        results.sort_by_key(|result| result.sequence);

        let board = self.settle_media(board.id).await?;
        let render = ImageRender {
            board,
            scenes: results,
        };
        bookkeeping::record(
            self.store.as_ref(),
            NewActivity::new(ActivityKind::ImagesRendered, story.id)
                .with_board(render.board.id)
                .with_actor(options.actor)
                .with_detail(format!(
                    "{} of {} scenes",
                    render.generated(),
                    render.scenes.len()
                )),
        )
        .await;

        info!(
            generated = render.generated(),
            scenes = render.scenes.len(),
            stage = %render.board.stage,
            "Rendered scene images"
        );
        Ok(RenderOutcome::Completed(render))
    }

    async fn render_scene_image(
        &self,
        story: &Story,
        board: &Storyboard,
        scene: &Scene,
        roles: &HashMap<RoleId, Role>,
        options: &RenderOptions,
    ) -> FabulistResult<SceneImageResult> {
        let result = |task_id: Option<TaskId>, outcome: SceneImageOutcome| SceneImageResult {
            scene_id: scene.id,
            sequence: scene.sequence,
            task_id,
            outcome,
        };

        let cast: Vec<Role> = scene
            .character_ids
            .iter()
            .filter_map(|id| roles.get(id).cloned())
            .collect();
        let request = match self.templates.template_for(&TemplateContext::SceneImage {
            story,
            board,
            scene,
            roles: &cast,
        }) {
            Ok(request) => request.with_reference_image(
                cast.iter().find_map(|role| role.avatar_url.clone()),
            ),
            Err(e) => {
                self.store_scene_failure(scene.id, None, &e).await?;
                return Ok(result(None, SceneImageOutcome::Failed(e.to_string())));
            }
        };

        let spec = TaskSpec::text(
            TaskTarget::scene(scene.id, board.id),
            TaskType::Storyboard,
            request.positive().clone(),
        )
        .with_gen_type(GenType::Image)
        .with_negative(request.negative().clone())
        .with_regen(options.regen);
        let task = match self.tracker.begin_task(spec).await? {
            TaskStart::Started(task) => task,
            TaskStart::AlreadyRunning(task) => {
                return Ok(result(Some(task.id), SceneImageOutcome::InProgress));
            }
        };

        let generated = match self
            .tracker
            .invoke(
                &task,
                self.deadline(options),
                options.cancel.as_ref(),
                self.provider.generate_images(&request),
            )
            .await
        {
            Ok(urls) => self.tracker.complete_images(&task, urls).await,
            Err(e) => Err(e),
        };

        if !self.board_in_pipeline(board.id).await? {
            self.store
                .update_scene(
                    scene.id,
                    SceneUpdate {
                        is_generating: Some(false),
                        status: Some(SceneStatus::Draft),
                        ..SceneUpdate::default()
                    },
                )
                .await?;
            return Ok(result(Some(task.id), SceneImageOutcome::Discarded));
        }

        match generated {
            Ok(finished) => {
                let urls = match finished.parsed_result {
                    Some(ParsedContent::Images(urls)) => urls,
                    _ => Vec::new(),
                };
                self.store
                    .update_scene(
                        scene.id,
                        SceneUpdate {
                            is_generating: Some(false),
                            status: Some(SceneStatus::Ready),
                            gen_result: Some(SceneMedia {
                                image_urls: urls.clone(),
                                error: None,
                                task_id: Some(task.id),
                            }),
                            ..SceneUpdate::default()
                        },
                    )
                    .await?;
                Ok(result(Some(task.id), SceneImageOutcome::Generated(urls)))
            }
            Err(e) if e.is_generation_failure() => {
                self.store_scene_failure(scene.id, Some(task.id), &e).await?;
                Ok(result(Some(task.id), SceneImageOutcome::Failed(e.to_string())))
            }
            Err(e) => Err(e),
        }
    }

    async fn store_scene_failure(
        &self,
        scene_id: SceneId,
        task_id: Option<TaskId>,
        err: &FabulistError,
    ) -> FabulistResult<()> {
        warn!(scene_id = %scene_id, error = %err, "Scene image failed");
        self.store
            .update_scene(
                scene_id,
                SceneUpdate {
                    is_generating: Some(false),
                    status: Some(SceneStatus::Draft),
                    gen_result: Some(SceneMedia {
                        image_urls: Vec::new(),
                        error: Some(err.to_string()),
                        task_id,
                    }),
                    ..SceneUpdate::default()
                },
            )
            .await?;
        Ok(())
    }

    async fn board_in_pipeline(&self, board_id: BoardId) -> FabulistResult<bool> {
        Ok(matches!(
            self.store.get_board(board_id).await?,
            Some(board) if !board.is_deleted() && board.stage != BoardStage::Unspecified
        ))
    }
}
