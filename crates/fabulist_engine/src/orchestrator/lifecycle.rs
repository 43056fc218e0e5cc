//! Board lifecycle: settle, publish, cancel, restore, and tree changes.

use super::Orchestrator;
use crate::bookkeeping;
use crate::stage::{self, ResumePoint, StageEvent};
use crate::tree::DeleteOutcome;
use fabulist_core::{
    ActivityKind, BoardContent, BoardId, BoardOverrides, GenerationTask, NewActivity, Scene,
    StoryId, Storyboard, StoryboardDraft, TaskTarget, TaskType,
};
use fabulist_error::FabulistResult;
use fabulist_interface::{BoardUpdate, ContentStore, GenerationProvider};
use tracing::{debug, info, instrument};

/// Everything needed to pick a board's pipeline back up.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardSnapshot {
    /// The board
    pub board: Storyboard,
    /// Live scenes in sequence order
    pub scenes: Vec<Scene>,
    /// Draft of the newest finished continuation task, if any
    pub draft: Option<StoryboardDraft>,
    /// Continuation task still in flight, if any
    pub in_flight: Option<GenerationTask>,
    /// Next step, from the stage alone
    pub resume: ResumePoint,
}

impl<S: ContentStore, P: GenerationProvider> Orchestrator<S, P> {
    /// Move a media-generating board to `FINISHED` once none of its scenes is
    /// generating. Other boards come back unchanged.
    #[instrument(skip(self), fields(board_id = %board_id))]
    pub async fn settle_media(&self, board_id: BoardId) -> FabulistResult<Storyboard> {
        let board = self.tree.get_active_board(board_id).await?;
        if !board.stage.is_generating_media() {
            return Ok(board);
        }

        let scenes = self.store.list_scenes_by_board(board.id).await?;
        let generating = scenes.iter().filter(|scene| scene.is_generating).count();
        if generating > 0 {
            debug!(generating, "Scenes still generating");
            return Ok(board);
        }

        let next = stage::transition(&board, StageEvent::MediaSettled)?;
        let board = self
            .store
            .update_board(board.id, BoardUpdate::stage(next))
            .await?;
        info!(stage = %board.stage, "Settled media generation");
        Ok(board)
    }

    /// Publish a finished board. Published boards accept no further renders
    /// or forks.
    #[instrument(skip(self), fields(board_id = %board_id))]
    pub async fn publish(
        &self,
        board_id: BoardId,
        actor: Option<i64>,
    ) -> FabulistResult<Storyboard> {
        let board = self.tree.get_active_board(board_id).await?;
        let next = stage::transition(&board, StageEvent::Publish)?;
        let board = self
            .store
            .update_board(board.id, BoardUpdate::stage(next))
            .await?;

        bookkeeping::record(
            self.store.as_ref(),
            NewActivity::new(ActivityKind::BoardPublished, board.story_id)
                .with_board(board.id)
                .with_actor(actor),
        )
        .await;
        info!("Published storyboard");
        Ok(board)
    }

    /// Cancel a board. Tasks already running finish, but their results are
    /// not applied to the board.
    #[instrument(skip(self), fields(board_id = %board_id))]
    pub async fn cancel(
        &self,
        board_id: BoardId,
        actor: Option<i64>,
    ) -> FabulistResult<Storyboard> {
        let board = self.tree.get_active_board(board_id).await?;
        let previous = board.stage;
        let next = stage::transition(&board, StageEvent::Cancel)?;
        let board = self
            .store
            .update_board(board.id, BoardUpdate::stage(next))
            .await?;

        bookkeeping::record(
            self.store.as_ref(),
            NewActivity::new(ActivityKind::BoardCancelled, board.story_id)
                .with_board(board.id)
                .with_actor(actor)
                .with_detail(format!("from {}", previous)),
        )
        .await;
        info!(from = %previous, "Cancelled storyboard");
        Ok(board)
    }

    /// Read-only projection of a board's resumable state.
    ///
    /// Nothing is re-issued: the draft comes from the newest finished task.
    #[instrument(skip(self), fields(board_id = %board_id))]
    pub async fn restore(&self, board_id: BoardId) -> FabulistResult<BoardSnapshot> {
        let board = self.tree.get_active_board(board_id).await?;
        let scenes = self.store.list_scenes_by_board(board.id).await?;
        let target = TaskTarget::board(board.story_id, board.id);

        let draft = self
            .tracker
            .latest_finished(target, TaskType::Storyboard)
            .await?
            .and_then(|task| task.parsed_result)
            .and_then(|parsed| parsed.as_storyboard().cloned());
        let in_flight = self
            .tracker
            .find_in_flight(target, TaskType::Storyboard)
            .await?;

        let resume = ResumePoint::from_stage(board.stage);
        debug!(scenes = scenes.len(), resume = %resume, "Restored storyboard");
        Ok(BoardSnapshot {
            board,
            scenes,
            draft,
            in_flight,
            resume,
        })
    }

    /// Create a story's root board.
    pub async fn create_root(
        &self,
        story_id: StoryId,
        content: BoardContent,
    ) -> FabulistResult<Storyboard> {
        self.tree.create_root(story_id, content).await
    }

    /// Branch a board with `overrides`.
    pub async fn fork_board(
        &self,
        board_id: BoardId,
        overrides: BoardOverrides,
    ) -> FabulistResult<Storyboard> {
        self.tree.fork(board_id, overrides).await
    }

    /// Add a fresh child under a board.
    pub async fn continue_board(
        &self,
        board_id: BoardId,
        content: BoardContent,
    ) -> FabulistResult<Storyboard> {
        self.tree.continue_from(board_id, content).await
    }

    /// Soft-delete a board, handing its children to its parent.
    pub async fn delete_board(
        &self,
        board_id: BoardId,
        actor: Option<i64>,
    ) -> FabulistResult<DeleteOutcome> {
        self.tree.delete(board_id, actor).await
    }
}
