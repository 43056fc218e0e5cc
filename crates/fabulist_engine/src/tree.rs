//! Storyboard Tree Manager.
//!
//! Maintains the parent links between a story's storyboards. A board with
//! `prev_id == None` is a root. Deleting a board hands its children to its
//! own parent, so no subtree is ever orphaned.

use crate::ListingSettings;
use crate::bookkeeping;
use fabulist_core::{
    ActivityKind, BoardContent, BoardCounter, BoardId, BoardOverrides, BoardStage, Lifecycle,
    NewActivity, NewStoryboard, SceneStatus, Story, StoryCounter, StoryId, Storyboard,
};
use fabulist_error::{
    FabulistResult, NotFoundError, NotFoundErrorKind, ValidationError, ValidationErrorKind,
};
use fabulist_interface::{BoardOrder, BoardUpdate, ContentStore, Page, StoryUpdate};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// What a delete changed.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteOutcome {
    /// The board, now soft-deleted
    pub board: Storyboard,
    /// Children handed to the board's parent, deleted ones included
    pub reparented: Vec<BoardId>,
    /// Scenes soft-deleted with the board
    pub scenes_deleted: usize,
    /// The story's root after the delete, if it changed
    pub new_root: Option<Option<BoardId>>,
}

/// Tree operations over a content store.
#[derive(Debug)]
pub struct StoryboardTree<S> {
    store: Arc<S>,
    listing: ListingSettings,
}

impl<S> Clone for StoryboardTree<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            listing: self.listing,
        }
    }
}

impl<S: ContentStore> StoryboardTree<S> {
    /// Manage trees in `store`, paging listings with `listing`.
    pub fn new(store: Arc<S>, listing: ListingSettings) -> Self {
        Self { store, listing }
    }

    /// Load a story or fail with `NotFound`.
    pub async fn get_story(&self, story_id: StoryId) -> FabulistResult<Story> {
        self.store
            .get_story(story_id)
            .await?
            .ok_or_else(|| NotFoundError::new(NotFoundErrorKind::Story(story_id.get())).into())
    }

    /// Load a live board or fail with `NotFound`; deleted boards count as absent.
    pub async fn get_active_board(&self, board_id: BoardId) -> FabulistResult<Storyboard> {
        match self.store.get_board(board_id).await? {
            Some(board) if !board.is_deleted() => Ok(board),
            _ => Err(NotFoundError::new(NotFoundErrorKind::Board(board_id.get())).into()),
        }
    }

    /// Create a root board and make it the story's root if it has none.
    #[instrument(skip(self, content), fields(story_id = %story_id))]
    pub async fn create_root(
        &self,
        story_id: StoryId,
        content: BoardContent,
    ) -> FabulistResult<Storyboard> {
        let story = self.get_story(story_id).await?;
        story.ensure_open()?;

        let actor = content.creator_id;
        let board = self
            .store
            .create_board(NewStoryboard::from_content(story_id, None, content))
            .await?;

        // Concurrent root creation can leave either board as the root.
        if story.root_board_id.is_none() {
            self.store
                .update_story(
                    story_id,
                    StoryUpdate {
                        root_board_id: Some(Some(board.id)),
                        ..StoryUpdate::default()
                    },
                )
                .await?;
            info!(board_id = %board.id, "Designated story root");
        }

        self.after_create(&story, &board, None, actor).await;
        Ok(board)
    }

    /// Create a child of `prev_id` with fresh content.
    #[instrument(skip(self, content), fields(prev_id = %prev_id))]
    pub async fn continue_from(
        &self,
        prev_id: BoardId,
        content: BoardContent,
    ) -> FabulistResult<Storyboard> {
        let (story, parent) = self.branchable(prev_id).await?;
        let actor = content.creator_id;
        let board = self
            .store
            .create_board(NewStoryboard::from_content(
                story.id,
                Some(parent.id),
                content,
            ))
            .await?;
        self.after_create(&story, &board, Some(&parent), actor).await;
        Ok(board)
    }

    /// Branch from `prev_id`: duplicate its fields as a new child, apply
    /// `overrides`, and bump the parent's fork count.
    #[instrument(skip(self, overrides), fields(prev_id = %prev_id))]
    pub async fn fork(
        &self,
        prev_id: BoardId,
        overrides: BoardOverrides,
    ) -> FabulistResult<Storyboard> {
        let (story, parent) = self.branchable(prev_id).await?;
        let mut new_board = NewStoryboard::duplicate_of(&parent);
        overrides.apply(&mut new_board);
        let board = self.store.create_board(new_board).await?;
        self.after_create(&story, &board, Some(&parent), overrides.creator_id)
            .await;
        Ok(board)
    }

    /// Soft-delete a board and its scenes, handing its children to its parent.
    ///
    /// If the board was the story's root, the oldest re-parented root child
    /// becomes the new root (or the root is cleared).
    #[instrument(skip(self), fields(board_id = %board_id))]
    pub async fn delete(
        &self,
        board_id: BoardId,
        actor: Option<i64>,
    ) -> FabulistResult<DeleteOutcome> {
        let board = self.get_active_board(board_id).await?;

        // Children move first so a partial failure never leaves an orphan.
        // Deleted children move too: no board may keep pointing at this one.
        let mut live_children = self
            .store
            .list_boards_by_prev(board.story_id, Some(board.id))
            .await?;
        live_children.sort_by_key(|child| (child.create_time, child.id));
        let reparented = self
            .store
            .reparent_boards(board.story_id, board.id, board.prev_id)
            .await?;

        let board = self
            .store
            .update_board(
                board.id,
                BoardUpdate {
                    lifecycle: Some(Lifecycle::Deleted),
                    ..BoardUpdate::default()
                },
            )
            .await?;
        let scenes_deleted = self
            .store
            .batch_update_scene_status(board.id, SceneStatus::Deleted)
            .await?;

        let mut new_root = None;
        if let Some(story) = self.store.get_story(board.story_id).await? {
            if story.root_board_id == Some(board.id) {
                let replacement = if board.prev_id.is_none() {
                    live_children.first().map(|child| child.id)
                } else {
                    board.prev_id
                };
                self.store
                    .update_story(
                        story.id,
                        StoryUpdate {
                            root_board_id: Some(replacement),
                            ..StoryUpdate::default()
                        },
                    )
                    .await?;
                info!(new_root = ?replacement, "Re-pointed story root");
                new_root = Some(replacement);
            }
        }

        bookkeeping::settle(
            self.store
                .increment_story_counter(board.story_id, StoryCounter::Boards, -1)
                .await,
            "story board count",
        );
        bookkeeping::record(
            self.store.as_ref(),
            NewActivity::new(ActivityKind::BoardDeleted, board.story_id)
                .with_board(board.id)
                .with_actor(actor)
                .with_detail(format!("re-parented {} children", reparented.len())),
        )
        .await;

        info!(
            reparented = reparented.len(),
            scenes_deleted, "Deleted storyboard"
        );
        Ok(DeleteOutcome {
            board,
            reparented,
            scenes_deleted,
            new_root,
        })
    }

    /// Live children of a board, oldest first.
    pub async fn children(&self, board_id: BoardId) -> FabulistResult<Vec<Storyboard>> {
        let board = self.get_active_board(board_id).await?;
        self.store
            .list_boards_by_prev(board.story_id, Some(board.id))
            .await
    }

    /// Live roots of a story.
    pub async fn roots(&self, story_id: StoryId) -> FabulistResult<Vec<Storyboard>> {
        self.store.list_boards_by_prev(story_id, None).await
    }

    /// Every live board of a story.
    pub async fn by_story(&self, story_id: StoryId) -> FabulistResult<Vec<Storyboard>> {
        self.store.list_boards_by_story(story_id).await
    }

    /// Live boards under `prev_id`, ordered and paged.
    ///
    /// `page` defaults to the first page of the configured default size.
    #[instrument(skip(self), fields(story_id = %story_id))]
    pub async fn by_prev_and_story(
        &self,
        story_id: StoryId,
        prev_id: Option<BoardId>,
        page: Option<Page>,
        order: BoardOrder,
    ) -> FabulistResult<Vec<Storyboard>> {
        let page = page.unwrap_or_else(|| Page::new(1, self.listing.default_page_size));
        page.validate(self.listing.max_page_size)?;
        self.store
            .list_boards_by_story_and_prev(story_id, prev_id, page, order)
            .await
    }

    /// Ancestors of a board, oldest first, at most `depth` of them.
    ///
    /// The walk stops at a root, at a missing parent, or at a repeated id.
    #[instrument(skip(self), fields(board_id = %board.id))]
    pub async fn ancestors(
        &self,
        board: &Storyboard,
        depth: usize,
    ) -> FabulistResult<Vec<Storyboard>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::from([board.id]);
        let mut next = board.prev_id;

        while let Some(prev_id) = next {
            if chain.len() >= depth {
                break;
            }
            if !seen.insert(prev_id) {
                warn!(prev_id = %prev_id, "Cycle in storyboard ancestry");
                break;
            }
            let Some(parent) = self.store.get_board(prev_id).await? else {
                warn!(prev_id = %prev_id, "Missing storyboard parent");
                break;
            };
            if parent.story_id != board.story_id {
                warn!(prev_id = %prev_id, "Storyboard parent belongs to another story");
                break;
            }
            next = parent.prev_id;
            chain.push(parent);
        }

        chain.reverse();
        debug!(depth = chain.len(), "Walked ancestors");
        Ok(chain)
    }

    /// Story and parent for a new branch; both must accept branching.
    async fn branchable(&self, prev_id: BoardId) -> FabulistResult<(Story, Storyboard)> {
        let parent = self.get_active_board(prev_id).await?;
        let story = self.get_story(parent.story_id).await?;
        story.ensure_open()?;
        if parent.stage == BoardStage::Published {
            return Err(
                ValidationError::new(ValidationErrorKind::BoardPublished(parent.id.get())).into(),
            );
        }
        Ok((story, parent))
    }

    async fn after_create(
        &self,
        story: &Story,
        board: &Storyboard,
        parent: Option<&Storyboard>,
        actor: Option<i64>,
    ) {
        bookkeeping::settle(
            self.store
                .increment_story_counter(story.id, StoryCounter::Boards, 1)
                .await,
            "story board count",
        );

        let Some(parent) = parent else {
            info!(board_id = %board.id, "Created root storyboard");
            return;
        };
        let forks = bookkeeping::settle(
            self.store
                .increment_board_counter(parent.id, BoardCounter::Forks, 1)
                .await,
            "parent fork count",
        );
        bookkeeping::record(
            self.store.as_ref(),
            NewActivity::new(ActivityKind::BoardForked, story.id)
                .with_board(board.id)
                .with_actor(actor)
                .with_detail(format!("from board {}", parent.id)),
        )
        .await;
        info!(board_id = %board.id, parent_id = %parent.id, fork_num = ?forks, "Branched storyboard");
    }
}
