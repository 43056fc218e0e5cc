//! Orchestrator: composes the tree, tracker, templates and parser per use case.
//!
//! Every render runs end to end for its caller. The provider call is the only
//! long suspension and is bounded by the caller's deadline and cancel signal.
//! A render that finds a task already in flight for its target reports
//! [`RenderOutcome::InProgress`] instead of starting another.

mod images;
mod lifecycle;
mod role;
mod story;
mod storyboard;

pub use images::{ImageRender, SceneImageOutcome, SceneImageResult};
pub use lifecycle::BoardSnapshot;
pub use role::RoleRender;
pub use story::StoryRender;
pub use storyboard::BoardRender;

use crate::{
    CancelSignal, FabulistConfig, GenerationSettings, GenerationTracker, PromptTemplates,
    StoryboardTree,
};
use fabulist_core::{GenerationTask, TaskTarget, TaskType};
use fabulist_error::FabulistResult;
use fabulist_interface::{ContentStore, GenerationProvider};
use std::sync::Arc;
use std::time::Duration;

/// Per-call options for renders.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Forced redo: bypass the in-flight check and allow re-rendering
    pub regen: bool,
    /// Bound on the provider call; falls back to the configured timeout
    pub deadline: Option<Duration>,
    /// Aborts the provider call when fired
    pub cancel: Option<CancelSignal>,
    /// Acting user, recorded on activities
    pub actor: Option<i64>,
}

impl RenderOptions {
    /// Builder method to request a forced redo.
    pub fn with_regen(mut self, regen: bool) -> Self {
        self.regen = regen;
        self
    }

    /// Builder method to bound the provider call.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Builder method to attach a cancel signal.
    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Builder method to set the acting user.
    pub fn with_actor(mut self, actor: i64) -> Self {
        self.actor = Some(actor);
        self
    }
}

/// Result of a render.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderOutcome<T> {
    /// The render ran and this is what it produced
    Completed(T),
    /// A task for the same target was already in flight; nothing new started
    InProgress(GenerationTask),
}

impl<T> RenderOutcome<T> {
    /// The completed detail, if any.
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(detail) => Some(detail),
            Self::InProgress(_) => None,
        }
    }

    /// The in-flight task, if any.
    pub fn in_progress(&self) -> Option<&GenerationTask> {
        match self {
            Self::Completed(_) => None,
            Self::InProgress(task) => Some(task),
        }
    }

    /// Whether another task was already rendering.
    pub fn is_in_progress(&self) -> bool {
        matches!(self, Self::InProgress(_))
    }
}

/// Runs every generation use case against a content store and a provider.
pub struct Orchestrator<S, P> {
    store: Arc<S>,
    provider: Arc<P>,
    tree: StoryboardTree<S>,
    tracker: GenerationTracker<S>,
    templates: PromptTemplates,
    settings: GenerationSettings,
}

impl<S, P> Clone for Orchestrator<S, P> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            provider: Arc::clone(&self.provider),
            tree: self.tree.clone(),
            tracker: self.tracker.clone(),
            templates: self.templates.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl<S: ContentStore, P: GenerationProvider> Orchestrator<S, P> {
    /// Build an orchestrator over `store` and `provider`.
    pub fn new(store: Arc<S>, provider: Arc<P>, config: &FabulistConfig) -> Self {
        Self {
            tree: StoryboardTree::new(Arc::clone(&store), config.listing),
            tracker: GenerationTracker::new(Arc::clone(&store)),
            templates: PromptTemplates::new(&config.generation),
            settings: config.generation.clone(),
            store,
            provider,
        }
    }

    /// The tree manager.
    pub fn tree(&self) -> &StoryboardTree<S> {
        &self.tree
    }

    /// The task tracker.
    pub fn tracker(&self) -> &GenerationTracker<S> {
        &self.tracker
    }

    /// The prompt templates.
    pub fn templates(&self) -> &PromptTemplates {
        &self.templates
    }

    /// The content store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The generation provider.
    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    fn deadline(&self, options: &RenderOptions) -> Option<Duration> {
        options.deadline.or_else(|| self.settings.provider_timeout())
    }

    /// In-flight task for the target unless the caller forces a redo.
    async fn already_rendering(
        &self,
        target: TaskTarget,
        task_type: TaskType,
        options: &RenderOptions,
    ) -> FabulistResult<Option<GenerationTask>> {
        if options.regen {
            return Ok(None);
        }
        self.tracker.find_in_flight(target, task_type).await
    }
}
