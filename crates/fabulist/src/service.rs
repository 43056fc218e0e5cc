//! The service container.

use fabulist_engine::{
    FabulistConfig, GenerationTracker, Orchestrator, StoryboardTree, ThrottledProvider,
};
use fabulist_interface::{ContentStore, GenerationProvider};
use std::sync::Arc;
use tracing::{info, instrument};

/// Every Fabulist service, wired once at startup and passed by reference.
///
/// Cloning is cheap and shares the same store, provider and task tracker.
pub struct Fabulist<S, P> {
    config: Arc<FabulistConfig>,
    orchestrator: Orchestrator<S, P>,
}

impl<S, P> Clone for Fabulist<S, P> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            orchestrator: self.orchestrator.clone(),
        }
    }
}

impl<S: ContentStore, P: GenerationProvider> Fabulist<S, P> {
    /// Wire the services around a store and a provider.
    #[instrument(skip_all)]
    pub fn new(store: Arc<S>, provider: Arc<P>, config: FabulistConfig) -> Self {
        let orchestrator = Orchestrator::new(store, provider, &config);
        info!(
            ancestor_depth = config.generation.ancestor_depth,
            image_concurrency = config.generation.image_concurrency,
            "Fabulist services ready"
        );
        Self {
            config: Arc::new(config),
            orchestrator,
        }
    }

    /// The orchestrator.
    pub fn orchestrator(&self) -> &Orchestrator<S, P> {
        &self.orchestrator
    }

    /// The storyboard tree.
    pub fn tree(&self) -> &StoryboardTree<S> {
        self.orchestrator.tree()
    }

    /// The generation task tracker.
    pub fn tracker(&self) -> &GenerationTracker<S> {
        self.orchestrator.tracker()
    }

    /// The content store.
    pub fn store(&self) -> &Arc<S> {
        self.orchestrator.store()
    }

    /// The generation provider.
    pub fn provider(&self) -> &Arc<P> {
        self.orchestrator.provider()
    }

    /// The configuration the services were built with.
    pub fn config(&self) -> &FabulistConfig {
        &self.config
    }
}

impl<S: ContentStore, P: GenerationProvider> Fabulist<S, ThrottledProvider<P>> {
    /// Wire the services with the provider behind the `[provider]` limits.
    pub fn throttled(store: Arc<S>, provider: P, config: FabulistConfig) -> Self {
        let provider = ThrottledProvider::new(provider, config.provider);
        Self::new(store, Arc::new(provider), config)
    }
}
