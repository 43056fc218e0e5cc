//! Storyboard generation and branching engine.
//!
//! This crate turns the records in a content store into prompts, sends them
//! to a generation provider, and folds the results back into the story tree.
//!
//! # Components
//!
//! - [`StoryboardTree`]: root creation, fork, continue, delete with
//!   re-parenting, ordered listings and ancestor walks
//! - [`stage`]: the storyboard stage state machine
//! - [`GenerationTracker`]: one tracked task per provider call, with
//!   at-most-one-in-flight dedupe
//! - [`PromptTemplates`]: prompts per use case, each ending with a fixed
//!   JSON output schema
//! - [`extraction`]: cleans provider output and decodes it into typed content
//! - [`Orchestrator`]: composes the above per use case
//!
//! # Example
//!
//! ```rust,ignore
//! use fabulist_engine::{FabulistConfig, Orchestrator, RenderOptions};
//! use std::sync::Arc;
//!
//! let config = FabulistConfig::load()?;
//! let orchestrator = Orchestrator::new(Arc::new(store), Arc::new(provider), &config);
//! let outcome = orchestrator
//!     .render_storyboard(board_id, RenderOptions::default())
//!     .await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod bookkeeping;
mod cancel;
mod config;
pub mod extraction;
mod orchestrator;
pub mod stage;
mod template;
mod throttle;
mod tracker;
mod tree;

pub use cancel::CancelSignal;
pub use config::{FabulistConfig, GenerationSettings, ListingSettings, ProviderLimits};
pub use extraction::TargetShape;
pub use orchestrator::{
    BoardRender, BoardSnapshot, ImageRender, Orchestrator, RenderOptions, RenderOutcome,
    RoleRender, SceneImageOutcome, SceneImageResult, StoryRender,
};
pub use stage::{ResumePoint, StageEvent, next_stage, transition};
pub use template::{
    PromptTemplates, ROLE_SCHEMA, STORY_SCHEMA, STORYBOARD_SCHEMA, SceneHistory, TemplateContext,
    UseCase,
};
pub use throttle::ThrottledProvider;
pub use tracker::{ABANDONED, GenerationTracker, TaskSpec, TaskStart};
pub use tree::{DeleteOutcome, StoryboardTree};
