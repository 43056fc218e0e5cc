//! Trait definitions for the Fabulist storyboard engine.
//!
//! The engine talks to two external collaborators:
//!
//! - a [`GenerationProvider`] that turns prompts into text or images, and
//! - a content store, split into one trait per record type and gathered
//!   under [`ContentStore`].
//!
//! Both are consumed through these traits only, so any model vendor or
//! storage engine can sit behind them.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod paging;
mod provider;
mod store;

pub use paging::{BoardOrder, Page};
pub use provider::{GenerationProvider, GenerationRequest, GenerationRequestBuilder};
pub use store::{
    ActivityStore, BoardUpdate, ContentStore, RoleStore, RoleUpdate, SceneStore, SceneUpdate,
    StoryStore, StoryUpdate, StoryboardStore, TaskFilter, TaskStore, TaskUpdate,
};
