//! Fabulist - branching storyboard generation
//!
//! Fabulist grows a story as a tree of storyboards. Each storyboard is
//! continued from its ancestors by a text generation provider, split into
//! scenes, and illustrated scene by scene. Boards can be forked into
//! alternative branches, deleted without orphaning their children, published,
//! or cancelled mid-render.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use fabulist::{Fabulist, FabulistConfig, InMemoryContentStore, RenderOptions};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = FabulistConfig::load()?;
//!     let fabulist = Fabulist::throttled(
//!         Arc::new(InMemoryContentStore::new()),
//!         MyProvider::new(),
//!         config,
//!     );
//!
//!     let outcome = fabulist
//!         .orchestrator()
//!         .render_storyboard(board_id, RenderOptions::default())
//!         .await?;
//!     println!("{:?}", outcome);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! Fabulist is organized as a workspace with focused crates:
//!
//! - `fabulist_error` - Error types and stable error codes
//! - `fabulist_core` - Data model, typed ids, parsed content, telemetry
//! - `fabulist_interface` - `GenerationProvider` and content store traits
//! - `fabulist_store` - In-memory content store
//! - `fabulist_engine` - Tree, stage machine, templates, parser, tracker, orchestrator
//!
//! This crate (`fabulist`) re-exports everything for convenience.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod service;

pub use service::Fabulist;

pub use fabulist_core::*;
pub use fabulist_engine::*;
pub use fabulist_error::*;
pub use fabulist_interface::*;
pub use fabulist_store::*;
