//! Test utilities for engine tests.
//!
//! A scripted provider plus fixtures over the in-memory content store.

#![allow(dead_code)]

pub mod mock_provider;

#[allow(unused_imports)]
pub use mock_provider::{MockProvider, MockResponse};

use fabulist_core::{BoardContent, BoardParams, NewStory, Story, StoryStatus, Storyboard};
use fabulist_engine::{FabulistConfig, Orchestrator};
use fabulist_interface::StoryStore;
use fabulist_store::InMemoryContentStore;
use std::sync::Arc;

pub type TestOrchestrator = Orchestrator<InMemoryContentStore, MockProvider>;

/// Store, provider and an orchestrator over both.
pub struct Harness {
    pub store: Arc<InMemoryContentStore>,
    pub provider: Arc<MockProvider>,
    pub orchestrator: TestOrchestrator,
}

pub fn harness(provider: MockProvider) -> Harness {
    harness_with_config(provider, FabulistConfig::default())
}

pub fn harness_with_config(provider: MockProvider, config: FabulistConfig) -> Harness {
    let store = Arc::new(InMemoryContentStore::new());
    let provider = Arc::new(provider);
    let orchestrator = Orchestrator::new(Arc::clone(&store), Arc::clone(&provider), &config);
    Harness {
        store,
        provider,
        orchestrator,
    }
}

/// An open story with an empty title.
pub async fn open_story(store: &InMemoryContentStore, origin: &str) -> Story {
    store
        .create_story(NewStory::new("", origin))
        .await
        .unwrap()
}

pub async fn closed_story(store: &InMemoryContentStore, origin: &str) -> Story {
    store
        .create_story(NewStory::new("Closed", origin).with_status(StoryStatus::Closed))
        .await
        .unwrap()
}

pub fn content(title: &str) -> BoardContent {
    BoardContent::new(title, format!("{} happens", title))
}

pub fn content_with_roles(title: &str, roles: &[&str]) -> BoardContent {
    content(title).with_params(BoardParams {
        roles: roles.iter().map(|name| name.to_string()).collect(),
        ..BoardParams::default()
    })
}

/// A root board for a fresh open story.
pub async fn story_with_root(harness: &Harness) -> (Story, Storyboard) {
    let story = open_story(&harness.store, "A lighthouse keeper finds a drowned bell").await;
    let root = harness
        .orchestrator
        .create_root(story.id, content_with_roles("Arrival", &["Mira"]))
        .await
        .unwrap();
    (story, root)
}

pub const STORY_JSON: &str = r#"```json
{
  "name_and_theme": "The Drowned Bell: grief and the sea",
  "chapters": [
    {"title": "Arrival", "summary": "Mira takes the lighthouse post."},
    {"title": "The Bell", "summary": "A bell rings under the water."}
  ]
}
```"#;

pub const ROLE_JSON: &str = r#"{
  "name": "Mira",
  "background": "Former ferry pilot",
  "personality": "wry and stubborn",
  "goals": "find her brother",
  "appearance": "salt-grey coat",
  "relationships": "estranged from Tomas",
  "abilities": "reads weather"
}"#;

/// Provider output for a storyboard with one scene per `(content, characters)`.
pub fn storyboard_json(title: &str, scenes: &[(&str, &[&str])]) -> String {
    let details: Vec<serde_json::Value> = scenes
        .iter()
        .enumerate()
        .map(|(i, (content, characters))| {
            serde_json::json!({
                "scene_id": i + 1,
                "content": content,
                "characters": characters,
                "image_prompt": format!("illustration of {}", content),
            })
        })
        .collect();
    let body = serde_json::json!({
        "chapter_summary": {"title": title, "summary": format!("{} summary", title)},
        "chapter_detail": details,
    });
    format!("Here is the chapter:\n```json\n{}\n```", body)
}
