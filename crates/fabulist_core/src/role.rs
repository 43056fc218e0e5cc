//! Role (character) records.

use crate::{RoleId, StoryId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Structured character detail.
///
/// This is also the decode target for role-detail and role-continuity
/// output. Missing keys default to empty strings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleDetail {
    /// Name as the provider wrote it
    #[serde(deserialize_with = "crate::content::null_or_default")]
    pub name: String,
    /// History and origin
    #[serde(deserialize_with = "crate::content::null_or_default")]
    pub background: String,
    /// Temperament and manner
    #[serde(deserialize_with = "crate::content::null_or_default")]
    pub personality: String,
    /// What the character wants
    #[serde(deserialize_with = "crate::content::null_or_default")]
    pub goals: String,
    /// Physical description
    #[serde(deserialize_with = "crate::content::null_or_default")]
    pub appearance: String,
    /// Ties to other roles
    #[serde(deserialize_with = "crate::content::null_or_default")]
    pub relationships: String,
    /// Skills and powers
    #[serde(deserialize_with = "crate::content::null_or_default")]
    pub abilities: String,
    /// Keys outside the documented schema
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl RoleDetail {
    /// Whether no documented field carries text.
    pub fn is_empty(&self) -> bool {
        [
            &self.background,
            &self.personality,
            &self.goals,
            &self.appearance,
            &self.relationships,
            &self.abilities,
        ]
        .iter()
        .all(|field| field.trim().is_empty())
    }
}

/// A reusable persona referenced by storyboards and scenes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    /// Store key
    pub id: RoleId,
    /// Owning story
    pub story_id: StoryId,
    /// Unique within the story
    pub name: String,
    /// Short description
    pub description: String,
    /// Portrait used as an image reference
    pub avatar_url: Option<String>,
    /// Structured detail
    pub detail: RoleDetail,
    /// Likes
    pub like_num: i64,
    /// Followers
    pub follow_num: i64,
    /// Storyboards this role appears in
    pub storyboard_num: i64,
    /// Creation time
    pub create_time: DateTime<Utc>,
    /// Last update time
    pub update_time: DateTime<Utc>,
}

impl Role {
    /// One-line summary used when other prompts need to mention this role.
    pub fn summary(&self) -> String {
        let mut summary = self.name.clone();
        let description = if self.description.trim().is_empty() {
            self.detail.personality.trim()
        } else {
            self.description.trim()
        };
        if !description.is_empty() {
            summary.push_str(": ");
            summary.push_str(description);
        }
        summary
    }
}

/// Fields for inserting a role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRole {
    /// Owning story
    pub story_id: StoryId,
    /// Unique within the story
    pub name: String,
    /// Short description
    pub description: String,
    /// Portrait
    pub avatar_url: Option<String>,
}

impl NewRole {
    /// A role with a name and description.
    pub fn new(story_id: StoryId, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            story_id,
            name: name.into(),
            description: description.into(),
            avatar_url: None,
        }
    }

    /// Builder method to set the portrait.
    pub fn with_avatar(mut self, avatar_url: impl Into<String>) -> Self {
        self.avatar_url = Some(avatar_url.into());
        self
    }
}

/// Aggregate counters kept on a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum RoleCounter {
    /// `like_num`
    Likes,
    /// `follow_num`
    Follows,
    /// `storyboard_num`
    Storyboards,
}
