//! Typed content decoded from provider output.
//!
//! Two shapes recur in generated text: a story-level outline and a
//! storyboard-level draft. Both decode leniently: absent keys become empty
//! defaults, scalar-vs-list drift is absorbed, and keys outside the schema are
//! kept in `extra` so nothing the provider said is lost.

use crate::RoleDetail;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Story-level outline: `{"name_and_theme": ..., "chapters": [...]}`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoryOutline {
    /// Title and theme in one line
    #[serde(alias = "nameAndTheme", deserialize_with = "null_or_default")]
    pub name_and_theme: String,
    /// Planned chapters, in order
    #[serde(deserialize_with = "null_or_default")]
    pub chapters: Vec<ChapterOutline>,
    /// Keys outside the documented schema
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// One planned chapter of a story outline.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChapterOutline {
    /// Chapter title
    #[serde(deserialize_with = "null_or_default")]
    pub title: String,
    /// What happens
    #[serde(deserialize_with = "null_or_default")]
    pub summary: String,
    /// Keys outside the documented schema
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Storyboard-level draft:
/// `{"chapter_summary": {...}, "chapter_detail": [{scene}, ...]}`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoryboardDraft {
    /// Summary of the chapter as a whole
    #[serde(alias = "chapterSummary", deserialize_with = "null_or_default")]
    pub chapter_summary: ChapterSummary,
    /// Scene-by-scene detail
    #[serde(alias = "chapterDetail", deserialize_with = "null_or_default")]
    pub chapter_detail: ChapterDetail,
    /// Keys outside the documented schema
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Chapter title and summary. Decodes from an object or a bare string.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "ChapterSummaryRepr")]
pub struct ChapterSummary {
    /// Chapter title
    pub title: String,
    /// Chapter summary
    pub summary: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ChapterSummaryRepr {
    Text(String),
    Full {
        #[serde(default, deserialize_with = "null_or_default")]
        title: String,
        #[serde(default, alias = "content", deserialize_with = "null_or_default")]
        summary: String,
    },
}

impl From<ChapterSummaryRepr> for ChapterSummary {
    fn from(repr: ChapterSummaryRepr) -> Self {
        match repr {
            ChapterSummaryRepr::Text(summary) => Self {
                title: String::new(),
                summary,
            },
            ChapterSummaryRepr::Full { title, summary } => Self { title, summary },
        }
    }
}

/// The ordered scenes of a chapter.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChapterDetail {
    /// Scenes in order
    pub scenes: Vec<SceneDetail>,
}

/// One scene of a storyboard draft.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneDetail {
    /// Scene label as the provider numbered it
    #[serde(alias = "sceneId", deserialize_with = "string_or_number")]
    pub scene_id: String,
    /// Narrative text
    #[serde(deserialize_with = "null_or_default")]
    pub content: String,
    /// Names of the roles appearing
    #[serde(deserialize_with = "string_or_list")]
    pub characters: Vec<String>,
    /// Prompt for the scene image
    #[serde(alias = "imagePrompt", deserialize_with = "null_or_default")]
    pub image_prompt: String,
    /// Keys outside the documented schema
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Decoded result stored on a finished generation task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", content = "data", rename_all = "snake_case")]
pub enum ParsedContent {
    /// Story outline
    Story(StoryOutline),
    /// Storyboard draft
    Storyboard(StoryboardDraft),
    /// Role detail
    Role(RoleDetail),
    /// Image locations
    Images(Vec<String>),
}

impl ParsedContent {
    /// The storyboard draft, if this is one.
    pub fn as_storyboard(&self) -> Option<&StoryboardDraft> {
        match self {
            Self::Storyboard(draft) => Some(draft),
            _ => None,
        }
    }
}

/// Accept an explicit null as the empty value.
pub(crate) fn null_or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<String>),
    One(String),
}

/// Accept `["A", "B"]`, `"A, B"` or null.
fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<OneOrMany>::deserialize(deserializer)?;
    let names = match value {
        None => Vec::new(),
        Some(OneOrMany::Many(names)) => names,
        Some(OneOrMany::One(joined)) => joined
            .split([',', '，', '、', ';'])
            .map(str::to_string)
            .collect(),
    };
    Ok(names
        .into_iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Label {
    Text(String),
    Int(i64),
    Float(f64),
}

/// Accept `"3"`, `3` or null.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Label>::deserialize(deserializer)? {
        None => String::new(),
        Some(Label::Text(text)) => text,
        Some(Label::Int(n)) => n.to_string(),
        Some(Label::Float(n)) => n.to_string(),
    })
}
