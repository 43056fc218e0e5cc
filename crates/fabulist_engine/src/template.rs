//! Prompt Template Engine.
//!
//! Turns story, role and ancestor context into provider-ready prompts. Every
//! text template ends with a fixed-key JSON contract that
//! [`extraction::parse`](crate::extraction::parse) decodes against.

use crate::GenerationSettings;
use fabulist_core::{Role, Scene, Story, Storyboard};
use fabulist_error::{FabulistResult, ValidationError, ValidationErrorKind};
use fabulist_interface::GenerationRequest;

/// Output contract for story synopses.
pub const STORY_SCHEMA: &str = r#"Respond with ONLY a JSON object, without code fences or commentary, using exactly these keys:
{
  "name_and_theme": "<story title and theme in one line>",
  "chapters": [
    {"title": "<chapter title>", "summary": "<what happens in the chapter>"}
  ]
}"#;

/// Output contract for storyboard continuations.
pub const STORYBOARD_SCHEMA: &str = r#"Respond with ONLY a JSON object, without code fences or commentary, using exactly these keys:
{
  "chapter_summary": {"title": "<chapter title>", "summary": "<chapter summary>"},
  "chapter_detail": [
    {
      "scene_id": "<1-based scene number>",
      "content": "<scene narration and dialogue>",
      "characters": ["<name of each character present>"],
      "image_prompt": "<visual description of the scene for an illustrator>"
    }
  ]
}"#;

/// Output contract for role detail and role continuity.
pub const ROLE_SCHEMA: &str = r#"Respond with ONLY a JSON object, without code fences or commentary, using exactly these keys:
{
  "name": "<character name>",
  "background": "<history and origin>",
  "personality": "<temperament and manner>",
  "goals": "<what the character wants>",
  "appearance": "<physical description>",
  "relationships": "<ties to other characters>",
  "abilities": "<skills and powers>"
}"#;

/// Prompt use cases.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr, strum::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum UseCase {
    /// Story-level outline
    StorySynopsis,
    /// Next chapter of a storyboard branch
    StoryboardContinuation,
    /// Structured character detail
    RoleDetail,
    /// Character detail revised from what the character has done so far
    RoleContinuity,
    /// Illustration of one scene
    SceneImage,
}

/// One scene of a role's history, in story order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneHistory {
    /// Title of the board the scene belongs to
    pub board_title: String,
    /// Position within the board
    pub sequence: u32,
    /// Scene text
    pub content: String,
}

/// Context for one prompt.
#[derive(Debug, Clone, Copy)]
pub enum TemplateContext<'a> {
    /// Story synopsis
    StorySynopsis {
        /// Story being outlined
        story: &'a Story,
        /// Known roles
        roles: &'a [Role],
    },
    /// Storyboard continuation
    StoryboardContinuation {
        /// Owning story
        story: &'a Story,
        /// Ancestor chain, oldest first
        ancestors: &'a [Storyboard],
        /// Board being rendered
        board: &'a Storyboard,
        /// Roles already known to the story that the board references
        existing_roles: &'a [Role],
        /// Role names the board introduces
        new_roles: &'a [String],
    },
    /// Role detail
    RoleDetail {
        /// Owning story; its premise is the background
        story: &'a Story,
        /// Role being detailed
        role: &'a Role,
        /// Other roles of the story
        siblings: &'a [Role],
    },
    /// Role continuity
    RoleContinuity {
        /// Owning story
        story: &'a Story,
        /// Role being revised
        role: &'a Role,
        /// Scenes featuring the role, oldest first
        history: &'a [SceneHistory],
    },
    /// Scene illustration
    SceneImage {
        /// Owning story
        story: &'a Story,
        /// Board the scene belongs to
        board: &'a Storyboard,
        /// Scene to illustrate
        scene: &'a Scene,
        /// Roles appearing in the scene
        roles: &'a [Role],
    },
}

impl TemplateContext<'_> {
    /// Use case this context renders.
    pub fn use_case(&self) -> UseCase {
        match self {
            Self::StorySynopsis { .. } => UseCase::StorySynopsis,
            Self::StoryboardContinuation { .. } => UseCase::StoryboardContinuation,
            Self::RoleDetail { .. } => UseCase::RoleDetail,
            Self::RoleContinuity { .. } => UseCase::RoleContinuity,
            Self::SceneImage { .. } => UseCase::SceneImage,
        }
    }
}

/// Builds prompts for every use case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplates {
    ancestor_depth: usize,
    language: Option<String>,
    negative_prompt: Option<String>,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self::new(&GenerationSettings::default())
    }
}

impl PromptTemplates {
    /// Templates configured from generation settings.
    pub fn new(settings: &GenerationSettings) -> Self {
        Self {
            ancestor_depth: settings.ancestor_depth.max(1),
            language: settings.language.clone(),
            negative_prompt: settings.negative_prompt.clone(),
        }
    }

    /// Most ancestors a continuation prompt includes.
    pub fn ancestor_depth(&self) -> usize {
        self.ancestor_depth
    }

    /// Build the prompt for `context`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::MissingContext` when the context lacks what
    /// the use case requires (a story premise for role detail, scene history
    /// for role continuity, scene text for an illustration).
    #[tracing::instrument(skip(self, context), fields(use_case = %context.use_case()))]
    pub fn template_for(&self, context: &TemplateContext<'_>) -> FabulistResult<GenerationRequest> {
        let request = match *context {
            TemplateContext::StorySynopsis { story, roles } => {
                GenerationRequest::text(self.story_synopsis(story, roles))
            }
            TemplateContext::StoryboardContinuation {
                story,
                ancestors,
                board,
                existing_roles,
                new_roles,
            } => GenerationRequest::text(self.storyboard_continuation(
                story,
                ancestors,
                board,
                existing_roles,
                new_roles,
            )),
            TemplateContext::RoleDetail {
                story,
                role,
                siblings,
            } => GenerationRequest::text(self.role_detail(story, role, siblings)?),
            TemplateContext::RoleContinuity {
                story,
                role,
                history,
            } => GenerationRequest::text(self.role_continuity(story, role, history)?),
            TemplateContext::SceneImage {
                story,
                board,
                scene,
                roles,
            } => GenerationRequest::text(self.scene_image(story, board, scene, roles)?)
                .with_negative(self.negative_prompt.clone()),
        };
        tracing::debug!(prompt_len = request.positive().len(), "Rendered prompt");
        Ok(request)
    }

    fn story_synopsis(&self, story: &Story, roles: &[Role]) -> String {
        let mut prompt = String::from("You are a novelist planning a serialized illustrated story.\n\n");
        push_field(&mut prompt, "Working title", &story.title);
        push_field(&mut prompt, "Premise", &story.origin);
        if !roles.is_empty() {
            prompt.push_str("Characters:\n");
            push_role_summaries(&mut prompt, roles);
        }
        prompt.push_str(
            "\nName the story, state its theme, and outline its chapters in order.\n",
        );
        self.finish(prompt, STORY_SCHEMA)
    }

    fn storyboard_continuation(
        &self,
        story: &Story,
        ancestors: &[Storyboard],
        board: &Storyboard,
        existing_roles: &[Role],
        new_roles: &[String],
    ) -> String {
        let mut prompt =
            String::from("You are a novelist writing the next chapter of an illustrated story.\n\n");
        push_field(&mut prompt, "Story", &story.title);
        push_field(&mut prompt, "Premise", &story.origin);

        let skip = ancestors.len().saturating_sub(self.ancestor_depth);
        let recent = &ancestors[skip..];
        if recent.is_empty() {
            prompt.push_str("\nThis is the opening chapter.\n");
        } else {
            prompt.push_str("\nThe story so far, oldest chapter first:\n");
            for (i, ancestor) in recent.iter().enumerate() {
                prompt.push_str(&format!(
                    "{}. {}: {}\n",
                    i + 1,
                    ancestor.title.trim(),
                    ancestor.description.trim()
                ));
            }
        }

        prompt.push_str("\nWrite this chapter:\n");
        push_field(&mut prompt, "Title", &board.title);
        push_field(&mut prompt, "Description", &board.description);
        if let Some(direction) = &board.params.direction {
            push_field(&mut prompt, "Direction", direction);
        }
        if let Some(style) = &board.params.style {
            push_field(&mut prompt, "Style", style);
        }
        if let Some(count) = board.params.scene_count {
            prompt.push_str(&format!("Scenes: exactly {}\n", count));
        }

        if !existing_roles.is_empty() {
            prompt.push_str("\nEstablished characters (keep them consistent):\n");
            push_role_summaries(&mut prompt, existing_roles);
        }
        if !new_roles.is_empty() {
            prompt.push_str(&format!(
                "\nNew characters introduced in this chapter: {}\n",
                new_roles.join(", ")
            ));
        }
        prompt.push_str(
            "\nList every character present in each scene by name in its \"characters\" array.\n",
        );
        self.finish(prompt, STORYBOARD_SCHEMA)
    }

    fn role_detail(&self, story: &Story, role: &Role, siblings: &[Role]) -> FabulistResult<String> {
        if story.origin.trim().is_empty() {
            return Err(ValidationError::new(ValidationErrorKind::MissingContext(format!(
                "story {} has no premise to ground role {}",
                story.id, role.id
            )))
            .into());
        }
        let mut prompt = String::from("You are a character designer for an illustrated story.\n\n");
        push_field(&mut prompt, "Story", &story.title);
        push_field(&mut prompt, "Background", &story.origin);
        prompt.push_str("\nDesign this character:\n");
        push_field(&mut prompt, "Name", &role.name);
        push_field(&mut prompt, "Description", &role.description);

        let others: Vec<&Role> = siblings.iter().filter(|other| other.id != role.id).collect();
        if !others.is_empty() {
            prompt.push_str(
                "\nOther characters in the story (avoid duplicating their traits or contradicting them):\n",
            );
            for other in others {
                prompt.push_str(&format!("- {}\n", other.summary()));
            }
        }
        Ok(self.finish(prompt, ROLE_SCHEMA))
    }

    fn role_continuity(
        &self,
        story: &Story,
        role: &Role,
        history: &[SceneHistory],
    ) -> FabulistResult<String> {
        if history.is_empty() {
            return Err(ValidationError::new(ValidationErrorKind::MissingContext(format!(
                "role {} appears in no scenes",
                role.id
            )))
            .into());
        }
        let mut prompt = String::from(
            "You are a continuity editor for an illustrated story. Update the character sheet so it reflects everything the character has done so far.\n\n",
        );
        push_field(&mut prompt, "Story", &story.title);
        push_field(&mut prompt, "Background", &story.origin);
        push_field(&mut prompt, "Character", &role.name);
        if !role.detail.is_empty() {
            push_field(&mut prompt, "Current background", &role.detail.background);
            push_field(&mut prompt, "Current personality", &role.detail.personality);
            push_field(&mut prompt, "Current goals", &role.detail.goals);
            push_field(&mut prompt, "Current appearance", &role.detail.appearance);
            push_field(&mut prompt, "Current relationships", &role.detail.relationships);
            push_field(&mut prompt, "Current abilities", &role.detail.abilities);
        } else {
            push_field(&mut prompt, "Description", &role.description);
        }
        prompt.push_str("\nScenes featuring the character, in story order:\n");
        for entry in history {
            prompt.push_str(&format!(
                "- [{} #{}] {}\n",
                entry.board_title.trim(),
                entry.sequence,
                entry.content.trim()
            ));
        }
        Ok(self.finish(prompt, ROLE_SCHEMA))
    }

    fn scene_image(
        &self,
        story: &Story,
        board: &Storyboard,
        scene: &Scene,
        roles: &[Role],
    ) -> FabulistResult<String> {
        let subject = if scene.image_prompt.trim().is_empty() {
            scene.content.trim()
        } else {
            scene.image_prompt.trim()
        };
        if subject.is_empty() {
            return Err(ValidationError::new(ValidationErrorKind::MissingContext(format!(
                "scene {} has nothing to illustrate",
                scene.id
            )))
            .into());
        }
        let mut prompt = subject.to_string();
        for role in roles {
            let appearance = role.detail.appearance.trim();
            if !appearance.is_empty() {
                prompt.push_str(&format!(". {}: {}", role.name, appearance));
            }
        }
        if let Some(style) = &board.params.style {
            prompt.push_str(&format!(". Style: {}", style.trim()));
        }
        if !story.title.trim().is_empty() {
            prompt.push_str(&format!(". From the story \"{}\"", story.title.trim()));
        }
        Ok(prompt)
    }

    fn finish(&self, mut prompt: String, schema: &str) -> String {
        if let Some(language) = &self.language {
            prompt.push_str(&format!("\nWrite all text values in {}.\n", language));
        }
        prompt.push('\n');
        prompt.push_str(schema);
        prompt
    }
}

fn push_field(prompt: &mut String, label: &str, value: &str) {
    let value = value.trim();
    if !value.is_empty() {
        prompt.push_str(&format!("{}: {}\n", label, value));
    }
}

fn push_role_summaries(prompt: &mut String, roles: &[Role]) {
    for role in roles {
        prompt.push_str(&format!("- {}\n", role.summary()));
    }
}
