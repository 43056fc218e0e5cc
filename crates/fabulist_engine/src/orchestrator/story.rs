//! Story synopsis.

use super::{Orchestrator, RenderOptions, RenderOutcome};
use crate::bookkeeping;
use crate::extraction::TargetShape;
use crate::{TaskSpec, TaskStart, TemplateContext};
use fabulist_core::{
    ActivityKind, GenerationTask, NewActivity, ParsedContent, Story, StoryId, StoryOutline,
    TaskTarget, TaskType,
};
use fabulist_error::{FabulistResult, ParseError, ParseErrorKind};
use fabulist_interface::{ContentStore, GenerationProvider, StoryUpdate};
use tracing::{info, instrument};

/// A rendered story synopsis.
#[derive(Debug, Clone, PartialEq)]
pub struct StoryRender {
    /// The story, with its title filled in if it was empty
    pub story: Story,
    /// The finished task
    pub task: GenerationTask,
    /// Decoded outline
    pub outline: StoryOutline,
}

impl<S: ContentStore, P: GenerationProvider> Orchestrator<S, P> {
    /// Generate a synopsis for a story.
    ///
    /// # Errors
    ///
    /// `StoryClosed` for a closed story; provider and parse failures are
    /// recorded on the task and returned.
    #[instrument(skip(self, options), fields(story_id = %story_id, regen = options.regen))]
    pub async fn render_story(
        &self,
        story_id: StoryId,
        options: RenderOptions,
    ) -> FabulistResult<RenderOutcome<StoryRender>> {
        let story = self.tree.get_story(story_id).await?;
        story.ensure_open()?;

        let target = TaskTarget::story(story.id);
        if let Some(task) = self
            .already_rendering(target, TaskType::Story, &options)
            .await?
        {
            return Ok(RenderOutcome::InProgress(task));
        }

        let roles = self.store.list_roles_by_story(story.id).await?;
        let request = self.templates.template_for(&TemplateContext::StorySynopsis {
            story: &story,
            roles: &roles,
        })?;

        let task = match self
            .tracker
            .begin_task(
                TaskSpec::text(target, TaskType::Story, request.positive().clone())
                    .with_regen(options.regen),
            )
            .await?
        {
            TaskStart::Started(task) => task,
            TaskStart::AlreadyRunning(task) => return Ok(RenderOutcome::InProgress(task)),
        };

        let raw = self
            .tracker
            .invoke(
                &task,
                self.deadline(&options),
                options.cancel.as_ref(),
                self.provider.generate_text(&request),
            )
            .await?;
        let (task, parsed) = self
            .tracker
            .complete_task(&task, &raw, TargetShape::StoryOutline)
            .await?;
        let ParsedContent::Story(outline) = parsed else {
            return Err(ParseError::new(ParseErrorKind::SchemaMismatch {
                shape: TargetShape::StoryOutline.to_string(),
                message: "decoded into a different shape".to_string(),
            })
            .into());
        };

        let story = match title_from(&outline) {
            Some(title) if story.title.trim().is_empty() => {
                info!(title = %title, "Filled story title from synopsis");
                self.store
                    .update_story(
                        story.id,
                        StoryUpdate {
                            title: Some(title),
                            ..StoryUpdate::default()
                        },
                    )
                    .await?
            }
            _ => story,
        };

        bookkeeping::record(
            self.store.as_ref(),
            NewActivity::new(ActivityKind::StoryRendered, story.id)
                .with_actor(options.actor)
                .with_detail(format!("{} chapters", outline.chapters.len())),
        )
        .await;

        info!(task_id = %task.id, chapters = outline.chapters.len(), "Rendered story synopsis");
        Ok(RenderOutcome::Completed(StoryRender {
            story,
            task,
            outline,
        }))
    }
}

/// Title half of a "name: theme" line.
fn title_from(outline: &StoryOutline) -> Option<String> {
    let name = outline
        .name_and_theme
        .split([':', '：'])
        .next()
        .unwrap_or_default()
        .trim();
    (!name.is_empty()).then(|| name.to_string())
}
