//! Generation Task Tracker.
//!
//! Records one [`GenerationTask`] per provider invocation and keeps at most
//! one task in flight per (origin, board, task type). The check runs against
//! the content store before the insert, so two callers racing through the
//! same window can both start; that duplicate is accepted rather than locked
//! away.

use crate::CancelSignal;
use crate::extraction::{self, TargetShape};
use fabulist_core::{
    GenType, GenerationTask, NewGenerationTask, ParsedContent, TaskId, TaskStatus, TaskTarget,
    TaskType,
};
use fabulist_error::{FabulistError, FabulistResult, ProviderError, ProviderErrorKind};
use fabulist_interface::{TaskFilter, TaskStore, TaskUpdate};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Prefix of the error message stored on tasks abandoned by their caller.
pub const ABANDONED: &str = "abandoned";

/// What a new task is for.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSpec {
    /// Origin and board scope
    pub target: TaskTarget,
    /// Level of the story
    pub task_type: TaskType,
    /// Kind of output
    pub gen_type: GenType,
    /// Prompt sent to the provider
    pub positive_prompt: String,
    /// Negative prompt
    pub negative_prompt: Option<String>,
    /// Forced redo; bypasses the in-flight check
    pub regen: bool,
}

impl TaskSpec {
    /// A text task with no negative prompt.
    pub fn text(target: TaskTarget, task_type: TaskType, positive_prompt: impl Into<String>) -> Self {
        Self {
            target,
            task_type,
            gen_type: GenType::Text,
            positive_prompt: positive_prompt.into(),
            negative_prompt: None,
            regen: false,
        }
    }

    /// Builder method to set the output kind.
    pub fn with_gen_type(mut self, gen_type: GenType) -> Self {
        self.gen_type = gen_type;
        self
    }

    /// Builder method to set the negative prompt.
    pub fn with_negative(mut self, negative_prompt: Option<String>) -> Self {
        self.negative_prompt = negative_prompt;
        self
    }

    /// Builder method to mark a forced redo.
    pub fn with_regen(mut self, regen: bool) -> Self {
        self.regen = regen;
        self
    }
}

/// Result of [`GenerationTracker::begin_task`].
#[derive(Debug, Clone, PartialEq)]
pub enum TaskStart {
    /// A new task was recorded; the caller invokes the provider.
    Started(GenerationTask),
    /// A task for the same key is already in flight; returned unchanged.
    AlreadyRunning(GenerationTask),
}

impl TaskStart {
    /// The task, new or existing.
    pub fn task(&self) -> &GenerationTask {
        match self {
            Self::Started(task) | Self::AlreadyRunning(task) => task,
        }
    }
}

/// Tracks generation tasks in a [`TaskStore`].
#[derive(Debug)]
pub struct GenerationTracker<S> {
    store: Arc<S>,
}

impl<S> Clone for GenerationTracker<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: TaskStore> GenerationTracker<S> {
    /// Track tasks in `store`.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Newest in-flight task for `target` and `task_type`, if any.
    #[instrument(skip(self), fields(target = %target))]
    pub async fn find_in_flight(
        &self,
        target: TaskTarget,
        task_type: TaskType,
    ) -> FabulistResult<Option<GenerationTask>> {
        let tasks = self
            .store
            .list_tasks_by_origin_and_status(&TaskFilter::in_flight(target, task_type))
            .await?;
        Ok(tasks.into_iter().next())
    }

    /// Record a new task, or return the one already in flight for its key.
    ///
    /// `spec.regen` skips the check and always records a new task.
    #[instrument(skip(self, spec), fields(target = %spec.target, task_type = %spec.task_type, regen = spec.regen))]
    pub async fn begin_task(&self, spec: TaskSpec) -> FabulistResult<TaskStart> {
        if !spec.regen {
            if let Some(existing) = self.find_in_flight(spec.target, spec.task_type).await? {
                info!(task_id = %existing.id, "Task already in flight");
                return Ok(TaskStart::AlreadyRunning(existing));
            }
        }

        let task = self
            .store
            .create_task(NewGenerationTask {
                target: spec.target,
                task_type: spec.task_type,
                gen_type: spec.gen_type,
                status: TaskStatus::Pending,
                positive_prompt: spec.positive_prompt,
                negative_prompt: spec.negative_prompt,
                regen: spec.regen,
            })
            .await?;
        info!(task_id = %task.id, "Task started");
        Ok(TaskStart::Started(task))
    }

    /// Run a provider call on behalf of `task`.
    ///
    /// Marks the task running, then waits for `call` bounded by `deadline`
    /// and `cancel`. A failed or abandoned call marks the task `error` and
    /// returns the error; the caller completes the task on success.
    ///
    /// Dropping the returned future before it resolves also marks the task
    /// `error` as abandoned, so its key does not stay in flight.
    #[instrument(skip(self, task, call, cancel), fields(task_id = %task.id))]
    pub async fn invoke<T, F>(
        &self,
        task: &GenerationTask,
        deadline: Option<Duration>,
        cancel: Option<&CancelSignal>,
        call: F,
    ) -> FabulistResult<T>
    where
        F: Future<Output = FabulistResult<T>>,
    {
        let mut guard = AbandonGuard::new(Arc::clone(&self.store), task.id);
        self.store
            .update_task(
                task.id,
                TaskUpdate {
                    status: Some(TaskStatus::Running),
                    ..TaskUpdate::default()
                },
            )
            .await?;

        let result = bounded(call, deadline, cancel).await;
        if let Err(err) = &result {
            self.fail_task(task, err, None).await?;
        }
        guard.disarm();
        result
    }

    /// Clean and parse `raw`, then store both on `task` and mark it finished.
    ///
    /// Output that does not decode marks the task `error` with the raw text
    /// kept for diagnosis, and the parse error is returned.
    #[instrument(skip(self, task, raw), fields(task_id = %task.id, shape = %shape))]
    pub async fn complete_task(
        &self,
        task: &GenerationTask,
        raw: &str,
        shape: TargetShape,
    ) -> FabulistResult<(GenerationTask, ParsedContent)> {
        let cleaned = extraction::clean(raw);
        let parsed = match extraction::parse(&cleaned, shape) {
            Ok(parsed) => parsed,
            Err(err) => {
                self.fail_task(task, &err, Some(raw.to_string())).await?;
                return Err(err);
            }
        };

        let finished = self
            .store
            .update_task(
                task.id,
                TaskUpdate {
                    status: Some(TaskStatus::Finished),
                    raw_result: Some(raw.to_string()),
                    parsed_result: Some(parsed.clone()),
                    error_message: None,
                    finished: true,
                },
            )
            .await?;
        info!("Task finished");
        Ok((finished, parsed))
    }

    /// Store image locations on `task` and mark it finished.
    #[instrument(skip(self, task, urls), fields(task_id = %task.id, count = urls.len()))]
    pub async fn complete_images(
        &self,
        task: &GenerationTask,
        urls: Vec<String>,
    ) -> FabulistResult<GenerationTask> {
        if urls.is_empty() {
            let err: FabulistError = ProviderError::new(ProviderErrorKind::EmptyResponse).into();
            self.fail_task(task, &err, None).await?;
            return Err(err);
        }
        let raw = serde_json::to_string(&urls).map_err(fabulist_error::JsonError::from)?;
        let finished = self
            .store
            .update_task(
                task.id,
                TaskUpdate {
                    status: Some(TaskStatus::Finished),
                    raw_result: Some(raw),
                    parsed_result: Some(ParsedContent::Images(urls)),
                    error_message: None,
                    finished: true,
                },
            )
            .await?;
        info!("Image task finished");
        Ok(finished)
    }

    /// Mark `task` as failed. The task stays queryable.
    #[instrument(skip(self, task, err, raw), fields(task_id = %task.id, code = err.code()))]
    pub async fn fail_task(
        &self,
        task: &GenerationTask,
        err: &FabulistError,
        raw: Option<String>,
    ) -> FabulistResult<GenerationTask> {
        let message = if err.is_abandoned() {
            format!("{}: {}", ABANDONED, err)
        } else {
            err.to_string()
        };
        warn!(error = %message, "Task failed");
        self.store
            .update_task(
                task.id,
                TaskUpdate {
                    status: Some(TaskStatus::Error),
                    raw_result: raw,
                    parsed_result: None,
                    error_message: Some(message),
                    finished: true,
                },
            )
            .await
    }

    /// Every task recorded for `target` and `task_type`, newest first.
    pub async fn history(
        &self,
        target: TaskTarget,
        task_type: TaskType,
    ) -> FabulistResult<Vec<GenerationTask>> {
        self.store
            .list_tasks_by_origin_and_status(&TaskFilter {
                target: Some(target),
                task_type: Some(task_type),
                ..TaskFilter::default()
            })
            .await
    }

    /// Newest finished task for `target` and `task_type`.
    pub async fn latest_finished(
        &self,
        target: TaskTarget,
        task_type: TaskType,
    ) -> FabulistResult<Option<GenerationTask>> {
        let tasks = self
            .store
            .list_tasks_by_origin_and_status(
                &TaskFilter {
                    target: Some(target),
                    task_type: Some(task_type),
                    ..TaskFilter::default()
                }
                .with_statuses(vec![TaskStatus::Finished])
                .with_gen_type(GenType::Text),
            )
            .await?;
        debug!(found = !tasks.is_empty(), "Looked up latest finished task");
        Ok(tasks.into_iter().next())
    }
}

/// Marks a task abandoned if the invoking future is dropped mid-call.
struct AbandonGuard<S: TaskStore> {
    store: Arc<S>,
    task_id: TaskId,
    armed: bool,
}

impl<S: TaskStore> AbandonGuard<S> {
    fn new(store: Arc<S>, task_id: TaskId) -> Self {
        Self {
            store,
            task_id,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl<S: TaskStore> Drop for AbandonGuard<S> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let task_id = self.task_id;
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(%task_id, "No runtime to close dropped task");
            return;
        };
        let store = Arc::clone(&self.store);
        handle.spawn(async move {
            let update = TaskUpdate {
                status: Some(TaskStatus::Error),
                raw_result: None,
                parsed_result: None,
                error_message: Some(format!("{}: caller dropped the request", ABANDONED)),
                finished: true,
            };
            match store.update_task(task_id, update).await {
                Ok(_) => warn!(%task_id, "Task abandoned by its caller"),
                Err(e) => warn!(%task_id, error = %e, "Failed to close dropped task"),
            }
        });
    }
}

/// Await `call`, giving up at `deadline` or when `cancel` fires.
async fn bounded<T, F>(
    call: F,
    deadline: Option<Duration>,
    cancel: Option<&CancelSignal>,
) -> FabulistResult<T>
where
    F: Future<Output = FabulistResult<T>>,
{
    let timed = async {
        match deadline {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::new(ProviderErrorKind::Timeout(
                    limit.as_millis() as u64,
                ))
                .into()),
            },
            None => call.await,
        }
    };

    match cancel {
        Some(signal) => {
            if signal.is_cancelled() {
                return Err(ProviderError::new(ProviderErrorKind::Cancelled).into());
            }
            tokio::select! {
                result = timed => result,
                _ = signal.cancelled() => Err(ProviderError::new(ProviderErrorKind::Cancelled).into()),
            }
        }
        None => timed.await,
    }
}
