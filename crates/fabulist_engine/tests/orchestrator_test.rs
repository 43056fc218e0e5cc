//! Orchestrator tests against the in-memory store and a scripted provider.

mod test_utils;

use fabulist_core::{
    ActivityKind, BoardOverrides, BoardStage, GenType, NewGenerationTask, NewRole, SceneStatus,
    StoryStatus, TaskStatus, TaskTarget, TaskType,
};
use fabulist_engine::{
    ABANDONED, FabulistConfig, RenderOptions, RenderOutcome, ResumePoint, SceneImageOutcome,
};
use fabulist_error::ProviderErrorKind;
use fabulist_interface::{
    ActivityStore, RoleStore, RoleUpdate, SceneStore, StoryStore, StoryUpdate, StoryboardStore,
    TaskStore, TaskUpdate,
};
use std::time::Duration;
use test_utils::{
    Harness, MockProvider, ROLE_JSON, STORY_JSON, closed_story, content, harness,
    harness_with_config, open_story, story_with_root, storyboard_json,
};

fn two_scenes() -> String {
    storyboard_json(
        "The Bell",
        &[
            ("Mira hears a bell under the water.", &["Mira"]),
            ("Tomas rows out at dawn.", &["Tomas", "Mira"]),
        ],
    )
}

async fn rendered_board(harness: &Harness) -> fabulist_core::Storyboard {
    let (_story, root) = story_with_root(harness).await;
    harness
        .orchestrator
        .render_storyboard(root.id, RenderOptions::default())
        .await
        .unwrap()
        .completed()
        .unwrap()
        .board
}

#[tokio::test]
async fn test_render_story_fills_empty_title() {
    let h = harness(MockProvider::new().with_text(STORY_JSON));
    let story = open_story(&h.store, "A lighthouse keeper finds a drowned bell").await;

    let render = h
        .orchestrator
        .render_story(story.id, RenderOptions::default().with_actor(3))
        .await
        .unwrap()
        .completed()
        .unwrap();
    assert_eq!(render.story.title, "The Drowned Bell");
    assert_eq!(render.outline.chapters.len(), 2);
    assert_eq!(render.task.status, TaskStatus::Finished);
    assert_eq!(render.task.target, TaskTarget::story(story.id));

    let activities = h.store.list_activities(story.id).await.unwrap();
    assert!(
        activities
            .iter()
            .any(|a| a.kind == ActivityKind::StoryRendered && a.actor == Some(3))
    );
}

#[tokio::test]
async fn test_render_storyboard_from_fenced_output() {
    let h = harness(MockProvider::new().with_text(two_scenes()));
    let (story, root) = story_with_root(&h).await;

    let render = h
        .orchestrator
        .render_storyboard(root.id, RenderOptions::default())
        .await
        .unwrap()
        .completed()
        .unwrap();
    assert!(render.applied);
    assert_eq!(render.board.stage, BoardStage::Rendered);
    assert!(render.board.is_ai_gen);
    assert_eq!(render.board.fork_num, 1);
    assert_eq!(render.draft.chapter_summary.title, "The Bell");
    assert_eq!(render.scenes.len(), 2);
    assert_eq!(render.scenes[0].sequence, 1);
    assert_eq!(render.scenes[1].character_ids.len(), 2);
    assert_eq!(render.task.status, TaskStatus::Finished);

    let names: Vec<_> = render.new_roles.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Mira", "Tomas"]);
    let mira = h.store.get_role_by_name(story.id, "Mira").await.unwrap().unwrap();
    assert_eq!(mira.storyboard_num, 1);
    let linked = h.store.list_board_roles(root.id).await.unwrap();
    assert_eq!(linked.len(), 2);

    let story = h.store.get_story(story.id).await.unwrap().unwrap();
    assert_eq!(story.role_num, 2);
    assert_eq!(h.provider.text_calls(), 1);
}

#[tokio::test]
async fn test_prompt_names_existing_and_new_roles() {
    let h = harness(MockProvider::new().with_text(two_scenes()));
    let story = open_story(&h.store, "A lighthouse keeper finds a drowned bell").await;
    h.store
        .create_role(NewRole::new(story.id, "Mira", "the keeper"))
        .await
        .unwrap();
    let root = h
        .orchestrator
        .create_root(story.id, test_utils::content_with_roles("Arrival", &["Mira", "Ines"]))
        .await
        .unwrap();

    let render = h
        .orchestrator
        .render_storyboard(root.id, RenderOptions::default())
        .await
        .unwrap()
        .completed()
        .unwrap();
    let prompt = h.provider.requests()[0].positive().clone();
    assert!(prompt.contains("Mira"));
    assert!(prompt.contains("Ines"));
    assert!(prompt.contains("chapter_detail"));

    // Ines is referenced by the board, Tomas by the draft; Mira already existed.
    let mut created: Vec<_> = render.new_roles.iter().map(|r| r.name.clone()).collect();
    created.sort();
    assert_eq!(created, vec!["Ines", "Tomas"]);
}

#[tokio::test]
async fn test_rendered_board_needs_regen() {
    let h = harness(
        MockProvider::new()
            .with_text(two_scenes())
            .with_text(storyboard_json("Again", &[("Only scene.", &["Mira"])])),
    );
    let board = rendered_board(&h).await;

    let err = h
        .orchestrator
        .render_storyboard(board.id, RenderOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "validation.already_rendered");

    let render = h
        .orchestrator
        .render_storyboard(board.id, RenderOptions::default().with_regen(true))
        .await
        .unwrap()
        .completed()
        .unwrap();
    assert_eq!(render.scenes.len(), 1);
    assert!(render.task.regen);

    let live = h.store.list_scenes_by_board(board.id).await.unwrap();
    assert_eq!(live.len(), 1);
    let all = h.store.all_scenes(board.id).await;
    assert_eq!(
        all.iter()
            .filter(|s| s.status == SceneStatus::Deleted)
            .count(),
        2
    );

    // Re-linking the same role does not count twice.
    let mira = h
        .store
        .get_role_by_name(board.story_id, "Mira")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(mira.storyboard_num, 1);
}

#[tokio::test]
async fn test_in_flight_task_reports_in_progress() {
    let h = harness(MockProvider::new().with_text(two_scenes()));
    let (story, root) = story_with_root(&h).await;
    let running = h
        .store
        .create_task(NewGenerationTask {
            target: TaskTarget::board(story.id, root.id),
            task_type: TaskType::Storyboard,
            gen_type: GenType::Text,
            status: TaskStatus::Running,
            positive_prompt: "earlier".to_string(),
            negative_prompt: None,
            regen: false,
        })
        .await
        .unwrap();

    let outcome = h
        .orchestrator
        .render_storyboard(root.id, RenderOptions::default())
        .await
        .unwrap();
    assert_eq!(outcome, RenderOutcome::InProgress(running));
    assert_eq!(h.provider.text_calls(), 0);
    assert_eq!(h.store.task_count().await, 1);
}

#[tokio::test]
async fn test_polling_rendered_board_during_regen_reports_in_progress() {
    let h = harness(MockProvider::new().with_text(two_scenes()));
    let board = rendered_board(&h).await;
    assert_eq!(board.stage, BoardStage::Rendered);
    let redo = h
        .store
        .create_task(NewGenerationTask {
            target: TaskTarget::board(board.story_id, board.id),
            task_type: TaskType::Storyboard,
            gen_type: GenType::Text,
            status: TaskStatus::Running,
            positive_prompt: "redo".to_string(),
            negative_prompt: None,
            regen: true,
        })
        .await
        .unwrap();

    let outcome = h
        .orchestrator
        .render_storyboard(board.id, RenderOptions::default())
        .await
        .unwrap();
    assert_eq!(outcome, RenderOutcome::InProgress(redo));
    assert_eq!(h.provider.text_calls(), 1);

    // Without a render in flight the same call is rejected.
    h.store
        .update_task(
            outcome.in_progress().unwrap().id,
            TaskUpdate {
                status: Some(TaskStatus::Finished),
                finished: true,
                ..TaskUpdate::default()
            },
        )
        .await
        .unwrap();
    let err = h
        .orchestrator
        .render_storyboard(board.id, RenderOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "validation.already_rendered");
}

#[tokio::test]
async fn test_closed_story_creates_no_task() {
    let h = harness(MockProvider::new().with_text(two_scenes()).with_text(STORY_JSON));
    let (story, root) = story_with_root(&h).await;
    h.store
        .update_story(
            story.id,
            StoryUpdate {
                status: Some(StoryStatus::Closed),
                ..StoryUpdate::default()
            },
        )
        .await
        .unwrap();

    let err = h
        .orchestrator
        .render_storyboard(root.id, RenderOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "validation.story_closed");
    let err = h
        .orchestrator
        .render_story(story.id, RenderOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "validation.story_closed");
    let err = h
        .orchestrator
        .fork_board(root.id, BoardOverrides::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "validation.story_closed");

    let other = closed_story(&h.store, "premise").await;
    let err = h
        .orchestrator
        .create_root(other.id, content("One"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "validation.story_closed");

    assert_eq!(h.store.task_count().await, 0);
    assert_eq!(h.provider.text_calls(), 0);
}

#[tokio::test]
async fn test_publish_then_reject_render_and_fork() {
    let h = harness(
        MockProvider::new()
            .with_text(two_scenes())
            .with_default_images(&["https://img/a.png"]),
    );
    let board = rendered_board(&h).await;

    let err = h.orchestrator.publish(board.id, None).await.unwrap_err();
    assert_eq!(err.code(), "validation.invalid_transition");

    let images = h
        .orchestrator
        .render_scene_images(board.id, RenderOptions::default())
        .await
        .unwrap()
        .completed()
        .unwrap();
    assert_eq!(images.board.stage, BoardStage::Finished);

    let published = h.orchestrator.publish(board.id, Some(9)).await.unwrap();
    assert_eq!(published.stage, BoardStage::Published);

    let err = h
        .orchestrator
        .render_storyboard(board.id, RenderOptions::default().with_regen(true))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "validation.board_published");
    let err = h
        .orchestrator
        .fork_board(board.id, BoardOverrides::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "validation.board_published");
    let err = h.orchestrator.cancel(board.id, None).await.unwrap_err();
    assert_eq!(err.code(), "validation.board_published");
}

#[tokio::test]
async fn test_cancel_is_terminal_reset() {
    let h = harness(MockProvider::new().with_text(two_scenes()));
    let (_story, root) = story_with_root(&h).await;

    let cancelled = h.orchestrator.cancel(root.id, None).await.unwrap();
    assert_eq!(cancelled.stage, BoardStage::Unspecified);
    let again = h.orchestrator.cancel(root.id, None).await.unwrap();
    assert_eq!(again.stage, BoardStage::Unspecified);

    let err = h
        .orchestrator
        .render_storyboard(root.id, RenderOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "validation.board_cancelled");
    let err = h.orchestrator.publish(root.id, None).await.unwrap_err();
    assert_eq!(err.code(), "validation.board_cancelled");
    assert_eq!(h.provider.text_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_late_result_on_cancelled_board_kept_in_history() {
    let h = harness(MockProvider::new().with_delayed_text(Duration::from_secs(30), two_scenes()));
    let (_story, root) = story_with_root(&h).await;

    let render = h
        .orchestrator
        .render_storyboard(root.id, RenderOptions::default());
    let cancel = async {
        tokio::time::sleep(Duration::from_secs(1)).await;
        h.orchestrator.cancel(root.id, None).await
    };
    let (render, cancelled) = tokio::join!(render, cancel);
    assert_eq!(cancelled.unwrap().stage, BoardStage::Unspecified);

    let render = render.unwrap().completed().unwrap();
    assert!(!render.applied);
    assert!(render.scenes.is_empty());
    assert_eq!(render.board.stage, BoardStage::Unspecified);
    assert_eq!(render.task.status, TaskStatus::Finished);
    assert!(h.store.list_scenes_by_board(root.id).await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_deadline_abandons_task_and_frees_board() {
    let h = harness(
        MockProvider::new()
            .with_delayed_text(Duration::from_secs(600), two_scenes())
            .with_text(two_scenes()),
    );
    let (story, root) = story_with_root(&h).await;

    let err = h
        .orchestrator
        .render_storyboard(
            root.id,
            RenderOptions::default().with_deadline(Duration::from_secs(5)),
        )
        .await
        .unwrap_err();
    assert!(err.is_abandoned());

    let history = h
        .orchestrator
        .tracker()
        .history(TaskTarget::board(story.id, root.id), TaskType::Storyboard)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, TaskStatus::Error);
    assert!(history[0].error_message.as_deref().unwrap().starts_with(ABANDONED));

    let board = h.orchestrator.tree().get_active_board(root.id).await.unwrap();
    assert_eq!(board.stage, BoardStage::Created);

    // A caller-initiated retry starts a new task.
    let retry = h
        .orchestrator
        .render_storyboard(root.id, RenderOptions::default())
        .await
        .unwrap();
    assert!(!retry.is_in_progress());
}

#[tokio::test(start_paused = true)]
async fn test_configured_timeout_applies_without_deadline() {
    let mut config = FabulistConfig::default();
    config.generation.provider_timeout_secs = Some(2);
    let h = harness_with_config(
        MockProvider::new().with_delayed_text(Duration::from_secs(60), STORY_JSON),
        config,
    );
    let story = open_story(&h.store, "premise").await;

    let err = h
        .orchestrator
        .render_story(story.id, RenderOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "provider.timeout");
}

#[tokio::test]
async fn test_provider_and_parse_failures_recorded_on_task() {
    let h = harness(
        MockProvider::new()
            .with_text_error(ProviderErrorKind::Request("502 bad gateway".to_string()))
            .with_text("Sorry, I can't help with that."),
    );
    let (story, root) = story_with_root(&h).await;
    let target = TaskTarget::board(story.id, root.id);

    let err = h
        .orchestrator
        .render_storyboard(root.id, RenderOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "provider.request");
    assert!(err.is_generation_failure());

    let err = h
        .orchestrator
        .render_storyboard(root.id, RenderOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "parse.invalid_json");

    let history = h
        .orchestrator
        .tracker()
        .history(target, TaskType::Storyboard)
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|t| t.status == TaskStatus::Error));
    assert_eq!(
        history[0].raw_result.as_deref(),
        Some("Sorry, I can't help with that.")
    );
    let board = h.orchestrator.tree().get_active_board(root.id).await.unwrap();
    assert_eq!(board.stage, BoardStage::Created);
}

#[tokio::test]
async fn test_scene_images_settle_to_finished() {
    let h = harness(
        MockProvider::new()
            .with_text(two_scenes())
            .with_default_images(&["https://img/scene.png"]),
    );
    let board = rendered_board(&h).await;
    let mira = h
        .store
        .get_role_by_name(board.story_id, "Mira")
        .await
        .unwrap()
        .unwrap();
    h.store
        .update_role(
            mira.id,
            RoleUpdate {
                avatar_url: Some("https://img/mira.png".to_string()),
                ..RoleUpdate::default()
            },
        )
        .await
        .unwrap();

    let render = h
        .orchestrator
        .render_scene_images(board.id, RenderOptions::default())
        .await
        .unwrap()
        .completed()
        .unwrap();
    assert_eq!(render.board.stage, BoardStage::Finished);
    assert_eq!(render.generated(), 2);
    assert_eq!(render.scenes[0].sequence, 1);
    assert_eq!(h.provider.image_calls(), 2);

    let image_requests: Vec<_> = h
        .provider
        .requests()
        .into_iter()
        .filter(|r| r.negative().is_some() || r.reference_image().is_some())
        .collect();
    assert_eq!(image_requests.len(), 2);
    assert!(
        image_requests
            .iter()
            .all(|r| r.reference_image().as_deref() == Some("https://img/mira.png"))
    );

    for scene in h.store.list_scenes_by_board(board.id).await.unwrap() {
        assert!(!scene.is_generating);
        assert_eq!(scene.status, SceneStatus::Ready);
        let media = scene.gen_result.unwrap();
        assert_eq!(media.image_urls, vec!["https://img/scene.png".to_string()]);
        assert!(media.task_id.is_some());
    }
}

#[tokio::test]
async fn test_failed_scene_does_not_block_finish() {
    let h = harness(
        MockProvider::new()
            .with_text(two_scenes())
            .with_images(&["https://img/ok.png"])
            .with_image_error(ProviderErrorKind::Request("quota".to_string())),
    );
    let board = rendered_board(&h).await;

    let render = h
        .orchestrator
        .render_scene_images(board.id, RenderOptions::default())
        .await
        .unwrap()
        .completed()
        .unwrap();
    assert_eq!(render.board.stage, BoardStage::Finished);
    assert_eq!(render.generated(), 1);
    assert_eq!(
        render
            .scenes
            .iter()
            .filter(|s| matches!(s.outcome, SceneImageOutcome::Failed(_)))
            .count(),
        1
    );

    let scenes = h.store.list_scenes_by_board(board.id).await.unwrap();
    assert!(scenes.iter().all(|s| !s.is_generating));
    assert!(
        scenes
            .iter()
            .any(|s| s.gen_result.as_ref().and_then(|m| m.error.as_ref()).is_some())
    );
}

#[tokio::test]
async fn test_images_require_rendered_text_and_scenes() {
    let h = harness(
        MockProvider::new()
            .with_text(storyboard_json("Empty", &[]))
            .with_default_images(&["https://img/x.png"]),
    );
    let (story, root) = story_with_root(&h).await;

    let err = h
        .orchestrator
        .render_scene_images(root.id, RenderOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "validation.invalid_transition");

    h.orchestrator
        .render_storyboard(root.id, RenderOptions::default())
        .await
        .unwrap();
    let err = h
        .orchestrator
        .render_scene_images(root.id, RenderOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "validation.no_scenes");
    let board = h.store.get_board(root.id).await.unwrap().unwrap();
    assert_eq!(board.stage, BoardStage::Rendered);
    assert_eq!(board.story_id, story.id);
    assert_eq!(h.provider.image_calls(), 0);
}

#[tokio::test]
async fn test_bookkeeping_failures_are_swallowed() {
    let h = harness(MockProvider::new().with_text(two_scenes()));
    let (_story, root) = story_with_root(&h).await;
    h.store.set_activity_failure(true);
    h.store.set_counter_failure(true);

    let render = h
        .orchestrator
        .render_storyboard(root.id, RenderOptions::default())
        .await
        .unwrap()
        .completed()
        .unwrap();
    assert_eq!(render.board.stage, BoardStage::Rendered);
    assert_eq!(render.board.fork_num, 0);

    let child = h
        .orchestrator
        .fork_board(root.id, BoardOverrides::default())
        .await
        .unwrap();
    assert_eq!(child.prev_id, Some(root.id));
}

#[tokio::test]
async fn test_render_role_uses_story_and_siblings() {
    let h = harness(MockProvider::new().with_text(ROLE_JSON));
    let story = open_story(&h.store, "A lighthouse keeper finds a drowned bell").await;
    let mira = h
        .store
        .create_role(NewRole::new(story.id, "Mira", ""))
        .await
        .unwrap();
    h.store
        .create_role(NewRole::new(story.id, "Tomas", "her brother, lost at sea"))
        .await
        .unwrap();

    let render = h
        .orchestrator
        .render_role(mira.id, RenderOptions::default())
        .await
        .unwrap()
        .completed()
        .unwrap();
    assert_eq!(render.detail.personality, "wry and stubborn");
    assert_eq!(render.role.detail.goals, "find her brother");
    assert_eq!(render.role.description, "wry and stubborn");

    let prompt = h.provider.requests()[0].positive().clone();
    assert!(prompt.contains("drowned bell"));
    assert!(prompt.contains("Tomas"));
    assert_eq!(render.task.target, TaskTarget::role(mira.id, None));
}

#[tokio::test]
async fn test_role_continuity_reads_scene_history() {
    let h = harness(
        MockProvider::new()
            .with_text(two_scenes())
            .with_text(storyboard_json("Dawn", &[("Ines arrives alone.", &["Ines"])]))
            .with_text(ROLE_JSON),
    );
    let board = rendered_board(&h).await;
    let child = h
        .orchestrator
        .continue_board(board.id, content("Dawn"))
        .await
        .unwrap();
    h.orchestrator
        .render_storyboard(child.id, RenderOptions::default())
        .await
        .unwrap();
    let mira = h
        .store
        .get_role_by_name(board.story_id, "Mira")
        .await
        .unwrap()
        .unwrap();

    let render = h
        .orchestrator
        .render_role_continuity(mira.id, child.id, RenderOptions::default())
        .await
        .unwrap()
        .completed()
        .unwrap();
    assert_eq!(render.task.target, TaskTarget::role(mira.id, Some(child.id)));
    assert_eq!(render.role.detail.background, "Former ferry pilot");

    let prompt = h.provider.requests()[2].positive().clone();
    let first = prompt.find("hears a bell").unwrap();
    let second = prompt.find("rows out at dawn").unwrap();
    assert!(first < second);
    assert!(!prompt.contains("Ines arrives alone"));
}

#[tokio::test]
async fn test_role_continuity_without_history_is_rejected() {
    let h = harness(MockProvider::new().with_text(ROLE_JSON));
    let (story, root) = story_with_root(&h).await;
    let role = h
        .store
        .create_role(NewRole::new(story.id, "Stranger", "never seen"))
        .await
        .unwrap();

    let err = h
        .orchestrator
        .render_role_continuity(role.id, root.id, RenderOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "validation.missing_context");
    assert_eq!(h.store.task_count().await, 0);
}

#[tokio::test]
async fn test_restore_projects_resumable_state() {
    let h = harness(MockProvider::new().with_text(two_scenes()));
    let board = rendered_board(&h).await;

    let snapshot = h.orchestrator.restore(board.id).await.unwrap();
    assert_eq!(snapshot.resume, ResumePoint::GenerateMedia);
    assert_eq!(snapshot.scenes.len(), 2);
    assert_eq!(snapshot.draft.unwrap().chapter_summary.title, "The Bell");
    assert!(snapshot.in_flight.is_none());
    // Restoring issues no new work.
    assert_eq!(h.provider.text_calls(), 1);
    assert_eq!(h.store.task_count().await, 1);

    h.orchestrator.delete_board(board.id, None).await.unwrap();
    let err = h.orchestrator.restore(board.id).await.unwrap_err();
    assert_eq!(err.code(), "not_found.board");
}
