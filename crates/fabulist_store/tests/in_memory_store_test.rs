//! Tests for the in-memory content store.

use fabulist_core::{
    ActivityKind, BoardCounter, BoardId, GenType, NewActivity, NewGenerationTask, NewRole,
    NewScene, NewStory, NewStoryboard, RoleCounter, SceneStatus, StoryId, TaskStatus, TaskTarget,
    TaskType,
};
use fabulist_interface::{
    ActivityStore, BoardOrder, BoardUpdate, Page, RoleStore, SceneStore, StoryStore,
    StoryboardStore, TaskFilter, TaskStore, TaskUpdate,
};
use fabulist_store::InMemoryContentStore;

fn board(story_id: StoryId, prev_id: Option<BoardId>, title: &str) -> NewStoryboard {
    NewStoryboard {
        story_id,
        prev_id,
        title: title.to_string(),
        description: String::new(),
        params: Default::default(),
        is_ai_gen: false,
        creator_id: None,
    }
}

fn scene(story_id: StoryId, board_id: BoardId, sequence: u32) -> NewScene {
    NewScene {
        board_id,
        story_id,
        sequence,
        content: format!("Scene {}", sequence),
        character_ids: vec![],
        image_prompt: String::new(),
        audio_prompt: String::new(),
        video_prompt: String::new(),
    }
}

fn task(target: TaskTarget, status: TaskStatus) -> NewGenerationTask {
    NewGenerationTask {
        target,
        task_type: TaskType::Storyboard,
        gen_type: GenType::Text,
        status,
        positive_prompt: "continue".to_string(),
        negative_prompt: None,
        regen: false,
    }
}

#[tokio::test]
async fn test_update_missing_board_is_not_found() {
    let store = InMemoryContentStore::new();
    let err = store
        .update_board(BoardId(42), BoardUpdate::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "not_found.board");
}

#[tokio::test]
async fn test_listings_hide_deleted_boards() {
    let store = InMemoryContentStore::new();
    let story = store.create_story(NewStory::new("S", "premise")).await.unwrap();
    let root = store.create_board(board(story.id, None, "root")).await.unwrap();
    let a = store
        .create_board(board(story.id, Some(root.id), "a"))
        .await
        .unwrap();
    let b = store
        .create_board(board(story.id, Some(root.id), "b"))
        .await
        .unwrap();

    store
        .update_board(
            a.id,
            BoardUpdate {
                lifecycle: Some(fabulist_core::Lifecycle::Deleted),
                ..BoardUpdate::default()
            },
        )
        .await
        .unwrap();

    let children = store.list_boards_by_prev(story.id, Some(root.id)).await.unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].id, b.id);

    // Lookups by id still see it.
    assert!(store.get_board(a.id).await.unwrap().unwrap().is_deleted());
    assert_eq!(store.list_boards_by_story(story.id).await.unwrap().len(), 2);
    assert_eq!(store.all_boards(story.id).await.len(), 3);
}

#[tokio::test]
async fn test_reparent_boards_includes_deleted() {
    let store = InMemoryContentStore::new();
    let story = store.create_story(NewStory::new("S", "premise")).await.unwrap();
    let other = store.create_story(NewStory::new("T", "premise")).await.unwrap();
    let root = store.create_board(board(story.id, None, "root")).await.unwrap();
    let mid = store
        .create_board(board(story.id, Some(root.id), "mid"))
        .await
        .unwrap();
    let gone = store
        .create_board(board(story.id, Some(mid.id), "gone"))
        .await
        .unwrap();
    let kept = store
        .create_board(board(story.id, Some(mid.id), "kept"))
        .await
        .unwrap();
    let foreign = store
        .create_board(board(other.id, Some(mid.id), "foreign"))
        .await
        .unwrap();
    store
        .update_board(
            gone.id,
            BoardUpdate {
                lifecycle: Some(fabulist_core::Lifecycle::Deleted),
                ..BoardUpdate::default()
            },
        )
        .await
        .unwrap();

    let moved = store
        .reparent_boards(story.id, mid.id, Some(root.id))
        .await
        .unwrap();
    assert_eq!(moved, vec![gone.id, kept.id]);

    for id in [gone.id, kept.id] {
        let board = store.get_board(id).await.unwrap().unwrap();
        assert_eq!(board.prev_id, Some(root.id));
    }
    let foreign = store.get_board(foreign.id).await.unwrap().unwrap();
    assert_eq!(foreign.prev_id, Some(mid.id));
}

#[tokio::test]
async fn test_paged_listing() {
    let store = InMemoryContentStore::new();
    let story = store.create_story(NewStory::new("S", "premise")).await.unwrap();
    let root = store.create_board(board(story.id, None, "root")).await.unwrap();
    let mut children = Vec::new();
    for i in 0..5 {
        let child = store
            .create_board(board(story.id, Some(root.id), &format!("child {}", i)))
            .await
            .unwrap();
        children.push(child.id);
    }
    store
        .increment_board_counter(children[0], BoardCounter::Forks, 3)
        .await
        .unwrap();

    let first = store
        .list_boards_by_story_and_prev(
            story.id,
            Some(root.id),
            Page::new(1, 2),
            BoardOrder::ForkCountDesc,
        )
        .await
        .unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].id, children[0]);
    assert_eq!(first[1].id, children[4]);

    let last = store
        .list_boards_by_story_and_prev(
            story.id,
            Some(root.id),
            Page::new(3, 2),
            BoardOrder::ForkCountDesc,
        )
        .await
        .unwrap();
    assert_eq!(last.len(), 1);
    assert_eq!(last[0].id, children[1]);
}

#[tokio::test]
async fn test_concurrent_counter_increments() {
    let store = InMemoryContentStore::new();
    let story = store.create_story(NewStory::new("S", "premise")).await.unwrap();
    let root_id = store
        .create_board(board(story.id, None, "root"))
        .await
        .unwrap()
        .id;

    let mut handles = Vec::new();
    for _ in 0..20 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .increment_board_counter(root_id, BoardCounter::Forks, 1)
                .await
                .unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let root = store.get_board(root_id).await.unwrap().unwrap();
    assert_eq!(root.fork_num, 20);
}

#[tokio::test]
async fn test_counter_failure_toggle() {
    let store = InMemoryContentStore::new();
    let story = store.create_story(NewStory::new("S", "premise")).await.unwrap();
    let role = store
        .create_role(NewRole::new(story.id, "Mira", "a cartographer"))
        .await
        .unwrap();

    store.set_counter_failure(true);
    let err = store
        .increment_role_counter(role.id, RoleCounter::Storyboards, 1)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "store");

    store.set_counter_failure(false);
    let value = store
        .increment_role_counter(role.id, RoleCounter::Storyboards, 1)
        .await
        .unwrap();
    assert_eq!(value, 1);
}

#[tokio::test]
async fn test_duplicate_role_name_conflicts() {
    let store = InMemoryContentStore::new();
    let story = store.create_story(NewStory::new("S", "premise")).await.unwrap();
    let other = store.create_story(NewStory::new("T", "premise")).await.unwrap();

    store
        .create_role(NewRole::new(story.id, "Mira", "a cartographer"))
        .await
        .unwrap();
    let err = store
        .create_role(NewRole::new(story.id, "Mira", "someone else"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "conflict.duplicate_role_name");

    // Names are scoped per story.
    store
        .create_role(NewRole::new(other.id, "Mira", "a namesake"))
        .await
        .unwrap();
    assert!(store.get_role_by_name(story.id, "Mira").await.unwrap().is_some());
    assert!(store.get_role_by_name(story.id, "Tomas").await.unwrap().is_none());
}

#[tokio::test]
async fn test_board_role_links_are_idempotent() {
    let store = InMemoryContentStore::new();
    let story = store.create_story(NewStory::new("S", "premise")).await.unwrap();
    let root = store.create_board(board(story.id, None, "root")).await.unwrap();
    let role = store
        .create_role(NewRole::new(story.id, "Mira", ""))
        .await
        .unwrap();

    assert!(store.link_board_role(root.id, role.id).await.unwrap());
    assert!(!store.link_board_role(root.id, role.id).await.unwrap());
    assert_eq!(store.list_board_roles(root.id).await.unwrap(), vec![role.id]);
}

#[tokio::test]
async fn test_scene_listing_and_batch_status() {
    let store = InMemoryContentStore::new();
    let story = store.create_story(NewStory::new("S", "premise")).await.unwrap();
    let root = store.create_board(board(story.id, None, "root")).await.unwrap();
    let second = store.create_scene(scene(story.id, root.id, 2)).await.unwrap();
    let first = store.create_scene(scene(story.id, root.id, 1)).await.unwrap();

    let listed = store.list_scenes_by_board(root.id).await.unwrap();
    assert_eq!(listed[0].id, first.id);
    assert_eq!(listed[1].id, second.id);

    store
        .update_scene_status(first.id, SceneStatus::Deleted)
        .await
        .unwrap();
    let changed = store
        .batch_update_scene_status(root.id, SceneStatus::Generating)
        .await
        .unwrap();
    assert_eq!(changed, 1);

    let listed = store.list_scenes_by_board(root.id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].status, SceneStatus::Generating);
    assert_eq!(store.all_scenes(root.id).await.len(), 2);
}

#[tokio::test]
async fn test_task_filter_by_target_and_status() {
    let store = InMemoryContentStore::new();
    let target = TaskTarget::board(StoryId(1), BoardId(1));
    let other = TaskTarget::board(StoryId(1), BoardId(2));

    let running = store
        .create_task(task(target, TaskStatus::Running))
        .await
        .unwrap();
    store
        .create_task(task(target, TaskStatus::Finished))
        .await
        .unwrap();
    store
        .create_task(task(other, TaskStatus::Pending))
        .await
        .unwrap();

    let in_flight = store
        .list_tasks_by_origin_and_status(&TaskFilter::in_flight(target, TaskType::Storyboard))
        .await
        .unwrap();
    assert_eq!(in_flight.len(), 1);
    assert_eq!(in_flight[0].id, running.id);

    let all_for_target = store
        .list_tasks_by_origin_and_status(&TaskFilter {
            target: Some(target),
            ..TaskFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(all_for_target.len(), 2);
    // Newest first.
    assert!(all_for_target[0].id > all_for_target[1].id);

    let updated = store
        .update_task(
            running.id,
            TaskUpdate {
                status: Some(TaskStatus::Error),
                error_message: Some("abandoned".to_string()),
                finished: true,
                ..TaskUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.status, TaskStatus::Error);
    assert!(updated.finish_time.is_some());
}

#[tokio::test]
async fn test_activity_failure_toggle() {
    let store = InMemoryContentStore::new();
    let story = store.create_story(NewStory::new("S", "premise")).await.unwrap();

    store.set_activity_failure(true);
    assert!(
        store
            .record_activity(NewActivity::new(ActivityKind::BoardForked, story.id))
            .await
            .is_err()
    );

    store.set_activity_failure(false);
    store
        .record_activity(NewActivity::new(ActivityKind::BoardForked, story.id).with_detail("x"))
        .await
        .unwrap();
    let activities = store.list_activities(story.id).await.unwrap();
    assert_eq!(activities.len(), 1);
    assert_eq!(activities[0].detail, "x");
}
