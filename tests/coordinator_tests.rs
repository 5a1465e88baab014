use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use story_portal::{
    AdminCoordinator, InMemoryStore,
    coordinator::{ActionError, ConfirmOutcome, LOAD_FAILED_MESSAGE},
    models::{ActionKind, AdminListItem, NoticeLevel, StoryItem},
    store::{Collection, DataStore, ListQuery, Page, StoreError, StoreState},
};
use tokio::sync::Notify;
use uuid::Uuid;

// --- Mock Stores ---

/// Holds every delete until `release` is notified.
struct GatedStore {
    inner: InMemoryStore,
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl DataStore for GatedStore {
    async fn list(&self, collection: Collection, query: &ListQuery) -> Result<Page<Value>, StoreError> {
        self.inner.list(collection, query).await
    }

    async fn delete(&self, collection: Collection, id: Uuid) -> Result<(), StoreError> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.delete(collection, id).await
    }
}

/// Acknowledges deletes without removing anything, like a lagging replica.
struct LaggingStore {
    inner: InMemoryStore,
}

#[async_trait]
impl DataStore for LaggingStore {
    async fn list(&self, collection: Collection, query: &ListQuery) -> Result<Page<Value>, StoreError> {
        self.inner.list(collection, query).await
    }

    async fn delete(&self, _collection: Collection, _id: Uuid) -> Result<(), StoreError> {
        Ok(())
    }
}

/// The first delete never returns; later ones go through.
struct HangOnceStore {
    inner: InMemoryStore,
    hung: AtomicBool,
}

#[async_trait]
impl DataStore for HangOnceStore {
    async fn list(&self, collection: Collection, query: &ListQuery) -> Result<Page<Value>, StoreError> {
        self.inner.list(collection, query).await
    }

    async fn delete(&self, collection: Collection, id: Uuid) -> Result<(), StoreError> {
        if !self.hung.swap(true, Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.inner.delete(collection, id).await
    }
}

/// Holds story listings until `release` is notified once `stall` is set.
struct StallingListStore {
    inner: InMemoryStore,
    stall: AtomicBool,
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl DataStore for StallingListStore {
    async fn list(&self, collection: Collection, query: &ListQuery) -> Result<Page<Value>, StoreError> {
        if collection == Collection::Stories && self.stall.load(Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.list(collection, query).await
    }

    async fn delete(&self, collection: Collection, id: Uuid) -> Result<(), StoreError> {
        self.inner.delete(collection, id).await
    }
}

// --- Helpers ---

fn story_id(n: u128) -> Uuid {
    Uuid::from_u128(100 + n)
}

async fn seeded_store() -> InMemoryStore {
    let store = InMemoryStore::new();
    for n in 0..3u128 {
        store
            .insert(
                Collection::Profiles,
                &json!({
                    "id": Uuid::from_u128(n + 1).to_string(),
                    "username": format!("writer{}", n),
                    "role": "user",
                    "created_at": format!("2025-01-0{}T00:00:00Z", n + 1),
                }),
            )
            .await;
    }
    // Newest first: Story 3, Story 2, Story 1, Story 0
    for n in 0..4u128 {
        store
            .insert(
                Collection::Stories,
                &json!({
                    "id": story_id(n).to_string(),
                    "title": format!("Story {}", n),
                    "content": "Once upon a time",
                    "author_name": "writer0",
                    "created_at": format!("2025-02-0{}T00:00:00Z", n + 1),
                }),
            )
            .await;
    }
    store
}

async fn coordinator() -> (Arc<InMemoryStore>, AdminCoordinator) {
    let store = Arc::new(seeded_store().await);
    let console = AdminCoordinator::new(store.clone() as StoreState);
    console.load_overview().await;
    (store, console)
}

fn titles(items: &[StoryItem]) -> Vec<&str> {
    items.iter().map(|s| s.title.as_str()).collect()
}

// --- Overview ---

#[tokio::test]
async fn test_overview_loads_counts_and_newest_items() {
    let (_, console) = coordinator().await;
    let snapshot = console.snapshot().await;

    assert_eq!(snapshot.counts.total_users, Some(3));
    assert_eq!(snapshot.counts.total_stories, Some(4));
    assert_eq!(snapshot.recent_users[0].username, "writer2");
    assert_eq!(
        titles(&snapshot.recent_stories),
        vec!["Story 3", "Story 2", "Story 1", "Story 0"]
    );
    assert!(snapshot.notices.is_empty());
}

#[tokio::test]
async fn test_partial_failure_keeps_successful_slice_with_one_notice() {
    let store = Arc::new(seeded_store().await);
    store.set_list_failing(Collection::Profiles, true).await;
    let console = AdminCoordinator::new(store.clone() as StoreState);

    let snapshot = console.load_overview().await;

    assert_eq!(snapshot.counts.total_users, None);
    assert!(snapshot.recent_users.is_empty());
    assert_eq!(snapshot.counts.total_stories, Some(4));
    assert_eq!(snapshot.recent_stories.len(), 4);
    assert_eq!(snapshot.notices.len(), 1);
    assert_eq!(snapshot.notices[0].level, NoticeLevel::Error);
    assert_eq!(snapshot.notices[0].message, LOAD_FAILED_MESSAGE);
}

#[tokio::test]
async fn test_total_failure_still_reports_once() {
    let store = Arc::new(seeded_store().await);
    store.set_list_failing(Collection::Profiles, true).await;
    store.set_list_failing(Collection::Stories, true).await;
    let console = AdminCoordinator::new(store.clone() as StoreState);

    let snapshot = console.load_overview().await;
    assert_eq!(snapshot.notices.len(), 1);
    assert!(snapshot.recent_stories.is_empty());
}

#[tokio::test]
async fn test_failed_refresh_keeps_previous_slice() {
    let (store, console) = coordinator().await;
    store.set_list_failing(Collection::Stories, true).await;

    let snapshot = console.load_overview().await;
    assert_eq!(snapshot.recent_stories.len(), 4);
    assert_eq!(snapshot.counts.total_stories, Some(4));
    assert_eq!(snapshot.notices.len(), 1);
}

// --- Request / cancel ---

#[tokio::test]
async fn test_new_request_replaces_unconfirmed_one() {
    let (_, console) = coordinator().await;

    let first = console
        .request_action_by_id(ActionKind::Delete, story_id(1))
        .await
        .unwrap();
    let second = console
        .request_action_by_id(ActionKind::Feature, story_id(2))
        .await
        .unwrap();

    assert!(second.ticket > first.ticket);
    let pending = console.snapshot().await.pending.unwrap();
    assert_eq!(pending.kind, ActionKind::Feature);
    assert_eq!(pending.target.id(), story_id(2));
}

#[tokio::test]
async fn test_mismatched_and_unknown_targets_are_refused() {
    let (_, console) = coordinator().await;

    let unknown = console.request_action_by_id(ActionKind::Ban, story_id(1)).await;
    assert_eq!(unknown.unwrap_err(), ActionError::TargetNotFound(story_id(1)));

    let story = console.snapshot().await.recent_stories[0].clone();
    let mismatch = console
        .request_action(ActionKind::Ban, AdminListItem::Story(story))
        .await;
    assert_eq!(mismatch.unwrap_err(), ActionError::TargetMismatch("ban"));
    assert!(console.snapshot().await.pending.is_none());
}

#[tokio::test]
async fn test_cancel_clears_pending_without_mutation() {
    let (store, console) = coordinator().await;
    console
        .request_action_by_id(ActionKind::Delete, story_id(0))
        .await
        .unwrap();

    assert!(console.cancel().await);
    assert!(!console.cancel().await);
    assert!(console.snapshot().await.pending.is_none());
    assert_eq!(store.len(Collection::Stories).await, 4);
    assert_eq!(console.confirm().await.unwrap_err(), ActionError::NoPendingAction);
}

// --- Confirm ---

#[tokio::test]
async fn test_delete_removes_by_id_and_keeps_order() {
    let (store, console) = coordinator().await;
    console
        .request_action_by_id(ActionKind::Delete, story_id(2))
        .await
        .unwrap();

    let outcome = console.confirm().await.unwrap();
    assert!(matches!(outcome, ConfirmOutcome::Applied(_)));
    assert_eq!(outcome.notice().message, "Story deleted successfully");

    let snapshot = console.snapshot().await;
    assert_eq!(titles(&snapshot.recent_stories), vec!["Story 3", "Story 1", "Story 0"]);
    assert_eq!(snapshot.counts.total_stories, Some(3));
    assert!(snapshot.pending.is_none());
    assert!(!snapshot.in_flight);
    assert_eq!(store.len(Collection::Stories).await, 3);
}

#[tokio::test]
async fn test_deleting_an_absent_story_still_succeeds() {
    let (_, console) = coordinator().await;
    let mut ghost = console.snapshot().await.recent_stories[0].clone();
    ghost.id = Uuid::from_u128(999);
    console
        .request_action(ActionKind::Delete, AdminListItem::Story(ghost))
        .await
        .unwrap();

    let outcome = console.confirm().await.unwrap();
    assert!(matches!(outcome, ConfirmOutcome::Applied(_)));
    assert_eq!(console.snapshot().await.recent_stories.len(), 4);
}

#[tokio::test]
async fn test_failed_delete_leaves_list_and_reports_once() {
    let (store, console) = coordinator().await;
    store.set_delete_failing(true);
    console
        .request_action_by_id(ActionKind::Delete, story_id(0))
        .await
        .unwrap();

    let outcome = console.confirm().await.unwrap();
    assert!(matches!(outcome, ConfirmOutcome::Failed(_)));

    let snapshot = console.snapshot().await;
    assert_eq!(snapshot.recent_stories.len(), 4);
    assert_eq!(snapshot.notices.len(), 1);
    assert_eq!(snapshot.notices[0].message, "Failed to delete story");
    assert!(!snapshot.in_flight);
}

#[tokio::test]
async fn test_ban_and_feature_are_acknowledged_locally() {
    let (store, console) = coordinator().await;

    console
        .request_action_by_id(ActionKind::Ban, Uuid::from_u128(1))
        .await
        .unwrap();
    let banned = console.confirm().await.unwrap();
    assert_eq!(banned.notice().message, "User banned successfully");

    console
        .request_action_by_id(ActionKind::Feature, story_id(3))
        .await
        .unwrap();
    let featured = console.confirm().await.unwrap();
    assert_eq!(featured.notice().message, "Story featured successfully");

    assert_eq!(store.len(Collection::Profiles).await, 3);
    assert_eq!(console.snapshot().await.recent_stories.len(), 4);
}

#[tokio::test]
async fn test_second_confirm_is_refused_while_in_flight() {
    let store = Arc::new(GatedStore {
        inner: seeded_store().await,
        entered: Notify::new(),
        release: Notify::new(),
    });
    let console = Arc::new(AdminCoordinator::new(store.clone() as StoreState));
    console.load_overview().await;
    console
        .request_action_by_id(ActionKind::Delete, story_id(1))
        .await
        .unwrap();

    let first = tokio::spawn({
        let console = console.clone();
        async move { console.confirm().await }
    });
    store.entered.notified().await;

    assert!(console.snapshot().await.in_flight);
    assert_eq!(console.confirm().await.unwrap_err(), ActionError::MutationInFlight);

    store.release.notify_one();
    let outcome = first.await.unwrap().unwrap();
    assert!(matches!(outcome, ConfirmOutcome::Applied(_)));

    let snapshot = console.snapshot().await;
    assert_eq!(snapshot.notices.len(), 1);
    assert_eq!(snapshot.recent_stories.len(), 3);
}

#[tokio::test]
async fn test_request_during_flight_survives_completion() {
    let store = Arc::new(GatedStore {
        inner: seeded_store().await,
        entered: Notify::new(),
        release: Notify::new(),
    });
    let console = Arc::new(AdminCoordinator::new(store.clone() as StoreState));
    console.load_overview().await;
    console
        .request_action_by_id(ActionKind::Delete, story_id(1))
        .await
        .unwrap();

    let first = tokio::spawn({
        let console = console.clone();
        async move { console.confirm().await }
    });
    store.entered.notified().await;

    console
        .request_action_by_id(ActionKind::Feature, story_id(3))
        .await
        .unwrap();
    store.release.notify_one();
    first.await.unwrap().unwrap();

    let pending = console.snapshot().await.pending.unwrap();
    assert_eq!(pending.kind, ActionKind::Feature);
}

#[tokio::test]
async fn test_unmounted_console_discards_mutation_result() {
    let store = Arc::new(GatedStore {
        inner: seeded_store().await,
        entered: Notify::new(),
        release: Notify::new(),
    });
    let console = Arc::new(AdminCoordinator::new(store.clone() as StoreState));
    console.load_overview().await;
    console
        .request_action_by_id(ActionKind::Delete, story_id(0))
        .await
        .unwrap();

    let first = tokio::spawn({
        let console = console.clone();
        async move { console.confirm().await }
    });
    store.entered.notified().await;

    console.unmount();
    store.release.notify_one();

    assert_eq!(first.await.unwrap().unwrap_err(), ActionError::Unmounted);
    let snapshot = console.snapshot().await;
    assert!(snapshot.notices.is_empty());
    assert_eq!(snapshot.recent_stories.len(), 4);
    // The store call itself still completed.
    assert_eq!(store.inner.len(Collection::Stories).await, 3);
}

#[tokio::test]
async fn test_refresh_does_not_resurrect_deleted_story() {
    let store = Arc::new(LaggingStore {
        inner: seeded_store().await,
    });
    let console = AdminCoordinator::new(store.clone() as StoreState);
    console.load_overview().await;
    console
        .request_action_by_id(ActionKind::Delete, story_id(3))
        .await
        .unwrap();
    console.confirm().await.unwrap();

    let snapshot = console.load_overview().await;
    assert!(snapshot.recent_stories.iter().all(|s| s.id != story_id(3)));
    assert_eq!(snapshot.recent_stories.len(), 3);
    // The store still counts the row; the console does not.
    assert_eq!(snapshot.counts.total_stories, Some(3));
}

#[tokio::test]
async fn test_abandoned_confirm_releases_in_flight() {
    let store = Arc::new(HangOnceStore {
        inner: seeded_store().await,
        hung: AtomicBool::new(false),
    });
    let console = AdminCoordinator::new(store.clone() as StoreState);
    console.load_overview().await;
    console
        .request_action_by_id(ActionKind::Delete, story_id(1))
        .await
        .unwrap();

    // The caller gives up while the store never answers.
    let abandoned = tokio::time::timeout(Duration::from_millis(50), console.confirm()).await;
    assert!(abandoned.is_err());
    assert!(!console.snapshot().await.in_flight);

    let outcome = console.confirm().await.unwrap();
    assert!(matches!(outcome, ConfirmOutcome::Applied(_)));
    assert_eq!(console.snapshot().await.recent_stories.len(), 3);
}

#[tokio::test]
async fn test_unmounted_console_ignores_late_load() {
    let store = Arc::new(StallingListStore {
        inner: seeded_store().await,
        stall: AtomicBool::new(false),
        entered: Notify::new(),
        release: Notify::new(),
    });
    let console = Arc::new(AdminCoordinator::new(store.clone() as StoreState));
    console.load_overview().await;

    store.stall.store(true, Ordering::SeqCst);
    // Would surface as a load notice if the results were applied.
    store.inner.set_list_failing(Collection::Profiles, true).await;
    let refresh = tokio::spawn({
        let console = console.clone();
        async move { console.load_overview().await }
    });
    store.entered.notified().await;

    console.unmount();
    store
        .inner
        .insert(
            Collection::Stories,
            &json!({
                "id": story_id(9).to_string(),
                "title": "Story 9",
                "content": "Late arrival",
                "created_at": "2025-03-01T00:00:00Z",
            }),
        )
        .await;
    store.release.notify_one();
    refresh.await.unwrap();

    let snapshot = console.snapshot().await;
    assert_eq!(
        titles(&snapshot.recent_stories),
        vec!["Story 3", "Story 2", "Story 1", "Story 0"]
    );
    assert_eq!(snapshot.recent_users.len(), 3);
    assert!(snapshot.notices.is_empty());
}

#[tokio::test]
async fn test_notices_can_be_dismissed() {
    let (_, console) = coordinator().await;
    console
        .request_action_by_id(ActionKind::Feature, story_id(0))
        .await
        .unwrap();
    let id = console.confirm().await.unwrap().notice().id;

    assert!(console.dismiss_notice(id).await);
    assert!(!console.dismiss_notice(id).await);
    assert!(console.snapshot().await.notices.is_empty());
}

