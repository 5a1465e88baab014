use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::models::{
    ActionKind, AdminListItem, ConsoleSnapshot, Notice, NoticeLevel, OverviewCounts,
    PendingAction, Profile, Story, StoryItem, UserItem,
};
use crate::store::{Collection, ListQuery, StoreError, StoreState, list_as};

/// Upper bound of each recent-items slice in the working set.
pub const RECENT_LIMIT: usize = 10;

/// Oldest notices are dropped past this many.
const MAX_NOTICES: usize = 20;

pub const LOAD_FAILED_MESSAGE: &str = "Failed to load admin data";

/// ActionError
///
/// Reasons a moderation request is refused before any mutation is attempted.
/// Mutation failures themselves are not errors here: they become notices
/// (see `ConfirmOutcome::Failed`).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("no action is awaiting confirmation")]
    NoPendingAction,

    #[error("a confirmed action is still in flight")]
    MutationInFlight,

    #[error("item {0} is not in the working set")]
    TargetNotFound(Uuid),

    #[error("cannot {0} this item")]
    TargetMismatch(&'static str),

    #[error("admin console was closed")]
    Unmounted,
}

/// ConfirmOutcome
///
/// Result of a confirm attempt that reached the mutation step. Either way the
/// notice has already been queued on the console.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmOutcome {
    Applied(Notice),
    Failed(Notice),
}

impl ConfirmOutcome {
    pub fn notice(&self) -> &Notice {
        match self {
            ConfirmOutcome::Applied(notice) | ConfirmOutcome::Failed(notice) => notice,
        }
    }
}

#[derive(Default)]
struct Console {
    counts: OverviewCounts,
    users: Vec<Profile>,
    stories: Vec<Story>,
    // Stories deleted through this console; a refresh that raced the delete must not bring them back.
    deleted: HashSet<Uuid>,
    pending: Option<PendingAction>,
    notices: VecDeque<Notice>,
    next_notice: u64,
    next_ticket: u64,
}

impl Console {
    fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) -> Notice {
        self.next_notice += 1;
        let notice = Notice {
            id: self.next_notice,
            level,
            message: message.into(),
        };
        self.notices.push_back(notice.clone());
        while self.notices.len() > MAX_NOTICES {
            self.notices.pop_front();
        }
        notice
    }

    fn find(&self, kind: ActionKind, id: Uuid) -> Option<AdminListItem> {
        match kind {
            ActionKind::Ban => self
                .users
                .iter()
                .find(|user| user.id == id)
                .map(|user| AdminListItem::User(UserItem::from(user))),
            ActionKind::Delete | ActionKind::Feature => self
                .stories
                .iter()
                .find(|story| story.id == id)
                .map(|story| AdminListItem::Story(StoryItem::from(story))),
        }
    }

    /// Removes the story with `id`, keeping every other entry in place.
    fn remove_story(&mut self, id: Uuid) -> bool {
        let before = self.stories.len();
        self.stories.retain(|story| story.id != id);
        self.deleted.insert(id);
        let removed = self.stories.len() != before;
        if removed {
            self.counts.total_stories = self.counts.total_stories.map(|n| n.saturating_sub(1));
        }
        removed
    }

    fn snapshot(&self, in_flight: bool) -> ConsoleSnapshot {
        ConsoleSnapshot {
            counts: self.counts.clone(),
            recent_users: self.users.iter().map(UserItem::from).collect(),
            recent_stories: self.stories.iter().map(StoryItem::from).collect(),
            pending: self.pending.clone(),
            in_flight,
            notices: self.notices.iter().cloned().collect(),
        }
    }
}

/// Clears the in-flight ticket when dropped, so a confirm whose future is
/// abandoned mid-call (client gone, handler timed out) never wedges the console.
struct InFlight<'a> {
    slot: &'a AtomicU64,
    ticket: u64,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let _ = self
            .slot
            .compare_exchange(self.ticket, 0, Ordering::SeqCst, Ordering::SeqCst);
    }
}

/// AdminCoordinator
///
/// Owns one admin view's working set and drives its
/// fetch → request → confirm → mutate cycle. No other component writes the
/// working set.
///
/// The console lock is never held across a store call. Every continuation
/// that follows a store call checks `is_mounted` before writing, so a view
/// closed mid-request is left untouched.
pub struct AdminCoordinator {
    store: StoreState,
    console: Mutex<Console>,
    // Ticket of the confirm awaiting the store; 0 when idle. Tickets start at 1.
    in_flight: AtomicU64,
    mounted: AtomicBool,
}

impl AdminCoordinator {
    pub fn new(store: StoreState) -> Self {
        Self {
            store,
            console: Mutex::new(Console::default()),
            in_flight: AtomicU64::new(0),
            mounted: AtomicBool::new(true),
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    /// Detaches the view. Requests already in flight complete against the
    /// store but their results are discarded.
    pub fn unmount(&self) {
        self.mounted.store(false, Ordering::SeqCst);
    }

    pub async fn snapshot(&self) -> ConsoleSnapshot {
        self.console.lock().await.snapshot(self.is_busy())
    }

    fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) != 0
    }

    /// load_overview
    ///
    /// Fetches the newest users and stories with their exact totals. Both
    /// queries run concurrently and settle individually: a failed query keeps
    /// the previously loaded slice, the successful one is applied, and one
    /// error notice covers the whole load.
    pub async fn load_overview(&self) -> ConsoleSnapshot {
        let query = ListQuery::recent(RECENT_LIMIT);
        let (users, stories) = tokio::join!(
            list_as::<Profile>(self.store.as_ref(), Collection::Profiles, &query),
            list_as::<Story>(self.store.as_ref(), Collection::Stories, &query),
        );

        let mut console = self.console.lock().await;
        if !self.is_mounted() {
            tracing::debug!("admin console closed during load, discarding results");
            return console.snapshot(self.is_busy());
        }

        let mut failed = false;
        match users {
            Ok(page) => {
                console.counts.total_users = Some(page.total.unwrap_or(page.rows.len() as u64));
                console.users = page.rows;
                console.users.truncate(RECENT_LIMIT);
            }
            Err(e) => {
                tracing::warn!(error = %e, "loading recent users failed");
                failed = true;
            }
        }
        match stories {
            Ok(page) => {
                let deleted = std::mem::take(&mut console.deleted);
                let total = page.total.unwrap_or(page.rows.len() as u64);
                let (stale, live): (Vec<Story>, Vec<Story>) = page
                    .rows
                    .into_iter()
                    .partition(|story| deleted.contains(&story.id));
                // A lagging store may still count rows this console deleted.
                console.counts.total_stories = Some(total.saturating_sub(stale.len() as u64));
                console.stories = live.into_iter().take(RECENT_LIMIT).collect();
                console.deleted = deleted;
            }
            Err(e) => {
                tracing::warn!(error = %e, "loading recent stories failed");
                failed = true;
            }
        }
        if failed {
            console.notify(NoticeLevel::Error, LOAD_FAILED_MESSAGE);
        }

        console.snapshot(self.is_busy())
    }

    /// request_action
    ///
    /// Records `kind` against `target` as the pending confirmation. Nothing is
    /// mutated. A pending request that was never confirmed is replaced.
    pub async fn request_action(
        &self,
        kind: ActionKind,
        target: AdminListItem,
    ) -> Result<PendingAction, ActionError> {
        if !kind.accepts(&target) {
            return Err(ActionError::TargetMismatch(kind.verb()));
        }

        let mut console = self.console.lock().await;
        console.next_ticket += 1;
        let action = PendingAction::new(console.next_ticket, kind, target);
        if let Some(previous) = console.pending.replace(action.clone()) {
            tracing::debug!(
                discarded = previous.kind.verb(),
                target = %previous.target.id(),
                "pending action replaced"
            );
        }
        Ok(action)
    }

    /// Like `request_action`, resolving the target from the working set.
    pub async fn request_action_by_id(
        &self,
        kind: ActionKind,
        id: Uuid,
    ) -> Result<PendingAction, ActionError> {
        let target = self
            .console
            .lock()
            .await
            .find(kind, id)
            .ok_or(ActionError::TargetNotFound(id))?;
        self.request_action(kind, target).await
    }

    /// confirm
    ///
    /// Applies the pending action. Refused while a previous confirm is still
    /// awaiting the store, so one click never submits twice. The in-flight
    /// marker is released even if this future is dropped before settling.
    ///
    /// `delete` removes the story from the hosted store and then from the
    /// working set by id. `ban` and `feature` are acknowledged locally only:
    /// records carry no status field to persist them in.
    pub async fn confirm(&self) -> Result<ConfirmOutcome, ActionError> {
        let (action, _in_flight) = {
            let console = self.console.lock().await;
            if self.is_busy() {
                return Err(ActionError::MutationInFlight);
            }
            let action = console.pending.clone().ok_or(ActionError::NoPendingAction)?;
            self.in_flight.store(action.ticket, Ordering::SeqCst);
            let guard = InFlight {
                slot: &self.in_flight,
                ticket: action.ticket,
            };
            (action, guard)
        };

        let target = action.target.id();
        let result = match action.kind {
            ActionKind::Delete => self.store.delete(Collection::Stories, target).await,
            ActionKind::Ban | ActionKind::Feature => {
                tracing::info!(
                    action = action.kind.verb(),
                    %target,
                    "acknowledged without persistence"
                );
                Ok(())
            }
        };

        let mut console = self.console.lock().await;
        self.in_flight.store(0, Ordering::SeqCst);
        if !self.is_mounted() {
            tracing::debug!(%target, "admin console closed during mutation, result not applied");
            return Err(ActionError::Unmounted);
        }
        if console.pending.as_ref().map(|p| p.ticket) == Some(action.ticket) {
            console.pending = None;
        }

        Ok(self.settle(&mut console, &action, result))
    }

    fn settle(
        &self,
        console: &mut Console,
        action: &PendingAction,
        result: Result<(), StoreError>,
    ) -> ConfirmOutcome {
        let target = action.target.id();
        let noun = match action.target {
            AdminListItem::User(_) => "User",
            AdminListItem::Story(_) => "Story",
        };
        let past = match action.kind {
            ActionKind::Ban => "banned",
            ActionKind::Delete => "deleted",
            ActionKind::Feature => "featured",
        };

        match result {
            Ok(()) => {
                if action.kind == ActionKind::Delete {
                    let removed = console.remove_story(target);
                    tracing::info!(%target, removed, "story deleted");
                }
                ConfirmOutcome::Applied(console.notify(
                    NoticeLevel::Success,
                    format!("{} {} successfully", noun, past),
                ))
            }
            Err(e) => {
                tracing::warn!(action = action.kind.verb(), %target, error = %e, "moderation action failed");
                ConfirmOutcome::Failed(console.notify(
                    NoticeLevel::Error,
                    format!("Failed to {} {}", action.kind.verb(), noun.to_lowercase()),
                ))
            }
        }
    }

    /// Drops the pending action, if any. No query is issued.
    pub async fn cancel(&self) -> bool {
        self.console.lock().await.pending.take().is_some()
    }

    pub async fn dismiss_notice(&self, id: u64) -> bool {
        let mut console = self.console.lock().await;
        let before = console.notices.len();
        console.notices.retain(|notice| notice.id != id);
        console.notices.len() != before
    }
}

/// ConsoleRegistry
///
/// One mounted admin console per admin identity.
#[derive(Clone, Default)]
pub struct ConsoleRegistry {
    consoles: Arc<RwLock<HashMap<Uuid, Arc<AdminCoordinator>>>>,
}

impl ConsoleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the admin's console, mounting a fresh one if none is open.
    pub async fn open(&self, admin: Uuid, store: &StoreState) -> Arc<AdminCoordinator> {
        let mut consoles = self.consoles.write().await;
        consoles
            .entry(admin)
            .or_insert_with(|| {
                tracing::debug!(%admin, "admin console mounted");
                Arc::new(AdminCoordinator::new(store.clone()))
            })
            .clone()
    }

    pub async fn get(&self, admin: Uuid) -> Option<Arc<AdminCoordinator>> {
        self.consoles.read().await.get(&admin).cloned()
    }

    /// Unmounts and forgets the admin's console.
    pub async fn close(&self, admin: Uuid) -> bool {
        match self.consoles.write().await.remove(&admin) {
            Some(console) => {
                console.unmount();
                tracing::debug!(%admin, "admin console unmounted");
                true
            }
            None => false,
        }
    }
}
