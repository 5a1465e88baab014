use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Records (mirrored from the hosted store) ---

/// Role
///
/// The RBAC attribute of a profile. Only the exact value `admin` is privileged;
/// any other string stored in the `role` column reads as `user`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Admin,
    // Catch-all: must stay the last variant.
    #[default]
    #[serde(other)]
    User,
}

/// Profile
///
/// A user record from the `profiles` table. The id is shared with the identity
/// provider's user id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Profile {
    pub id: Uuid,
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl Profile {
    /// The name shown in lists: the full name when present, the username otherwise.
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.username)
    }
}

/// Story
///
/// A story record from the `stories` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Story {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub author_name: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

const EXCERPT_CHARS: usize = 100;

impl Story {
    /// First 100 characters of the content, with an ellipsis when cut.
    pub fn excerpt(&self) -> String {
        let mut chars = self.content.chars();
        let head: String = chars.by_ref().take(EXCERPT_CHARS).collect();
        if chars.next().is_some() {
            format!("{}...", head.trim_end())
        } else {
            head
        }
    }
}

// --- Moderation working set ---

/// UserItem
///
/// Moderation projection of a `Profile`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserItem {
    pub id: Uuid,
    pub display_name: String,
    pub username: String,
    pub role: Role,
    pub avatar_url: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl From<&Profile> for UserItem {
    fn from(profile: &Profile) -> Self {
        Self {
            id: profile.id,
            display_name: profile.display_name().to_string(),
            username: profile.username.clone(),
            role: profile.role,
            avatar_url: profile.avatar_url.clone(),
            created_at: profile.created_at,
        }
    }
}

/// StoryItem
///
/// Moderation projection of a `Story`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct StoryItem {
    pub id: Uuid,
    pub title: String,
    pub display_name: String,
    pub excerpt: String,
    // Where the front-end opens the story for review.
    pub href: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl From<&Story> for StoryItem {
    fn from(story: &Story) -> Self {
        Self {
            id: story.id,
            title: story.title.clone(),
            display_name: story
                .author_name
                .clone()
                .unwrap_or_else(|| "Unknown author".to_string()),
            excerpt: story.excerpt(),
            href: crate::guard::Destination::Story { id: story.id }.to_path(),
            created_at: story.created_at,
        }
    }
}

/// AdminListItem
///
/// A user or story surfaced for moderation. Never authoritative: the hosted
/// store owns the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export)]
pub enum AdminListItem {
    User(UserItem),
    Story(StoryItem),
}

impl AdminListItem {
    pub fn id(&self) -> Uuid {
        match self {
            AdminListItem::User(user) => user.id,
            AdminListItem::Story(story) => story.id,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            AdminListItem::User(user) => &user.display_name,
            AdminListItem::Story(story) => &story.display_name,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            AdminListItem::User(user) => user.created_at,
            AdminListItem::Story(story) => story.created_at,
        }
    }

    fn noun(&self) -> &'static str {
        match self {
            AdminListItem::User(_) => "user",
            AdminListItem::Story(_) => "story",
        }
    }
}

/// ActionKind
///
/// The privileged operations an admin can confirm. `Ban` applies to users,
/// `Delete` and `Feature` to stories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ActionKind {
    Ban,
    Delete,
    Feature,
}

impl ActionKind {
    pub fn verb(self) -> &'static str {
        match self {
            ActionKind::Ban => "ban",
            ActionKind::Delete => "delete",
            ActionKind::Feature => "feature",
        }
    }

    /// Whether this action can be applied to `target`.
    pub fn accepts(self, target: &AdminListItem) -> bool {
        matches!(
            (self, target),
            (ActionKind::Ban, AdminListItem::User(_))
                | (ActionKind::Delete, AdminListItem::Story(_))
                | (ActionKind::Feature, AdminListItem::Story(_))
        )
    }
}

/// PendingAction
///
/// The single confirmation awaiting the admin's answer. `ticket` identifies this
/// request so a late-settling confirm never clears a newer one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PendingAction {
    #[ts(type = "number")]
    pub ticket: u64,
    pub kind: ActionKind,
    pub target: AdminListItem,
    pub prompt: String,
}

impl PendingAction {
    pub fn new(ticket: u64, kind: ActionKind, target: AdminListItem) -> Self {
        let prompt = format!("Are you sure you want to {} this {}?", kind.verb(), target.noun());
        Self {
            ticket,
            kind,
            target,
            prompt,
        }
    }
}

/// NoticeLevel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// Notice
///
/// A dismissible, non-blocking message shown in the admin console.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Notice {
    #[ts(type = "number")]
    pub id: u64,
    pub level: NoticeLevel,
    pub message: String,
}

/// OverviewCounts
///
/// Exact totals reported by the store. `None` until the matching query has
/// succeeded at least once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct OverviewCounts {
    #[ts(type = "number | null")]
    pub total_users: Option<u64>,
    #[ts(type = "number | null")]
    pub total_stories: Option<u64>,
}

/// ConsoleSnapshot
///
/// Everything the admin console renders, captured under the console lock.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ConsoleSnapshot {
    pub counts: OverviewCounts,
    pub recent_users: Vec<UserItem>,
    pub recent_stories: Vec<StoryItem>,
    pub pending: Option<PendingAction>,
    // True while a confirmed mutation awaits the store; the confirm control is disabled.
    pub in_flight: bool,
    pub notices: Vec<Notice>,
}

// --- Request Payloads ---

/// ActionRequest
///
/// Body of `POST /admin/console/actions`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ActionRequest {
    pub kind: ActionKind,
    pub target_id: Uuid,
}

// --- Identity Responses ---

/// DemoTicket
///
/// Returned by `POST /auth/demo`. The client sends the token back in the
/// `x-demo-token` header for the rest of the demo.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct DemoTicket {
    pub token: Uuid,
}

/// SessionView
///
/// Read-only projection of the resolved session (`GET /me`).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SessionView {
    pub mode: crate::session::NavigationMode,
    pub is_authenticated: bool,
    pub is_demo_mode: bool,
    pub user_id: Option<Uuid>,
    pub username: Option<String>,
    pub role: Option<Role>,
}
