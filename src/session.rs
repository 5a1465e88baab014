use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Profile, Role, SessionView};

/// Member
///
/// The resolved identity of a signed-in user: the profile fields the access
/// decisions and the navigation chrome need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
}

impl From<&Profile> for Member {
    fn from(profile: &Profile) -> Self {
        Self {
            id: profile.id,
            username: profile.username.clone(),
            role: profile.role,
        }
    }
}

/// Session
///
/// Who is looking at the page. Demo mode and a real identity are separate
/// variants, so a demo session can never carry a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session {
    Guest,
    Demo,
    Member(Member),
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Session::Member(_))
    }

    pub fn is_demo_mode(&self) -> bool {
        matches!(self, Session::Demo)
    }

    pub fn role(&self) -> Option<Role> {
        match self {
            Session::Member(member) => Some(member.role),
            _ => None,
        }
    }

    pub fn view(&self) -> SessionView {
        let member = match self {
            Session::Member(member) => Some(member),
            _ => None,
        };
        SessionView {
            mode: classify(self),
            is_authenticated: self.is_authenticated(),
            is_demo_mode: self.is_demo_mode(),
            user_id: member.map(|m| m.id),
            username: member.map(|m| m.username.clone()),
            role: self.role(),
        }
    }
}

/// SessionState
///
/// A session is `Loading` while an authenticated identity's profile has not
/// resolved yet. Consumers render a loading state for it; it is never Guest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Loading,
    Ready(Session),
}

impl SessionState {
    /// from_parts
    ///
    /// Normalizes the raw facts gathered while resolving a request:
    /// a live demo ticket wins over everything else; no identity is a guest;
    /// an identity without a profile is still loading.
    pub fn from_parts(is_demo: bool, user_id: Option<Uuid>, profile: Option<Member>) -> Self {
        if is_demo {
            return SessionState::Ready(Session::Demo);
        }
        match (user_id, profile) {
            (None, _) => SessionState::Ready(Session::Guest),
            (Some(_), None) => SessionState::Loading,
            (Some(_), Some(member)) => SessionState::Ready(Session::Member(member)),
        }
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionState::Loading => None,
            SessionState::Ready(session) => Some(session),
        }
    }
}

/// NavigationMode
///
/// The navigation chrome a session gets. Recomputed on every render, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum NavigationMode {
    Guest,
    Demo,
    Member,
}

/// classify
///
/// Maps a session onto its navigation mode.
pub fn classify(session: &Session) -> NavigationMode {
    match session {
        Session::Guest => NavigationMode::Guest,
        Session::Demo => NavigationMode::Demo,
        Session::Member(_) => NavigationMode::Member,
    }
}
