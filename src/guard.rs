use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Role;
use crate::session::{Session, SessionState};

/// Destination
///
/// The logical places the front-end can be sent to. The router is owned by the
/// client; this type only names paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Landing,
    // `from` is the originally requested location, restored after sign-in.
    Login { from: Option<String> },
    Register,
    Dashboard,
    Profile { username: String },
    Story { id: Uuid },
}

impl Destination {
    pub fn to_path(&self) -> String {
        match self {
            Destination::Landing => "/".to_string(),
            Destination::Login { from: None } => "/auth/login".to_string(),
            Destination::Login { from: Some(from) } => {
                let query = url::form_urlencoded::Serializer::new(String::new())
                    .append_pair("from", from)
                    .finish();
                format!("/auth/login?{}", query)
            }
            Destination::Register => "/auth/register".to_string(),
            Destination::Dashboard => "/dashboard".to_string(),
            Destination::Profile { username } => format!("/profile/{}", username),
            Destination::Story { id } => format!("/story/{}", id),
        }
    }
}

/// GuardDecision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    // Session still resolving: show a blocking loader, do not redirect yet.
    Wait,
    Redirect(Destination),
}

/// guard
///
/// Decides whether a route may render for the given session.
///
/// Evaluated on every route entry and again whenever the session changes, so a
/// `Wait` is always followed by a definitive answer once the profile resolves.
/// Demo sessions never satisfy `require_admin`, whatever else is known about
/// the request.
pub fn guard(state: &SessionState, require_admin: bool, requested: &str) -> GuardDecision {
    let session = match state {
        SessionState::Loading => return GuardDecision::Wait,
        SessionState::Ready(session) => session,
    };

    match session {
        Session::Guest => GuardDecision::Redirect(Destination::Login {
            from: Some(requested.to_string()).filter(|path| !path.is_empty()),
        }),
        Session::Demo if require_admin => GuardDecision::Redirect(Destination::Dashboard),
        Session::Member(member) if require_admin && member.role != Role::Admin => {
            GuardDecision::Redirect(Destination::Dashboard)
        }
        _ => GuardDecision::Allow,
    }
}

/// AccessQuery
///
/// Query of `GET /access`: the location the client router is about to enter.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct AccessQuery {
    pub path: String,
    #[serde(default)]
    pub require_admin: bool,
}

/// AccessResponse
///
/// JSON form of a `GuardDecision` for the client-side router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(tag = "outcome", rename_all = "lowercase")]
#[ts(export)]
pub enum AccessResponse {
    Allow,
    Wait,
    Redirect { to: String },
}

impl From<GuardDecision> for AccessResponse {
    fn from(decision: GuardDecision) -> Self {
        match decision {
            GuardDecision::Allow => AccessResponse::Allow,
            GuardDecision::Wait => AccessResponse::Wait,
            GuardDecision::Redirect(destination) => AccessResponse::Redirect {
                to: destination.to_path(),
            },
        }
    }
}
