use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

use crate::guard::Destination;
use crate::session::{NavigationMode, Session, SessionState, classify};

/// Primary navigation shown to members, in display order.
const MEMBER_LINKS: [(&str, &str); 5] = [
    ("Dashboard", "/dashboard"),
    ("Create", "/create-story"),
    ("Library", "/library"),
    ("Videos", "/videos"),
    ("Explore", "/explore"),
];

/// NavLink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct NavLink {
    pub label: String,
    pub href: String,
    pub active: bool,
}

/// NavAction
///
/// Controls drawn on the right-hand side of the bar. `href` is `None` for
/// controls that post to the service (`sign_out`, `exit_demo`) or stay on the
/// page (`about_developer`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct NavAction {
    pub kind: NavActionKind,
    pub label: String,
    pub href: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum NavActionKind {
    SignIn,
    SignUp,
    ExitDemo,
    Profile,
    SignOut,
    AboutDeveloper,
}

/// NavbarView
///
/// The navigation chrome for one render. `mode` is `None` while the session is
/// still resolving; nothing member-only is emitted in that state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct NavbarView {
    pub mode: Option<NavigationMode>,
    pub brand_href: String,
    pub demo_badge: bool,
    pub links: Vec<NavLink>,
    pub actions: Vec<NavAction>,
}

/// NavQuery
///
/// Query of `GET /nav`.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct NavQuery {
    #[serde(default)]
    pub path: String,
}

pub fn render_navbar(state: &SessionState, current_path: &str) -> NavbarView {
    let Some(session) = state.session() else {
        return NavbarView {
            mode: None,
            brand_href: Destination::Landing.to_path(),
            demo_badge: false,
            links: Vec::new(),
            actions: Vec::new(),
        };
    };

    let mode = classify(session);
    let brand_href = match mode {
        NavigationMode::Guest => Destination::Landing,
        NavigationMode::Demo | NavigationMode::Member => Destination::Dashboard,
    }
    .to_path();

    let (links, mut actions) = match session {
        Session::Guest => (
            Vec::new(),
            vec![
                action(NavActionKind::SignIn, "Sign In", Some(Destination::Login { from: None })),
                action(NavActionKind::SignUp, "Sign Up", Some(Destination::Register)),
            ],
        ),
        Session::Demo => (
            Vec::new(),
            vec![
                action(NavActionKind::ExitDemo, "Exit Demo", None),
                action(NavActionKind::SignUp, "Sign Up", Some(Destination::Register)),
            ],
        ),
        Session::Member(member) => (
            member_links(current_path),
            vec![
                action(
                    NavActionKind::Profile,
                    &member.username,
                    Some(Destination::Profile {
                        username: member.username.clone(),
                    }),
                ),
                action(NavActionKind::SignOut, "Sign Out", None),
            ],
        ),
    };

    // Shown in every resolved mode; opens a client-side dialog.
    actions.push(action(NavActionKind::AboutDeveloper, "About Developer", None));

    NavbarView {
        mode: Some(mode),
        brand_href,
        demo_badge: mode == NavigationMode::Demo,
        links,
        actions,
    }
}

fn member_links(current_path: &str) -> Vec<NavLink> {
    MEMBER_LINKS
        .iter()
        .map(|(label, href)| NavLink {
            label: (*label).to_string(),
            href: (*href).to_string(),
            active: *href == current_path,
        })
        .collect()
}

fn action(kind: NavActionKind, label: &str, destination: Option<Destination>) -> NavAction {
    NavAction {
        kind,
        label: label.to_string(),
        href: destination.map(|d| d.to_path()),
    }
}
