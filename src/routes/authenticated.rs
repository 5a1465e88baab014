use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Routes for any caller the guard lets into the member area: signed-in
/// members and demo sessions. The guard middleware is layered on in
/// `create_router`.
pub fn authenticated_routes() -> Router<AppState> {
    Router::new()
        // GET /me
        // The caller's resolved session (mode, flags, username, role).
        .route("/me", get(handlers::get_me))
}
