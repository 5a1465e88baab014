use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints every caller may hit, guest or not. None of them reveal data
/// beyond what the caller's own session already implies.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // GET /nav?path=/library
        // Navigation chrome (links, actions, demo badge) for the caller's session.
        .route("/nav", get(handlers::get_navbar))
        // GET /access?path=/admin&require_admin=true
        // Route-entry decision for the client router: allow, wait, or redirect.
        .route("/access", get(handlers::check_access))
        // POST /auth/demo
        // Issues a demo ticket.
        .route("/auth/demo", post(handlers::start_demo))
        // POST /auth/exit-demo
        // Revokes the demo ticket and redirects to the landing page.
        .route("/auth/exit-demo", post(handlers::exit_demo))
        // POST /auth/sign-out
        // Provider sign-out, always followed by a redirect to the landing page.
        .route("/auth/sign-out", post(handlers::sign_out))
}
