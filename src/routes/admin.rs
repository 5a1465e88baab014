use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, post},
};

/// Admin Router Module
///
/// The moderation console. Nested under `/admin` behind the admin guard;
/// every handler re-checks the role through the `AdminUser` extractor.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/console: mount (or reuse) and load the overview.
        // DELETE /admin/console: unmount.
        .route(
            "/console",
            get(handlers::open_console).delete(handlers::close_console),
        )
        // POST /admin/console/refresh
        // Re-run both overview queries.
        .route("/console/refresh", post(handlers::refresh_console))
        // POST /admin/console/actions
        // Record a ban/delete/feature request awaiting confirmation.
        .route("/console/actions", post(handlers::request_action))
        // POST /admin/console/actions/confirm
        // Apply the pending action; refused while another is in flight.
        .route("/console/actions/confirm", post(handlers::confirm_action))
        // POST /admin/console/actions/cancel
        .route("/console/actions/cancel", post(handlers::cancel_action))
        // DELETE /admin/console/notices/{id}
        .route("/console/notices/{id}", delete(handlers::dismiss_notice))
}
