use axum::{
    Json, Router,
    extract::{FromRef, OriginalUri, Request},
    http::{HeaderName, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Redirect, Response},
};
use serde_json::json;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod guard;
pub mod handlers;
pub mod identity;
pub mod models;
pub mod navbar;
pub mod session;
pub mod store;

// Routing split by access level (public, authenticated, admin).
pub mod routes;
use routes::{admin, authenticated, public};

use guard::{GuardDecision, guard};
use session::SessionState;

// --- Public Re-exports ---

pub use config::AppConfig;
pub use coordinator::{AdminCoordinator, ConsoleRegistry};
pub use identity::{DemoSessions, IdentityState, LocalIdentity, SupabaseIdentity};
pub use store::{InMemoryStore, StoreState, SupabaseStore};

/// ApiDoc
///
/// OpenAPI document for every route, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::get_navbar, handlers::check_access, handlers::start_demo,
        handlers::exit_demo, handlers::sign_out, handlers::get_me,
        handlers::open_console, handlers::refresh_console, handlers::close_console,
        handlers::request_action, handlers::confirm_action, handlers::cancel_action,
        handlers::dismiss_notice
    ),
    components(
        schemas(
            navbar::NavbarView, navbar::NavLink, navbar::NavAction, navbar::NavActionKind,
            guard::AccessResponse, session::NavigationMode,
            models::Role, models::UserItem, models::StoryItem, models::AdminListItem,
            models::ActionKind, models::PendingAction, models::Notice, models::NoticeLevel,
            models::OverviewCounts, models::ConsoleSnapshot, models::ActionRequest,
            models::DemoTicket, models::SessionView,
        )
    ),
    tags(
        (name = "story-portal", description = "Navigation, access and moderation API for the story front-end")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single container of shared services, cloned into every request.
#[derive(Clone)]
pub struct AppState {
    /// Hosted record store (or its in-memory stand-in).
    pub store: StoreState,
    /// Identity provider calls (sign-out).
    pub identity: IdentityState,
    /// Live demo tickets.
    pub demos: DemoSessions,
    /// Mounted admin consoles, one per admin.
    pub consoles: ConsoleRegistry,
    /// The loaded, immutable configuration.
    pub config: AppConfig,
}

impl AppState {
    pub fn new(store: StoreState, identity: IdentityState, config: AppConfig) -> Self {
        Self {
            store,
            identity,
            demos: DemoSessions::new(config.demo_ttl),
            consoles: ConsoleRegistry::new(),
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for StoreState {
    fn from_ref(app_state: &AppState) -> StoreState {
        app_state.store.clone()
    }
}

impl FromRef<AppState> for DemoSessions {
    fn from_ref(app_state: &AppState) -> DemoSessions {
        app_state.demos.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// require_member
///
/// Route guard for the member area: demo sessions and members pass, guests are
/// redirected to sign in with the requested location preserved.
async fn require_member(
    session: SessionState,
    OriginalUri(uri): OriginalUri,
    request: Request,
    next: Next,
) -> Response {
    enforce(guard(&session, false, &requested(&uri)), request, next).await
}

/// require_admin
///
/// Route guard for the admin area. Demo sessions and non-admin members are
/// redirected to the dashboard.
async fn require_admin(
    session: SessionState,
    OriginalUri(uri): OriginalUri,
    request: Request,
    next: Next,
) -> Response {
    enforce(guard(&session, true, &requested(&uri)), request, next).await
}

fn requested(uri: &axum::http::Uri) -> String {
    uri.path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string())
}

async fn enforce(decision: GuardDecision, request: Request, next: Next) -> Response {
    match decision {
        GuardDecision::Allow => next.run(request).await,
        GuardDecision::Wait => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::RETRY_AFTER, "1")],
            Json(json!({ "status": "loading" })),
        )
            .into_response(),
        GuardDecision::Redirect(destination) => {
            tracing::debug!(to = %destination.to_path(), "guard redirect");
            Redirect::temporary(&destination.to_path()).into_response()
        }
    }
}

/// create_router
///
/// Assembles routing, the per-module guards and the observability layers, and
/// registers the application state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), require_member)),
        )
        .nest(
            "/admin",
            admin::admin_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), require_admin)),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Builds the per-request span, tagged with the `x-request-id` so every log
/// line of one request correlates.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
