use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use uuid::Uuid;

use crate::{
    AppState,
    auth::{AdminUser, DEMO_TOKEN_HEADER, bearer_token},
    coordinator::{AdminCoordinator, ConfirmOutcome},
    error::AppError,
    guard::{AccessQuery, AccessResponse, Destination, guard},
    models::{ActionRequest, ConsoleSnapshot, DemoTicket, SessionView},
    navbar::{NavQuery, NavbarView, render_navbar},
    session::SessionState,
};

/// Response header flagging a sign-out the identity provider did not confirm.
pub const SIGN_OUT_STATUS_HEADER: &str = "x-sign-out-status";

// --- Navigation & Access ---

/// get_navbar
///
/// [Public Route] Navigation chrome for the caller's session on `path`.
#[utoipa::path(
    get,
    path = "/nav",
    params(NavQuery),
    responses((status = 200, description = "Navigation bar", body = NavbarView))
)]
pub async fn get_navbar(session: SessionState, Query(query): Query<NavQuery>) -> Json<NavbarView> {
    Json(render_navbar(&session, &query.path))
}

/// check_access
///
/// [Public Route] Guard decision for a client-side route entry. The browser
/// router calls this before rendering `path` and again when the session changes.
#[utoipa::path(
    get,
    path = "/access",
    params(AccessQuery),
    responses((status = 200, description = "Guard decision", body = AccessResponse))
)]
pub async fn check_access(
    session: SessionState,
    Query(query): Query<AccessQuery>,
) -> Json<AccessResponse> {
    Json(guard(&session, query.require_admin, &query.path).into())
}

// --- Identity ---

/// start_demo
///
/// [Public Route] Opens a demo session. The ticket grants member-area access
/// without an identity, a profile or a role.
#[utoipa::path(
    post,
    path = "/auth/demo",
    responses((status = 201, description = "Demo started", body = DemoTicket))
)]
pub async fn start_demo(State(state): State<AppState>) -> (StatusCode, Json<DemoTicket>) {
    let token = state.demos.start().await;
    (StatusCode::CREATED, Json(DemoTicket { token }))
}

/// exit_demo
///
/// [Public Route] Revokes the caller's demo ticket and sends them to the
/// landing page as a guest.
#[utoipa::path(
    post,
    path = "/auth/exit-demo",
    responses((status = 303, description = "Back to landing page"))
)]
pub async fn exit_demo(State(state): State<AppState>, headers: HeaderMap) -> Redirect {
    let ticket = headers
        .get(DEMO_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| Uuid::parse_str(value.trim()).ok());

    if let Some(ticket) = ticket {
        state.demos.exit_demo_mode(ticket).await;
    }
    Redirect::to(&Destination::Landing.to_path())
}

/// sign_out
///
/// [Public Route] Signs the caller out at the identity provider. A provider
/// failure is logged and flagged in `x-sign-out-status` but never blocks the
/// redirect to the landing page.
#[utoipa::path(
    post,
    path = "/auth/sign-out",
    responses((status = 303, description = "Back to landing page"))
)]
pub async fn sign_out(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let mut response = Redirect::to(&Destination::Landing.to_path()).into_response();

    if let Some(token) = bearer_token(&headers) {
        if let Err(e) = state.identity.sign_out(token).await {
            tracing::error!(error = %e, "sign-out failed at identity provider");
            response.headers_mut().insert(
                HeaderName::from_static(SIGN_OUT_STATUS_HEADER),
                HeaderValue::from_static("failed"),
            );
        }
    }
    response
}

/// get_me
///
/// [Authenticated Route] The resolved session of the caller (member or demo).
#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "Session", body = SessionView),
        (status = 401, description = "No session")
    )
)]
pub async fn get_me(session: SessionState) -> Result<Json<SessionView>, AppError> {
    session
        .session()
        .map(|s| Json(s.view()))
        .ok_or(AppError::Unauthorized)
}

// --- Admin Console ---

async fn mounted_console(state: &AppState, admin: &AdminUser) -> Result<Arc<AdminCoordinator>, AppError> {
    state
        .consoles
        .get(admin.id)
        .await
        .ok_or_else(|| AppError::NotFound("admin console is not open".to_string()))
}

/// open_console
///
/// [Admin Route] Mounts the caller's admin console (or reuses the open one)
/// and loads the overview: counts plus the ten newest users and stories.
#[utoipa::path(
    get,
    path = "/admin/console",
    responses(
        (status = 200, description = "Console", body = ConsoleSnapshot),
        (status = 403, description = "Access Denied")
    )
)]
pub async fn open_console(
    admin: AdminUser,
    State(state): State<AppState>,
) -> Json<ConsoleSnapshot> {
    tracing::info!(admin = %admin.username, "admin console opened");
    let console = state.consoles.open(admin.id, &state.store).await;
    Json(console.load_overview().await)
}

/// refresh_console
///
/// [Admin Route] Reloads the overview. Slices whose query fails keep their
/// previous contents.
#[utoipa::path(
    post,
    path = "/admin/console/refresh",
    responses((status = 200, description = "Console", body = ConsoleSnapshot))
)]
pub async fn refresh_console(
    admin: AdminUser,
    State(state): State<AppState>,
) -> Result<Json<ConsoleSnapshot>, AppError> {
    let console = mounted_console(&state, &admin).await?;
    Ok(Json(console.load_overview().await))
}

/// close_console
///
/// [Admin Route] Unmounts the console. Requests still in flight finish
/// against the store without touching the discarded view.
#[utoipa::path(
    delete,
    path = "/admin/console",
    responses(
        (status = 204, description = "Closed"),
        (status = 404, description = "Not open")
    )
)]
pub async fn close_console(admin: AdminUser, State(state): State<AppState>) -> StatusCode {
    if state.consoles.close(admin.id).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

/// request_action
///
/// [Admin Route] Opens the confirmation step for a ban, delete or feature.
/// Replaces any unconfirmed request.
#[utoipa::path(
    post,
    path = "/admin/console/actions",
    request_body = ActionRequest,
    responses(
        (status = 200, description = "Pending action recorded", body = ConsoleSnapshot),
        (status = 404, description = "Target not in the working set"),
        (status = 422, description = "Action does not apply to target")
    )
)]
pub async fn request_action(
    admin: AdminUser,
    State(state): State<AppState>,
    Json(payload): Json<ActionRequest>,
) -> Result<Json<ConsoleSnapshot>, AppError> {
    let console = mounted_console(&state, &admin).await?;
    console
        .request_action_by_id(payload.kind, payload.target_id)
        .await?;
    Ok(Json(console.snapshot().await))
}

/// confirm_action
///
/// [Admin Route] Applies the pending action. A store failure is reported as an
/// error notice in the returned console, not as an HTTP error.
#[utoipa::path(
    post,
    path = "/admin/console/actions/confirm",
    responses(
        (status = 200, description = "Attempted", body = ConsoleSnapshot),
        (status = 409, description = "Nothing pending, or a mutation is still in flight")
    )
)]
pub async fn confirm_action(
    admin: AdminUser,
    State(state): State<AppState>,
) -> Result<Json<ConsoleSnapshot>, AppError> {
    let console = mounted_console(&state, &admin).await?;
    match console.confirm().await? {
        ConfirmOutcome::Applied(notice) => {
            tracing::info!(admin = %admin.username, message = %notice.message, "moderation action applied")
        }
        ConfirmOutcome::Failed(notice) => {
            tracing::warn!(admin = %admin.username, message = %notice.message, "moderation action failed")
        }
    }
    Ok(Json(console.snapshot().await))
}

/// cancel_action
///
/// [Admin Route] Dismisses the confirmation step without touching the store.
#[utoipa::path(
    post,
    path = "/admin/console/actions/cancel",
    responses((status = 200, description = "Cancelled", body = ConsoleSnapshot))
)]
pub async fn cancel_action(
    admin: AdminUser,
    State(state): State<AppState>,
) -> Result<Json<ConsoleSnapshot>, AppError> {
    let console = mounted_console(&state, &admin).await?;
    console.cancel().await;
    Ok(Json(console.snapshot().await))
}

/// dismiss_notice
///
/// [Admin Route] Removes one notice from the console.
#[utoipa::path(
    delete,
    path = "/admin/console/notices/{id}",
    params(("id" = u64, Path, description = "Notice ID")),
    responses(
        (status = 200, description = "Dismissed", body = ConsoleSnapshot),
        (status = 404, description = "Unknown notice")
    )
)]
pub async fn dismiss_notice(
    admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<ConsoleSnapshot>, AppError> {
    let console = mounted_console(&state, &admin).await?;
    if !console.dismiss_notice(id).await {
        return Err(AppError::NotFound(format!("notice {}", id)));
    }
    Ok(Json(console.snapshot().await))
}
