use std::convert::Infallible;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::AppError,
    identity::DemoSessions,
    models::Role,
    session::{Member, Session, SessionState},
    store::{StoreState, fetch_profile},
};

/// Header carrying a demo ticket issued by `POST /auth/demo`.
pub const DEMO_TOKEN_HEADER: &str = "x-demo-token";

/// Local-only header naming a profile id to act as.
pub const LOCAL_USER_HEADER: &str = "x-user-id";

/// Claims
///
/// Payload of an access token issued by the hosted identity provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the provider user id, shared with `profiles.id`.
    pub sub: Uuid,
    pub exp: usize,
    pub iat: usize,
    /// Audience. Checked against `AppConfig::jwt_audience`.
    pub aud: String,
}

/// bearer_token
///
/// The token of an `Authorization: Bearer ...` header, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn header_uuid(headers: &HeaderMap, name: &str) -> Option<Uuid> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| Uuid::parse_str(value.trim()).ok())
}

/// SessionState Extractor
///
/// Resolves who is making the request. Resolution never rejects: anything
/// that does not prove an identity is a guest, and an identity whose profile
/// is missing or cannot be read right now is `Loading`.
///
/// Order:
/// 1. A live demo ticket in `x-demo-token` → Demo.
/// 2. `Env::Local` only: `x-user-id` naming an existing profile → Member.
/// 3. A valid bearer token → profile lookup.
/// 4. Otherwise → Guest.
///
/// The resolved state is cached in the request extensions so the guard
/// middleware and the handler share one lookup.
impl<S> FromRequestParts<S> for SessionState
where
    S: Send + Sync,
    StoreState: FromRef<S>,
    AppConfig: FromRef<S>,
    DemoSessions: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(cached) = parts.extensions.get::<SessionState>() {
            return Ok(cached.clone());
        }

        let resolved = resolve(parts, state).await;
        parts.extensions.insert(resolved.clone());
        Ok(resolved)
    }
}

async fn resolve<S>(parts: &Parts, state: &S) -> SessionState
where
    S: Send + Sync,
    StoreState: FromRef<S>,
    AppConfig: FromRef<S>,
    DemoSessions: FromRef<S>,
{
    let store = StoreState::from_ref(state);
    let config = AppConfig::from_ref(state);
    let demos = DemoSessions::from_ref(state);

    // 1. Demo ticket
    if let Some(ticket) = header_uuid(&parts.headers, DEMO_TOKEN_HEADER) {
        if demos.is_live(ticket).await {
            return SessionState::from_parts(true, None, None);
        }
        tracing::debug!(%ticket, "stale demo ticket ignored");
    }

    // 2. Local development bypass
    let mut user_id = None;
    if config.env == Env::Local {
        user_id = header_uuid(&parts.headers, LOCAL_USER_HEADER);
    }

    // 3. Provider-issued access token
    if user_id.is_none() {
        if let Some(token) = bearer_token(&parts.headers) {
            let key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
            let mut validation = Validation::default();
            validation.validate_exp = true;
            validation.set_audience(&[&config.jwt_audience]);

            match decode::<Claims>(token, &key, &validation) {
                Ok(data) => user_id = Some(data.claims.sub),
                Err(e) => tracing::debug!(error = %e, "access token rejected"),
            }
        }
    }

    let Some(id) = user_id else {
        return SessionState::Ready(Session::Guest);
    };

    // Profile lookup: the role lives on the profile, not in the token.
    match fetch_profile(store.as_ref(), id).await {
        Ok(Some(profile)) => SessionState::from_parts(false, Some(id), Some(Member::from(&profile))),
        // A fresh sign-up whose profile row is not written yet: still resolving.
        Ok(None) => {
            tracing::warn!(user_id = %id, "identity has no profile yet, session still resolving");
            SessionState::from_parts(false, Some(id), None)
        }
        Err(e) => {
            tracing::warn!(user_id = %id, error = %e, "profile lookup failed, session still resolving");
            SessionState::from_parts(false, Some(id), None)
        }
    }
}

/// AdminUser Extractor
///
/// Handler-level role check for admin routes, on top of the guard middleware.
/// Demo sessions and members without the `admin` role get `403 Access Denied`.
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub id: Uuid,
    pub username: String,
}

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    StoreState: FromRef<S>,
    AppConfig: FromRef<S>,
    DemoSessions: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = match SessionState::from_request_parts(parts, state).await {
            Ok(session) => session,
            Err(never) => match never {},
        };

        match session {
            SessionState::Ready(Session::Member(member)) if member.role == Role::Admin => {
                Ok(AdminUser {
                    id: member.id,
                    username: member.username,
                })
            }
            SessionState::Ready(Session::Member(_)) | SessionState::Ready(Session::Demo) => {
                Err(AppError::Forbidden)
            }
            SessionState::Ready(Session::Guest) | SessionState::Loading => {
                Err(AppError::Unauthorized)
            }
        }
    }
}
