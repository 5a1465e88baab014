use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::Instant;
use uuid::Uuid;

/// IdentityError
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("identity provider rejected sign-out: HTTP {0}")]
    Rejected(StatusCode),
}

/// IdentityService
///
/// The effectful calls this service makes against the hosted identity
/// provider. Session *resolution* happens per request in the auth extractor;
/// this trait only covers what changes provider-side state.
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Revokes the refresh tokens behind `access_token`.
    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError>;
}

/// IdentityState
pub type IdentityState = Arc<dyn IdentityService>;

/// SupabaseIdentity
///
/// `IdentityService` over the hosted GoTrue endpoint (`/auth/v1`).
#[derive(Clone)]
pub struct SupabaseIdentity {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl SupabaseIdentity {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl IdentityService for SupabaseIdentity {
    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError> {
        let response = self
            .client
            .post(format!("{}/auth/v1/logout", self.base_url))
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            status => Err(IdentityError::Rejected(status)),
        }
    }
}

/// LocalIdentity
///
/// `IdentityService` used when no hosted backend is configured: sign-out has
/// nothing to revoke. `failing` simulates an unreachable provider in tests.
#[derive(Clone, Default)]
pub struct LocalIdentity {
    pub failing: bool,
}

impl LocalIdentity {
    pub fn new() -> Self {
        Self { failing: false }
    }

    pub fn new_failing() -> Self {
        Self { failing: true }
    }
}

#[async_trait]
impl IdentityService for LocalIdentity {
    async fn sign_out(&self, _access_token: &str) -> Result<(), IdentityError> {
        if self.failing {
            return Err(IdentityError::Rejected(StatusCode::SERVICE_UNAVAILABLE));
        }
        Ok(())
    }
}

/// Upper bound of live demo tickets; the oldest is evicted past it.
pub const MAX_DEMO_SESSIONS: usize = 10_000;

/// DemoSessions
///
/// Registry of live demo tickets with their issue time. The identity
/// subsystem is its only writer; request handling only asks whether a ticket
/// is live. Tickets expire after `ttl` and are pruned whenever a new one is
/// issued.
#[derive(Clone)]
pub struct DemoSessions {
    tickets: Arc<RwLock<HashMap<Uuid, Instant>>>,
    ttl: Duration,
}

impl DemoSessions {
    pub fn new(ttl: Duration) -> Self {
        Self {
            tickets: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Opens a demo session. The ticket grants no identity and no role.
    pub async fn start(&self) -> Uuid {
        let ticket = Uuid::new_v4();
        let now = Instant::now();
        let mut tickets = self.tickets.write().await;

        let before = tickets.len();
        tickets.retain(|_, issued| now.duration_since(*issued) < self.ttl);
        if tickets.len() != before {
            tracing::debug!(expired = before - tickets.len(), "demo tickets pruned");
        }

        if tickets.len() >= MAX_DEMO_SESSIONS {
            let oldest = tickets
                .iter()
                .min_by_key(|(_, issued)| **issued)
                .map(|(id, _)| *id);
            if let Some(oldest) = oldest {
                tickets.remove(&oldest);
                tracing::warn!(evicted = %oldest, "demo ticket registry full");
            }
        }

        tickets.insert(ticket, now);
        tracing::info!(%ticket, "demo session started");
        ticket
    }

    /// exit_demo_mode
    ///
    /// Revokes `ticket`. Returns whether it was live. Exiting demo mode never
    /// signs anyone in.
    pub async fn exit_demo_mode(&self, ticket: Uuid) -> bool {
        let removed = self
            .tickets
            .write()
            .await
            .remove(&ticket)
            .is_some_and(|issued| issued.elapsed() < self.ttl);
        tracing::info!(%ticket, removed, "demo session ended");
        removed
    }

    pub async fn is_live(&self, ticket: Uuid) -> bool {
        self.tickets
            .read()
            .await
            .get(&ticket)
            .is_some_and(|issued| issued.elapsed() < self.ttl)
    }

    pub async fn len(&self) -> usize {
        self.tickets.read().await.len()
    }
}
