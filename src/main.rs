use std::sync::Arc;

use story_portal::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    identity::{IdentityState, LocalIdentity, SupabaseIdentity},
    store::{InMemoryStore, StoreState, SupabaseStore},
};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Entry point: configuration, logging, store and identity clients, then the
/// HTTP server.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast on missing production settings)
    dotenv::dotenv().ok();
    let config = AppConfig::load().expect("FATAL: invalid configuration");

    // 2. Logging: RUST_LOG wins, otherwise sensible development defaults.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "story_portal=debug,tower_http=info,axum=trace".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // JSON lines for the log aggregator.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Store and identity clients
    let (store, identity): (StoreState, IdentityState) = match &config.supabase_url {
        Some(url) => {
            tracing::info!(%url, "using hosted backend");
            (
                Arc::new(SupabaseStore::new(url, &config.supabase_service_key)),
                Arc::new(SupabaseIdentity::new(url, &config.supabase_service_key)),
            )
        }
        None => {
            tracing::warn!("SUPABASE_URL not set, using the in-memory store");
            (Arc::new(InMemoryStore::new()), Arc::new(LocalIdentity::new()))
        }
    };

    // 4. Router and server
    let bind_addr = config.bind_addr.clone();
    let app = create_router(AppState::new(store, identity, config));

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: failed to bind listener");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at /swagger-ui");

    axum::serve(listener, app).await.expect("FATAL: server error");
}
