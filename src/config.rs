use std::env;
use std::time::Duration;

use thiserror::Error;

/// ConfigError
///
/// Raised by `AppConfig::load` when a setting required by the current runtime
/// environment is absent. `main` treats this as fatal.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set in production")]
    Missing(&'static str),
}

/// AppConfig
///
/// Holds the service's entire configuration state. Immutable once loaded and
/// pulled into handlers and extractors via `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls the local identity bypass and the log format.
    pub env: Env,
    // Base URL of the hosted backend (PostgREST + GoTrue). `None` selects the in-memory store.
    pub supabase_url: Option<String>,
    // Service key sent as `apikey` and bearer on store requests.
    pub supabase_service_key: String,
    // Secret used to validate provider-issued access tokens (HS256).
    pub jwt_secret: String,
    // Expected `aud` claim of provider-issued access tokens.
    pub jwt_audience: String,
    // Socket address the HTTP server binds to.
    pub bind_addr: String,
    // Lifetime of a demo ticket.
    pub demo_ttl: Duration,
}

/// Env
///
/// Distinguishes the developer setup (local bypass header, pretty logs, optional
/// in-memory store) from the hardened production deployment.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

const LOCAL_JWT_SECRET: &str = "super-secure-test-secret-value-local";
const DEFAULT_AUDIENCE: &str = "authenticated";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_DEMO_TTL_SECS: u64 = 86_400;

impl Default for AppConfig {
    /// Non-panicking local configuration used by tests to scaffold state
    /// without touching the process environment.
    fn default() -> Self {
        Self {
            env: Env::Local,
            supabase_url: None,
            supabase_service_key: String::new(),
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            jwt_audience: DEFAULT_AUDIENCE.to_string(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            demo_ttl: Duration::from_secs(DEFAULT_DEMO_TTL_SECS),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables.
    ///
    /// `APP_ENV=production` requires `SUPABASE_URL`, `SUPABASE_SERVICE_KEY` and
    /// `SUPABASE_JWT_SECRET`. Any other value selects `Env::Local`, where every
    /// setting has a fallback and an unset `SUPABASE_URL` means "use the
    /// in-memory store".
    pub fn load() -> Result<Self, ConfigError> {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let jwt_audience =
            env::var("SUPABASE_JWT_AUDIENCE").unwrap_or_else(|_| DEFAULT_AUDIENCE.to_string());
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
        let demo_ttl = Duration::from_secs(
            env::var("DEMO_TTL_SECS")
                .ok()
                .and_then(|secs| secs.parse().ok())
                .unwrap_or(DEFAULT_DEMO_TTL_SECS),
        );

        match env {
            Env::Local => Ok(Self {
                env: Env::Local,
                supabase_url: env::var("SUPABASE_URL").ok().map(trim_base_url),
                supabase_service_key: env::var("SUPABASE_SERVICE_KEY").unwrap_or_default(),
                jwt_secret: env::var("SUPABASE_JWT_SECRET")
                    .unwrap_or_else(|_| LOCAL_JWT_SECRET.to_string()),
                jwt_audience,
                bind_addr,
                demo_ttl,
            }),
            Env::Production => Ok(Self {
                env: Env::Production,
                supabase_url: Some(trim_base_url(required("SUPABASE_URL")?)),
                supabase_service_key: required("SUPABASE_SERVICE_KEY")?,
                jwt_secret: required("SUPABASE_JWT_SECRET")?,
                jwt_audience,
                bind_addr,
                demo_ttl,
            }),
        }
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn trim_base_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
