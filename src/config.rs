use std::{env, fmt::Display, str::FromStr};

use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown store backend: {other}")),
        }
    }
}

pub struct Config {
    pub port: u16,
    pub store_backend: StoreBackend,
    pub database_url: String,
    /// Anti-spam toggle: submissions must be preceded by a contact intent.
    /// Read once here; the gate holds the value for the process lifetime.
    pub require_contact_intent: bool,
    /// Base URL of the remote identity service. Unset disables tier 3.
    pub identity_api_url: Option<String>,
    pub identity_timeout_ms: u64,
}

impl Config {
    pub fn load() -> Self {
        Self {
            port: try_load("PORT", "4005"),
            store_backend: try_load("STORE_BACKEND", "postgres"),
            database_url: try_load("DATABASE_URL", "postgres://localhost:5432/reviews"),
            require_contact_intent: try_load("REVIEWS_REQUIRE_CONTACT_INTENT", "true"),
            identity_api_url: env::var("IDENTITY_API_URL").ok(),
            identity_timeout_ms: try_load("IDENTITY_TIMEOUT_MS", "3000"),
        }
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        warn!("Environment variable {key} not found, using default");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
        })
        .expect("Environment misconfigured!")
}
