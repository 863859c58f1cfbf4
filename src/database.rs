//! # PostgreSQL
//!
//! Backing store for the ledger and the reviews table.
//!
//! ## Requirements
//!
//! - Windowed existence checks on (user, provider) pairs must stay index
//!   hits, both tables carry a composite `(user_id, provider_id,
//!   created_at)` index.
//! - Aggregates run over the trailing 90 days only; `(provider_id,
//!   created_at)` covers the listing and summary scans.
//!
//! Migrations are embedded and run at startup; a failed migration is fatal.

use std::time::Duration;

use sqlx::{PgPool, postgres::PgPoolOptions};
use tracing::info;

pub async fn init_postgres(database_url: &str) -> PgPool {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
        .expect("Database misconfigured!");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Migrations failed!");

    info!("Database ready");

    pool
}
