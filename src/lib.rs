//! # Reviews Service
//!
//! Backend for provider reviews on a services marketplace: users who
//! contacted a provider can leave a rating, and aggregate reputation
//! (average rating, photo coverage) is served per provider.
//!
//!
//!
//! # Submission Flow
//!
//! - Caller arrives pre-authenticated; the upstream layer forwards the user
//!   id/role as headers plus the raw bearer token
//! - Eligibility Gate checks rating bounds, the 30-day contact window and
//!   the 30-day one-review window (both measured from submission time,
//!   independent of each other)
//! - Identity Resolver attaches a display name/avatar by walking tiers:
//!   profile table join, remote identity service (3 s bound), `"Usuario"`
//!   placeholder
//! - The enriched row is persisted; listings and summaries read from the
//!   same store
//!
//!
//!
//! # Notes
//!
//! ## Denormalized identity
//!
//! Display identity is copied onto the review row at write time, so later
//! profile edits do not rewrite history. Read paths re-resolve only rows
//! still carrying the placeholder, for display, without mutating them.
//!
//! ## Store backends
//!
//! `STORE_BACKEND=postgres` (default) or `memory`. The memory backend keeps
//! the whole dataset behind one mutex and backs the test suite; see
//! `store/` for what each backend guarantees about the submission race.

use std::time::Duration;

use axum::{
    Router,
    http::{
        HeaderName, Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, patch, post, put},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod contacts;
pub mod database;
pub mod eligibility;
pub mod error;
pub mod identity;
pub mod models;
pub mod reviews;
pub mod routes;
pub mod state;
pub mod store;

use routes::{
    USER_ID_HEADER, USER_ROLE_HEADER, contact_responded_handler, create_contact_handler,
    create_review_handler, global_summary_handler, health_handler, provider_reviews_handler,
    provider_summary_handler, ready_handler, recent_reviews_handler, update_photos_handler,
};
use state::AppState;

pub async fn start_server() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::new().await;

    info!("Starting server...");

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static(USER_ID_HEADER),
            HeaderName::from_static(USER_ROLE_HEADER),
        ])
        .max_age(Duration::from_secs(60 * 60));

    let api = Router::new()
        .route("/contact-intents", post(create_contact_handler))
        .route(
            "/contact-intents/{id}/responded",
            patch(contact_responded_handler),
        )
        .route("/reviews", post(create_review_handler))
        .route("/reviews/{id}/photos", put(update_photos_handler))
        .route("/reviews/recent", get(recent_reviews_handler))
        .route("/reviews/stats/summary", get(global_summary_handler))
        .route("/providers/{id}/reviews", get(provider_reviews_handler))
        .route(
            "/providers/{id}/review-summary",
            get(provider_summary_handler),
        );

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .nest("/api/v1", api)
        .layer(cors)
        .with_state(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await.unwrap();
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    println!("Server shutting down...");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
