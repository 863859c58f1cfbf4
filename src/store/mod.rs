//! # Review Store
//!
//! Persistence boundary for contact intents and reviews.
//!
//! Two backends implement [`ReviewStore`], selected once at startup:
//! - `postgres` — production backend, windowed aggregates in SQL.
//! - `memory` — mutex-guarded collections, backs tests and local runs.
//!
//! Dialect-dependent pieces (counting reviews with at least one photo, the
//! atomicity of the window re-check on insert) live behind the trait so no
//! call site branches on the backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::identity::PLACEHOLDER_NAME;
use crate::models::{ContactIntent, NewReview, RawReview, StoredReview};

pub mod memory;
pub mod postgres;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// External profile row (owned by the identity system; read-only here).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProfileRow {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Raw aggregate numbers; rounding happens in the service layer.
#[derive(Debug, Clone, Copy)]
pub struct SummaryRow {
    pub count: i64,
    pub avg_rating: Option<f64>,
    pub with_photos: i64,
}

#[derive(Debug)]
pub enum InsertOutcome {
    Inserted(StoredReview),
    /// A review for the pair already sits inside the window. Detected inside
    /// the insert step itself so two concurrent submissions cannot both land.
    RecentExists,
}

#[async_trait]
pub trait ReviewStore: Send + Sync {
    async fn insert_contact(&self, intent: ContactIntent) -> Result<ContactIntent, StoreError>;

    /// Overwrites `provider_responded_at` even when already set.
    async fn mark_responded(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<ContactIntent>, StoreError>;

    async fn count_recent_contacts(
        &self,
        user_id: i64,
        provider_id: i64,
        since: DateTime<Utc>,
    ) -> Result<i64, StoreError>;

    /// Atomic window re-check + insert.
    async fn insert_review(
        &self,
        review: NewReview,
        window_start: DateTime<Utc>,
    ) -> Result<InsertOutcome, StoreError>;

    async fn count_recent_reviews(
        &self,
        user_id: i64,
        provider_id: i64,
        since: DateTime<Utc>,
    ) -> Result<i64, StoreError>;

    async fn get_review(&self, id: i64) -> Result<Option<StoredReview>, StoreError>;

    /// Page ordered by `created_at` descending, plus the provider's total.
    async fn list_by_provider(
        &self,
        provider_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<StoredReview>), StoreError>;

    async fn recent(&self, limit: i64) -> Result<Vec<StoredReview>, StoreError>;

    /// Aggregate over `created_at >= since`, site-wide when `provider_id` is
    /// `None`. Photo coverage is counted backend-side.
    async fn summary(
        &self,
        provider_id: Option<i64>,
        since: DateTime<Utc>,
    ) -> Result<SummaryRow, StoreError>;

    /// Wholesale replacement of the photo list.
    async fn replace_photos(
        &self,
        id: i64,
        photos: &[String],
        at: DateTime<Utc>,
    ) -> Result<Option<StoredReview>, StoreError>;

    /// Lookup into the external profile table. Errors (missing table,
    /// connectivity) are the caller's to absorb; they are degradation, not
    /// failure.
    async fn profile(&self, user_id: i64) -> Result<Option<ProfileRow>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// The one normalization point for review rows, shared by the write path and
/// every read path: photos become a concrete list no matter what the column
/// held, display names are never empty at rest.
pub fn normalize_review(raw: RawReview) -> StoredReview {
    StoredReview {
        id: raw.id,
        user_id: raw.user_id,
        provider_id: raw.provider_id,
        rating: raw.rating,
        comment: raw.comment,
        photos: normalize_photos(raw.photos),
        user_name: normalize_name(raw.user_name),
        user_avatar: raw.user_avatar.filter(|a| !a.trim().is_empty()),
        verified: raw.verified,
        flagged: raw.flagged,
        created_at: raw.created_at,
        updated_at: raw.updated_at,
    }
}

pub fn normalize_photos(value: Option<serde_json::Value>) -> Vec<String> {
    match value {
        Some(serde_json::Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                serde_json::Value::String(url) => Some(url),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

pub fn normalize_name(name: Option<String>) -> String {
    match name {
        Some(n) if !n.trim().is_empty() => n,
        _ => PLACEHOLDER_NAME.to_string(),
    }
}

pub fn window_start(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    now - chrono::Duration::days(days)
}
