//! # PostgreSQL backend
//!
//! Tables (see `migrations/`):
//! - `contact_intents` — append-only ledger, indexed on
//!   `(user_id, provider_id, created_at)` for the recency probe.
//! - `reviews` — one row per accepted submission with the display identity
//!   denormalized onto it, indexed for provider listings and the window
//!   check.
//!
//! The insert path takes `pg_advisory_xact_lock` on the (user, provider)
//! pair and re-runs the window count inside the same transaction, so two
//! concurrent submissions cannot both land inside one window.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{Channel, ContactIntent, NewReview, RawReview, StoredReview};

use super::{
    InsertOutcome, ProfileRow, ReviewStore, StoreError, SummaryRow, normalize_review,
};

const REVIEW_COLUMNS: &str = "id, user_id, provider_id, rating, comment, photos, \
     user_name, user_avatar, verified, flagged, created_at, updated_at";

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ContactRow {
    id: Uuid,
    user_id: i64,
    provider_id: i64,
    channel: String,
    message_preview: Option<String>,
    provider_responded_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<ContactRow> for ContactIntent {
    fn from(row: ContactRow) -> Self {
        ContactIntent {
            id: row.id,
            user_id: row.user_id,
            provider_id: row.provider_id,
            channel: Channel::parse(&row.channel),
            message_preview: row.message_preview,
            provider_responded_at: row.provider_responded_at,
            created_at: row.created_at,
        }
    }
}

fn pair_lock_key(user_id: i64, provider_id: i64) -> i64 {
    user_id.rotate_left(32) ^ provider_id
}

#[async_trait]
impl ReviewStore for PostgresStore {
    async fn insert_contact(&self, intent: ContactIntent) -> Result<ContactIntent, StoreError> {
        sqlx::query(
            "INSERT INTO contact_intents \
                 (id, user_id, provider_id, channel, message_preview, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(intent.id)
        .bind(intent.user_id)
        .bind(intent.provider_id)
        .bind(intent.channel.as_str())
        .bind(&intent.message_preview)
        .bind(intent.created_at)
        .execute(&self.pool)
        .await?;

        Ok(intent)
    }

    async fn mark_responded(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<ContactIntent>, StoreError> {
        let row = sqlx::query_as::<_, ContactRow>(
            "UPDATE contact_intents SET provider_responded_at = $2 WHERE id = $1 \
             RETURNING id, user_id, provider_id, channel, message_preview, \
                       provider_responded_at, created_at",
        )
        .bind(id)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn count_recent_contacts(
        &self,
        user_id: i64,
        provider_id: i64,
        since: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM contact_intents \
             WHERE user_id = $1 AND provider_id = $2 AND created_at >= $3",
        )
        .bind(user_id)
        .bind(provider_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn insert_review(
        &self,
        review: NewReview,
        window_start: DateTime<Utc>,
    ) -> Result<InsertOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(pair_lock_key(review.user_id, review.provider_id))
            .execute(&mut *tx)
            .await?;

        let recent: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM reviews \
             WHERE user_id = $1 AND provider_id = $2 AND created_at >= $3",
        )
        .bind(review.user_id)
        .bind(review.provider_id)
        .bind(window_start)
        .fetch_one(&mut *tx)
        .await?;

        if recent > 0 {
            tx.rollback().await?;
            return Ok(InsertOutcome::RecentExists);
        }

        let row = sqlx::query_as::<_, RawReview>(&format!(
            "INSERT INTO reviews \
                 (user_id, provider_id, rating, comment, photos, user_name, \
                  user_avatar, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8) \
             RETURNING {REVIEW_COLUMNS}"
        ))
        .bind(review.user_id)
        .bind(review.provider_id)
        .bind(review.rating)
        .bind(&review.comment)
        .bind(json!(review.photos))
        .bind(&review.user_name)
        .bind(&review.user_avatar)
        .bind(review.created_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(InsertOutcome::Inserted(normalize_review(row)))
    }

    async fn count_recent_reviews(
        &self,
        user_id: i64,
        provider_id: i64,
        since: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM reviews \
             WHERE user_id = $1 AND provider_id = $2 AND created_at >= $3",
        )
        .bind(user_id)
        .bind(provider_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn get_review(&self, id: i64) -> Result<Option<StoredReview>, StoreError> {
        let row = sqlx::query_as::<_, RawReview>(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(normalize_review))
    }

    async fn list_by_provider(
        &self,
        provider_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<StoredReview>), StoreError> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM reviews WHERE provider_id = $1")
                .bind(provider_id)
                .fetch_one(&self.pool)
                .await?;

        let rows = sqlx::query_as::<_, RawReview>(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE provider_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
        ))
        .bind(provider_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((total, rows.into_iter().map(normalize_review).collect()))
    }

    async fn recent(&self, limit: i64) -> Result<Vec<StoredReview>, StoreError> {
        let rows = sqlx::query_as::<_, RawReview>(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews \
             ORDER BY created_at DESC, id DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(normalize_review).collect())
    }

    async fn summary(
        &self,
        provider_id: Option<i64>,
        since: DateTime<Utc>,
    ) -> Result<SummaryRow, StoreError> {
        // jsonb_typeof guard: rows predating the photos normalization may
        // hold non-array JSON.
        let row = sqlx::query(
            "SELECT COUNT(*) AS count, \
                    AVG(rating)::float8 AS avg_rating, \
                    COALESCE(SUM(CASE WHEN jsonb_typeof(photos) = 'array' \
                                       AND jsonb_array_length(photos) > 0 \
                                      THEN 1 ELSE 0 END), 0) AS with_photos \
             FROM reviews \
             WHERE created_at >= $1 AND ($2::bigint IS NULL OR provider_id = $2)",
        )
        .bind(since)
        .bind(provider_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(SummaryRow {
            count: row.try_get("count").map_err(StoreError::from)?,
            avg_rating: row.try_get("avg_rating").map_err(StoreError::from)?,
            with_photos: row.try_get("with_photos").map_err(StoreError::from)?,
        })
    }

    async fn replace_photos(
        &self,
        id: i64,
        photos: &[String],
        at: DateTime<Utc>,
    ) -> Result<Option<StoredReview>, StoreError> {
        let row = sqlx::query_as::<_, RawReview>(&format!(
            "UPDATE reviews SET photos = $2, updated_at = $3 WHERE id = $1 \
             RETURNING {REVIEW_COLUMNS}"
        ))
        .bind(id)
        .bind(json!(photos))
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(normalize_review))
    }

    async fn profile(&self, user_id: i64) -> Result<Option<ProfileRow>, StoreError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            "SELECT first_name, last_name, avatar_url FROM user_profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
