//! In-memory backend. A single mutex over the whole dataset keeps the
//! window re-check and insert atomic, which is the same guarantee the
//! Postgres backend gets from its advisory lock.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::models::{ContactIntent, NewReview, RawReview, StoredReview};

use super::{
    InsertOutcome, ProfileRow, ReviewStore, StoreError, SummaryRow, normalize_review,
};

#[derive(Default)]
struct Inner {
    contacts: Vec<ContactIntent>,
    reviews: Vec<StoredReview>,
    profiles: HashMap<i64, ProfileRow>,
    next_review_id: i64,
}

pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_review_id: 1,
                ..Inner::default()
            }),
        }
    }

    /// Seeds the external profile table stand-in.
    pub fn seed_profile(&self, user_id: i64, profile: ProfileRow) {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        inner.profiles.insert(user_id, profile);
    }
}

fn raw_from_new(id: i64, review: NewReview) -> RawReview {
    RawReview {
        id,
        user_id: review.user_id,
        provider_id: review.provider_id,
        rating: review.rating,
        comment: review.comment,
        photos: Some(json!(review.photos)),
        user_name: Some(review.user_name),
        user_avatar: review.user_avatar,
        verified: false,
        flagged: false,
        created_at: review.created_at,
        updated_at: review.created_at,
    }
}

fn newest_first(rows: &mut [StoredReview]) {
    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

#[async_trait]
impl ReviewStore for MemoryStore {
    async fn insert_contact(&self, intent: ContactIntent) -> Result<ContactIntent, StoreError> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        inner.contacts.push(intent.clone());
        Ok(intent)
    }

    async fn mark_responded(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<ContactIntent>, StoreError> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner.contacts.iter_mut().find(|c| c.id == id).map(|c| {
            c.provider_responded_at = Some(at);
            c.clone()
        }))
    }

    async fn count_recent_contacts(
        &self,
        user_id: i64,
        provider_id: i64,
        since: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner
            .contacts
            .iter()
            .filter(|c| {
                c.user_id == user_id && c.provider_id == provider_id && c.created_at >= since
            })
            .count() as i64)
    }

    async fn insert_review(
        &self,
        review: NewReview,
        window_start: DateTime<Utc>,
    ) -> Result<InsertOutcome, StoreError> {
        let mut inner = self.inner.lock().expect("store lock poisoned");

        let recent = inner.reviews.iter().any(|r| {
            r.user_id == review.user_id
                && r.provider_id == review.provider_id
                && r.created_at >= window_start
        });
        if recent {
            return Ok(InsertOutcome::RecentExists);
        }

        let id = inner.next_review_id;
        inner.next_review_id += 1;

        let stored = normalize_review(raw_from_new(id, review));
        inner.reviews.push(stored.clone());
        Ok(InsertOutcome::Inserted(stored))
    }

    async fn count_recent_reviews(
        &self,
        user_id: i64,
        provider_id: i64,
        since: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner
            .reviews
            .iter()
            .filter(|r| {
                r.user_id == user_id && r.provider_id == provider_id && r.created_at >= since
            })
            .count() as i64)
    }

    async fn get_review(&self, id: i64) -> Result<Option<StoredReview>, StoreError> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner.reviews.iter().find(|r| r.id == id).cloned())
    }

    async fn list_by_provider(
        &self,
        provider_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<StoredReview>), StoreError> {
        let inner = self.inner.lock().expect("store lock poisoned");

        let mut rows: Vec<StoredReview> = inner
            .reviews
            .iter()
            .filter(|r| r.provider_id == provider_id)
            .cloned()
            .collect();
        newest_first(&mut rows);

        let total = rows.len() as i64;
        let page = rows
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((total, page))
    }

    async fn recent(&self, limit: i64) -> Result<Vec<StoredReview>, StoreError> {
        let inner = self.inner.lock().expect("store lock poisoned");

        let mut rows: Vec<StoredReview> = inner.reviews.clone();
        newest_first(&mut rows);
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn summary(
        &self,
        provider_id: Option<i64>,
        since: DateTime<Utc>,
    ) -> Result<SummaryRow, StoreError> {
        let inner = self.inner.lock().expect("store lock poisoned");

        let rows: Vec<&StoredReview> = inner
            .reviews
            .iter()
            .filter(|r| {
                r.created_at >= since && provider_id.is_none_or(|p| r.provider_id == p)
            })
            .collect();

        let count = rows.len() as i64;
        let avg_rating = if count > 0 {
            Some(rows.iter().map(|r| f64::from(r.rating)).sum::<f64>() / count as f64)
        } else {
            None
        };
        let with_photos = rows.iter().filter(|r| !r.photos.is_empty()).count() as i64;

        Ok(SummaryRow {
            count,
            avg_rating,
            with_photos,
        })
    }

    async fn replace_photos(
        &self,
        id: i64,
        photos: &[String],
        at: DateTime<Utc>,
    ) -> Result<Option<StoredReview>, StoreError> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner.reviews.iter_mut().find(|r| r.id == id).map(|r| {
            r.photos = photos.to_vec();
            r.updated_at = at;
            r.clone()
        }))
    }

    async fn profile(&self, user_id: i64) -> Result<Option<ProfileRow>, StoreError> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner.profiles.get(&user_id).cloned())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
