//! # Eligibility Gate
//!
//! Decides whether a review submission is accepted before anything touches
//! the store's write path. Two independent 30-day windows apply, both
//! measured backward from the submission time: the user must have contacted
//! the provider recently AND must not have reviewed them recently. The
//! windows are not coupled to each other.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::contacts::has_recent_contact;
use crate::error::AppError;
use crate::store::{ReviewStore, window_start};

pub const CONTACT_WINDOW_DAYS: i64 = 30;
pub const REVIEW_WINDOW_DAYS: i64 = 30;

pub struct EligibilityGate {
    store: Arc<dyn ReviewStore>,
    /// Injected once at construction; never re-read from the environment.
    require_contact_intent: bool,
}

impl EligibilityGate {
    pub fn new(store: Arc<dyn ReviewStore>, require_contact_intent: bool) -> Self {
        Self {
            store,
            require_contact_intent,
        }
    }

    pub async fn evaluate(
        &self,
        user_id: i64,
        provider_id: i64,
        rating: i16,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if !(1..=5).contains(&rating) {
            return Err(AppError::BadRating);
        }

        if self.require_contact_intent {
            let contacted = has_recent_contact(
                self.store.as_ref(),
                user_id,
                provider_id,
                CONTACT_WINDOW_DAYS,
                now,
            )
            .await?;
            if !contacted {
                return Err(AppError::NoContactIntent);
            }
        }

        let since = window_start(now, REVIEW_WINDOW_DAYS);
        let recent_reviews = self
            .store
            .count_recent_reviews(user_id, provider_id, since)
            .await?;
        if recent_reviews > 0 {
            return Err(AppError::WindowLimit);
        }

        Ok(())
    }
}
