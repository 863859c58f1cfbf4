//! # Review Store & Aggregator
//!
//! Orchestrates the submission flow (gate → identity enrichment → persist)
//! and the read side (listings, rolling summaries, recent feed). The display
//! identity is denormalized onto the row at write time; read paths only
//! re-resolve for rows still carrying the placeholder, and never write the
//! result back.

use chrono::Utc;
use url::Url;

use crate::eligibility::REVIEW_WINDOW_DAYS;
use crate::error::AppError;
use crate::identity::DisplayIdentity;
use crate::models::{Caller, CreateReview, NewReview, StoredReview, Summary};
use crate::state::AppState;
use crate::store::{InsertOutcome, SummaryRow, window_start};

pub const COMMENT_MAX: usize = 2000;
pub const PHOTOS_MAX: usize = 6;
pub const PAGE_LIMIT_DEFAULT: i64 = 20;
pub const PAGE_LIMIT_MAX: i64 = 100;
pub const RECENT_LIMIT: i64 = 10;
pub const SUMMARY_WINDOW_DAYS: i64 = 90;

pub async fn create_review(
    state: &AppState,
    caller: &Caller,
    payload: CreateReview,
) -> Result<StoredReview, AppError> {
    let now = Utc::now();
    let photos = payload.photos.unwrap_or_default();

    if let Some(comment) = &payload.comment {
        if comment.chars().count() > COMMENT_MAX {
            return Err(AppError::Validation(
                "comment demasiado largo (máx 2000)".to_string(),
            ));
        }
    }
    validate_photos(&photos)?;

    state
        .gate
        .evaluate(caller.user_id, payload.provider_id, payload.rating, now)
        .await?;

    // Resolve before persisting so the row lands enriched; a failed
    // resolution still yields the placeholder, never an error.
    let identity = state
        .resolver
        .resolve(caller.user_id, caller.credential.as_deref())
        .await;

    let review = NewReview {
        user_id: caller.user_id,
        provider_id: payload.provider_id,
        rating: payload.rating,
        comment: payload.comment,
        photos,
        user_name: identity.name,
        user_avatar: identity.avatar,
        created_at: now,
    };

    match state
        .store
        .insert_review(review, window_start(now, REVIEW_WINDOW_DAYS))
        .await?
    {
        InsertOutcome::Inserted(stored) => Ok(stored),
        InsertOutcome::RecentExists => Err(AppError::WindowLimit),
    }
}

pub async fn list_provider_reviews(
    state: &AppState,
    provider_id: i64,
    limit: Option<i64>,
    offset: Option<i64>,
) -> Result<(i64, Vec<StoredReview>), AppError> {
    let (limit, offset) = clamp_page(limit, offset);
    let (total, rows) = state
        .store
        .list_by_provider(provider_id, limit, offset)
        .await?;
    Ok((total, backfill_identities(state, rows).await))
}

pub async fn provider_summary(state: &AppState, provider_id: i64) -> Result<Summary, AppError> {
    summary(state, Some(provider_id)).await
}

pub async fn global_summary(state: &AppState) -> Result<Summary, AppError> {
    summary(state, None).await
}

async fn summary(state: &AppState, provider_id: Option<i64>) -> Result<Summary, AppError> {
    let since = window_start(Utc::now(), SUMMARY_WINDOW_DAYS);
    let row = state.store.summary(provider_id, since).await?;
    Ok(summarize(row))
}

pub async fn update_review_photos(
    state: &AppState,
    caller: &Caller,
    review_id: i64,
    photos: Vec<String>,
) -> Result<StoredReview, AppError> {
    validate_photos(&photos)?;

    let review = state
        .store
        .get_review(review_id)
        .await?
        .ok_or(AppError::ReviewNotFound)?;

    if review.user_id != caller.user_id && !caller.is_admin() {
        return Err(AppError::Forbidden);
    }

    let mut updated = state
        .store
        .replace_photos(review_id, &photos, Utc::now())
        .await?
        .ok_or(AppError::ReviewNotFound)?;

    // The response carries a fresh identity; the stored one is left as-is.
    let resolved = state
        .resolver
        .resolve(updated.user_id, caller.credential.as_deref())
        .await;
    if !DisplayIdentity::is_placeholder(&resolved.name) {
        updated.user_name = resolved.name;
        updated.user_avatar = resolved.avatar;
    }

    Ok(updated)
}

pub async fn recent_reviews(state: &AppState) -> Result<Vec<StoredReview>, AppError> {
    let rows = state.store.recent(RECENT_LIMIT).await?;
    Ok(backfill_identities(state, rows).await)
}

/// Best-effort display backfill for rows still carrying the placeholder.
/// Stored rows are not touched.
async fn backfill_identities(state: &AppState, mut rows: Vec<StoredReview>) -> Vec<StoredReview> {
    for review in &mut rows {
        if DisplayIdentity::is_placeholder(&review.user_name) {
            let resolved = state.resolver.resolve(review.user_id, None).await;
            review.user_name = resolved.name;
            if resolved.avatar.is_some() {
                review.user_avatar = resolved.avatar;
            }
        }
    }
    rows
}

pub fn validate_photos(photos: &[String]) -> Result<(), AppError> {
    if photos.len() > PHOTOS_MAX {
        return Err(AppError::Validation("Máximo 6 fotos".to_string()));
    }

    for photo in photos {
        Url::parse(photo)
            .map_err(|_| AppError::Validation(format!("URL de foto inválida: {photo}")))?;
    }

    Ok(())
}

pub fn clamp_page(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    let limit = limit.unwrap_or(PAGE_LIMIT_DEFAULT).clamp(1, PAGE_LIMIT_MAX);
    let offset = offset.unwrap_or(0).max(0);
    (limit, offset)
}

pub fn summarize(row: SummaryRow) -> Summary {
    let avg_rating = match row.avg_rating {
        Some(avg) if row.count > 0 => (avg * 10.0).round() / 10.0,
        _ => 0.0,
    };
    let photos_rate = if row.count > 0 {
        ((row.with_photos as f64 / row.count as f64) * 100.0).round() as i64
    } else {
        0
    };

    Summary {
        count: row.count,
        avg_rating,
        photos_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_math_matches_the_reference_numbers() {
        // ratings [5, 5, 4], photos on 2 of 3
        let s = summarize(SummaryRow {
            count: 3,
            avg_rating: Some(14.0 / 3.0),
            with_photos: 2,
        });
        assert_eq!(s, Summary { count: 3, avg_rating: 4.7, photos_rate: 67 });
    }

    #[test]
    fn empty_window_summarizes_to_zeroes() {
        let s = summarize(SummaryRow {
            count: 0,
            avg_rating: None,
            with_photos: 0,
        });
        assert_eq!(s, Summary { count: 0, avg_rating: 0.0, photos_rate: 0 });
    }

    #[test]
    fn page_bounds_are_clamped() {
        assert_eq!(clamp_page(None, None), (20, 0));
        assert_eq!(clamp_page(Some(500), Some(-3)), (100, 0));
        assert_eq!(clamp_page(Some(0), Some(40)), (1, 40));
    }

    #[test]
    fn photo_validation_enforces_count_and_shape() {
        let ok: Vec<String> = (0..6)
            .map(|i| format!("https://cdn.example/photo-{i}.jpg"))
            .collect();
        assert!(validate_photos(&ok).is_ok());

        let too_many: Vec<String> = (0..7)
            .map(|i| format!("https://cdn.example/photo-{i}.jpg"))
            .collect();
        assert!(matches!(
            validate_photos(&too_many),
            Err(AppError::Validation(_))
        ));

        let malformed = vec!["not a url".to_string()];
        assert!(matches!(
            validate_photos(&malformed),
            Err(AppError::Validation(_))
        ));
    }
}
