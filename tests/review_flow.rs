//! End-to-end submission and read flows over the in-memory backend.

use std::sync::Arc;

use chrono::{Duration, Utc};

use reviews_service::config::{Config, StoreBackend};
use reviews_service::contacts;
use reviews_service::error::AppError;
use reviews_service::models::{Caller, Channel, CreateContactIntent, CreateReview, NewReview};
use reviews_service::reviews;
use reviews_service::state::AppState;
use reviews_service::store::memory::MemoryStore;
use reviews_service::store::{ProfileRow, ReviewStore};

fn test_config(require_contact_intent: bool) -> Config {
    Config {
        port: 0,
        store_backend: StoreBackend::Memory,
        database_url: String::new(),
        require_contact_intent,
        identity_api_url: None,
        identity_timeout_ms: 3000,
    }
}

fn test_state(require_contact_intent: bool) -> (Arc<AppState>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::assemble(test_config(require_contact_intent), store.clone());
    (Arc::new(state), store)
}

fn caller(user_id: i64, role: &str) -> Caller {
    Caller {
        user_id,
        role: role.to_string(),
        credential: Some("tok".to_string()),
    }
}

fn submission(provider_id: i64, rating: i16) -> CreateReview {
    CreateReview {
        provider_id,
        rating,
        comment: Some("Excelente servicio".to_string()),
        photos: None,
    }
}

async fn record_contact(state: &AppState, user_id: i64, provider_id: i64) {
    contacts::create_contact_intent(
        state,
        &caller(user_id, "user"),
        CreateContactIntent {
            provider_id,
            channel: Channel::Whatsapp,
            message_preview: Some("Hola, necesito un presupuesto".to_string()),
        },
    )
    .await
    .unwrap();
}

async fn backdated_review(
    store: &MemoryStore,
    user_id: i64,
    provider_id: i64,
    rating: i16,
    age_days: i64,
    photos: Vec<String>,
) {
    let created_at = Utc::now() - Duration::days(age_days);
    store
        .insert_review(
            NewReview {
                user_id,
                provider_id,
                rating,
                comment: None,
                photos,
                user_name: "Ana".to_string(),
                user_avatar: None,
                created_at,
            },
            created_at - Duration::days(1),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn accepted_submission_lands_enriched() {
    let (state, store) = test_state(true);
    store.seed_profile(
        7,
        ProfileRow {
            first_name: Some("Ana".to_string()),
            last_name: Some("García".to_string()),
            avatar_url: Some("https://cdn.example/ana.png".to_string()),
        },
    );

    record_contact(&state, 7, 42).await;

    let review = reviews::create_review(&state, &caller(7, "user"), submission(42, 5))
        .await
        .unwrap();

    assert_eq!(review.rating, 5);
    assert_eq!(review.user_name, "Ana García");
    assert_eq!(review.user_avatar.as_deref(), Some("https://cdn.example/ana.png"));
    assert!(review.photos.is_empty());

    // identity is on the stored row, not just the response
    let stored = store.get_review(review.id).await.unwrap().unwrap();
    assert_eq!(stored.user_name, "Ana García");
}

#[tokio::test]
async fn unknown_users_land_with_the_placeholder() {
    let (state, store) = test_state(true);
    record_contact(&state, 9, 42).await;

    let review = reviews::create_review(&state, &caller(9, "user"), submission(42, 4))
        .await
        .unwrap();

    assert_eq!(review.user_name, "Usuario");
    assert_eq!(review.user_avatar, None);

    let stored = store.get_review(review.id).await.unwrap().unwrap();
    assert_eq!(stored.user_name, "Usuario");
}

#[tokio::test]
async fn bad_rating_persists_nothing() {
    let (state, store) = test_state(true);
    record_contact(&state, 7, 42).await;

    for rating in [0, 6, -2] {
        let err = reviews::create_review(&state, &caller(7, "user"), submission(42, rating))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRating));
    }

    let (total, _) = store.list_by_provider(42, 10, 0).await.unwrap();
    assert_eq!(total, 0);
}

#[tokio::test]
async fn submission_without_recent_contact_is_denied() {
    let (state, _) = test_state(true);

    let err = reviews::create_review(&state, &caller(7, "user"), submission(42, 5))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NoContactIntent));
}

#[tokio::test]
async fn disabling_enforcement_lets_uncontacted_users_through() {
    let (state, _) = test_state(false);

    let review = reviews::create_review(&state, &caller(7, "user"), submission(42, 5))
        .await
        .unwrap();
    assert_eq!(review.provider_id, 42);
}

#[tokio::test]
async fn one_review_per_pair_per_window() {
    let (state, store) = test_state(true);
    record_contact(&state, 7, 42).await;
    backdated_review(&store, 7, 42, 4, 10, Vec::new()).await;

    let err = reviews::create_review(&state, &caller(7, "user"), submission(42, 5))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::WindowLimit));
}

#[tokio::test]
async fn window_reopens_after_thirty_one_days() {
    let (state, store) = test_state(true);
    record_contact(&state, 7, 42).await;
    backdated_review(&store, 7, 42, 4, 31, Vec::new()).await;

    let review = reviews::create_review(&state, &caller(7, "user"), submission(42, 5))
        .await
        .unwrap();
    assert_eq!(review.rating, 5);
}

#[tokio::test]
async fn photo_updates_are_owner_or_admin_only() {
    let (state, store) = test_state(true);
    record_contact(&state, 7, 42).await;
    let review = reviews::create_review(&state, &caller(7, "user"), submission(42, 5))
        .await
        .unwrap();

    let photos = vec!["https://cdn.example/after.jpg".to_string()];

    let err =
        reviews::update_review_photos(&state, &caller(8, "user"), review.id, photos.clone())
            .await
            .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let by_owner =
        reviews::update_review_photos(&state, &caller(7, "user"), review.id, photos.clone())
            .await
            .unwrap();
    assert_eq!(by_owner.photos, photos);

    let by_admin = reviews::update_review_photos(
        &state,
        &caller(99, "admin"),
        review.id,
        Vec::new(),
    )
    .await
    .unwrap();
    assert!(by_admin.photos.is_empty());

    let stored = store.get_review(review.id).await.unwrap().unwrap();
    assert!(stored.photos.is_empty());
}

#[tokio::test]
async fn photo_updates_on_unknown_reviews_are_404() {
    let (state, _) = test_state(true);
    let err = reviews::update_review_photos(&state, &caller(7, "user"), 12345, Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ReviewNotFound));
}

#[tokio::test]
async fn provider_summary_matches_reference_numbers() {
    let (state, store) = test_state(true);
    let photo = vec!["https://cdn.example/p.jpg".to_string()];

    backdated_review(&store, 1, 42, 5, 2, photo.clone()).await;
    backdated_review(&store, 2, 42, 5, 4, photo).await;
    backdated_review(&store, 3, 42, 4, 6, Vec::new()).await;
    // outside the 90-day window, must not count
    backdated_review(&store, 4, 42, 1, 120, Vec::new()).await;
    // other provider, must not count
    backdated_review(&store, 5, 43, 1, 2, Vec::new()).await;

    let summary = reviews::provider_summary(&state, 42).await.unwrap();
    assert_eq!(summary.count, 3);
    assert_eq!(summary.avg_rating, 4.7);
    assert_eq!(summary.photos_rate, 67);
}

#[tokio::test]
async fn empty_summary_is_all_zeroes() {
    let (state, _) = test_state(true);
    let summary = reviews::provider_summary(&state, 42).await.unwrap();
    assert_eq!(summary.count, 0);
    assert_eq!(summary.avg_rating, 0.0);
    assert_eq!(summary.photos_rate, 0);
}

#[tokio::test]
async fn global_summary_spans_providers() {
    let (state, store) = test_state(true);
    backdated_review(&store, 1, 42, 5, 2, Vec::new()).await;
    backdated_review(&store, 2, 43, 3, 2, Vec::new()).await;

    let summary = reviews::global_summary(&state).await.unwrap();
    assert_eq!(summary.count, 2);
    assert_eq!(summary.avg_rating, 4.0);
}

#[tokio::test]
async fn listing_is_newest_first_and_backfills_display_names() {
    let (state, store) = test_state(true);
    store.seed_profile(
        2,
        ProfileRow {
            first_name: Some("Bruno".to_string()),
            last_name: Some("Díaz".to_string()),
            avatar_url: None,
        },
    );

    backdated_review(&store, 1, 42, 5, 5, Vec::new()).await;
    backdated_review(&store, 3, 42, 3, 1, Vec::new()).await;

    // a row persisted before enrichment existed: placeholder at rest
    let created_at = Utc::now() - Duration::days(3);
    store
        .insert_review(
            NewReview {
                user_id: 2,
                provider_id: 42,
                rating: 4,
                comment: None,
                photos: Vec::new(),
                user_name: String::new(),
                user_avatar: None,
                created_at,
            },
            created_at - Duration::days(1),
        )
        .await
        .unwrap();

    let (count, items) = reviews::list_provider_reviews(&state, 42, Some(20), Some(0))
        .await
        .unwrap();
    assert_eq!(count, 3);

    let users: Vec<i64> = items.iter().map(|r| r.user_id).collect();
    assert_eq!(users, vec![3, 2, 1]);

    // backfilled for display...
    assert_eq!(items[1].user_name, "Bruno Díaz");
    // ...but the stored row still holds the placeholder
    let stored = store.get_review(items[1].id).await.unwrap().unwrap();
    assert_eq!(stored.user_name, "Usuario");
}

#[tokio::test]
async fn recent_feed_crosses_providers_newest_first() {
    let (state, store) = test_state(true);
    backdated_review(&store, 1, 42, 5, 3, Vec::new()).await;
    backdated_review(&store, 2, 43, 4, 1, Vec::new()).await;
    backdated_review(&store, 3, 44, 3, 2, Vec::new()).await;

    let items = reviews::recent_reviews(&state).await.unwrap();
    let users: Vec<i64> = items.iter().map(|r| r.user_id).collect();
    assert_eq!(users, vec![2, 3, 1]);
}

#[tokio::test]
async fn oversized_payloads_are_rejected_before_the_gate() {
    let (state, _) = test_state(true);

    let mut too_many_photos = submission(42, 5);
    too_many_photos.photos = Some(
        (0..7)
            .map(|i| format!("https://cdn.example/{i}.jpg"))
            .collect(),
    );
    let err = reviews::create_review(&state, &caller(7, "user"), too_many_photos)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let mut long_comment = submission(42, 5);
    long_comment.comment = Some("x".repeat(2001));
    let err = reviews::create_review(&state, &caller(7, "user"), long_comment)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}
