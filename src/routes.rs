use std::sync::Arc;

use axum::{
    Json,
    extract::{FromRequestParts, Path, Query, State},
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    contacts,
    error::AppError,
    models::{Caller, CreateContactIntent, CreateReview, UpdatePhotos},
    reviews,
    state::AppState,
};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// The auth layer in front of this service verifies the token and forwards
/// the caller as headers; the raw bearer value rides along untouched for the
/// identity service.
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parse_caller(
            parts
                .headers
                .get(USER_ID_HEADER)
                .and_then(|v| v.to_str().ok()),
            parts
                .headers
                .get(USER_ROLE_HEADER)
                .and_then(|v| v.to_str().ok()),
            parts
                .headers
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok()),
        )
    }
}

pub fn parse_caller(
    user_id: Option<&str>,
    role: Option<&str>,
    authorization: Option<&str>,
) -> Result<Caller, AppError> {
    let credential = authorization
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(str::to_string);
    if credential.is_none() {
        return Err(AppError::MissingToken);
    }

    let user_id = user_id
        .and_then(|v| v.parse::<i64>().ok())
        .ok_or(AppError::InvalidToken)?;

    Ok(Caller {
        user_id,
        role: role.unwrap_or("user").to_string(),
        credential,
    })
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn create_contact_handler(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(payload): Json<CreateContactIntent>,
) -> Result<impl IntoResponse, AppError> {
    let intent = contacts::create_contact_intent(&state, &caller, payload).await?;
    Ok((StatusCode::CREATED, Json(json!({ "contactIntent": intent }))))
}

pub async fn contact_responded_handler(
    State(state): State<Arc<AppState>>,
    _caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let intent = contacts::mark_responded(&state, id).await?;
    Ok(Json(json!({ "contactIntent": intent })))
}

pub async fn create_review_handler(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(payload): Json<CreateReview>,
) -> Result<impl IntoResponse, AppError> {
    let review = reviews::create_review(&state, &caller, payload).await?;
    Ok((StatusCode::CREATED, Json(json!({ "review": review }))))
}

pub async fn update_photos_handler(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<i64>,
    Json(payload): Json<UpdatePhotos>,
) -> Result<impl IntoResponse, AppError> {
    let review = reviews::update_review_photos(&state, &caller, id, payload.photos).await?;
    Ok(Json(json!({ "review": review })))
}

pub async fn provider_reviews_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (count, items) =
        reviews::list_provider_reviews(&state, id, page.limit, page.offset).await?;
    Ok(Json(json!({ "count": count, "items": items })))
}

pub async fn provider_summary_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let summary = reviews::provider_summary(&state, id).await?;
    Ok(Json(json!({ "summary": summary })))
}

pub async fn global_summary_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let summary = reviews::global_summary(&state).await?;
    Ok(Json(json!({ "summary": summary })))
}

pub async fn recent_reviews_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let items = reviews::recent_reviews(&state).await?;
    Ok(Json(json!({ "items": items })))
}

pub async fn health_handler() -> impl IntoResponse {
    Json(json!({ "ok": true, "service": "reviews-service" }))
}

pub async fn ready_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.store.ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "ok": true }))),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "ok": false }))),
    }
}

#[cfg(test)]
mod tests {
    use super::parse_caller;
    use crate::error::AppError;

    #[test]
    fn caller_needs_a_bearer_token() {
        let err = parse_caller(Some("7"), Some("user"), None).unwrap_err();
        assert!(matches!(err, AppError::MissingToken));

        let err = parse_caller(Some("7"), Some("user"), Some("Basic abc")).unwrap_err();
        assert!(matches!(err, AppError::MissingToken));
    }

    #[test]
    fn caller_carries_the_raw_credential_through() {
        let caller = parse_caller(Some("7"), Some("admin"), Some("Bearer tok-123")).unwrap();
        assert_eq!(caller.user_id, 7);
        assert!(caller.is_admin());
        assert_eq!(caller.credential.as_deref(), Some("tok-123"));
    }

    #[test]
    fn missing_or_garbled_user_id_is_invalid() {
        let err = parse_caller(None, None, Some("Bearer tok")).unwrap_err();
        assert!(matches!(err, AppError::InvalidToken));

        let err = parse_caller(Some("not-a-number"), None, Some("Bearer tok")).unwrap_err();
        assert!(matches!(err, AppError::InvalidToken));
    }
}
