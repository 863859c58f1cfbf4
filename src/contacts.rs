//! Contact Ledger: records that a user reached out to a provider. Review
//! eligibility later asks it "did this pair talk recently?".

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Caller, ContactIntent, CreateContactIntent};
use crate::state::AppState;
use crate::store::{ReviewStore, StoreError, window_start};

pub const MESSAGE_PREVIEW_MAX: usize = 160;

pub async fn create_contact_intent(
    state: &AppState,
    caller: &Caller,
    payload: CreateContactIntent,
) -> Result<ContactIntent, AppError> {
    if let Some(preview) = &payload.message_preview {
        if preview.chars().count() > MESSAGE_PREVIEW_MAX {
            return Err(AppError::Validation(
                "messagePreview demasiado largo (máx 160)".to_string(),
            ));
        }
    }

    let intent = ContactIntent {
        id: Uuid::new_v4(),
        user_id: caller.user_id,
        provider_id: payload.provider_id,
        channel: payload.channel,
        message_preview: payload.message_preview,
        provider_responded_at: None,
        created_at: Utc::now(),
    };

    Ok(state.store.insert_contact(intent).await?)
}

/// Overwrites the response timestamp even when already set.
pub async fn mark_responded(state: &AppState, id: Uuid) -> Result<ContactIntent, AppError> {
    state
        .store
        .mark_responded(id, Utc::now())
        .await?
        .ok_or(AppError::ContactIntentNotFound)
}

/// True iff at least one intent for the pair falls inside the trailing
/// window. Pure read.
pub async fn has_recent_contact(
    store: &dyn ReviewStore,
    user_id: i64,
    provider_id: i64,
    window_days: i64,
    now: DateTime<Utc>,
) -> Result<bool, StoreError> {
    let since = window_start(now, window_days);
    let count = store
        .count_recent_contacts(user_id, provider_id, since)
        .await?;
    Ok(count > 0)
}
