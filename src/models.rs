use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How the user reached out to the provider before reviewing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Whatsapp,
    Form,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Whatsapp => "whatsapp",
            Channel::Form => "form",
        }
    }

    pub fn parse(value: &str) -> Channel {
        if value == "whatsapp" {
            Channel::Whatsapp
        } else {
            Channel::Form
        }
    }
}

/// A record that a user attempted to reach a provider. Gates review
/// eligibility; never deleted.
#[derive(Debug, Clone, Serialize)]
pub struct ContactIntent {
    pub id: Uuid,
    pub user_id: i64,
    pub provider_id: i64,
    pub channel: Channel,
    pub message_preview: Option<String>,
    pub provider_responded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A review as it leaves the store: photos are always a concrete list and
/// `user_name` is never empty.
#[derive(Debug, Clone, Serialize)]
pub struct StoredReview {
    pub id: i64,
    pub user_id: i64,
    pub provider_id: i64,
    pub rating: i16,
    pub comment: Option<String>,
    pub photos: Vec<String>,
    pub user_name: String,
    pub user_avatar: Option<String>,
    pub verified: bool,
    pub flagged: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Review row as the backing store holds it. Columns written before the
/// identity denormalization existed may carry NULL or malformed values, so
/// everything display-facing is optional here and goes through
/// [`crate::store::normalize_review`] on the way out.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RawReview {
    pub id: i64,
    pub user_id: i64,
    pub provider_id: i64,
    pub rating: i16,
    pub comment: Option<String>,
    pub photos: Option<serde_json::Value>,
    pub user_name: Option<String>,
    pub user_avatar: Option<String>,
    pub verified: bool,
    pub flagged: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Accepted submission, enriched and ready to persist.
#[derive(Debug, Clone)]
pub struct NewReview {
    pub user_id: i64,
    pub provider_id: i64,
    pub rating: i16,
    pub comment: Option<String>,
    pub photos: Vec<String>,
    pub user_name: String,
    pub user_avatar: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Rolling-window aggregate for one provider or the whole site.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub count: i64,
    pub avg_rating: f64,
    pub photos_rate: i64,
}

/// Caller identity as handed over by the upstream auth layer. The credential
/// is the raw bearer value, forwarded to the identity service but never
/// parsed here.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: i64,
    pub role: String,
    pub credential: Option<String>,
}

impl Caller {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateContactIntent {
    pub provider_id: i64,
    pub channel: Channel,
    pub message_preview: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateReview {
    pub provider_id: i64,
    pub rating: i16,
    pub comment: Option<String>,
    pub photos: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePhotos {
    pub photos: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::Channel;

    #[test]
    fn channel_round_trips_through_db_text() {
        assert_eq!(Channel::parse(Channel::Whatsapp.as_str()), Channel::Whatsapp);
        assert_eq!(Channel::parse(Channel::Form.as_str()), Channel::Form);
    }

    #[test]
    fn channel_deserializes_lowercase() {
        let c: Channel = serde_json::from_str("\"whatsapp\"").unwrap();
        assert_eq!(c, Channel::Whatsapp);
    }
}
