//! # Identity Resolver
//!
//! Reviews display a human name and avatar, but that data lives in another
//! system of record. Resolution walks an ordered list of strategies and
//! stops at the first usable identity:
//!
//! 1. Denormalized name already on the stored row (read paths short-circuit
//!    before calling in here).
//! 2. [`ProfileJoin`] — local lookup into the external profile table.
//! 3. [`RemoteIdentity`] — HTTP call to the identity service, bounded by a
//!    hard deadline so one slow dependency cannot stall a submission.
//! 4. The `"Usuario"` placeholder.
//!
//! Resolution is total: strategy failures are logged and swallowed, never
//! surfaced to the caller.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::time::timeout;
use tracing::warn;

use crate::store::ReviewStore;

pub const PLACEHOLDER_NAME: &str = "Usuario";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayIdentity {
    pub name: String,
    pub avatar: Option<String>,
}

impl DisplayIdentity {
    pub fn placeholder() -> Self {
        Self {
            name: PLACEHOLDER_NAME.to_string(),
            avatar: None,
        }
    }

    pub fn is_placeholder(name: &str) -> bool {
        let trimmed = name.trim();
        trimmed.is_empty() || trimmed == PLACEHOLDER_NAME
    }
}

/// One resolution tier. `attempt` returning `None` means "unresolved, try
/// the next tier" — strategies must not error.
#[async_trait]
pub trait ResolveStrategy: Send + Sync {
    fn label(&self) -> &'static str;

    /// Strategies that perform network I/O report a deadline; the engine
    /// wraps their attempt in it.
    fn deadline(&self) -> Option<Duration> {
        None
    }

    async fn attempt(&self, user_id: i64, credential: Option<&str>) -> Option<DisplayIdentity>;
}

pub struct IdentityResolver {
    strategies: Vec<Box<dyn ResolveStrategy>>,
}

impl IdentityResolver {
    pub fn new(strategies: Vec<Box<dyn ResolveStrategy>>) -> Self {
        Self { strategies }
    }

    /// Always produces something displayable.
    pub async fn resolve(&self, user_id: i64, credential: Option<&str>) -> DisplayIdentity {
        for strategy in &self.strategies {
            let outcome = match strategy.deadline() {
                Some(limit) => match timeout(limit, strategy.attempt(user_id, credential)).await {
                    Ok(found) => found,
                    Err(_) => {
                        warn!(
                            strategy = strategy.label(),
                            user_id, "identity lookup timed out"
                        );
                        None
                    }
                },
                None => strategy.attempt(user_id, credential).await,
            };

            if let Some(identity) = outcome {
                if !DisplayIdentity::is_placeholder(&identity.name) {
                    return identity;
                }
            }
        }

        DisplayIdentity::placeholder()
    }
}

fn identity_from_parts(
    first: Option<&str>,
    last: Option<&str>,
    avatar: Option<String>,
) -> Option<DisplayIdentity> {
    let name = format!("{} {}", first.unwrap_or(""), last.unwrap_or(""))
        .trim()
        .to_string();
    if name.is_empty() {
        return None;
    }

    Some(DisplayIdentity {
        name,
        avatar: avatar.filter(|a| !a.trim().is_empty()),
    })
}

/// Tier 2: join against the external profile table through the store.
pub struct ProfileJoin {
    store: Arc<dyn ReviewStore>,
}

impl ProfileJoin {
    pub fn new(store: Arc<dyn ReviewStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ResolveStrategy for ProfileJoin {
    fn label(&self) -> &'static str {
        "profile-join"
    }

    async fn attempt(&self, user_id: i64, _credential: Option<&str>) -> Option<DisplayIdentity> {
        let profile = match self.store.profile(user_id).await {
            Ok(found) => found?,
            Err(e) => {
                warn!(user_id, error = %e, "profile join unavailable");
                return None;
            }
        };

        identity_from_parts(
            profile.first_name.as_deref().map(str::trim),
            profile.last_name.as_deref().map(str::trim),
            profile.avatar_url,
        )
    }
}

/// Identity service body: profile fields either nested under `profile` or
/// at the top level.
#[derive(Deserialize)]
struct RemoteUser {
    profile: Option<RemoteProfile>,
    first_name: Option<String>,
    last_name: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Deserialize)]
struct RemoteProfile {
    first_name: Option<String>,
    last_name: Option<String>,
    avatar_url: Option<String>,
}

fn identity_from_remote(user: RemoteUser) -> Option<DisplayIdentity> {
    if let Some(profile) = user.profile {
        return identity_from_parts(
            profile.first_name.as_deref().map(str::trim),
            profile.last_name.as_deref().map(str::trim),
            profile.avatar_url,
        );
    }

    identity_from_parts(
        user.first_name.as_deref().map(str::trim),
        user.last_name.as_deref().map(str::trim),
        user.avatar_url,
    )
}

/// Tier 3: remote identity service, credential passed through verbatim.
pub struct RemoteIdentity {
    http: Client,
    base_url: String,
    deadline: Duration,
}

impl RemoteIdentity {
    pub fn new(base_url: String, deadline: Duration) -> Self {
        let http = Client::builder()
            .timeout(deadline)
            .build()
            .expect("HTTP client misconfigured!");

        Self {
            http,
            base_url,
            deadline,
        }
    }
}

#[async_trait]
impl ResolveStrategy for RemoteIdentity {
    fn label(&self) -> &'static str {
        "remote-identity"
    }

    fn deadline(&self) -> Option<Duration> {
        Some(self.deadline)
    }

    async fn attempt(&self, user_id: i64, credential: Option<&str>) -> Option<DisplayIdentity> {
        let url = format!("{}/users/{}", self.base_url.trim_end_matches('/'), user_id);

        let mut request = self.http.get(&url);
        if let Some(token) = credential {
            request = request.bearer_auth(token);
        }

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(user_id, error = %e, "identity service unreachable");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(user_id, status = %response.status(), "identity service refused lookup");
            return None;
        }

        match response.json::<RemoteUser>().await {
            Ok(user) => identity_from_remote(user),
            Err(e) => {
                warn!(user_id, error = %e, "identity service body unreadable");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    struct Fixed(Option<DisplayIdentity>);

    #[async_trait]
    impl ResolveStrategy for Fixed {
        fn label(&self) -> &'static str {
            "fixed"
        }

        async fn attempt(&self, _: i64, _: Option<&str>) -> Option<DisplayIdentity> {
            self.0.clone()
        }
    }

    struct Slow;

    #[async_trait]
    impl ResolveStrategy for Slow {
        fn label(&self) -> &'static str {
            "slow"
        }

        fn deadline(&self) -> Option<Duration> {
            Some(Duration::from_secs(3))
        }

        async fn attempt(&self, _: i64, _: Option<&str>) -> Option<DisplayIdentity> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Some(DisplayIdentity {
                name: "Too Late".to_string(),
                avatar: None,
            })
        }
    }

    fn named(name: &str) -> DisplayIdentity {
        DisplayIdentity {
            name: name.to_string(),
            avatar: None,
        }
    }

    #[tokio::test]
    async fn empty_chain_falls_back_to_the_placeholder() {
        let resolver = IdentityResolver::new(Vec::new());
        assert_eq!(resolver.resolve(1, None).await, DisplayIdentity::placeholder());
    }

    #[tokio::test]
    async fn first_usable_identity_wins() {
        let resolver = IdentityResolver::new(vec![
            Box::new(Fixed(None)),
            Box::new(Fixed(Some(named("  ")))),
            Box::new(Fixed(Some(named("Ana García")))),
            Box::new(Fixed(Some(named("Never Reached")))),
        ]);

        assert_eq!(resolver.resolve(1, None).await, named("Ana García"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_strategies_are_cut_off_at_their_deadline() {
        let resolver = IdentityResolver::new(vec![Box::new(Slow)]);
        assert_eq!(resolver.resolve(1, None).await, DisplayIdentity::placeholder());
    }

    #[test]
    fn placeholder_detection_covers_blank_and_literal() {
        assert!(DisplayIdentity::is_placeholder(""));
        assert!(DisplayIdentity::is_placeholder("  "));
        assert!(DisplayIdentity::is_placeholder("Usuario"));
        assert!(!DisplayIdentity::is_placeholder("Ana"));
    }

    #[test]
    fn remote_body_parses_nested_and_flat_shapes() {
        let nested: RemoteUser = serde_json::from_value(json!({
            "profile": { "first_name": "Ana", "last_name": "García", "avatar_url": "https://cdn.example/a.png" }
        }))
        .unwrap();
        let identity = identity_from_remote(nested).unwrap();
        assert_eq!(identity.name, "Ana García");
        assert_eq!(identity.avatar.as_deref(), Some("https://cdn.example/a.png"));

        let flat: RemoteUser = serde_json::from_value(json!({
            "first_name": "Bruno", "last_name": "", "avatar_url": null
        }))
        .unwrap();
        let identity = identity_from_remote(flat).unwrap();
        assert_eq!(identity.name, "Bruno");
        assert_eq!(identity.avatar, None);
    }

    #[test]
    fn blank_remote_names_stay_unresolved() {
        let empty: RemoteUser = serde_json::from_value(json!({
            "profile": { "first_name": " ", "last_name": null }
        }))
        .unwrap();
        assert!(identity_from_remote(empty).is_none());
    }
}
