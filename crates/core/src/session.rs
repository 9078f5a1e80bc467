//! Session state for one application instance.
//!
//! [`SessionManager`] is an explicitly owned object: construct it once per
//! application context and hand clones to whatever needs the current
//! credentials. There is no process-wide singleton, so test cases get
//! fully isolated sessions.
//!
//! Every mutating operation writes through to the durable store before the
//! in-memory snapshot is published, so a restart immediately after any
//! mutation observes the same state.

use crate::error::CoreResult;
use crate::storage::KeyValueStore;
use crate::types::User;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const USER_KEY: &str = "user";

/// Point-in-time session snapshot.
///
/// Authenticated iff all three fields are present; mutations replace the
/// whole snapshot so observers never see a partially-populated state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub user: Option<User>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some() && self.access_token.is_some() && self.refresh_token.is_some()
    }
}

/// Owns the current session and its durable mirror.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn KeyValueStore>,
    state: Arc<watch::Sender<Session>>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        let (state, _) = watch::channel(Session::default());
        Self {
            store,
            state: Arc::new(state),
        }
    }

    /// Establish an authenticated session. Token contents are opaque and
    /// trusted as given.
    pub async fn login(
        &self,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        user: User,
    ) -> CoreResult<()> {
        let access_token = access_token.into();
        let refresh_token = refresh_token.into();

        self.store.set(ACCESS_TOKEN_KEY, &access_token).await?;
        self.store.set(REFRESH_TOKEN_KEY, &refresh_token).await?;
        self.store
            .set(USER_KEY, &serde_json::to_string(&user)?)
            .await?;

        info!(email = %user.email, "session established");
        self.state.send_replace(Session {
            user: Some(user),
            access_token: Some(access_token),
            refresh_token: Some(refresh_token),
        });
        Ok(())
    }

    /// Tear the session down: delete the durable entries and publish the
    /// empty snapshot. Future authenticated requests fail fast on first
    /// use instead of on a network call.
    pub async fn logout(&self) -> CoreResult<()> {
        self.store.delete(ACCESS_TOKEN_KEY).await?;
        self.store.delete(REFRESH_TOKEN_KEY).await?;
        self.store.delete(USER_KEY).await?;

        info!("session cleared");
        self.state.send_replace(Session::default());
        Ok(())
    }

    /// Restore a previously persisted session. Returns `false` and leaves
    /// the state unauthenticated when any of the three entries is missing.
    /// Call once at startup, before the first authenticated request.
    pub async fn load_from_storage(&self) -> CoreResult<bool> {
        let access_token = self.store.get(ACCESS_TOKEN_KEY).await?;
        let refresh_token = self.store.get(REFRESH_TOKEN_KEY).await?;
        let user_json = self.store.get(USER_KEY).await?;

        let (Some(access_token), Some(refresh_token), Some(user_json)) =
            (access_token, refresh_token, user_json)
        else {
            debug!("no complete session in storage");
            return Ok(false);
        };

        let user: User = serde_json::from_str(&user_json)?;
        info!(email = %user.email, "session restored from storage");
        self.state.send_replace(Session {
            user: Some(user),
            access_token: Some(access_token),
            refresh_token: Some(refresh_token),
        });
        Ok(true)
    }

    /// Replace the user snapshot and re-persist it; tokens are untouched.
    pub async fn update_user(&self, user: User) -> CoreResult<()> {
        self.store
            .set(USER_KEY, &serde_json::to_string(&user)?)
            .await?;

        debug!(email = %user.email, "user profile updated");
        self.state.send_modify(|session| session.user = Some(user));
        Ok(())
    }

    /// Apply a renewed token pair from the refresh endpoint; the user is
    /// kept as-is.
    pub async fn apply_refreshed_tokens(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> CoreResult<()> {
        self.store.set(ACCESS_TOKEN_KEY, access_token).await?;
        self.store.set(REFRESH_TOKEN_KEY, refresh_token).await?;

        debug!("access token renewed");
        self.state.send_modify(|session| {
            session.access_token = Some(access_token.to_string());
            session.refresh_token = Some(refresh_token.to_string());
        });
        Ok(())
    }

    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.state.borrow().access_token.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.state.borrow().refresh_token.clone()
    }

    pub fn user(&self) -> Option<User> {
        self.state.borrow().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    /// Subscribe to session changes. The receiver yields a new snapshot on
    /// every login, logout, profile update, and token renewal.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    /// True unconditionally for a superadmin, else set membership in the
    /// user's permission keys, else false when unauthenticated.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.state
            .borrow()
            .user
            .as_ref()
            .is_some_and(|user| user.has_permission(permission))
    }

    /// Module-level counterpart of [`Self::has_permission`], derived from
    /// the user's security level.
    pub fn has_module(&self, module: &str) -> bool {
        self.state
            .borrow()
            .user
            .as_ref()
            .is_some_and(|user| user.has_module(module))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::storage::MemoryStore;
    use crate::storage::mock::MockKeyValueStore;
    use crate::types::SecurityLevel;
    use std::collections::HashSet;

    fn user() -> User {
        User {
            id: "7".into(),
            email: "ops@tenant.example".into(),
            full_name: "Ops Member".into(),
            tenant_id: Some(3),
            tenant_name: None,
            is_superadmin: false,
            photo_url: None,
            permissions: HashSet::from(["projects:read".to_string()]),
            security_level: Some(SecurityLevel {
                id: 1,
                name: "standard".into(),
                modules: HashSet::from(["projects".to_string()]),
            }),
        }
    }

    fn manager() -> (SessionManager, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (SessionManager::new(store.clone()), store)
    }

    #[tokio::test]
    async fn login_persists_before_publishing() {
        let (manager, store) = manager();
        assert!(!manager.is_authenticated());

        manager.login("a1", "r1", user()).await.unwrap();

        assert!(manager.is_authenticated());
        assert_eq!(manager.access_token().as_deref(), Some("a1"));
        assert_eq!(
            store.get(ACCESS_TOKEN_KEY).await.unwrap(),
            Some("a1".to_string())
        );
        assert_eq!(
            store.get(REFRESH_TOKEN_KEY).await.unwrap(),
            Some("r1".to_string())
        );
        let stored: User =
            serde_json::from_str(&store.get(USER_KEY).await.unwrap().unwrap()).unwrap();
        assert_eq!(stored, user());
    }

    #[tokio::test]
    async fn logout_leaves_no_residual_entries() {
        let (manager, store) = manager();
        manager.login("a1", "r1", user()).await.unwrap();

        manager.logout().await.unwrap();

        assert!(!manager.is_authenticated());
        assert_eq!(manager.snapshot(), Session::default());
        assert_eq!(store.get(ACCESS_TOKEN_KEY).await.unwrap(), None);
        assert_eq!(store.get(REFRESH_TOKEN_KEY).await.unwrap(), None);
        assert_eq!(store.get(USER_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn load_from_storage_requires_all_three_keys() {
        let (manager, store) = manager();
        store.set(ACCESS_TOKEN_KEY, "a1").await.unwrap();
        store.set(REFRESH_TOKEN_KEY, "r1").await.unwrap();

        assert!(!manager.load_from_storage().await.unwrap());
        assert!(!manager.is_authenticated());

        store
            .set(USER_KEY, r#"{"id":"7","email":"ops@tenant.example"}"#)
            .await
            .unwrap();

        assert!(manager.load_from_storage().await.unwrap());
        assert!(manager.is_authenticated());
        // Fields absent from the old record come back as defaults.
        let restored = manager.user().unwrap();
        assert_eq!(restored.full_name, "");
        assert!(!restored.is_superadmin);
        assert!(restored.permissions.is_empty());
    }

    #[tokio::test]
    async fn update_user_keeps_tokens() {
        let (manager, store) = manager();
        manager.login("a1", "r1", user()).await.unwrap();

        let mut renamed = user();
        renamed.full_name = "Renamed Member".into();
        manager.update_user(renamed.clone()).await.unwrap();

        assert_eq!(manager.user(), Some(renamed.clone()));
        assert_eq!(manager.access_token().as_deref(), Some("a1"));
        let stored: User =
            serde_json::from_str(&store.get(USER_KEY).await.unwrap().unwrap()).unwrap();
        assert_eq!(stored, renamed);
    }

    #[tokio::test]
    async fn refreshed_tokens_replace_both_credentials() {
        let (manager, store) = manager();
        manager.login("a1", "r1", user()).await.unwrap();

        manager.apply_refreshed_tokens("a2", "r2").await.unwrap();

        assert_eq!(manager.access_token().as_deref(), Some("a2"));
        assert_eq!(manager.refresh_token().as_deref(), Some("r2"));
        assert_eq!(manager.user(), Some(user()));
        assert_eq!(
            store.get(ACCESS_TOKEN_KEY).await.unwrap(),
            Some("a2".to_string())
        );
        assert_eq!(
            store.get(REFRESH_TOKEN_KEY).await.unwrap(),
            Some("r2".to_string())
        );
    }

    #[tokio::test]
    async fn permission_checks_are_false_when_unauthenticated() {
        let (manager, _) = manager();
        assert!(!manager.has_permission("projects:read"));
        assert!(!manager.has_module("projects"));

        manager.login("a1", "r1", user()).await.unwrap();
        assert!(manager.has_permission("projects:read"));
        assert!(!manager.has_permission("billing:write"));
        assert!(manager.has_module("projects"));
    }

    #[tokio::test]
    async fn subscribers_observe_session_transitions() {
        let (manager, _) = manager();
        let mut rx = manager.subscribe();

        manager.login("a1", "r1", user()).await.unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_authenticated());

        manager.logout().await.unwrap();
        rx.changed().await.unwrap();
        assert!(!rx.borrow().is_authenticated());
    }

    #[tokio::test]
    async fn storage_failure_leaves_state_unauthenticated() {
        let mut store = MockKeyValueStore::new();
        store
            .expect_set()
            .returning(|_, _| Err(CoreError::storage_error("disk full")));

        let manager = SessionManager::new(Arc::new(store));
        let result = manager.login("a1", "r1", user()).await;

        assert!(matches!(result, Err(CoreError::Storage { .. })));
        assert!(!manager.is_authenticated());
    }
}
