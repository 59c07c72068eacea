//! Process-wide session state.
//!
//! The [`SessionStore`] is the only consumer of the provider's identity-change
//! channel. Every notification gets a sequence number in receipt order. A
//! sign-out applies immediately; a sign-in starts a profile fetch for the
//! identity's role. A fetch result is applied only if no newer notification
//! has arrived in the meantime, so a slow fetch never overwrites a newer
//! session. Superseded fetches are left to finish and their results dropped.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use clinic_portal_core::{Email, Role, UserId};

use crate::error::{clear_sentry_user, set_sentry_user};
use crate::provider::{IdentityChanges, IdentityProvider, ProviderIdentity};
use crate::store::{DataStore, collections};

/// A signed-in identity with its resolved role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub id: UserId,
    pub email: Email,
    pub display_name: Option<String>,
    pub role: Role,
    pub email_verified: bool,
}

/// Projection of the provider state: an identity or none, plus whether the
/// initial resolution is still pending.
///
/// `loading` is true only until the first notification has been resolved.
/// Never make an access decision on a loading session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    identity: Option<Identity>,
    loading: bool,
}

impl Session {
    #[must_use]
    pub const fn loading() -> Self {
        Self {
            identity: None,
            loading: true,
        }
    }

    #[must_use]
    pub const fn signed_out() -> Self {
        Self {
            identity: None,
            loading: false,
        }
    }

    #[must_use]
    pub const fn signed_in(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
            loading: false,
        }
    }

    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.loading
    }

    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        !self.loading
    }

    #[must_use]
    pub const fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.identity.as_ref().map(|identity| identity.role)
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role().is_some_and(Role::is_admin)
    }
}

#[derive(Debug, Clone)]
struct SessionCell {
    /// Sequence number of the notification this session reflects (0 before any).
    seq: u64,
    session: Session,
}

/// Handle on session changes.
#[derive(Debug, Clone)]
pub struct SessionSubscription {
    rx: watch::Receiver<SessionCell>,
}

impl SessionSubscription {
    /// The latest session.
    #[must_use]
    pub fn current(&self) -> Session {
        self.rx.borrow().session.clone()
    }

    /// Sequence number of the notification the latest session reflects.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.rx.borrow().seq
    }

    /// Wait for the next session change.
    ///
    /// Returns `None` once the store has shut down.
    pub async fn changed(&mut self) -> Option<Session> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().session.clone())
    }

    /// Wait until the session satisfies `predicate` (checked immediately first).
    ///
    /// Returns `None` if the store shuts down before that happens.
    pub async fn wait_for(&mut self, mut predicate: impl FnMut(&Session) -> bool) -> Option<Session> {
        self.rx
            .wait_for(|cell| predicate(&cell.session))
            .await
            .ok()
            .map(|cell| cell.session.clone())
    }
}

/// Process-wide session state fed by identity-provider notifications.
///
/// Created by [`SessionStore::start`], which subscribes to the provider;
/// [`SessionStore::shutdown`] (or dropping the store) unsubscribes.
#[derive(Debug)]
pub struct SessionStore {
    rx: watch::Receiver<SessionCell>,
    task: JoinHandle<()>,
}

impl SessionStore {
    /// Subscribe to `provider` and start resolving sessions.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(provider: &dyn IdentityProvider, store: Arc<dyn DataStore>) -> Self {
        let (tx, rx) = watch::channel(SessionCell {
            seq: 0,
            session: Session::loading(),
        });
        let changes = provider.on_identity_change();
        let task = tokio::spawn(consume_changes(changes, store, tx));
        info!("Session store subscribed to identity changes");
        Self { rx, task }
    }

    /// The current session.
    #[must_use]
    pub fn get_session(&self) -> Session {
        self.rx.borrow().session.clone()
    }

    /// Observe session changes.
    #[must_use]
    pub fn subscribe(&self) -> SessionSubscription {
        SessionSubscription {
            rx: self.rx.clone(),
        }
    }

    /// Wait for the initial resolution.
    pub async fn wait_resolved(&self) -> Session {
        let mut subscription = self.subscribe();
        match subscription.wait_for(Session::is_resolved).await {
            Some(session) => session,
            None => subscription.current(),
        }
    }

    /// Unsubscribe from the provider. The last session stays readable.
    pub fn shutdown(&self) {
        if !self.task.is_finished() {
            self.task.abort();
            info!("Session store unsubscribed from identity changes");
        }
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn consume_changes(
    mut changes: IdentityChanges,
    store: Arc<dyn DataStore>,
    state: watch::Sender<SessionCell>,
) {
    let mut latest: u64 = 0;
    let mut pending: JoinSet<(u64, Identity)> = JoinSet::new();

    loop {
        tokio::select! {
            change = changes.next() => {
                let Some(change) = change else {
                    debug!("Identity change stream closed");
                    break;
                };
                latest += 1;
                match change {
                    None => apply(&state, latest, Session::signed_out()),
                    Some(provider_identity) => {
                        let seq = latest;
                        let store = Arc::clone(&store);
                        pending.spawn(async move {
                            (seq, resolve_identity(store.as_ref(), provider_identity).await)
                        });
                    }
                }
            }
            Some(joined) = pending.join_next(), if !pending.is_empty() => {
                match joined {
                    Ok((seq, identity)) if seq == latest => {
                        apply(&state, seq, Session::signed_in(identity));
                    }
                    Ok((seq, identity)) => {
                        debug!(seq, latest, user_id = %identity.id, "Discarding stale profile resolution");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Profile resolution task failed");
                    }
                }
            }
        }
    }
}

fn apply(state: &watch::Sender<SessionCell>, seq: u64, session: Session) {
    match session.identity() {
        Some(identity) => {
            set_sentry_user(&identity.id, Some(identity.email.as_str()));
            info!(seq, user_id = %identity.id, role = %identity.role, "Session signed in");
        }
        None => {
            clear_sentry_user();
            info!(seq, "Session signed out");
        }
    }
    state.send_replace(SessionCell { seq, session });
}

/// Combine a provider identity with its profile record.
///
/// Always produces an identity: a missing or unreadable profile, or an
/// unrecognized role, falls back to [`Role::User`].
async fn resolve_identity(store: &dyn DataStore, provider: ProviderIdentity) -> Identity {
    let (role, profile_name) = match store.get_record(collections::USERS, provider.uid.as_str()).await {
        Ok(Some(record)) => {
            let role = match record.str_field("role").map(str::parse::<Role>) {
                Some(Ok(role)) => role,
                Some(Err(e)) => {
                    warn!(user_id = %provider.uid, error = %e, "Unrecognized role in profile; using user");
                    Role::User
                }
                None => Role::User,
            };
            (role, record.str_field("displayName").map(String::from))
        }
        Ok(None) => {
            warn!(user_id = %provider.uid, "No profile record; using user role");
            (Role::User, None)
        }
        Err(e) => {
            warn!(user_id = %provider.uid, error = %e, "Profile fetch failed; using user role");
            (Role::User, None)
        }
    };

    Identity {
        id: provider.uid,
        email: provider.email,
        display_name: provider.display_name.or(profile_name),
        role,
        email_verified: provider.email_verified,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::memory::{InMemoryDataStore, InMemoryIdentityProvider, StoreOp};
    use crate::store::{Fields, StoreError};

    fn profile(role: &str, name: &str) -> Fields {
        let mut fields = Fields::new();
        fields.insert("role".into(), json!(role));
        fields.insert("displayName".into(), json!(name));
        fields
    }

    fn email(s: &str) -> Email {
        Email::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_resolves_signed_out_when_nobody_signed_in() {
        let provider = InMemoryIdentityProvider::new();
        let store = Arc::new(InMemoryDataStore::new());
        let sessions = SessionStore::start(&provider, store);

        let session = sessions.wait_resolved().await;
        assert!(session.is_resolved());
        assert!(session.identity().is_none());
    }

    #[tokio::test]
    async fn test_resolves_role_from_profile() {
        let provider = InMemoryIdentityProvider::new();
        let uid = provider.insert_account(&email("admin@clinic.test"), "hunter22", Some("Ada")).unwrap();
        provider.authenticate(&email("admin@clinic.test"), "hunter22").await.unwrap();

        let store = Arc::new(InMemoryDataStore::new());
        store.insert(collections::USERS, uid.as_str(), profile("admin", "Ada"));

        let sessions = SessionStore::start(&provider, store);
        let session = sessions.wait_resolved().await;
        assert!(session.is_admin());
        assert_eq!(session.identity().unwrap().display_name.as_deref(), Some("Ada"));
    }

    #[tokio::test]
    async fn test_missing_profile_defaults_to_user() {
        let provider = InMemoryIdentityProvider::new();
        provider.insert_account(&email("new@clinic.test"), "hunter22", None).unwrap();
        provider.authenticate(&email("new@clinic.test"), "hunter22").await.unwrap();

        let sessions = SessionStore::start(&provider, Arc::new(InMemoryDataStore::new()));
        let session = sessions.wait_resolved().await;
        assert_eq!(session.role(), Some(Role::User));
    }

    #[tokio::test]
    async fn test_failed_profile_fetch_defaults_to_user() {
        let provider = InMemoryIdentityProvider::new();
        let uid = provider.insert_account(&email("flaky@clinic.test"), "hunter22", None).unwrap();
        provider.authenticate(&email("flaky@clinic.test"), "hunter22").await.unwrap();

        let store = Arc::new(InMemoryDataStore::new());
        store.insert(collections::USERS, uid.as_str(), profile("admin", "Flaky"));
        store.fail_next(StoreOp::Get, StoreError::Unavailable("timeout".into()));

        let sessions = SessionStore::start(&provider, store);
        assert_eq!(sessions.wait_resolved().await.role(), Some(Role::User));
    }

    #[tokio::test]
    async fn test_unknown_role_defaults_to_user() {
        let provider = InMemoryIdentityProvider::new();
        let uid = provider.insert_account(&email("odd@clinic.test"), "hunter22", None).unwrap();
        provider.authenticate(&email("odd@clinic.test"), "hunter22").await.unwrap();

        let store = Arc::new(InMemoryDataStore::new());
        store.insert(collections::USERS, uid.as_str(), profile("superuser", "Odd"));

        let sessions = SessionStore::start(&provider, store);
        assert_eq!(sessions.wait_resolved().await.role(), Some(Role::User));
    }

    #[tokio::test]
    async fn test_stale_profile_fetch_is_discarded() {
        let provider = InMemoryIdentityProvider::new();
        let slow = provider.insert_account(&email("slow@clinic.test"), "hunter22", None).unwrap();
        let store = Arc::new(InMemoryDataStore::new());
        store.insert(collections::USERS, slow.as_str(), profile("admin", "Slow"));
        store.set_get_delay(slow.as_str(), Duration::from_millis(200));

        let sessions = SessionStore::start(&provider, store);
        let mut subscription = sessions.subscribe();
        subscription.wait_for(Session::is_resolved).await.unwrap();

        // Sign in (slow profile fetch), then sign out before it completes.
        provider.authenticate(&email("slow@clinic.test"), "hunter22").await.unwrap();
        provider.sign_out().await.unwrap();

        tokio::time::sleep(Duration::from_millis(400)).await;
        let session = sessions.get_session();
        assert!(session.identity().is_none(), "stale fetch overwrote sign-out");
        assert_eq!(subscription.version(), 3);
    }

    #[tokio::test]
    async fn test_display_name_change_refreshes_session() {
        let provider = InMemoryIdentityProvider::new();
        let uid = provider.insert_account(&email("mia@clinic.test"), "hunter22", Some("Mia")).unwrap();
        provider.authenticate(&email("mia@clinic.test"), "hunter22").await.unwrap();

        let sessions = SessionStore::start(&provider, Arc::new(InMemoryDataStore::new()));
        sessions.wait_resolved().await;

        provider.update_display_name(&uid, "Mia R.").await.unwrap();
        let mut subscription = sessions.subscribe();
        let session = subscription
            .wait_for(|s| {
                s.identity()
                    .and_then(|i| i.display_name.as_deref())
                    == Some("Mia R.")
            })
            .await
            .unwrap();
        assert_eq!(session.role(), Some(Role::User));
    }

    #[tokio::test]
    async fn test_shutdown_keeps_last_session() {
        let provider = InMemoryIdentityProvider::new();
        let sessions = SessionStore::start(&provider, Arc::new(InMemoryDataStore::new()));
        sessions.wait_resolved().await;

        sessions.shutdown();
        tokio::task::yield_now().await;
        assert!(sessions.get_session().is_resolved());
    }
}
