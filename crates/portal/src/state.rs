//! Portal state shared across views.

use std::sync::Arc;

use clinic_portal_core::{Role, UserId};

use crate::config::PortalConfig;
use crate::error::{PortalError, Result};
use crate::guard::{GuardState, RouteGuard, guard};
use crate::provider::IdentityProvider;
use crate::services::{BookingManager, CredentialService, ReportingSnapshot, load_snapshot};
use crate::session::{Identity, Session, SessionStore, SessionSubscription};
use crate::store::DataStore;

/// Proof that the session was admitted for a role requirement.
///
/// Obtained from [`Portal::admit`]; operations that need a signed-in
/// identity take one instead of re-checking the session themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    identity: Identity,
    required: Option<Role>,
}

impl Admission {
    #[must_use]
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    #[must_use]
    pub const fn user_id(&self) -> &UserId {
        &self.identity.id
    }

    #[must_use]
    pub const fn required(&self) -> Option<Role> {
        self.required
    }
}

/// Portal handle shared across views.
///
/// Cheaply cloneable via `Arc`. Owns the single session subscription for
/// the process: [`Portal::start`] subscribes, [`Portal::shutdown`] unsubscribes.
#[derive(Clone)]
pub struct Portal {
    inner: Arc<PortalInner>,
}

struct PortalInner {
    config: PortalConfig,
    store: Arc<dyn DataStore>,
    sessions: SessionStore,
    credentials: CredentialService,
}

impl Portal {
    /// Subscribe to the provider and wire up the services.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(
        config: PortalConfig,
        provider: Arc<dyn IdentityProvider>,
        store: Arc<dyn DataStore>,
    ) -> Self {
        let sessions = SessionStore::start(provider.as_ref(), Arc::clone(&store));
        let credentials =
            CredentialService::new(provider, Arc::clone(&store), config.min_password_length);

        Self {
            inner: Arc::new(PortalInner {
                config,
                store,
                sessions,
                credentials,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &PortalConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.inner.sessions
    }

    #[must_use]
    pub fn credentials(&self) -> &CredentialService {
        &self.inner.credentials
    }

    /// The current session.
    #[must_use]
    pub fn get_session(&self) -> Session {
        self.inner.sessions.get_session()
    }

    /// Observe session changes.
    #[must_use]
    pub fn on_session_change(&self) -> SessionSubscription {
        self.inner.sessions.subscribe()
    }

    /// Admission state for the current session, without waiting.
    #[must_use]
    pub fn guard(&self, required: Option<Role>) -> GuardState {
        guard(&self.get_session(), required)
    }

    /// A route guard for a long-lived view.
    #[must_use]
    pub const fn route_guard(&self, required: Option<Role>) -> RouteGuard {
        RouteGuard::new(required)
    }

    /// Wait for the session to resolve, then admit or deny.
    ///
    /// # Errors
    ///
    /// Returns `PortalError::NotAuthenticated` if nobody is signed in, or
    /// `PortalError::PermissionDenied` if the role does not satisfy `required`.
    pub async fn admit(&self, required: Option<Role>) -> Result<Admission> {
        let session = self.inner.sessions.wait_resolved().await;
        match guard(&session, required) {
            GuardState::Admitted => session
                .identity()
                .cloned()
                .map(|identity| Admission { identity, required })
                .ok_or(PortalError::NotAuthenticated),
            GuardState::Denied(denial) => Err(denial.into_error()),
            // wait_resolved only falls through unresolved if the store shut down
            GuardState::Resolving => Err(PortalError::NotAuthenticated),
        }
    }

    /// A booking manager for the admitted identity's view.
    #[must_use]
    pub fn bookings(&self, admission: &Admission) -> BookingManager {
        tracing::debug!(user_id = %admission.user_id(), "Opening booking view");
        BookingManager::new(Arc::clone(&self.inner.store))
    }

    /// Dashboard snapshot; admins only.
    ///
    /// # Errors
    ///
    /// Returns `PortalError::PermissionDenied` unless the admission is for an
    /// admin, or `PortalError::FetchFailed` if a collection cannot be read.
    pub async fn snapshot(&self, admission: &Admission) -> Result<ReportingSnapshot> {
        let role = admission.identity.role;
        if !role.satisfies(Role::Admin) {
            return Err(PortalError::PermissionDenied {
                required: Role::Admin,
                actual: role,
            });
        }
        load_snapshot(self.inner.store.as_ref()).await
    }

    /// Unsubscribe from the provider.
    pub fn shutdown(&self) {
        self.inner.sessions.shutdown();
    }
}
