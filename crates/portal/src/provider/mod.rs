//! Identity provider port.
//!
//! The portal never owns credentials. Registration, sign-in and password
//! reset are delegated to an external provider, and identity changes come
//! back as notifications on an [`IdentityChanges`] channel rather than as
//! callbacks.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use clinic_portal_core::{Email, UserId};

/// Identity as the provider reports it (no role; roles live in profile records).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderIdentity {
    /// Provider-assigned, immutable ID.
    pub uid: UserId,
    pub email: Email,
    pub display_name: Option<String>,
    /// Controlled by the provider; flips once the verification link is used.
    pub email_verified: bool,
}

/// Errors reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The provider refused the request; the user can correct it.
    #[error("rejected by identity provider: {0}")]
    Rejected(String),

    /// The provider could not be reached or failed internally.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

/// A stream of identity-change notifications.
///
/// Each item is the provider's full current state: `Some` when an identity
/// is signed in, `None` after sign-out. Dropping the stream unsubscribes.
#[derive(Debug)]
pub struct IdentityChanges {
    rx: mpsc::UnboundedReceiver<Option<ProviderIdentity>>,
}

impl IdentityChanges {
    /// Create a notification channel; the provider keeps the sender.
    #[must_use]
    pub fn channel() -> (mpsc::UnboundedSender<Option<ProviderIdentity>>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }

    /// Wait for the next notification.
    ///
    /// Returns `None` once the provider has dropped its side of the channel.
    pub async fn next(&mut self) -> Option<Option<ProviderIdentity>> {
        self.rx.recv().await
    }
}

/// Operations consumed from the external identity provider.
///
/// Implementations deliver the current state to every new subscriber right
/// away, then notify on each sign-in, sign-out and profile change.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create an identity and sign it in.
    async fn create_identity(
        &self,
        email: &Email,
        password: &str,
    ) -> Result<ProviderIdentity, ProviderError>;

    /// Sign in with email and password.
    async fn authenticate(&self, email: &Email, password: &str) -> Result<(), ProviderError>;

    /// Sign out the current identity.
    async fn sign_out(&self) -> Result<(), ProviderError>;

    /// Send the email-verification message for an identity.
    async fn send_verification(&self, uid: &UserId) -> Result<(), ProviderError>;

    /// Request a password-reset email. Success means the request was accepted.
    async fn send_password_reset(&self, email: &Email) -> Result<(), ProviderError>;

    /// Change the provider-side display name of an identity.
    async fn update_display_name(&self, uid: &UserId, name: &str) -> Result<(), ProviderError>;

    /// The identity currently signed in, if any.
    fn current_identity(&self) -> Option<ProviderIdentity>;

    /// Subscribe to identity-change notifications.
    fn on_identity_change(&self) -> IdentityChanges;
}
