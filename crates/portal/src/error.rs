//! Unified error handling with Sentry integration.
//!
//! Every portal operation returns `Result<T, PortalError>`. Port-level errors
//! ([`ProviderError`], [`StoreError`]) are mapped into the taxonomy at the call
//! site so callers can tell a rejected credential from a flaky network.

use std::fmt;

use thiserror::Error;

use clinic_portal_core::{EmailError, Role, UserId};

use crate::guard::RedirectTarget;
use crate::provider::ProviderError;
use crate::store::StoreError;

/// A registration step that runs after the provider identity exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistrationStep {
    /// Setting the provider display name.
    DisplayName,
    /// Dispatching the verification email.
    VerificationEmail,
    /// Writing the user profile record.
    ProfileRecord,
}

impl fmt::Display for RegistrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DisplayName => write!(f, "display_name"),
            Self::VerificationEmail => write!(f, "verification_email"),
            Self::ProfileRecord => write!(f, "profile_record"),
        }
    }
}

/// Portal-level error type.
#[derive(Debug, Error)]
pub enum PortalError {
    /// The identity provider rejected the request (bad credentials, email in use).
    #[error("authentication failed: {reason}")]
    AuthFailure { reason: String },

    /// The operation requires a signed-in identity.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Signed in, but the role does not satisfy the requirement.
    #[error("permission denied: {required} role required, signed in as {actual}")]
    PermissionDenied { required: Role, actual: Role },

    /// Reading from the data store failed.
    #[error("fetch failed: {0}")]
    FetchFailed(#[source] StoreError),

    /// Writing to the data store failed.
    #[error("write failed: {0}")]
    WriteFailed(#[source] StoreError),

    /// The provider identity exists but later registration steps failed.
    #[error(
        "registration incomplete for {uid}: failed steps [{}]",
        join_steps(.failed_steps)
    )]
    PartialRegistration {
        uid: UserId,
        failed_steps: Vec<RegistrationStep>,
    },

    /// The identity provider could not be reached.
    #[error("identity provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Password does not meet the configured policy.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Other rejected input (e.g. blank display name).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The view that started the operation was unmounted; its result was dropped.
    #[error("result discarded: view was unmounted")]
    Discarded,
}

impl PortalError {
    /// Whether the failure is transient and a user-initiated retry may succeed.
    ///
    /// Nothing in the core retries on its own.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::FetchFailed(_) | Self::WriteFailed(_) | Self::ProviderUnavailable(_)
        )
    }

    /// Redirect a view should perform when it receives this error.
    #[must_use]
    pub const fn redirect(&self) -> Option<RedirectTarget> {
        match self {
            Self::NotAuthenticated => Some(RedirectTarget::Login),
            Self::PermissionDenied { .. } => Some(RedirectTarget::Home),
            _ => None,
        }
    }
}

impl From<ProviderError> for PortalError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Rejected(reason) => Self::AuthFailure { reason },
            ProviderError::Unavailable(message) => Self::ProviderUnavailable(message),
        }
    }
}

fn join_steps(steps: &[RegistrationStep]) -> String {
    steps
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type alias for `PortalError`.
pub type Result<T> = std::result::Result<T, PortalError>;

/// Report a known, unrepaired inconsistency (e.g. a partial registration).
///
/// Goes to Sentry as an event in addition to the error log line.
pub fn capture_latent_inconsistency(err: &PortalError) {
    let event_id = sentry::capture_error(err);
    tracing::error!(
        error = %err,
        sentry_event_id = %event_id,
        "Latent inconsistency left in place"
    );
}

/// Set the Sentry user context once a session resolves to an identity.
pub fn set_sentry_user(user_id: &UserId, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context when the session signs out.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}
