//! Route admission.
//!
//! A guarded view asks [`guard`] whether the current [`Session`] may see it.
//! While the session is still resolving the answer is always
//! [`GuardState::Resolving`]: neither admitted nor redirected, so a reload
//! never bounces a signed-in admin to the login page.
//!
//! [`RouteGuard`] wraps the same decision for a long-lived view and emits
//! each redirect only once per transition into a denied state.

use serde::Serialize;

use clinic_portal_core::Role;

use crate::config::RedirectPaths;
use crate::error::PortalError;
use crate::session::Session;

/// Where a denied visitor is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RedirectTarget {
    /// Sign-in page; the visitor is not signed in.
    Login,
    /// Landing page; signed in but lacking the required role.
    Home,
}

impl RedirectTarget {
    /// Configured path for this target.
    #[must_use]
    pub fn path(self, paths: &RedirectPaths) -> &str {
        match self {
            Self::Login => &paths.login,
            Self::Home => &paths.home,
        }
    }
}

/// Why admission was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Denial {
    Unauthenticated,
    InsufficientRole { required: Role, actual: Role },
}

impl Denial {
    #[must_use]
    pub const fn redirect(self) -> RedirectTarget {
        match self {
            Self::Unauthenticated => RedirectTarget::Login,
            Self::InsufficientRole { .. } => RedirectTarget::Home,
        }
    }

    #[must_use]
    pub const fn into_error(self) -> PortalError {
        match self {
            Self::Unauthenticated => PortalError::NotAuthenticated,
            Self::InsufficientRole { required, actual } => {
                PortalError::PermissionDenied { required, actual }
            }
        }
    }
}

/// Guard state for a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GuardState {
    /// Session still loading; render nothing and redirect nowhere.
    Resolving,
    Denied(Denial),
    Admitted,
}

impl GuardState {
    #[must_use]
    pub const fn is_admitted(self) -> bool {
        matches!(self, Self::Admitted)
    }
}

/// Result of one [`RouteGuard::evaluate`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AdmissionDecision {
    pub state: GuardState,
    /// Set only on the evaluation that first enters a denied state.
    pub redirect: Option<RedirectTarget>,
}

/// Decide admission for a session.
///
/// With no required role any signed-in identity is admitted.
#[must_use]
pub fn guard(session: &Session, required: Option<Role>) -> GuardState {
    if !session.is_resolved() {
        return GuardState::Resolving;
    }
    let Some(identity) = session.identity() else {
        return GuardState::Denied(Denial::Unauthenticated);
    };
    match required {
        Some(required) if !identity.role.satisfies(required) => {
            GuardState::Denied(Denial::InsufficientRole {
                required,
                actual: identity.role,
            })
        }
        _ => GuardState::Admitted,
    }
}

/// Admission state machine for one guarded view.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    required: Option<Role>,
    last: GuardState,
}

impl RouteGuard {
    #[must_use]
    pub const fn new(required: Option<Role>) -> Self {
        Self {
            required,
            last: GuardState::Resolving,
        }
    }

    #[must_use]
    pub const fn required(&self) -> Option<Role> {
        self.required
    }

    #[must_use]
    pub const fn state(&self) -> GuardState {
        self.last
    }

    /// Re-evaluate against the latest session.
    ///
    /// Evaluating the same session again is a no-op: no second redirect.
    pub fn evaluate(&mut self, session: &Session) -> AdmissionDecision {
        let state = guard(session, self.required);
        let redirect = match state {
            GuardState::Denied(denial) if state != self.last => Some(denial.redirect()),
            _ => None,
        };
        if state != self.last {
            tracing::debug!(from = ?self.last, to = ?state, "Guard state changed");
        }
        self.last = state;
        AdmissionDecision { state, redirect }
    }
}
