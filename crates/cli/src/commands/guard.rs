//! Route admission check.
//!
//! Prints what a guarded view requiring `--role` would do for a visitor,
//! signed out (no credentials) or signed in.

use serde::Serialize;

use clinic_portal::{GuardState, Portal, RedirectTarget};
use clinic_portal_core::Role;

use super::{Credentials, print_json};

#[derive(Debug, Serialize)]
struct GuardReport<'a> {
    required: Option<Role>,
    state: GuardState,
    redirect: Option<RedirectTarget>,
    redirect_path: Option<&'a str>,
}

/// Evaluate the guard once the session has resolved.
///
/// # Errors
///
/// Returns an error if sign-in or output fails. A denial is not an error.
pub async fn check(
    portal: &Portal,
    credentials: Option<&Credentials>,
    required: Option<Role>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut route = portal.route_guard(required);
    route.evaluate(&portal.get_session());

    let mut session = portal.sessions().wait_resolved().await;
    if let Some(credentials) = credentials {
        portal
            .credentials()
            .login(&credentials.email, &credentials.password)
            .await?;
        if let Some(signed_in) = portal
            .on_session_change()
            .wait_for(|s| s.identity().is_some())
            .await
        {
            session = signed_in;
        }
    }

    let decision = route.evaluate(&session);
    let redirect_path = decision
        .redirect
        .map(|target| target.path(&portal.config().redirects));

    print_json(&GuardReport {
        required,
        state: decision.state,
        redirect: decision.redirect,
        redirect_path,
    })
}
