//! Admin dashboard snapshot.

use clinic_portal::Portal;
use clinic_portal_core::Role;

use super::{Credentials, print_json, sign_in};

/// Sign in as an admin and print the reporting snapshot.
///
/// # Errors
///
/// Returns an error if the account is not an admin, a collection cannot be
/// read, or output fails.
pub async fn run(portal: &Portal, credentials: &Credentials) -> Result<(), Box<dyn std::error::Error>> {
    let admission = sign_in(portal, credentials, Some(Role::Admin)).await?;
    let snapshot = portal.snapshot(&admission).await?;
    print_json(&snapshot)
}
