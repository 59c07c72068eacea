//! Registration against the fixture provider.

use serde::Serialize;

use clinic_portal::Portal;
use clinic_portal::memory::EmailKind;
use clinic_portal_core::UserId;

use super::print_json;
use crate::fixture::World;

#[derive(Debug, Serialize)]
struct RegistrationReport {
    uid: UserId,
    verification_sent: bool,
    profile_written: bool,
}

/// Register a new account and report which steps took effect.
///
/// # Errors
///
/// Returns an error if validation or any registration step fails.
pub async fn run(
    portal: &Portal,
    world: &World,
    email: &str,
    password: &str,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let uid = portal.credentials().register(email, password, name).await?;

    let verification_sent = world
        .provider
        .sent_emails()
        .iter()
        .any(|sent| sent.kind == EmailKind::Verification);
    let profile_written = world
        .store
        .get(clinic_portal::store::collections::USERS, uid.as_str())
        .is_some();

    print_json(&RegistrationReport {
        uid,
        verification_sent,
        profile_written,
    })
}
