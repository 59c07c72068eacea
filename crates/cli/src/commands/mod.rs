//! Subcommand implementations and shared helpers.

pub mod bookings;
pub mod guard;
pub mod register;
pub mod snapshot;

use std::io::Write;

use clap::Args;
use serde::Serialize;

use clinic_portal::{Admission, Portal, PortalError};
use clinic_portal_core::{Email, Role};

/// Credentials of a fixture account.
#[derive(Debug, Clone, Args)]
pub struct Credentials {
    /// Account email
    #[arg(short, long)]
    pub email: String,

    /// Account password
    #[arg(short, long)]
    pub password: String,
}

/// Sign in and wait until the session reflects the identity, then admit.
///
/// # Errors
///
/// Returns the login error, or the admission denial.
pub async fn sign_in(
    portal: &Portal,
    credentials: &Credentials,
    required: Option<Role>,
) -> Result<Admission, PortalError> {
    let email = Email::parse(&credentials.email)?;
    portal.sessions().wait_resolved().await;
    portal
        .credentials()
        .login(email.as_str(), &credentials.password)
        .await?;

    // Login returning does not mean the session has caught up yet.
    portal
        .on_session_change()
        .wait_for(|session| session.identity().is_some_and(|identity| identity.email == email))
        .await;

    portal.admit(required).await
}

/// Write a value to stdout as pretty JSON.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    let mut out = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}
