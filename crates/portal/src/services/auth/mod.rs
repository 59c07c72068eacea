//! Credential service.
//!
//! Thin orchestration over the identity provider and the user profile
//! record. None of these operations touch the session directly: the
//! session changes only when the provider notifies.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{error, info, instrument, warn};

use clinic_portal_core::{Email, Role, UserId};

use crate::error::{PortalError, RegistrationStep, Result, capture_latent_inconsistency};
use crate::provider::IdentityProvider;
use crate::store::{DataStore, Fields, UserProfileRecord, WriteMode, collections};

/// Credential operations against the identity provider and profile store.
#[derive(Clone)]
pub struct CredentialService {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<dyn DataStore>,
    min_password_length: usize,
}

impl CredentialService {
    #[must_use]
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        store: Arc<dyn DataStore>,
        min_password_length: usize,
    ) -> Self {
        Self {
            provider,
            store,
            min_password_length,
        }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Create an identity, then set its display name, send the verification
    /// email and write its profile record (role `user`).
    ///
    /// On success the new identity is signed in; the session follows once
    /// the provider notifies.
    ///
    /// # Errors
    ///
    /// Returns `PortalError::InvalidEmail`, `WeakPassword` or `InvalidInput`
    /// before anything is created. Returns `AuthFailure` or
    /// `ProviderUnavailable` if the identity cannot be created.
    /// Returns `PartialRegistration` if the identity exists but any later
    /// step failed; nothing is rolled back.
    #[instrument(skip(self, password))]
    pub async fn register(&self, email: &str, password: &str, display_name: &str) -> Result<UserId> {
        let email = Email::parse(email)?;
        self.validate_password(password)?;
        let display_name = validate_display_name(display_name)?;

        let identity = self.provider.create_identity(&email, password).await?;
        let uid = identity.uid;
        let mut failed_steps = Vec::new();

        if let Err(e) = self.provider.update_display_name(&uid, display_name).await {
            warn!(user_id = %uid, error = %e, "Setting display name failed");
            failed_steps.push(RegistrationStep::DisplayName);
        }

        if let Err(e) = self.provider.send_verification(&uid).await {
            warn!(user_id = %uid, error = %e, "Sending verification email failed");
            failed_steps.push(RegistrationStep::VerificationEmail);
        }

        if let Err(e) = self.write_profile(&uid, &email, display_name).await {
            warn!(user_id = %uid, error = %e, "Writing profile record failed");
            failed_steps.push(RegistrationStep::ProfileRecord);
        }

        if failed_steps.is_empty() {
            info!(user_id = %uid, "User registered");
            return Ok(uid);
        }

        let err = PortalError::PartialRegistration { uid, failed_steps };
        error!(error = %err, "Registration left incomplete");
        capture_latent_inconsistency(&err);
        Err(err)
    }

    async fn write_profile(
        &self,
        uid: &UserId,
        email: &Email,
        display_name: &str,
    ) -> Result<()> {
        let record = UserProfileRecord {
            uid: uid.clone(),
            email: email.clone(),
            display_name: display_name.to_string(),
            role: Role::User,
            created_at: Utc::now(),
        };
        let fields = record.to_fields().map_err(PortalError::WriteFailed)?;
        self.store
            .put_record(collections::USERS, uid.as_str(), fields, WriteMode::Replace)
            .await
            .map_err(PortalError::WriteFailed)
    }

    // =========================================================================
    // Sign-in / Sign-out
    // =========================================================================

    /// Sign in with email and password.
    ///
    /// Returning `Ok` does not mean the session already reflects the sign-in.
    ///
    /// # Errors
    ///
    /// Returns `PortalError::InvalidEmail` for a malformed address,
    /// `AuthFailure` for rejected credentials, `ProviderUnavailable` otherwise.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<()> {
        let email = Email::parse(email)?;
        self.provider.authenticate(&email, password).await?;
        info!("Login accepted");
        Ok(())
    }

    /// Sign out the current identity.
    ///
    /// # Errors
    ///
    /// Returns `PortalError::ProviderUnavailable` if the provider fails.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<()> {
        self.provider.sign_out().await?;
        info!("Logout accepted");
        Ok(())
    }

    /// Request a password-reset email.
    ///
    /// `Ok` means the provider accepted the request, not that an email went out.
    ///
    /// # Errors
    ///
    /// Returns `PortalError::InvalidEmail` for a malformed address, or the
    /// mapped provider error.
    #[instrument(skip(self))]
    pub async fn reset_password(&self, email: &str) -> Result<()> {
        let email = Email::parse(email)?;
        self.provider.send_password_reset(&email).await?;
        Ok(())
    }

    // =========================================================================
    // Profile
    // =========================================================================

    /// Change the display name of the signed-in identity.
    ///
    /// Updates the provider first, then merges `displayName` into the profile
    /// record (creating it if missing).
    ///
    /// # Errors
    ///
    /// Returns `PortalError::NotAuthenticated` if nobody is signed in,
    /// `InvalidInput` for a blank name, the mapped provider error, or
    /// `WriteFailed` if the profile record cannot be written.
    #[instrument(skip(self))]
    pub async fn update_profile(&self, display_name: &str) -> Result<()> {
        let display_name = validate_display_name(display_name)?;
        let identity = self
            .provider
            .current_identity()
            .ok_or(PortalError::NotAuthenticated)?;

        self.provider
            .update_display_name(&identity.uid, display_name)
            .await?;

        let mut fields = Fields::new();
        fields.insert("displayName".to_string(), json!(display_name));
        self.store
            .put_record(collections::USERS, identity.uid.as_str(), fields, WriteMode::Merge)
            .await
            .map_err(PortalError::WriteFailed)?;

        info!(user_id = %identity.uid, "Profile updated");
        Ok(())
    }

    fn validate_password(&self, password: &str) -> Result<()> {
        if password.chars().count() < self.min_password_length {
            return Err(PortalError::WeakPassword(format!(
                "password must be at least {} characters",
                self.min_password_length
            )));
        }
        Ok(())
    }
}

fn validate_display_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(PortalError::InvalidInput("display name is required".to_string()));
    }
    Ok(name)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::memory::{EmailKind, InMemoryDataStore, InMemoryIdentityProvider, ProviderOp, StoreOp};
    use crate::provider::ProviderError;
    use crate::store::StoreError;

    struct Harness {
        provider: Arc<InMemoryIdentityProvider>,
        store: Arc<InMemoryDataStore>,
        service: CredentialService,
    }

    fn harness() -> Harness {
        let provider = Arc::new(InMemoryIdentityProvider::new());
        let store = Arc::new(InMemoryDataStore::new());
        let service = CredentialService::new(provider.clone(), store.clone(), 6);
        Harness {
            provider,
            store,
            service,
        }
    }

    #[tokio::test]
    async fn test_register_runs_every_step() {
        let h = harness();
        let uid = h
            .service
            .register("Mia@Clinic.test", "secret1", "Mia")
            .await
            .unwrap();

        let profile = h.store.get(collections::USERS, uid.as_str()).unwrap();
        assert_eq!(profile.get("role"), Some(&json!("user")));
        assert_eq!(profile.get("email"), Some(&json!("mia@clinic.test")));
        assert_eq!(profile.get("displayName"), Some(&json!("Mia")));
        assert!(profile.contains_key("createdAt"));

        assert_eq!(h.provider.display_name_of(&uid).as_deref(), Some("Mia"));
        let kinds: Vec<_> = h.provider.sent_emails().iter().map(|m| m.kind).collect();
        assert_eq!(kinds, [EmailKind::Verification]);
        assert_eq!(h.provider.current_identity().unwrap().uid, uid);
    }

    #[tokio::test]
    async fn test_register_validates_before_provider() {
        let h = harness();
        assert!(matches!(
            h.service.register("not-an-email", "secret1", "Mia").await,
            Err(PortalError::InvalidEmail(_))
        ));
        assert!(matches!(
            h.service.register("mia@clinic.test", "123", "Mia").await,
            Err(PortalError::WeakPassword(_))
        ));
        assert!(matches!(
            h.service.register("mia@clinic.test", "secret1", "   ").await,
            Err(PortalError::InvalidInput(_))
        ));
        assert!(h.provider.current_identity().is_none());
    }

    #[tokio::test]
    async fn test_register_duplicate_email_is_auth_failure() {
        let h = harness();
        h.service.register("mia@clinic.test", "secret1", "Mia").await.unwrap();

        let err = h
            .service
            .register("mia@clinic.test", "secret2", "Mia Again")
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::AuthFailure { .. }));
    }

    #[tokio::test]
    async fn test_register_reports_every_failed_step() {
        let h = harness();
        h.provider.fail_next(
            ProviderOp::SendVerification,
            ProviderError::Unavailable("smtp down".into()),
        );
        h.store
            .fail_next(StoreOp::Put, StoreError::Unavailable("offline".into()));

        let err = h
            .service
            .register("lea@clinic.test", "secret1", "Lea")
            .await
            .unwrap_err();

        let PortalError::PartialRegistration { uid, failed_steps } = err else {
            panic!("expected partial registration, got {err:?}");
        };
        assert_eq!(
            failed_steps,
            [RegistrationStep::VerificationEmail, RegistrationStep::ProfileRecord]
        );
        // The identity exists and is signed in; nothing was rolled back.
        assert_eq!(h.provider.current_identity().unwrap().uid, uid);
        assert_eq!(h.provider.display_name_of(&uid).as_deref(), Some("Lea"));
        assert!(h.store.get(collections::USERS, uid.as_str()).is_none());
    }

    #[tokio::test]
    async fn test_login_and_logout() {
        let h = harness();
        let email = Email::parse("ana@clinic.test").unwrap();
        h.provider.insert_account(&email, "secret1", None).unwrap();

        assert!(matches!(
            h.service.login("ana@clinic.test", "wrong-pass").await,
            Err(PortalError::AuthFailure { .. })
        ));
        h.service.login("ANA@clinic.test", "secret1").await.unwrap();
        assert!(h.provider.current_identity().is_some());

        h.service.logout().await.unwrap();
        assert!(h.provider.current_identity().is_none());
    }

    #[tokio::test]
    async fn test_login_provider_outage_is_transient() {
        let h = harness();
        h.provider.fail_next(
            ProviderOp::Authenticate,
            ProviderError::Unavailable("network".into()),
        );
        let err = h.service.login("ana@clinic.test", "secret1").await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_reset_password_accepts_known_and_unknown() {
        let h = harness();
        let email = Email::parse("ana@clinic.test").unwrap();
        h.provider.insert_account(&email, "secret1", None).unwrap();

        h.service.reset_password("ana@clinic.test").await.unwrap();
        h.service.reset_password("ghost@clinic.test").await.unwrap();

        let kinds: Vec<_> = h.provider.sent_emails().iter().map(|m| m.kind).collect();
        assert_eq!(kinds, [EmailKind::PasswordReset]);
    }

    #[tokio::test]
    async fn test_update_profile_requires_sign_in() {
        let h = harness();
        assert!(matches!(
            h.service.update_profile("New Name").await,
            Err(PortalError::NotAuthenticated)
        ));
    }

    #[tokio::test]
    async fn test_update_profile_merges_display_name() {
        let h = harness();
        let uid = h
            .service
            .register("mia@clinic.test", "secret1", "Mia")
            .await
            .unwrap();
        let mut admin = h.store.get(collections::USERS, uid.as_str()).unwrap();
        admin.insert("role".into(), json!("admin"));
        h.store.insert(collections::USERS, uid.as_str(), admin);

        h.service.update_profile("Mia Rossi").await.unwrap();

        let profile = h.store.get(collections::USERS, uid.as_str()).unwrap();
        assert_eq!(profile.get("displayName"), Some(&json!("Mia Rossi")));
        assert_eq!(profile.get("role"), Some(&json!("admin")));
        assert_eq!(h.provider.display_name_of(&uid).as_deref(), Some("Mia Rossi"));
    }

    #[tokio::test]
    async fn test_update_profile_store_failure_is_write_failed() {
        let h = harness();
        h.service.register("mia@clinic.test", "secret1", "Mia").await.unwrap();
        h.store
            .fail_next(StoreOp::Put, StoreError::Unavailable("offline".into()));

        let err = h.service.update_profile("Mia R.").await.unwrap_err();
        assert!(matches!(err, PortalError::WriteFailed(_)));
    }
}
