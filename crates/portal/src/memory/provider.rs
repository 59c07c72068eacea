//! In-memory identity provider.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use clinic_portal_core::{Email, UserId};

use crate::provider::{IdentityChanges, IdentityProvider, ProviderError, ProviderIdentity};

/// Shortest password the provider accepts.
const PROVIDER_MIN_PASSWORD_LENGTH: usize = 6;

/// Provider operation, for failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderOp {
    CreateIdentity,
    Authenticate,
    SignOut,
    SendVerification,
    SendPasswordReset,
    UpdateDisplayName,
}

/// Kind of email the provider sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailKind {
    Verification,
    PasswordReset,
}

/// An email recorded in the provider's outbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub to: Email,
    pub kind: EmailKind,
}

#[derive(Debug, Clone)]
struct Account {
    uid: UserId,
    email: Email,
    password_hash: String,
    display_name: Option<String>,
    email_verified: bool,
}

impl Account {
    fn identity(&self) -> ProviderIdentity {
        ProviderIdentity {
            uid: self.uid.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            email_verified: self.email_verified,
        }
    }
}

#[derive(Debug, Default)]
struct ProviderState {
    accounts: HashMap<Email, Account>,
    current: Option<UserId>,
    subscribers: Vec<mpsc::UnboundedSender<Option<ProviderIdentity>>>,
    outbox: Vec<SentEmail>,
    failures: HashMap<ProviderOp, ProviderError>,
}

impl ProviderState {
    fn account_by_uid(&mut self, uid: &UserId) -> Option<&mut Account> {
        self.accounts.values_mut().find(|account| &account.uid == uid)
    }

    fn current_identity(&self) -> Option<ProviderIdentity> {
        let uid = self.current.as_ref()?;
        self.accounts
            .values()
            .find(|account| &account.uid == uid)
            .map(Account::identity)
    }

    fn take_failure(&mut self, op: ProviderOp) -> Result<(), ProviderError> {
        self.failures.remove(&op).map_or(Ok(()), Err)
    }

    /// Push the current state to every live subscriber, dropping closed ones.
    fn notify(&mut self) {
        let identity = self.current_identity();
        self.subscribers
            .retain(|tx| tx.send(identity.clone()).is_ok());
    }
}

/// Identity provider backed by process memory.
///
/// Passwords are stored as Argon2id hashes. A single identity can be signed
/// in at a time, as in a browser session.
pub struct InMemoryIdentityProvider {
    state: Mutex<ProviderState>,
    hasher: Argon2<'static>,
}

impl InMemoryIdentityProvider {
    #[must_use]
    pub fn new() -> Self {
        // Light parameters; this provider never guards real credentials.
        let params = Params::new(1024, 1, 1, None).unwrap_or_default();
        Self {
            state: Mutex::new(ProviderState::default()),
            hasher: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }

    /// Seed an account without signing it in or notifying subscribers.
    ///
    /// Replaces any account with the same email.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Unavailable` if the password cannot be hashed.
    pub fn insert_account(
        &self,
        email: &Email,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<UserId, ProviderError> {
        let uid = UserId::new(Uuid::new_v4().to_string());
        let password_hash = self.hash_password(password)?;
        self.lock().accounts.insert(
            email.clone(),
            Account {
                uid: uid.clone(),
                email: email.clone(),
                password_hash,
                display_name: display_name.map(String::from),
                email_verified: false,
            },
        );
        Ok(uid)
    }

    /// Mark an account's email as verified (as if the link was followed).
    pub fn set_email_verified(&self, uid: &UserId, verified: bool) {
        let mut state = self.lock();
        if let Some(account) = state.account_by_uid(uid) {
            account.email_verified = verified;
        }
        if state.current.as_ref() == Some(uid) {
            state.notify();
        }
    }

    /// Fail the next call of `op` with `err`.
    pub fn fail_next(&self, op: ProviderOp, err: ProviderError) {
        self.lock().failures.insert(op, err);
    }

    /// Emails sent so far, oldest first.
    #[must_use]
    pub fn sent_emails(&self) -> Vec<SentEmail> {
        self.lock().outbox.clone()
    }

    #[must_use]
    pub fn display_name_of(&self, uid: &UserId) -> Option<String> {
        self.lock()
            .account_by_uid(uid)
            .and_then(|account| account.display_name.clone())
    }

    /// Number of live identity-change subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.lock();
        state.subscribers.retain(|tx| !tx.is_closed());
        state.subscribers.len()
    }

    fn lock(&self) -> MutexGuard<'_, ProviderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn hash_password(&self, password: &str) -> Result<String, ProviderError> {
        let salt = SaltString::generate(&mut OsRng);
        self.hasher
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| ProviderError::Unavailable(format!("password hashing failed: {e}")))
    }

    fn verify_password(&self, password: &str, hash: &str) -> bool {
        PasswordHash::new(hash).is_ok_and(|parsed| {
            self.hasher
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
    }
}

impl Default for InMemoryIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn create_identity(
        &self,
        email: &Email,
        password: &str,
    ) -> Result<ProviderIdentity, ProviderError> {
        self.lock().take_failure(ProviderOp::CreateIdentity)?;
        if password.chars().count() < PROVIDER_MIN_PASSWORD_LENGTH {
            return Err(ProviderError::Rejected(format!(
                "password should be at least {PROVIDER_MIN_PASSWORD_LENGTH} characters"
            )));
        }
        let password_hash = self.hash_password(password)?;

        let mut state = self.lock();
        if state.accounts.contains_key(email) {
            return Err(ProviderError::Rejected("email already in use".to_string()));
        }
        let account = Account {
            uid: UserId::new(Uuid::new_v4().to_string()),
            email: email.clone(),
            password_hash,
            display_name: None,
            email_verified: false,
        };
        let identity = account.identity();
        state.accounts.insert(email.clone(), account);
        state.current = Some(identity.uid.clone());
        state.notify();
        tracing::debug!(user_id = %identity.uid, "Identity created");
        Ok(identity)
    }

    async fn authenticate(&self, email: &Email, password: &str) -> Result<(), ProviderError> {
        let stored = {
            let mut state = self.lock();
            state.take_failure(ProviderOp::Authenticate)?;
            state
                .accounts
                .get(email)
                .map(|account| (account.uid.clone(), account.password_hash.clone()))
        };
        let Some((uid, hash)) = stored else {
            return Err(ProviderError::Rejected("invalid credentials".to_string()));
        };
        if !self.verify_password(password, &hash) {
            return Err(ProviderError::Rejected("invalid credentials".to_string()));
        }

        let mut state = self.lock();
        state.current = Some(uid);
        state.notify();
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        let mut state = self.lock();
        state.take_failure(ProviderOp::SignOut)?;
        if state.current.take().is_some() {
            state.notify();
        }
        Ok(())
    }

    async fn send_verification(&self, uid: &UserId) -> Result<(), ProviderError> {
        let mut state = self.lock();
        state.take_failure(ProviderOp::SendVerification)?;
        let to = state
            .account_by_uid(uid)
            .map(|account| account.email.clone())
            .ok_or_else(|| ProviderError::Rejected(format!("unknown identity {uid}")))?;
        tracing::info!(email = %to, "Verification email sent");
        state.outbox.push(SentEmail {
            to,
            kind: EmailKind::Verification,
        });
        Ok(())
    }

    async fn send_password_reset(&self, email: &Email) -> Result<(), ProviderError> {
        let mut state = self.lock();
        state.take_failure(ProviderOp::SendPasswordReset)?;
        // Unknown addresses are accepted silently so callers cannot probe accounts.
        if state.accounts.contains_key(email) {
            tracing::info!(email = %email, "Password reset email sent");
            state.outbox.push(SentEmail {
                to: email.clone(),
                kind: EmailKind::PasswordReset,
            });
        }
        Ok(())
    }

    async fn update_display_name(&self, uid: &UserId, name: &str) -> Result<(), ProviderError> {
        let mut state = self.lock();
        state.take_failure(ProviderOp::UpdateDisplayName)?;
        let account = state
            .account_by_uid(uid)
            .ok_or_else(|| ProviderError::Rejected(format!("unknown identity {uid}")))?;
        account.display_name = Some(name.to_string());
        if state.current.as_ref() == Some(uid) {
            state.notify();
        }
        Ok(())
    }

    fn current_identity(&self) -> Option<ProviderIdentity> {
        self.lock().current_identity()
    }

    fn on_identity_change(&self) -> IdentityChanges {
        let (tx, changes) = IdentityChanges::channel();
        let mut state = self.lock();
        // New subscribers learn the current state right away.
        if tx.send(state.current_identity()).is_ok() {
            state.subscribers.push(tx);
        }
        changes
    }
}
