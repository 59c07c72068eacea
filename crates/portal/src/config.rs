//! Portal configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All optional:
//! - `PORTAL_LOGIN_PATH` - Redirect for unauthenticated visitors (default: /login)
//! - `PORTAL_HOME_PATH` - Redirect for signed-in visitors lacking a role (default: /)
//! - `PORTAL_MIN_PASSWORD_LENGTH` - Minimum password length checked before calling the provider (default: 6)
//! - `PORTAL_PROVIDER_URL` - Remote identity provider endpoint
//! - `PORTAL_PROVIDER_API_KEY` - Identity provider API key (required when `PORTAL_PROVIDER_URL` is set)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name (default: development)

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const DEFAULT_LOGIN_PATH: &str = "/login";
const DEFAULT_HOME_PATH: &str = "/";
const DEFAULT_MIN_PASSWORD_LENGTH: usize = 6;
const DEFAULT_SENTRY_ENVIRONMENT: &str = "development";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &["your-", "changeme", "replace", "placeholder", "xxx"];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Portal configuration.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    /// Where guarded routes send denied visitors
    pub redirects: RedirectPaths,
    /// Minimum password length enforced before calling the provider
    pub min_password_length: usize,
    /// Identity provider connection settings
    pub provider: ProviderConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: String,
}

/// Redirect destinations for denied admissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectPaths {
    pub login: String,
    pub home: String,
}

impl Default for RedirectPaths {
    fn default() -> Self {
        Self {
            login: DEFAULT_LOGIN_PATH.to_string(),
            home: DEFAULT_HOME_PATH.to_string(),
        }
    }
}

/// Identity provider settings.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone, Default)]
pub struct ProviderConfig {
    /// Provider API key
    pub api_key: Option<SecretString>,
    /// Provider endpoint
    pub url: Option<Url>,
}

impl ProviderConfig {
    /// The remote endpoint and its key, if a remote provider is configured.
    #[must_use]
    pub fn remote(&self) -> Option<(&Url, &SecretString)> {
        self.url.as_ref().zip(self.api_key.as_ref())
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("url", &self.url.as_ref().map(Url::as_str))
            .finish()
    }
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            redirects: RedirectPaths::default(),
            min_password_length: DEFAULT_MIN_PASSWORD_LENGTH,
            provider: ProviderConfig::default(),
            sentry_dsn: None,
            sentry_environment: DEFAULT_SENTRY_ENVIRONMENT.to_string(),
        }
    }
}

impl PortalConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);

        let redirects = RedirectPaths {
            login: env.path_or_default("PORTAL_LOGIN_PATH", DEFAULT_LOGIN_PATH)?,
            home: env.path_or_default("PORTAL_HOME_PATH", DEFAULT_HOME_PATH)?,
        };

        let min_password_length = match env.optional("PORTAL_MIN_PASSWORD_LENGTH") {
            Some(raw) => parse_password_length(&raw)?,
            None => DEFAULT_MIN_PASSWORD_LENGTH,
        };

        let provider = ProviderConfig {
            api_key: env.optional_secret("PORTAL_PROVIDER_API_KEY")?,
            url: env
                .optional("PORTAL_PROVIDER_URL")
                .map(|raw| {
                    Url::parse(&raw).map_err(|e| {
                        ConfigError::InvalidEnvVar("PORTAL_PROVIDER_URL".to_string(), e.to_string())
                    })
                })
                .transpose()?,
        };
        if provider.url.is_some() && provider.api_key.is_none() {
            return Err(ConfigError::MissingEnvVar(
                "PORTAL_PROVIDER_API_KEY".to_string(),
            ));
        }

        Ok(Self {
            redirects,
            min_password_length,
            provider,
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env
                .optional("SENTRY_ENVIRONMENT")
                .unwrap_or_else(|| DEFAULT_SENTRY_ENVIRONMENT.to_string()),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    /// Get an optional variable; empty values count as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    /// Get a route path with a default value.
    fn path_or_default(&self, key: &str, default: &str) -> Result<String, ConfigError> {
        let Some(value) = self.optional(key) else {
            return Ok(default.to_string());
        };
        if !value.starts_with('/') {
            return Err(ConfigError::InvalidEnvVar(
                key.to_string(),
                format!("must be an absolute path (got {value})"),
            ));
        }
        Ok(value)
    }

    /// Get an optional secret, rejecting obvious placeholders.
    fn optional_secret(&self, key: &str) -> Result<Option<SecretString>, ConfigError> {
        self.optional(key)
            .map(|value| {
                let secret = SecretString::from(value);
                validate_not_placeholder(&secret, key)?;
                Ok(secret)
            })
            .transpose()
    }
}

fn parse_password_length(raw: &str) -> Result<usize, ConfigError> {
    let length = raw.trim().parse::<usize>().map_err(|e| {
        ConfigError::InvalidEnvVar("PORTAL_MIN_PASSWORD_LENGTH".to_string(), e.to_string())
    })?;
    if length == 0 {
        return Err(ConfigError::InvalidEnvVar(
            "PORTAL_MIN_PASSWORD_LENGTH".to_string(),
            "must be at least 1".to_string(),
        ));
    }
    Ok(length)
}

fn validate_not_placeholder(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.expose_secret().to_lowercase();
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }
    Ok(())
}
