//! Storefront client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `LUSTRE_ENV` - `local` or `production`; picks the built-in API base URL (default: local)
//! - `LUSTRE_API_BASE_URL` - Override the API base URL (staging, tests)
//! - `LUSTRE_HTTP_TIMEOUT_SECS` - Per-request timeout (default: 30)
//! - `LUSTRE_CATALOG_TTL_SECS` - Catalog cache lifetime (default: 300)
//! - `LUSTRE_PAYMENT_TIMEOUT_SECS` - Wait for the payment widget; `0` waits forever (default: 900)
//! - `LUSTRE_SHIPPING_FEE` - Flat shipping fee (default: 99)
//! - `LUSTRE_FREE_SHIPPING_THRESHOLD` - Subtotal for free shipping (default: 999)
//! - `LUSTRE_EMAIL` / `LUSTRE_PASSWORD` - Credentials to sign in with
//! - `LUSTRE_ACCESS_TOKEN` / `LUSTRE_REFRESH_TOKEN` - Previously issued tokens
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::str::FromStr;
use std::time::Duration;

use lustre_core::cart::ShippingPolicy;
use rust_decimal::Decimal;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

/// Local development API.
pub const LOCAL_API_BASE_URL: &str = "http://127.0.0.1:8000/api/";

/// Production API.
pub const PRODUCTION_API_BASE_URL: &str = "https://api.lustrejewels.in/api/";

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CATALOG_TTL_SECS: u64 = 300;
const DEFAULT_PAYMENT_TIMEOUT_SECS: u64 = 900;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Which built-in backend to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApiEnvironment {
    #[default]
    Local,
    Production,
}

impl ApiEnvironment {
    /// Built-in base URL for this environment.
    #[must_use]
    pub const fn base_url(&self) -> &'static str {
        match self {
            Self::Local => LOCAL_API_BASE_URL,
            Self::Production => PRODUCTION_API_BASE_URL,
        }
    }

    /// Name used for error-tracking environments.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Production => "production",
        }
    }
}

impl FromStr for ApiEnvironment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "dev" | "development" => Ok(Self::Local),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!("unknown environment: {other}")),
        }
    }
}

/// HTTP API configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub environment: ApiEnvironment,
    /// Base URL, always ending in `/` so endpoint paths join beneath it.
    pub base_url: Url,
    pub timeout: Duration,
}

impl ApiConfig {
    /// Configuration pointing at an explicit base URL.
    ///
    /// # Errors
    ///
    /// Returns `url::ParseError` if `base_url` is not a valid URL.
    pub fn for_base_url(base_url: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            environment: ApiEnvironment::Local,
            base_url: normalize_base_url(base_url)?,
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        })
    }
}

/// How the client should authenticate on startup.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone, Default)]
pub enum Credentials {
    #[default]
    None,
    Password {
        email: String,
        password: SecretString,
    },
    Tokens {
        access: SecretString,
        refresh: Option<SecretString>,
    },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Password { email, .. } => f
                .debug_struct("Password")
                .field("email", email)
                .field("password", &"[REDACTED]")
                .finish(),
            Self::Tokens { refresh, .. } => f
                .debug_struct("Tokens")
                .field("access", &"[REDACTED]")
                .field("refresh", &refresh.as_ref().map(|_| "[REDACTED]"))
                .finish(),
        }
    }
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    pub api: ApiConfig,
    /// Catalog cache lifetime.
    pub catalog_ttl: Duration,
    /// How long to wait for the payment widget; `None` waits indefinitely.
    pub payment_timeout: Option<Duration>,
    pub shipping: ShippingPolicy,
    pub credentials: Credentials,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid, or if only
    /// one half of a credential pair is set.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// See [`StorefrontConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let environment: ApiEnvironment = env.parsed_or("LUSTRE_ENV", ApiEnvironment::Local)?;
        let base_url = env
            .optional("LUSTRE_API_BASE_URL")
            .unwrap_or_else(|| environment.base_url().to_string());
        let base_url = normalize_base_url(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("LUSTRE_API_BASE_URL".to_string(), e.to_string())
        })?;
        let timeout = Duration::from_secs(
            env.parsed_or("LUSTRE_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?,
        );

        let catalog_ttl = Duration::from_secs(
            env.parsed_or("LUSTRE_CATALOG_TTL_SECS", DEFAULT_CATALOG_TTL_SECS)?,
        );
        let payment_timeout = match env
            .parsed_or("LUSTRE_PAYMENT_TIMEOUT_SECS", DEFAULT_PAYMENT_TIMEOUT_SECS)?
        {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        let defaults = ShippingPolicy::default();
        let shipping = ShippingPolicy {
            flat_fee: env.parsed_or::<Decimal>("LUSTRE_SHIPPING_FEE", defaults.flat_fee)?,
            free_shipping_threshold: env.parsed_or::<Decimal>(
                "LUSTRE_FREE_SHIPPING_THRESHOLD",
                defaults.free_shipping_threshold,
            )?,
        };

        let credentials = credentials_from(&env)?;

        Ok(Self {
            api: ApiConfig {
                environment,
                base_url,
                timeout,
            },
            catalog_ttl,
            payment_timeout,
            shipping,
            credentials,
            sentry_dsn: env.optional("SENTRY_DSN"),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Get an optional, non-empty variable.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    /// Get a required variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Parse a variable, falling back to `default` when unset.
    fn parsed_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key).map_or(Ok(default), |raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
    }
}

fn credentials_from<F>(env: &Env<F>) -> Result<Credentials, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(email) = env.optional("LUSTRE_EMAIL") {
        let password = env.required("LUSTRE_PASSWORD")?;
        return Ok(Credentials::Password {
            email,
            password: SecretString::from(password),
        });
    }
    if let Some(access) = env.optional("LUSTRE_ACCESS_TOKEN") {
        return Ok(Credentials::Tokens {
            access: SecretString::from(access),
            refresh: env.optional("LUSTRE_REFRESH_TOKEN").map(SecretString::from),
        });
    }
    Ok(Credentials::None)
}

/// Parse a base URL and make sure it ends with `/`.
fn normalize_base_url(raw: &str) -> Result<Url, url::ParseError> {
    let trimmed = raw.trim();
    if trimmed.ends_with('/') {
        Url::parse(trimmed)
    } else {
        Url::parse(&format!("{trimmed}/"))
    }
}
