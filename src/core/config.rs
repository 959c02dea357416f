use crate::core::kernel::rate_limit::RateLimitPolicy;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::env;

pub const LIVE_REST_URL: &str = "https://api.pro.coinbase.com";
pub const SANDBOX_REST_URL: &str = "https://api-public.sandbox.pro.coinbase.com";

/// API key triple issued by Coinbase Pro
#[derive(Clone)]
pub struct Credentials {
    key: Secret<String>,
    secret: Secret<String>,
    passphrase: Secret<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("key", &"[REDACTED]")
            .field("secret", &"[REDACTED]")
            .field("passphrase", &"[REDACTED]")
            .finish()
    }
}

impl Credentials {
    /// `secret` is the base64 string shown by Coinbase when the key was created.
    pub fn new(key: String, secret: String, passphrase: String) -> Self {
        Self {
            key: Secret::new(key),
            secret: Secret::new(secret),
            passphrase: Secret::new(passphrase),
        }
    }

    pub fn key(&self) -> &str {
        self.key.expose_secret()
    }

    pub fn secret(&self) -> &Secret<String> {
        &self.secret
    }

    pub fn passphrase(&self) -> &str {
        self.passphrase.expose_secret()
    }

    pub fn is_complete(&self) -> bool {
        !self.key.expose_secret().is_empty()
            && !self.secret.expose_secret().is_empty()
            && !self.passphrase.expose_secret().is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub credentials: Credentials,
    pub sandbox: bool,
    pub base_url: Option<String>,
    pub timeout_seconds: u64,
    pub user_agent: String,
    pub rate_limit_policy: RateLimitPolicy,
}

// Custom Serialize implementation - never expose secrets in serialization
impl Serialize for ClientConfig {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("ClientConfig", 8)?;
        state.serialize_field("api_key", "[REDACTED]")?;
        state.serialize_field("api_secret", "[REDACTED]")?;
        state.serialize_field("api_passphrase", "[REDACTED]")?;
        state.serialize_field("sandbox", &self.sandbox)?;
        state.serialize_field("base_url", &self.base_url)?;
        state.serialize_field("timeout_seconds", &self.timeout_seconds)?;
        state.serialize_field("user_agent", &self.user_agent)?;
        state.serialize_field("rate_limit_policy", &self.rate_limit_policy)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for ClientConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct ClientConfigHelper {
            api_key: String,
            api_secret: String,
            api_passphrase: String,
            #[serde(default)]
            sandbox: bool,
            base_url: Option<String>,
            timeout_seconds: Option<u64>,
            user_agent: Option<String>,
            #[serde(default)]
            rate_limit_policy: RateLimitPolicy,
        }

        let helper = ClientConfigHelper::deserialize(deserializer)?;
        let mut config = Self::new(helper.api_key, helper.api_secret, helper.api_passphrase)
            .sandbox(helper.sandbox)
            .rate_limit_policy(helper.rate_limit_policy);
        config.base_url = helper.base_url;
        if let Some(timeout) = helper.timeout_seconds {
            config.timeout_seconds = timeout;
        }
        if let Some(user_agent) = helper.user_agent {
            config.user_agent = user_agent;
        }
        Ok(config)
    }
}

impl ClientConfig {
    /// Create a new configuration with API credentials
    #[must_use]
    pub fn new(api_key: String, api_secret: String, api_passphrase: String) -> Self {
        Self {
            credentials: Credentials::new(api_key, api_secret, api_passphrase),
            sandbox: false,
            base_url: None,
            timeout_seconds: 30,
            user_agent: concat!("cbpro/", env!("CARGO_PKG_VERSION")).to_string(),
            rate_limit_policy: RateLimitPolicy::default(),
        }
    }

    /// Create configuration from environment variables
    ///
    /// Expected environment variables:
    /// - `{PREFIX}_API_KEY`
    /// - `{PREFIX}_API_SECRET` (base64, as issued)
    /// - `{PREFIX}_API_PASSPHRASE`
    /// - `{PREFIX}_SANDBOX` (optional, defaults to false)
    /// - `{PREFIX}_BASE_URL` (optional)
    pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
        let prefix = prefix.to_uppercase();
        let required = |suffix: &str| {
            let name = format!("{}_{}", prefix, suffix);
            env::var(&name).map_err(|_| ConfigError::MissingEnvironmentVariable(name))
        };

        let api_key = required("API_KEY")?;
        let api_secret = required("API_SECRET")?;
        let api_passphrase = required("API_PASSPHRASE")?;

        let sandbox = match env::var(format!("{}_SANDBOX", prefix)) {
            Ok(raw) => raw.parse::<bool>().map_err(|_| {
                ConfigError::InvalidConfiguration(format!(
                    "{}_SANDBOX must be true or false, got '{}'",
                    prefix, raw
                ))
            })?,
            Err(_) => false,
        };

        let mut config = Self::new(api_key, api_secret, api_passphrase).sandbox(sandbox);
        config.base_url = env::var(format!("{}_BASE_URL", prefix)).ok();
        Ok(config)
    }

    /// Create configuration from a .env file and environment variables
    ///
    /// A missing file is not an error; the process environment is used as is.
    #[cfg(feature = "env-file")]
    pub fn from_env_file(prefix: &str, env_file_path: &str) -> Result<Self, ConfigError> {
        match dotenv::from_path(env_file_path) {
            Ok(()) => {}
            Err(dotenv::Error::Io(io_err)) if io_err.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(ConfigError::InvalidConfiguration(format!(
                    "Failed to load .env file '{}': {}",
                    env_file_path, e
                )));
            }
        }

        Self::from_env(prefix)
    }

    /// Use the sandbox API
    #[must_use]
    pub const fn sandbox(mut self, sandbox: bool) -> Self {
        self.sandbox = sandbox;
        self
    }

    /// Set custom base URL
    #[must_use]
    pub fn base_url(mut self, base_url: String) -> Self {
        self.base_url = Some(base_url);
        self
    }

    #[must_use]
    pub const fn timeout_seconds(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    #[must_use]
    pub const fn rate_limit_policy(mut self, policy: RateLimitPolicy) -> Self {
        self.rate_limit_policy = policy;
        self
    }

    /// The REST root requests are sent to: explicit override, else live or sandbox.
    pub fn rest_url(&self) -> &str {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/'),
            None if self.sandbox => SANDBOX_REST_URL,
            None => LIVE_REST_URL,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvironmentVariable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}
