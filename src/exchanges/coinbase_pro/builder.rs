use crate::core::config::{ClientConfig, Credentials};
use crate::core::errors::CbproError;
use crate::core::kernel::{AuthenticatedRest, RateLimitPolicy, ReqwestTransport};
use crate::exchanges::coinbase_pro::rest::CoinbaseRest;

/// Builder for Coinbase Pro clients
///
/// Starts from the live endpoint with fail-fast rate limiting; every option
/// can be overridden before `build`.
#[derive(Debug, Default)]
pub struct CoinbaseBuilder {
    config: Option<ClientConfig>,
    sandbox: Option<bool>,
    base_url: Option<String>,
    timeout_seconds: Option<u64>,
    rate_limit_policy: Option<RateLimitPolicy>,
}

impl CoinbaseBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a complete configuration
    #[must_use]
    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set API credentials, keeping any options already set
    #[must_use]
    pub fn with_credentials(mut self, api_key: String, api_secret: String, passphrase: String) -> Self {
        let config = match self.config.take() {
            Some(mut config) => {
                config.credentials = Credentials::new(api_key, api_secret, passphrase);
                config
            }
            None => ClientConfig::new(api_key, api_secret, passphrase),
        };
        self.config = Some(config);
        self
    }

    #[must_use]
    pub fn with_sandbox(mut self, sandbox: bool) -> Self {
        self.sandbox = Some(sandbox);
        self
    }

    /// Override the REST root, e.g. for a local mock server
    #[must_use]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = Some(base_url);
        self
    }

    #[must_use]
    pub fn with_timeout_seconds(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = Some(timeout_seconds);
        self
    }

    #[must_use]
    pub fn with_rate_limit_policy(mut self, policy: RateLimitPolicy) -> Self {
        self.rate_limit_policy = Some(policy);
        self
    }

    /// The configuration `build` would use
    pub fn config(self) -> Result<ClientConfig, CbproError> {
        let mut config = self.config.ok_or_else(|| {
            CbproError::InvalidCredential("API key, secret and passphrase are required".to_string())
        })?;

        if let Some(sandbox) = self.sandbox {
            config = config.sandbox(sandbox);
        }
        if let Some(base_url) = self.base_url {
            config = config.base_url(base_url);
        }
        if let Some(timeout_seconds) = self.timeout_seconds {
            config = config.timeout_seconds(timeout_seconds);
        }
        if let Some(policy) = self.rate_limit_policy {
            config = config.rate_limit_policy(policy);
        }

        if !config.credentials.is_complete() {
            return Err(CbproError::InvalidCredential(
                "API key, secret and passphrase must all be non-empty".to_string(),
            ));
        }
        Ok(config)
    }

    /// Build a client over reqwest
    pub fn build(self) -> Result<CoinbaseRest<AuthenticatedRest<ReqwestTransport>>, CbproError> {
        let config = self.config()?;
        let rest = AuthenticatedRest::new(&config)?;
        Ok(CoinbaseRest::new(rest))
    }
}

/// Build a client from `config`
pub fn build_client(
    config: ClientConfig,
) -> Result<CoinbaseRest<AuthenticatedRest<ReqwestTransport>>, CbproError> {
    CoinbaseBuilder::new().with_config(config).build()
}
