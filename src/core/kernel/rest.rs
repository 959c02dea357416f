use crate::core::config::{ClientConfig, ConfigError};
use crate::core::errors::CbproError;
use crate::core::kernel::clock::{Clock, SystemClock};
use crate::core::kernel::codec::{decode_api_error, decode_json};
use crate::core::kernel::paginate::{Cursor, Page};
use crate::core::kernel::rate_limit::{EndpointClass, RateLimiter};
use crate::core::kernel::request::{EndpointTarget, RequestBuilder, SignedRequest};
use crate::core::kernel::transport::{HttpTransport, RawResponse, ReqwestTransport};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// REST client trait for authenticated requests
///
/// Every call builds a freshly signed request, so calling again is also the
/// only way to retry: nothing here retries on its own.
#[async_trait]
pub trait RestClient: Send + Sync {
    /// Sign, rate-limit and send `target`, returning the 2xx response
    ///
    /// # Arguments
    /// * `target` - Method, path (with query) and body to send
    /// * `class` - Rate-limit budget the request draws from
    async fn execute(
        &self,
        target: &EndpointTarget,
        class: EndpointClass,
    ) -> Result<RawResponse, CbproError>;

    /// Execute and deserialize the body into `T`
    async fn request_json<T: DeserializeOwned + Send>(
        &self,
        target: &EndpointTarget,
        class: EndpointClass,
    ) -> Result<T, CbproError> {
        let response = self.execute(target, class).await?;
        decode_json(target.path(), &response)
    }

    /// GET `path` and deserialize the body into `T`
    async fn get_json<T: DeserializeOwned + Send>(
        &self,
        path: &str,
        class: EndpointClass,
    ) -> Result<T, CbproError> {
        self.request_json(&EndpointTarget::get(path), class).await
    }

    /// Execute and decode one page of a cursor-paginated listing
    async fn get_page<T: DeserializeOwned + Send>(
        &self,
        target: &EndpointTarget,
        class: EndpointClass,
    ) -> Result<Page<T>, CbproError> {
        let response = self.execute(target, class).await?;
        let items = decode_json(target.path(), &response)?;
        Ok(Page {
            items,
            cursor: Cursor::from_response(&response),
        })
    }
}

/// Authenticated client: request builder, rate limiter and injected transport
#[derive(Clone)]
pub struct AuthenticatedRest<T: HttpTransport = ReqwestTransport> {
    builder: RequestBuilder,
    transport: T,
    limiter: Arc<RateLimiter>,
    timeout: Option<Duration>,
}

impl<T: HttpTransport> std::fmt::Debug for AuthenticatedRest<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticatedRest")
            .field("builder", &self.builder)
            .field("limiter", &self.limiter)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl AuthenticatedRest<ReqwestTransport> {
    /// Client over reqwest, configured from `config`
    pub fn new(config: &ClientConfig) -> Result<Self, CbproError> {
        let transport = ReqwestTransport::new(
            Duration::from_secs(config.timeout_seconds),
            &config.user_agent,
        )
        .map_err(|e| ConfigError::InvalidConfiguration(e.to_string()))?;
        Self::with_transport(config, transport)
    }
}

impl<T: HttpTransport> AuthenticatedRest<T> {
    /// Client over any transport, with the wall clock and documented rate limits
    pub fn with_transport(config: &ClientConfig, transport: T) -> Result<Self, CbproError> {
        Self::with_clock(config, transport, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: &ClientConfig,
        transport: T,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, CbproError> {
        let builder = RequestBuilder::new(config.rest_url(), &config.credentials, clock)?;
        let limiter = Arc::new(RateLimiter::new(config.rate_limit_policy));
        Ok(Self::from_parts(builder, transport, limiter)
            .with_timeout(Some(Duration::from_secs(config.timeout_seconds))))
    }

    /// Assemble from parts; clients sharing `limiter` share its budgets.
    pub fn from_parts(
        builder: RequestBuilder,
        transport: T,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            builder,
            transport,
            limiter,
            timeout: None,
        }
    }

    /// Upper bound on each transport call; `None` waits indefinitely.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout.filter(|timeout| !timeout.is_zero());
        self
    }

    pub const fn request_builder(&self) -> &RequestBuilder {
        &self.builder
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn build(&self, target: &EndpointTarget) -> Result<SignedRequest, CbproError> {
        self.builder.build(target)
    }

    /// Send a signed request and classify the outcome
    pub async fn dispatch(
        &self,
        request: &SignedRequest,
        class: EndpointClass,
    ) -> Result<RawResponse, CbproError> {
        self.dispatch_until(request, class, std::future::pending::<()>())
            .await
    }

    /// Like [`dispatch`](Self::dispatch), abandoning the call once `cancel` completes.
    ///
    /// `request` was signed before its permit was taken, so under
    /// [`RateLimitPolicy::Block`](crate::core::kernel::RateLimitPolicy::Block) a
    /// long wait ages its timestamp; prefer [`execute_until`](Self::execute_until).
    #[instrument(skip(self, request, cancel), fields(method = %request.method(), path = %request.path(), %class))]
    pub async fn dispatch_until<F>(
        &self,
        request: &SignedRequest,
        class: EndpointClass,
        cancel: F,
    ) -> Result<RawResponse, CbproError>
    where
        F: Future<Output = ()> + Send,
    {
        let path = request.path();
        let attempt = async {
            self.limiter.acquire(class, path).await?;
            self.send(request).await
        };
        Self::settle(path, attempt, cancel).await
    }

    /// Take a permit, then build, sign and send `target`, abandoning the call
    /// once `cancel` completes.
    ///
    /// The timestamp is read after the permit is granted, so a blocking wait
    /// never sends a stale signature. Waiting for the permit is cancellable
    /// too. The in-flight transport future is dropped on cancellation or
    /// timeout, which closes its connection.
    #[instrument(skip(self, target, cancel), fields(method = %target.method(), path = %target.path(), %class))]
    pub async fn execute_until<F>(
        &self,
        target: &EndpointTarget,
        class: EndpointClass,
        cancel: F,
    ) -> Result<RawResponse, CbproError>
    where
        F: Future<Output = ()> + Send,
    {
        let path = target.path();
        let attempt = async {
            self.limiter.acquire(class, path).await?;
            let request = self.builder.build(target)?;
            self.send(&request).await
        };
        Self::settle(path, attempt, cancel).await
    }

    /// Race `attempt` against `cancel` and classify the response
    async fn settle<A, F>(path: &str, attempt: A, cancel: F) -> Result<RawResponse, CbproError>
    where
        A: Future<Output = Result<RawResponse, CbproError>> + Send,
        F: Future<Output = ()> + Send,
    {
        let response = tokio::select! {
            biased;
            () = cancel => {
                warn!("request cancelled by caller");
                return Err(CbproError::Cancelled { path: path.to_string() });
            }
            response = attempt => response?,
        };

        if response.is_success() {
            debug!(status = response.status, "request succeeded");
            Ok(response)
        } else {
            let err = decode_api_error(path, response);
            warn!(status = err.status, message = %err.message, "API returned an error");
            Err(err.into())
        }
    }

    async fn send(&self, request: &SignedRequest) -> Result<RawResponse, CbproError> {
        let network_error = |message: String| CbproError::Network {
            path: request.path().to_string(),
            message,
        };

        let result = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.transport.execute(request))
                .await
                .map_err(|_| network_error(format!("timed out after {:?}", timeout)))?,
            None => self.transport.execute(request).await,
        };
        result.map_err(|e| network_error(e.to_string()))
    }
}

#[async_trait]
impl<T: HttpTransport> RestClient for AuthenticatedRest<T> {
    async fn execute(
        &self,
        target: &EndpointTarget,
        class: EndpointClass,
    ) -> Result<RawResponse, CbproError> {
        self.execute_until(target, class, std::future::pending::<()>())
            .await
    }
}
