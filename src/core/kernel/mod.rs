/// `cbpro` Kernel - the authenticated request pipeline
///
/// Every API call flows through the same stages:
///
/// ## Request Building
/// - `EndpointTarget`: method, path (with query) and optional body
/// - `RequestBuilder`: reads the `Clock` once, signs with the `Signer`, and
///   attaches the four `CB-ACCESS-*` headers
/// - `HmacSigner`: HMAC-SHA256 over `timestamp || method || path || body`
///
/// ## Dispatch
/// - `RateLimiter`: per-`EndpointClass` budgets, fail-fast or blocking
/// - `HttpTransport`: injected transport; `ReqwestTransport` in production
/// - `AuthenticatedRest`: ties the above together and classifies responses
///
/// ## Decoding and Pagination
/// - `decode_json` / `decode_api_error`: typed bodies and structured API errors
/// - `paginate`: lazy stream over cursor-paginated listings
///
/// # Example
/// ```rust,no_run
/// use cbpro::core::config::ClientConfig;
/// use cbpro::core::kernel::*;
/// use futures_util::TryStreamExt;
///
/// # async fn example() -> Result<(), cbpro::CbproError> {
/// let config = ClientConfig::new(
///     "api_key".to_string(),
///     "c2VjcmV0".to_string(),
///     "passphrase".to_string(),
/// )
/// .sandbox(true);
/// let rest = AuthenticatedRest::new(&config)?;
///
/// let accounts: serde_json::Value = rest.get_json("/accounts", EndpointClass::Accounts).await?;
///
/// let ledger = PageRequest::new("/accounts/abc123/ledger").with_limit(100);
/// let entries: Vec<serde_json::Value> = paginate(&rest, ledger, EndpointClass::Accounts)
///     .try_collect()
///     .await?;
/// # let _ = (accounts, entries);
/// # Ok(())
/// # }
/// ```
pub mod clock;
pub mod codec;
pub mod paginate;
pub mod rate_limit;
pub mod request;
pub mod rest;
pub mod signer;
pub mod transport;

// Re-export key types for convenience
pub use clock::{Clock, FixedClock, SystemClock};
pub use codec::{decode_api_error, decode_json};
pub use paginate::{paginate, Cursor, Page, PageDirection, PageRequest, PageStream};
pub use rate_limit::{EndpointClass, RateLimit, RateLimitPolicy, RateLimiter};
pub use request::{EndpointTarget, RequestBuilder, SignedRequest};
pub use rest::{AuthenticatedRest, RestClient};
pub use signer::{sign, HmacSigner, Signer};
pub use transport::{HttpTransport, RawResponse, ReqwestTransport, TransportError};
