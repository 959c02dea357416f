use crate::core::config::Credentials;
use crate::core::errors::CbproError;
use crate::core::kernel::clock::Clock;
use crate::core::kernel::signer::{HmacSigner, Signer};
use reqwest::Method;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{instrument, trace};

pub const HEADER_ACCESS_KEY: &str = "CB-ACCESS-KEY";
pub const HEADER_ACCESS_SIGN: &str = "CB-ACCESS-SIGN";
pub const HEADER_ACCESS_TIMESTAMP: &str = "CB-ACCESS-TIMESTAMP";
pub const HEADER_ACCESS_PASSPHRASE: &str = "CB-ACCESS-PASSPHRASE";
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";

/// Method, path and body of one API call, before signing
///
/// The path includes the query string, since both are covered by the signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointTarget {
    method: Method,
    path: String,
    body: Option<Vec<u8>>,
}

impl EndpointTarget {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let path = path.into();
        let path = if path.starts_with('/') {
            path
        } else {
            format!("/{}", path)
        };
        Self {
            method,
            path,
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Attach a raw body. An empty body is the same as none.
    #[must_use]
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = if body.is_empty() { None } else { Some(body) };
        self
    }

    pub fn with_json<T: Serialize>(self, body: &T) -> Result<Self, CbproError> {
        let bytes = serde_json::to_vec(body).map_err(|e| {
            CbproError::InvalidParameters(format!("Failed to serialize request body: {}", e))
        })?;
        Ok(self.with_body(bytes))
    }

    /// Append URL-encoded query parameters to the path
    pub fn with_query(mut self, params: &[(&str, &str)]) -> Result<Self, CbproError> {
        if params.is_empty() {
            return Ok(self);
        }
        let query = serde_urlencoded::to_string(params).map_err(|e| {
            CbproError::InvalidParameters(format!("Failed to encode query string: {}", e))
        })?;
        let separator = if self.path.contains('?') { '&' } else { '?' };
        self.path.push(separator);
        self.path.push_str(&query);
        Ok(self)
    }

    pub const fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }
}

/// A target with its authentication headers, valid for one send
///
/// There are no setters: a different body or path needs a new request, and
/// with it a new timestamp and signature.
#[derive(Clone)]
pub struct SignedRequest {
    target: EndpointTarget,
    url: String,
    timestamp: String,
    headers: Vec<(&'static str, String)>,
}

impl SignedRequest {
    pub const fn method(&self) -> &Method {
        self.target.method()
    }

    pub fn path(&self) -> &str {
        self.target.path()
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.target.body()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn headers(&self) -> &[(&'static str, String)] {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

impl fmt::Debug for SignedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: Vec<(&str, &str)> = self
            .headers
            .iter()
            .map(|(key, value)| match *key {
                HEADER_ACCESS_SIGN | HEADER_ACCESS_PASSPHRASE => (*key, "[REDACTED]"),
                _ => (*key, value.as_str()),
            })
            .collect();
        f.debug_struct("SignedRequest")
            .field("method", self.method())
            .field("url", &self.url)
            .field("timestamp", &self.timestamp)
            .field("headers", &headers)
            .field("body_len", &self.body().map_or(0, <[u8]>::len))
            .finish()
    }
}

/// Builds signed requests against one base URL with one set of credentials
#[derive(Clone)]
pub struct RequestBuilder {
    base_url: String,
    api_key: String,
    passphrase: String,
    signer: Arc<dyn Signer>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for RequestBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBuilder")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl RequestBuilder {
    /// Fails with `InvalidCredential` when the secret is not base64.
    pub fn new(
        base_url: &str,
        credentials: &Credentials,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, CbproError> {
        let signer = HmacSigner::new(credentials.secret())?;
        Ok(Self::with_signer(base_url, credentials, Arc::new(signer), clock))
    }

    pub fn with_signer(
        base_url: &str,
        credentials: &Credentials,
        signer: Arc<dyn Signer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: credentials.key().to_string(),
            passphrase: credentials.passphrase().to_string(),
            signer,
            clock,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sign `target` with a timestamp read once from the clock.
    #[instrument(skip(self, target), fields(method = %target.method(), path = %target.path()))]
    pub fn build(&self, target: &EndpointTarget) -> Result<SignedRequest, CbproError> {
        let timestamp = self.clock.unix_seconds()?.to_string();
        let body = target.body().unwrap_or_default();
        let signature = self
            .signer
            .sign(&timestamp, target.method().as_str(), target.path(), body);

        let mut headers = vec![
            (HEADER_ACCESS_KEY, self.api_key.clone()),
            (HEADER_ACCESS_SIGN, signature),
            (HEADER_ACCESS_TIMESTAMP, timestamp.clone()),
            (HEADER_ACCESS_PASSPHRASE, self.passphrase.clone()),
        ];
        if target.body().is_some() {
            headers.push((HEADER_CONTENT_TYPE, "application/json".to_string()));
        }

        trace!(%timestamp, "signed request");

        Ok(SignedRequest {
            target: target.clone(),
            url: format!("{}{}", self.base_url, target.path()),
            timestamp,
            headers,
        })
    }
}
