use crate::core::kernel::rate_limit::EndpointClass;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CbproError {
    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    #[error("Network error on {path}: {message}")]
    Network { path: String, message: String },

    #[error("Rate limited: {class} budget exhausted, {path} was not sent")]
    RateLimited { class: EndpointClass, path: String },

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Failed to decode response from {path}: {reason}")]
    Decode {
        path: String,
        reason: String,
        body: Vec<u8>,
    },

    #[error("Request to {path} was cancelled")]
    Cancelled { path: String },

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::core::config::ConfigError),
}

/// Fieldless discriminant of [`CbproError`], for callers that only branch on the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidCredential,
    Network,
    RateLimited,
    Api,
    Decode,
    Cancelled,
    InvalidParameters,
    Config,
}

impl CbproError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidCredential(_) => ErrorKind::InvalidCredential,
            Self::Network { .. } => ErrorKind::Network,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::Api(_) => ErrorKind::Api,
            Self::Decode { .. } => ErrorKind::Decode,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::InvalidParameters(_) => ErrorKind::InvalidParameters,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    /// Whether re-building and re-sending the same request could succeed.
    ///
    /// Nothing in this crate acts on this; retry policy belongs to the caller.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } | Self::RateLimited { .. } => true,
            Self::Api(err) => err.status == 429 || err.status >= 500,
            _ => false,
        }
    }

    /// The request path the error was produced for, when one was attempted.
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Network { path, .. }
            | Self::RateLimited { path, .. }
            | Self::Decode { path, .. }
            | Self::Cancelled { path } => Some(path),
            Self::Api(err) => Some(&err.path),
            _ => None,
        }
    }
}

/// A non-2xx response from the API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: u16,
    pub message: String,
    /// Upstream error code, when the body carried one
    pub code: Option<String>,
    pub path: String,
    pub body: String,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "API error {} on {}: {}", self.status, self.path, self.message)?;
        if let Some(code) = &self.code {
            write!(f, " ({})", code)?;
        }
        Ok(())
    }
}
