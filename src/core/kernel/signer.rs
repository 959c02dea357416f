use crate::core::errors::CbproError;
use base64::engine::general_purpose;
use base64::Engine;
use hmac::{Hmac, Mac};
use secrecy::zeroize::Zeroizing;
use secrecy::{ExposeSecret, Secret};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Signer trait for request authentication
///
/// Implementations are pure: the same inputs always produce the same
/// signature, and signing never fails once the signer exists.
pub trait Signer: Send + Sync {
    /// Sign one request
    ///
    /// # Arguments
    /// * `timestamp` - Unix seconds, exactly as sent in the timestamp header
    /// * `method` - Upper-case HTTP method
    /// * `path` - Request path including any query string
    /// * `body` - Raw request body bytes, empty when there is none
    fn sign(&self, timestamp: &str, method: &str, path: &str, body: &[u8]) -> String;
}

/// Sign a request directly from the base64-encoded secret.
///
/// The message is `timestamp || method || path || body`, the MAC is
/// HMAC-SHA256 keyed with the decoded secret, and the result is the standard
/// base64 encoding of the digest.
pub fn sign(
    secret: &str,
    timestamp: &str,
    method: &str,
    path: &str,
    body: &[u8],
) -> Result<String, CbproError> {
    let signer = HmacSigner::from_base64(secret)?;
    Ok(signer.sign(timestamp, method, path, body))
}

/// HMAC-SHA256 signer keyed with the decoded API secret
///
/// Only the keyed MAC state is kept; each signature starts from a clone of it.
#[derive(Clone)]
pub struct HmacSigner {
    mac: HmacSha256,
}

impl HmacSigner {
    /// Decode the base64 API secret once, up front.
    ///
    /// A secret that does not decode is a configuration problem, so it is
    /// reported here rather than on every request.
    pub fn new(secret: &Secret<String>) -> Result<Self, CbproError> {
        Self::from_base64(secret.expose_secret())
    }

    fn from_base64(secret: &str) -> Result<Self, CbproError> {
        // The decode error names an offset, never the secret's content
        let key = Zeroizing::new(
            general_purpose::STANDARD
                .decode(secret.trim())
                .map_err(|e| {
                    CbproError::InvalidCredential(format!("API secret is not valid base64: {}", e))
                })?,
        );
        let mac = HmacSha256::new_from_slice(&key)
            .map_err(|e| CbproError::InvalidCredential(format!("Unusable API secret: {}", e)))?;
        Ok(Self { mac })
    }
}

impl std::fmt::Debug for HmacSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacSigner").finish_non_exhaustive()
    }
}

impl Signer for HmacSigner {
    fn sign(&self, timestamp: &str, method: &str, path: &str, body: &[u8]) -> String {
        let mut mac = self.mac.clone();
        mac.update(timestamp.as_bytes());
        mac.update(method.as_bytes());
        mac.update(path.as_bytes());
        mac.update(body);
        general_purpose::STANDARD.encode(mac.finalize().into_bytes())
    }
}
