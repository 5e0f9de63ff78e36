//! HMAC-based URL signing for backends without a native pre-signing API.
//!
//! A signed URL carries `expires` (unix seconds) and `sig`, where `sig` is
//! `base64url(HMAC-SHA256(secret, "<path>\n<expires>"))`. Whoever serves the
//! files holds the same secret and checks requests with [`UrlSigner::verify`].

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use snafu::prelude::*;
use url::Url;

use crate::storage::{SigningSnafu, StorageResult};

type HmacSha256 = Hmac<Sha256>;

/// Signs and verifies `(path, expires)` pairs with a shared secret.
#[derive(Clone)]
pub struct UrlSigner {
    secret: Vec<u8>,
}

impl std::fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSigner").finish_non_exhaustive()
    }
}

impl UrlSigner {
    /// Create a signer from an explicit secret.
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Create a signer with a random per-process secret.
    ///
    /// URLs minted by an ephemeral signer can only be verified by the same
    /// process.
    pub fn ephemeral() -> Self {
        let mut secret = Vec::with_capacity(32);
        secret.extend_from_slice(uuid::Uuid::new_v4().as_bytes());
        secret.extend_from_slice(uuid::Uuid::new_v4().as_bytes());
        Self { secret }
    }

    fn mac(&self, path: &str) -> StorageResult<HmacSha256> {
        let Ok(mac) = HmacSha256::new_from_slice(&self.secret) else {
            return SigningSnafu {
                path,
                message: "failed to initialize hmac",
            }
            .fail();
        };
        Ok(mac)
    }

    /// Compute the signature for `path` expiring at `expires` (unix seconds).
    pub fn sign(&self, path: &str, expires: i64) -> StorageResult<String> {
        let mut mac = self.mac(path)?;
        mac.update(path.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        Ok(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
    }

    /// Check a signature and its expiry against `now` (unix seconds).
    pub fn verify(&self, path: &str, expires: i64, sig: &str, now: i64) -> bool {
        if expires < now {
            return false;
        }
        let Ok(raw) = URL_SAFE_NO_PAD.decode(sig) else {
            return false;
        };
        let Ok(mut mac) = self.mac(path) else {
            return false;
        };
        mac.update(path.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        mac.verify_slice(&raw).is_ok()
    }

    /// Render a full signed URL under `base`.
    ///
    /// Each segment of `path` is percent-encoded into the URL; the signature
    /// covers the raw path.
    pub fn signed_url(&self, base: &str, path: &str, expires: i64) -> StorageResult<String> {
        let sig = self.sign(path, expires)?;
        let Ok(mut url) = Url::parse(base) else {
            return SigningSnafu {
                path,
                message: format!("invalid url base {base}"),
            }
            .fail();
        };
        let Ok(mut segments) = url.path_segments_mut() else {
            return SigningSnafu {
                path,
                message: format!("url base {base} cannot hold a path"),
            }
            .fail();
        };
        segments
            .pop_if_empty()
            .extend(path.trim_start_matches('/').split('/'));
        drop(segments);
        url.set_query(Some(&format!("expires={expires}&sig={sig}")));
        Ok(url.into())
    }
}
