use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use chrono::{DateTime, Utc};

use crate::storage::{StorageBackend, StorageResult};

/// A minted URL together with the instant it stops working.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUrl {
    /// The URL handed to the client.
    pub url: String,
    /// When the URL expires.
    pub expires_at: DateTime<Utc>,
}

impl SignedUrl {
    /// Expiration as epoch milliseconds, the unit used on the wire.
    pub fn expiration_millis(&self) -> i64 {
        self.expires_at.timestamp_millis()
    }
}

type CacheKey = (String, String);

/// Caller-owned cache of signed URLs keyed by `(backend id, path)`.
///
/// A cached URL is handed out again only while it still has more than
/// `refresh_margin` of validity left. Expired entries are evicted on every
/// insert and on demand via [`SignedUrlCache::evict_expired`]. Clones share
/// the same entries.
#[derive(Debug, Clone)]
pub struct SignedUrlCache {
    entries: Arc<Mutex<HashMap<CacheKey, SignedUrl>>>,
    refresh_margin: chrono::Duration,
}

impl Default for SignedUrlCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::MAX)
}

impl SignedUrlCache {
    /// Create an empty cache with the given refresh margin.
    pub fn new(refresh_margin: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            refresh_margin: to_chrono(refresh_margin),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, SignedUrl>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a URL that is still usable at `now`.
    pub fn get(&self, backend_id: &str, path: &str, now: DateTime<Utc>) -> Option<SignedUrl> {
        let key = (backend_id.to_string(), path.to_string());
        self.lock()
            .get(&key)
            .filter(|cached| {
                cached
                    .expires_at
                    .checked_sub_signed(self.refresh_margin)
                    .is_some_and(|fresh_until| fresh_until > now)
            })
            .cloned()
    }

    /// Store a freshly minted URL, evicting anything already expired at `now`.
    pub fn insert(&self, backend_id: &str, path: &str, url: SignedUrl, now: DateTime<Utc>) {
        let mut entries = self.lock();
        entries.retain(|_, cached| cached.expires_at > now);
        entries.insert((backend_id.to_string(), path.to_string()), url);
    }

    /// Drop every entry expired at `now`; returns how many were removed.
    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, cached| cached.expires_at > now);
        before - entries.len()
    }

    /// Number of cached entries (including ones inside the refresh margin).
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return a cached URL for `path` or mint a new one through `backend`.
    pub async fn get_or_mint(
        &self,
        backend: &dyn StorageBackend,
        path: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> StorageResult<SignedUrl> {
        if let Some(cached) = self.get(backend.id(), path, now) {
            return Ok(cached);
        }

        let url = backend.presigned_url(path, ttl).await?;
        let signed = SignedUrl {
            url,
            expires_at: now
                .checked_add_signed(to_chrono(ttl))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        };
        self.insert(backend.id(), path, signed.clone(), now);
        Ok(signed)
    }
}
