//! Per-server bearer token cache for the token-auth panel backend.
//!
//! An explicit keyed store injected into the client so tests can assert
//! invalidation and retry behavior deterministically.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Tokens live slightly shorter than the panel's issue window so a cached
/// token is refreshed before the panel would start rejecting it.
const TOKEN_TTL: Duration = Duration::from_secs(50 * 60);

struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Keyed store of `server id -> bearer token` behind a mutex.
///
/// Clones share the underlying map, so one store handed to the registry at
/// startup serves every job and foreground call.
#[derive(Clone, Default)]
pub struct TokenStore {
    inner: Arc<Mutex<HashMap<i32, CachedToken>>>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached token for a server if present and not expired.
    pub fn get(&self, server_id: i32) -> Option<String> {
        let mut cache = self.inner.lock().ok()?;

        match cache.get(&server_id) {
            Some(cached) if cached.expires_at > Instant::now() => Some(cached.token.clone()),
            Some(_) => {
                cache.remove(&server_id);
                None
            }
            None => None,
        }
    }

    /// Stores a fresh token for a server with the standard TTL.
    pub fn put(&self, server_id: i32, token: String) {
        self.put_with_ttl(server_id, token, TOKEN_TTL);
    }

    fn put_with_ttl(&self, server_id: i32, token: String, ttl: Duration) {
        if let Ok(mut cache) = self.inner.lock() {
            cache.insert(
                server_id,
                CachedToken {
                    token,
                    expires_at: Instant::now() + ttl,
                },
            );
        }
    }

    /// Drops the cached token for a server, forcing re-authentication.
    pub fn invalidate(&self, server_id: i32) {
        if let Ok(mut cache) = self.inner.lock() {
            cache.remove(&server_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_stored_token() {
        let store = TokenStore::new();
        store.put(1, "abc".to_string());

        assert_eq!(store.get(1), Some("abc".to_string()));
        assert_eq!(store.get(2), None);
    }

    #[test]
    fn invalidate_forces_miss() {
        let store = TokenStore::new();
        store.put(1, "abc".to_string());
        store.invalidate(1);

        assert_eq!(store.get(1), None);
    }

    #[test]
    fn expired_token_is_dropped() {
        let store = TokenStore::new();
        store.put_with_ttl(1, "abc".to_string(), Duration::from_secs(0));

        assert_eq!(store.get(1), None);
    }

    #[test]
    fn clones_share_the_cache() {
        let store = TokenStore::new();
        let clone = store.clone();

        store.put(1, "abc".to_string());

        assert_eq!(clone.get(1), Some("abc".to_string()));
    }
}
