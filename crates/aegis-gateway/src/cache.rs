//! Response cache (§4.11 "Caching"): only GET with `cache_enabled`. Cache
//! key = hash(service, endpoint, method, normalized query string).
//! Successful (<400) responses are cached with the group's TTL; stale
//! entries are discarded rather than refreshed in place.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::entities::ServiceResponse;

fn normalize_query(query: &str) -> String {
    let mut pairs: Vec<&str> = query.split('&').filter(|p| !p.is_empty()).collect();
    pairs.sort_unstable();
    pairs.join("&")
}

pub fn cache_key(service: &str, endpoint: &str, method: &str, query: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(service.as_bytes());
    hasher.update(b"\0");
    hasher.update(endpoint.as_bytes());
    hasher.update(b"\0");
    hasher.update(method.as_bytes());
    hasher.update(b"\0");
    hasher.update(normalize_query(query).as_bytes());
    hex::encode(hasher.finalize())
}

struct CacheEntry {
    response: ServiceResponse,
    expires_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct ResponseCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<ServiceResponse> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Utc::now() => {
                let mut response = entry.response.clone();
                response.cached = true;
                Some(response)
            }
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Only call for GET responses with `cache_enabled` and status < 400
    /// (§4.11); the gateway engine enforces that, not this store.
    pub fn put(&self, key: &str, response: ServiceResponse, ttl: Duration) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            key.to_string(),
            CacheEntry {
                response,
                expires_at: Utc::now() + chrono::Duration::from_std(ttl).unwrap_or_default(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn sample_response() -> ServiceResponse {
        ServiceResponse {
            status_code: 200,
            headers: BTreeMap::new(),
            body: serde_json::json!({"ok": true}),
            duration_ms: 12.0,
            cached: false,
        }
    }

    #[test]
    fn query_param_order_does_not_change_key() {
        let a = cache_key("scan", "/run", "GET", "b=2&a=1");
        let b = cache_key("scan", "/run", "GET", "a=1&b=2");
        assert_eq!(a, b);
    }

    #[test]
    fn hit_within_ttl_marks_cached() {
        let cache = ResponseCache::new();
        let key = cache_key("scan", "/run", "GET", "");
        cache.put(&key, sample_response(), Duration::from_secs(60));
        let hit = cache.get(&key).unwrap();
        assert!(hit.cached);
    }

    #[test]
    fn expired_entry_is_discarded() {
        let cache = ResponseCache::new();
        let key = cache_key("scan", "/run", "GET", "");
        cache.put(&key, sample_response(), Duration::from_secs(0));
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(cache.get(&key).is_none());
    }
}
