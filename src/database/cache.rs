//! Handle Cache
//!
//! Opened database handles are reused for a bounded freshness window.
//! Entries are keyed by a fingerprint of the configuration that produced
//! them and are checked lazily on every access.

use crate::config::{DatabaseMode, RemoteConnection};
use crate::database::manager::ConnectOptions;
use crate::error::Result;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Fingerprint of a database configuration
///
/// The password only contributes through a hash, so keys are safe to log.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Build the key for a mode, its remote details and connect options
    pub fn for_configuration(
        mode: DatabaseMode,
        remote: Option<&RemoteConnection>,
        options: &ConnectOptions,
    ) -> Self {
        match (mode, remote) {
            (DatabaseMode::Remote, Some(remote)) => {
                let mut hasher = DefaultHasher::new();
                remote.password.hash(&mut hasher);
                CacheKey(format!(
                    "remote:{}@{}/{}#{:x}#ro={}",
                    remote.user,
                    remote.host,
                    remote.database,
                    hasher.finish(),
                    options.remote_read_only
                ))
            }
            (DatabaseMode::Remote, None) => CacheKey("remote:<incomplete>".to_string()),
            (DatabaseMode::Local, _) => {
                CacheKey(format!("local:{}", options.local_db_path.display()))
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A cached handle and when it was created
#[derive(Debug)]
struct CacheEntry<H> {
    handle: Arc<H>,
    created_at: Instant,
    ttl: Duration,
}

impl<H> CacheEntry<H> {
    fn is_fresh(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) < self.ttl
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub expired: u64,
}

/// TTL cache of opened handles
#[derive(Debug)]
pub struct HandleCache<H> {
    entries: HashMap<CacheKey, CacheEntry<H>>,
    ttl: Duration,
    stats: CacheStats,
}

impl<H> HandleCache<H> {
    /// Create a cache whose entries live for `ttl`
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            stats: CacheStats::default(),
        }
    }

    /// Freshness window applied to new entries
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a fresh handle, dropping it if it has expired
    pub fn get(&mut self, key: &CacheKey, now: Instant) -> Option<Arc<H>> {
        match self.entries.get(key) {
            Some(entry) if entry.is_fresh(now) => {
                self.stats.hits += 1;
                Some(Arc::clone(&entry.handle))
            }
            Some(_) => {
                tracing::debug!(key = key.as_str(), "cached database handle expired");
                self.entries.remove(key);
                self.stats.expired += 1;
                None
            }
            None => None,
        }
    }

    /// Store a handle created at `now`
    pub fn insert(&mut self, key: CacheKey, handle: Arc<H>, now: Instant) {
        self.entries.insert(
            key,
            CacheEntry {
                handle,
                created_at: now,
                ttl: self.ttl,
            },
        );
    }

    /// Return the cached handle or build, store and return a new one
    ///
    /// A failed build stores nothing.
    pub async fn get_or_try_insert_with<F, Fut>(
        &mut self,
        key: CacheKey,
        now: Instant,
        build: F,
    ) -> Result<Arc<H>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<H>>,
    {
        if let Some(handle) = self.get(&key, now) {
            tracing::debug!(key = key.as_str(), "reusing cached database handle");
            return Ok(handle);
        }

        self.stats.misses += 1;
        let handle = Arc::new(build().await?);
        self.insert(key, Arc::clone(&handle), now);
        Ok(handle)
    }

    /// Drop every expired entry
    pub fn purge_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_fresh(now));
        let purged = before - self.entries.len();
        self.stats.expired += purged as u64;
        purged
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SqlChatError;
    use std::cell::Cell;

    fn options() -> ConnectOptions {
        ConnectOptions::new("/data/student.db", true)
    }

    #[test]
    fn test_key_depends_on_configuration() {
        let remote = RemoteConnection::new("h", "u", "p1", "d");
        let other_password = RemoteConnection::new("h", "u", "p2", "d");

        let local = CacheKey::for_configuration(DatabaseMode::Local, None, &options());
        let a = CacheKey::for_configuration(DatabaseMode::Remote, Some(&remote), &options());
        let b = CacheKey::for_configuration(DatabaseMode::Remote, Some(&other_password), &options());

        assert_eq!(local.as_str(), "local:/data/student.db");
        assert_ne!(a, b);
        assert!(!a.as_str().contains("p1"));
        assert_eq!(
            a,
            CacheKey::for_configuration(DatabaseMode::Remote, Some(&remote.clone()), &options())
        );
    }

    #[tokio::test]
    async fn test_reuses_within_ttl_and_rebuilds_after() {
        let mut cache: HandleCache<u32> = HandleCache::new(Duration::from_secs(60));
        let key = CacheKey::for_configuration(DatabaseMode::Local, None, &options());
        let builds = Cell::new(0u32);
        let start = Instant::now();

        let build = || {
            builds.set(builds.get() + 1);
            let n = builds.get();
            async move { Ok(n) }
        };

        let first = cache.get_or_try_insert_with(key.clone(), start, build).await.unwrap();
        let second = cache
            .get_or_try_insert_with(key.clone(), start + Duration::from_secs(59), build)
            .await
            .unwrap();
        assert_eq!(*first, 1);
        assert!(Arc::ptr_eq(&first, &second));

        let third = cache
            .get_or_try_insert_with(key, start + Duration::from_secs(60), build)
            .await
            .unwrap();
        assert_eq!(*third, 2);
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 1,
                misses: 2,
                expired: 1
            }
        );
    }

    #[tokio::test]
    async fn test_failed_build_is_not_cached() {
        let mut cache: HandleCache<u32> = HandleCache::new(Duration::from_secs(60));
        let key = CacheKey::for_configuration(DatabaseMode::Local, None, &options());

        let result = cache
            .get_or_try_insert_with(key, Instant::now(), || async {
                Err(SqlChatError::Config("boom".to_string()))
            })
            .await;
        assert!(result.is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_purge_expired() {
        let mut cache: HandleCache<&str> = HandleCache::new(Duration::from_secs(10));
        let now = Instant::now();
        cache.insert(CacheKey("a".to_string()), Arc::new("a"), now);
        cache.insert(
            CacheKey("b".to_string()),
            Arc::new("b"),
            now + Duration::from_secs(5),
        );

        assert_eq!(cache.purge_expired(now + Duration::from_secs(12)), 1);
        assert_eq!(cache.len(), 1);
    }
}
