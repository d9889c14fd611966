//! Whole-response page cache.
//!
//! Rendered index pages are cached under their request URL for a short
//! TTL. Entries are never invalidated by writes; they expire on their own
//! or are dropped together through [`PageCache::clear`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use fred::clients::Client as RedisClient;
use fred::interfaces::KeysInterface;
use fred::types::Expiration;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::{AppError, AppResult};

/// A cached response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPage {
    /// Serialized response body.
    pub body: String,
}

/// Storage for cached pages.
#[async_trait::async_trait]
pub trait PageCache: Send + Sync {
    /// Fetch a live entry.
    async fn get(&self, key: &str) -> AppResult<Option<CachedPage>>;

    /// Store an entry for `ttl`.
    async fn set(&self, key: &str, body: &str, ttl: Duration) -> AppResult<()>;

    /// Drop every entry.
    async fn clear(&self) -> AppResult<()>;
}

struct MemoryEntry {
    body: String,
    expires_at: Instant,
}

/// Default cap on in-memory entries.
pub const DEFAULT_MAX_ENTRIES: usize = 300;

/// In-process page cache.
///
/// Every write sweeps expired entries. When the map is still full, the
/// third of entries closest to expiry is culled before inserting.
#[derive(Clone)]
pub struct MemoryPageCache {
    entries: Arc<RwLock<HashMap<String, MemoryEntry>>>,
    max_entries: usize,
}

impl Default for MemoryPageCache {
    fn default() -> Self {
        Self::with_max_entries(DEFAULT_MAX_ENTRIES)
    }
}

impl MemoryPageCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty cache holding at most `max_entries` pages.
    #[must_use]
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            max_entries: max_entries.max(1),
        }
    }
}

fn cull(entries: &mut HashMap<String, MemoryEntry>, max_entries: usize, now: Instant) {
    entries.retain(|_, entry| entry.expires_at > now);
    if entries.len() < max_entries {
        return;
    }

    let mut by_expiry: Vec<(Instant, String)> = entries
        .iter()
        .map(|(key, entry)| (entry.expires_at, key.clone()))
        .collect();
    by_expiry.sort_unstable();

    let evict = (entries.len() / 3).max(entries.len() + 1 - max_entries);
    for (_, key) in by_expiry.into_iter().take(evict) {
        entries.remove(&key);
    }
    debug!(evicted = evict, "Culled page cache");
}

#[async_trait::async_trait]
impl PageCache for MemoryPageCache {
    async fn get(&self, key: &str) -> AppResult<Option<CachedPage>> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.expires_at > now => {
                    debug!(key = %key, "Page cache hit");
                    return Ok(Some(CachedPage {
                        body: entry.body.clone(),
                    }));
                }
                Some(_) => {}
                None => return Ok(None),
            }
        }

        // Expired
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|e| e.expires_at <= now) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, body: &str, ttl: Duration) -> AppResult<()> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.remove(key);
        cull(&mut entries, self.max_entries, now);
        entries.insert(
            key.to_string(),
            MemoryEntry {
                body: body.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(())
    }

    async fn clear(&self) -> AppResult<()> {
        let mut entries = self.entries.write().await;
        let dropped = entries.len();
        entries.clear();
        info!(dropped, "Cleared page cache");
        Ok(())
    }
}

/// Redis-backed page cache, shared between server processes.
///
/// Keys embed a generation number. Clearing bumps the generation, which
/// orphans every existing entry until its TTL runs out.
#[derive(Clone)]
pub struct RedisPageCache {
    redis: Arc<RedisClient>,
    prefix: String,
}

impl RedisPageCache {
    /// Create a cache storing keys under `{prefix}:page:`.
    #[must_use]
    pub fn new(redis: Arc<RedisClient>, prefix: &str) -> Self {
        Self {
            redis,
            prefix: format!("{prefix}:page"),
        }
    }

    fn generation_key(&self) -> String {
        format!("{}:generation", self.prefix)
    }

    fn cache_key(&self, generation: i64, key: &str) -> String {
        format!("{}:{generation}:{key}", self.prefix)
    }

    async fn generation(&self) -> AppResult<i64> {
        let generation: Option<i64> = self
            .redis
            .get(self.generation_key())
            .await
            .map_err(|e| AppError::Cache(e.to_string()))?;
        Ok(generation.unwrap_or(0))
    }
}

#[async_trait::async_trait]
impl PageCache for RedisPageCache {
    async fn get(&self, key: &str) -> AppResult<Option<CachedPage>> {
        let generation = self.generation().await?;
        let body: Option<String> = self
            .redis
            .get(self.cache_key(generation, key))
            .await
            .map_err(|e| AppError::Cache(e.to_string()))?;

        if body.is_some() {
            debug!(key = %key, "Page cache hit");
        }
        Ok(body.map(|body| CachedPage { body }))
    }

    async fn set(&self, key: &str, body: &str, ttl: Duration) -> AppResult<()> {
        let generation = self.generation().await?;
        let secs = ttl.as_secs().max(1) as i64;
        self.redis
            .set::<(), _, _>(
                self.cache_key(generation, key),
                body,
                Some(Expiration::EX(secs)),
                None,
                false,
            )
            .await
            .map_err(|e| AppError::Cache(e.to_string()))
    }

    async fn clear(&self) -> AppResult<()> {
        let generation: i64 = self
            .redis
            .incr(self.generation_key())
            .await
            .map_err(|e| AppError::Cache(e.to_string()))?;
        info!(generation, "Cleared page cache");
        Ok(())
    }
}
