//! Cache-aside regions for frequently read entities
//!
//! One named region per entity type. Reads go through
//! [`CacheRegion::get_or_load`]; every mutation names the exact keys it
//! refreshes or evicts, so an entity indexed by both id and email never
//! leaves a stale entry behind under the key that was not used for the
//! write. Entries have no TTL and are shared as `Arc<V>`.
//!
//! Regions offer atomic per-key operations only. A refresh that races a
//! concurrent update of the same entity is last-writer-wins.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Serialize};
use std::{collections::HashMap, future::Future, marker::PhantomData, sync::Arc};

use crate::{
    config::{CacheBackend, CacheConfig},
    error::AppResult,
    models::{Author, Book, BorrowingRecord, Member, MemberProfile},
};

use super::redis::RedisService;

/// Key under which an entity is cached
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Id(i32),
    /// Always lower case
    Email(String),
}

impl CacheKey {
    pub fn email(email: &str) -> Self {
        CacheKey::Email(email.trim().to_lowercase())
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::Id(id) => write!(f, "id:{}", id),
            CacheKey::Email(email) => write!(f, "email:{}", email),
        }
    }
}

/// Every key an entity is indexed by
pub trait Cached {
    fn cache_keys(&self) -> Vec<CacheKey>;
}

impl Cached for Author {
    fn cache_keys(&self) -> Vec<CacheKey> {
        vec![CacheKey::Id(self.id)]
    }
}

impl Cached for Book {
    fn cache_keys(&self) -> Vec<CacheKey> {
        vec![CacheKey::Id(self.id)]
    }
}

impl Cached for BorrowingRecord {
    fn cache_keys(&self) -> Vec<CacheKey> {
        vec![CacheKey::Id(self.id)]
    }
}

impl Cached for Member {
    fn cache_keys(&self) -> Vec<CacheKey> {
        vec![CacheKey::Id(self.id), CacheKey::email(&self.email)]
    }
}

impl Cached for MemberProfile {
    fn cache_keys(&self) -> Vec<CacheKey> {
        vec![CacheKey::Id(self.id), CacheKey::email(&self.email)]
    }
}

/// Storage behind a cache region
#[async_trait]
pub trait RegionStore<V: Send + Sync + 'static>: Send + Sync {
    async fn get(&self, key: &CacheKey) -> AppResult<Option<Arc<V>>>;
    async fn put(&self, key: CacheKey, value: Arc<V>) -> AppResult<()>;
    async fn evict(&self, key: &CacheKey) -> AppResult<()>;
    async fn clear(&self) -> AppResult<()>;
}

/// In-process region; lost on restart
pub struct MemoryRegion<V> {
    entries: RwLock<HashMap<CacheKey, Arc<V>>>,
}

impl<V> Default for MemoryRegion<V> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl<V: Send + Sync + 'static> RegionStore<V> for MemoryRegion<V> {
    async fn get(&self, key: &CacheKey) -> AppResult<Option<Arc<V>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn put(&self, key: CacheKey, value: Arc<V>) -> AppResult<()> {
        self.entries.write().insert(key, value);
        Ok(())
    }

    async fn evict(&self, key: &CacheKey) -> AppResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    async fn clear(&self) -> AppResult<()> {
        self.entries.write().clear();
        Ok(())
    }
}

/// Region stored as JSON in Redis under `cache:<region>:<key>`
pub struct RedisRegion<V> {
    name: &'static str,
    redis: RedisService,
    _marker: PhantomData<fn() -> V>,
}

impl<V> RedisRegion<V> {
    pub fn new(name: &'static str, redis: RedisService) -> Self {
        Self {
            name,
            redis,
            _marker: PhantomData,
        }
    }

    fn redis_key(&self, key: &CacheKey) -> String {
        format!("cache:{}:{}", self.name, key)
    }
}

#[async_trait]
impl<V> RegionStore<V> for RedisRegion<V>
where
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get(&self, key: &CacheKey) -> AppResult<Option<Arc<V>>> {
        let value = self.redis.get_json::<V>(&self.redis_key(key)).await?;
        Ok(value.map(Arc::new))
    }

    async fn put(&self, key: CacheKey, value: Arc<V>) -> AppResult<()> {
        self.redis.set_json(&self.redis_key(&key), value.as_ref()).await
    }

    async fn evict(&self, key: &CacheKey) -> AppResult<()> {
        self.redis.delete(&self.redis_key(key)).await
    }

    async fn clear(&self) -> AppResult<()> {
        self.redis
            .delete_matching(&format!("cache:{}:*", self.name))
            .await
    }
}

/// A named cache region
pub struct CacheRegion<V: Send + Sync + 'static> {
    name: &'static str,
    store: Arc<dyn RegionStore<V>>,
}

impl<V: Send + Sync + 'static> Clone for CacheRegion<V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            store: self.store.clone(),
        }
    }
}

impl<V: Send + Sync + 'static> CacheRegion<V> {
    pub fn new(name: &'static str, store: Arc<dyn RegionStore<V>>) -> Self {
        Self { name, store }
    }

    pub fn memory(name: &'static str) -> Self {
        Self::new(name, Arc::new(MemoryRegion::default()))
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Read-through lookup: a hit never calls `load`; a miss calls it once
    /// and caches a present result under `key`. Absence is not cached.
    pub async fn get_or_load<F, Fut>(&self, key: CacheKey, load: F) -> AppResult<Option<Arc<V>>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<Option<V>>>,
    {
        if let Some(hit) = self.store.get(&key).await? {
            tracing::trace!(region = self.name, %key, "cache hit");
            return Ok(Some(hit));
        }

        tracing::trace!(region = self.name, %key, "cache miss");
        match load().await? {
            Some(value) => {
                let value = Arc::new(value);
                self.store.put(key, value.clone()).await?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Current entry, without loading
    pub async fn peek(&self, key: &CacheKey) -> AppResult<Option<Arc<V>>> {
        self.store.get(key).await
    }

    /// Write-through: overwrite the entry under every listed key
    pub async fn refresh(&self, keys: &[CacheKey], value: V) -> AppResult<Arc<V>> {
        let value = Arc::new(value);
        for key in keys {
            self.store.put(key.clone(), value.clone()).await?;
        }
        tracing::debug!(region = self.name, keys = keys.len(), "cache refreshed");
        Ok(value)
    }

    /// Evict the entry under every listed key
    pub async fn evict(&self, keys: &[CacheKey]) -> AppResult<()> {
        for key in keys {
            self.store.evict(key).await?;
        }
        tracing::debug!(region = self.name, keys = keys.len(), "cache evicted");
        Ok(())
    }

    pub async fn clear(&self) -> AppResult<()> {
        self.store.clear().await
    }
}

impl<V: Cached + Send + Sync + 'static> CacheRegion<V> {
    /// Refresh an entity whose keys may have changed: keys only the previous
    /// version was indexed by are evicted, then every current key is written.
    pub async fn replace(&self, previous: &V, current: V) -> AppResult<Arc<V>> {
        let keys = current.cache_keys();
        let stale: Vec<CacheKey> = previous
            .cache_keys()
            .into_iter()
            .filter(|k| !keys.contains(k))
            .collect();

        self.evict(&stale).await?;
        self.refresh(&keys, current).await
    }
}

/// All cache regions of the server
#[derive(Clone)]
pub struct Caches {
    pub authors: CacheRegion<Author>,
    pub books: CacheRegion<Book>,
    pub members: CacheRegion<Member>,
    pub profiles: CacheRegion<MemberProfile>,
    pub borrowings: CacheRegion<BorrowingRecord>,
}

impl Caches {
    pub fn in_memory() -> Self {
        Self {
            authors: CacheRegion::memory("authors"),
            books: CacheRegion::memory("books"),
            members: CacheRegion::memory("members"),
            profiles: CacheRegion::memory("member_profiles"),
            borrowings: CacheRegion::memory("borrowing_records"),
        }
    }

    pub fn redis(redis: RedisService) -> Self {
        Self {
            authors: CacheRegion::new("authors", Arc::new(RedisRegion::new("authors", redis.clone()))),
            books: CacheRegion::new("books", Arc::new(RedisRegion::new("books", redis.clone()))),
            members: CacheRegion::new("members", Arc::new(RedisRegion::new("members", redis.clone()))),
            profiles: CacheRegion::new(
                "member_profiles",
                Arc::new(RedisRegion::new("member_profiles", redis.clone())),
            ),
            borrowings: CacheRegion::new(
                "borrowing_records",
                Arc::new(RedisRegion::new("borrowing_records", redis)),
            ),
        }
    }

    /// Build the regions selected by configuration.
    ///
    /// Redis regions survive a server restart, so they are cleared at
    /// startup to keep the "rebuilt lazily" contract of the memory backend.
    pub async fn from_config(config: &CacheConfig) -> AppResult<Self> {
        match config.backend {
            CacheBackend::Memory => Ok(Self::in_memory()),
            CacheBackend::Redis => {
                let redis = RedisService::new(&config.redis_url).await?;
                let caches = Self::redis(redis);
                caches.clear_all().await?;
                Ok(caches)
            }
        }
    }

    pub async fn clear_all(&self) -> AppResult<()> {
        self.authors.clear().await?;
        self.books.clear().await?;
        self.members.clear().await?;
        self.profiles.clear().await?;
        self.borrowings.clear().await
    }
}
