use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::cache::{CachedMapping, PrincipalCache};
use crate::types::{DatabaseName, PrincipalId};

/// In-memory cache for database-to-server principal mappings.
///
/// LRU with an optional TTL. Negative lookups are cached as
/// [`CachedMapping::Unmapped`] so users without a login are not re-queried
/// on every page.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    inner: Arc<Mutex<CacheState>>,
    capacity: usize,
    ttl: Option<Duration>,
}

#[derive(Debug)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    order: VecDeque<CacheKey>,
}

#[derive(Debug, Clone, Hash, Eq, PartialEq)]
struct CacheKey {
    database: DatabaseName,
    principal: PrincipalId,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    mapping: CachedMapping,
    stored_at: Instant,
}

impl MemoryCache {
    /// Creates a cache holding at most `capacity` mappings.
    ///
    /// A capacity of zero disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheState {
                entries: HashMap::new(),
                order: VecDeque::new(),
            })),
            capacity,
            ttl: None,
        }
    }

    /// Expires mappings older than `ttl`.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("poisoned lock").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn key(database: &DatabaseName, principal: PrincipalId) -> CacheKey {
        CacheKey {
            database: database.clone(),
            principal,
        }
    }

    fn remove_key(state: &mut CacheState, key: &CacheKey) {
        if state.entries.remove(key).is_some() {
            state.order.retain(|existing| existing != key);
        }
    }

    fn touch(state: &mut CacheState, key: &CacheKey) {
        state.order.retain(|existing| existing != key);
        state.order.push_back(key.clone());
    }

    fn is_expired(entry: &CacheEntry, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(entry.stored_at) > ttl
    }

    fn prune_expired(state: &mut CacheState, ttl: Duration, now: Instant) {
        state
            .entries
            .retain(|_, entry| !Self::is_expired(entry, ttl, now));
        let CacheState { entries, order } = state;
        order.retain(|key| entries.contains_key(key));
    }

    fn evict_over_capacity(state: &mut CacheState, capacity: usize) {
        while state.entries.len() > capacity {
            match state.order.pop_front() {
                Some(key) => {
                    state.entries.remove(&key);
                }
                None => break,
            }
        }
    }
}

#[async_trait]
impl PrincipalCache for MemoryCache {
    async fn get_mapping(
        &self,
        database: &DatabaseName,
        principal: PrincipalId,
    ) -> Option<CachedMapping> {
        if self.capacity == 0 {
            return None;
        }

        let key = Self::key(database, principal);
        let now = Instant::now();
        let mut guard = self.inner.lock().expect("poisoned lock");

        if let Some(ttl) = self.ttl
            && let Some(entry) = guard.entries.get(&key)
            && Self::is_expired(entry, ttl, now)
        {
            Self::remove_key(&mut guard, &key);
            return None;
        }

        let mapping = guard.entries.get(&key).map(|entry| entry.mapping.clone());
        if mapping.is_some() {
            Self::touch(&mut guard, &key);
        }
        mapping
    }

    async fn set_mapping(
        &self,
        database: &DatabaseName,
        principal: PrincipalId,
        mapping: CachedMapping,
    ) {
        if self.capacity == 0 {
            return;
        }

        let key = Self::key(database, principal);
        let now = Instant::now();
        let mut guard = self.inner.lock().expect("poisoned lock");

        if let Some(ttl) = self.ttl {
            Self::prune_expired(&mut guard, ttl, now);
        }

        guard.entries.insert(
            key.clone(),
            CacheEntry {
                mapping,
                stored_at: now,
            },
        );
        Self::touch(&mut guard, &key);
        Self::evict_over_capacity(&mut guard, self.capacity);
    }

    async fn invalidate_principal(&self, database: &DatabaseName, principal: PrincipalId) {
        let key = Self::key(database, principal);
        let mut guard = self.inner.lock().expect("poisoned lock");
        Self::remove_key(&mut guard, &key);
    }

    async fn invalidate_database(&self, database: &DatabaseName) {
        let mut guard = self.inner.lock().expect("poisoned lock");
        guard.entries.retain(|key, _| &key.database != database);
        guard.order.retain(|key| &key.database != database);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::principal::{PrincipalCategory, PrincipalRef};
    use futures::executor::block_on;

    fn db(name: &str) -> DatabaseName {
        DatabaseName::new(name).unwrap()
    }

    fn mapped(id: i64) -> CachedMapping {
        CachedMapping::Mapped(PrincipalRef::server(
            PrincipalId::new(id),
            PrincipalCategory::User,
        ))
    }

    #[test]
    fn lru_evicts_least_recently_used() {
        let cache = MemoryCache::new(2);
        let sales = db("sales");
        let (a, b, c) = (PrincipalId::new(5), PrincipalId::new(6), PrincipalId::new(7));

        block_on(cache.set_mapping(&sales, a, mapped(259)));
        block_on(cache.set_mapping(&sales, b, mapped(260)));
        let _ = block_on(cache.get_mapping(&sales, a));
        block_on(cache.set_mapping(&sales, c, CachedMapping::Unmapped));

        assert!(block_on(cache.get_mapping(&sales, b)).is_none());
        assert_eq!(block_on(cache.get_mapping(&sales, a)), Some(mapped(259)));
        assert_eq!(
            block_on(cache.get_mapping(&sales, c)),
            Some(CachedMapping::Unmapped)
        );
    }

    #[test]
    fn ttl_expires_entries() {
        let cache = MemoryCache::new(1).with_ttl(Duration::from_millis(10));
        let sales = db("sales");

        block_on(cache.set_mapping(&sales, PrincipalId::new(5), mapped(259)));
        std::thread::sleep(Duration::from_millis(20));

        assert!(block_on(cache.get_mapping(&sales, PrincipalId::new(5))).is_none());
    }

    #[test]
    fn invalidate_database_only_clears_that_database() {
        let cache = MemoryCache::new(4);
        let (sales, hr) = (db("sales"), db("hr"));
        let id = PrincipalId::new(5);

        block_on(cache.set_mapping(&sales, id, mapped(259)));
        block_on(cache.set_mapping(&hr, id, mapped(259)));
        block_on(cache.invalidate_database(&sales));

        assert!(block_on(cache.get_mapping(&sales, id)).is_none());
        assert!(block_on(cache.get_mapping(&hr, id)).is_some());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn zero_capacity_disables_caching() {
        let cache = MemoryCache::new(0);
        block_on(cache.set_mapping(&db("sales"), PrincipalId::new(5), mapped(259)));
        assert!(cache.is_empty());
    }
}
