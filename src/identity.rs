//! Principal to resource identity resolution.

use crate::cache::{CachedMapping, PrincipalCache};
use crate::error::Result;
use crate::principal::PrincipalCategory;
use crate::store::PrincipalMappingStore;
use crate::token::RoleKey;
use crate::types::{DatabaseName, PrincipalId, ResourceId};
use tracing::{debug, warn};

/// Where a principal ends up in the grant model.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum Identity {
    /// A login-backed user or group resource.
    Principal(ResourceId),
    /// A role, scope-qualified.
    Role(RoleKey),
    /// A database user or group without a server login.
    NoServerPrincipal,
    /// A principal-type tag the resolver does not know.
    Unknown,
}

impl Identity {
    /// Resource a grant should name as its principal, if any.
    pub(crate) fn resource(&self) -> Option<ResourceId> {
        match self {
            Identity::Principal(resource) => Some(resource.clone()),
            Identity::Role(key) => Some(key.resource_id()),
            Identity::NoServerPrincipal | Identity::Unknown => None,
        }
    }
}

/// Resolves principals seen in one scope into resource identities.
pub(crate) struct IdentityResolver<'a, S, C> {
    store: &'a S,
    cache: &'a C,
}

impl<'a, S, C> IdentityResolver<'a, S, C>
where
    S: PrincipalMappingStore + Sync,
    C: PrincipalCache,
{
    pub(crate) fn new(store: &'a S, cache: &'a C) -> Self {
        Self { store, cache }
    }

    /// Resolves principal `id` of `category`, listed in `database` (or at
    /// server scope when `None`).
    pub(crate) async fn resolve(
        &self,
        id: PrincipalId,
        category: PrincipalCategory,
        database: Option<&DatabaseName>,
    ) -> Result<Identity> {
        match (category, database) {
            (PrincipalCategory::Unknown, _) => Ok(Identity::Unknown),
            (PrincipalCategory::Role, None) => Ok(Identity::Role(RoleKey::server(id))),
            (PrincipalCategory::Role, Some(database)) => {
                Ok(Identity::Role(RoleKey::database(database.clone(), id)))
            }
            (category, None) => Ok(category
                .login_resource(id)
                .map_or(Identity::Unknown, Identity::Principal)),
            (_, Some(database)) => self.resolve_database_principal(database, id).await,
        }
    }

    async fn resolve_database_principal(
        &self,
        database: &DatabaseName,
        id: PrincipalId,
    ) -> Result<Identity> {
        let mapping = match self.cache.get_mapping(database, id).await {
            Some(cached) => {
                debug!(database = %database, principal = %id, "principal mapping cache hit");
                cached
            }
            None => {
                let mapping = CachedMapping::from(
                    self.store
                        .server_principal_for_database_principal(database, id)
                        .await?,
                );
                self.cache.set_mapping(database, id, mapping.clone()).await;
                mapping
            }
        };

        match mapping.into_option() {
            None => Ok(Identity::NoServerPrincipal),
            Some(server) => match server.category.login_resource(server.id) {
                Some(resource) => Ok(Identity::Principal(resource)),
                None => {
                    warn!(
                        database = %database,
                        principal = %id,
                        server_principal = %server.id,
                        category = ?server.category,
                        "database principal maps to a server principal that is not a login"
                    );
                    Ok(Identity::Unknown)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::NoCache;
    use crate::principal::PrincipalRef;
    use async_trait::async_trait;
    use futures::executor::block_on;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct MappingStore {
        logins: HashMap<i64, PrincipalRef>,
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl PrincipalMappingStore for MappingStore {
        async fn server_principal_for_database_principal(
            &self,
            _database: &DatabaseName,
            principal: PrincipalId,
        ) -> std::result::Result<Option<PrincipalRef>, crate::StoreError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self.logins.get(&principal.get()).cloned())
        }
    }

    fn store() -> MappingStore {
        let mut store = MappingStore::default();
        store.logins.insert(
            5,
            PrincipalRef::server(PrincipalId::new(259), PrincipalCategory::User),
        );
        store.logins.insert(
            6,
            PrincipalRef::server(PrincipalId::new(3), PrincipalCategory::Role),
        );
        store
    }

    fn sales() -> DatabaseName {
        DatabaseName::new("sales").unwrap()
    }

    #[test]
    fn server_scope_uses_member_id_directly() {
        let store = store();
        let resolver = IdentityResolver::new(&store, &NoCache);
        let identity = block_on(resolver.resolve(PrincipalId::new(270), PrincipalCategory::Group, None)).unwrap();
        assert_eq!(identity, Identity::Principal(ResourceId::group(PrincipalId::new(270))));
        assert_eq!(store.lookups.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn database_users_map_through_the_store() {
        let store = store();
        let resolver = IdentityResolver::new(&store, &NoCache);
        let db = sales();
        let identity = block_on(resolver.resolve(PrincipalId::new(5), PrincipalCategory::User, Some(&db))).unwrap();
        assert_eq!(identity, Identity::Principal(ResourceId::user(PrincipalId::new(259))));

        let orphan = block_on(resolver.resolve(PrincipalId::new(9), PrincipalCategory::User, Some(&db))).unwrap();
        assert_eq!(orphan, Identity::NoServerPrincipal);
        assert_eq!(orphan.resource(), None);
    }

    #[test]
    fn roles_never_hit_the_store() {
        let store = store();
        let resolver = IdentityResolver::new(&store, &NoCache);
        let db = sales();
        let identity = block_on(resolver.resolve(PrincipalId::new(16384), PrincipalCategory::Role, Some(&db))).unwrap();
        assert_eq!(identity, Identity::Role(RoleKey::database(db, PrincipalId::new(16384))));
        assert_eq!(store.lookups.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn mapping_to_non_login_is_unknown() {
        let store = store();
        let resolver = IdentityResolver::new(&store, &NoCache);
        let db = sales();
        let identity = block_on(resolver.resolve(PrincipalId::new(6), PrincipalCategory::User, Some(&db))).unwrap();
        assert_eq!(identity, Identity::Unknown);
    }

    #[cfg(feature = "memory-cache")]
    #[test]
    fn cache_avoids_repeated_lookups_including_misses() {
        let store = store();
        let cache = crate::MemoryCache::new(16);
        let resolver = IdentityResolver::new(&store, &cache);
        let db = sales();

        for _ in 0..3 {
            block_on(resolver.resolve(PrincipalId::new(5), PrincipalCategory::User, Some(&db))).unwrap();
            block_on(resolver.resolve(PrincipalId::new(9), PrincipalCategory::User, Some(&db))).unwrap();
        }
        assert_eq!(store.lookups.load(Ordering::SeqCst), 2);
    }
}
