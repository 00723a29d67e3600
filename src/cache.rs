use crate::principal::PrincipalRef;
use crate::types::{DatabaseName, PrincipalId};
use async_trait::async_trait;

/// Cached outcome of a database-to-server principal lookup.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CachedMapping {
    /// The database principal maps to this server principal.
    Mapped(PrincipalRef),
    /// The database principal has no server login.
    Unmapped,
}

impl CachedMapping {
    pub fn into_option(self) -> Option<PrincipalRef> {
        match self {
            CachedMapping::Mapped(principal) => Some(principal),
            CachedMapping::Unmapped => None,
        }
    }
}

impl From<Option<PrincipalRef>> for CachedMapping {
    fn from(value: Option<PrincipalRef>) -> Self {
        value.map_or(CachedMapping::Unmapped, CachedMapping::Mapped)
    }
}

/// Cache interface for cross-scope principal mappings.
#[async_trait]
pub trait PrincipalCache: Send + Sync {
    /// Gets the cached mapping for a (database, principal) pair.
    async fn get_mapping(
        &self,
        database: &DatabaseName,
        principal: PrincipalId,
    ) -> Option<CachedMapping>;

    /// Sets the cached mapping for a (database, principal) pair.
    async fn set_mapping(
        &self,
        database: &DatabaseName,
        principal: PrincipalId,
        mapping: CachedMapping,
    );

    /// Invalidates cache for a database principal.
    async fn invalidate_principal(&self, database: &DatabaseName, principal: PrincipalId);

    /// Invalidates cache for a database.
    async fn invalidate_database(&self, database: &DatabaseName);
}

/// No-op cache implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

#[async_trait]
impl PrincipalCache for NoCache {
    async fn get_mapping(
        &self,
        _database: &DatabaseName,
        _principal: PrincipalId,
    ) -> Option<CachedMapping> {
        None
    }

    async fn set_mapping(
        &self,
        _database: &DatabaseName,
        _principal: PrincipalId,
        _mapping: CachedMapping,
    ) {
    }

    async fn invalidate_principal(&self, _database: &DatabaseName, _principal: PrincipalId) {}

    async fn invalidate_database(&self, _database: &DatabaseName) {}
}
