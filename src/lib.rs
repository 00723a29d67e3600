//! Access inventory and provisioning for SQL Server.
//!
//! This crate flattens server and database role memberships into grants one
//! page at a time, resuming from an opaque token with no server-side state,
//! and decodes aggregated permission rows into entitlement grants. Catalog
//! access goes through async store traits such as [`RoleMemberStore`] and
//! [`PermissionStore`]; [`Connector`] is the entry point.
//!
//! # Examples
//!
//! Draining a role traversal using the in-memory store (enable `memory-store`):
//! ```no_run
//! use rs_sqlgrants::{ConnectorBuilder, PrincipalId, ResourceId};
//! # #[cfg(feature = "memory-store")]
//! # {
//! use futures::executor::block_on;
//! use rs_sqlgrants::MemoryStore;
//! let connector = ConnectorBuilder::new(MemoryStore::new()).build();
//! let root = ResourceId::server_role(PrincipalId::new(3));
//! let mut token = String::new();
//! loop {
//!     let page = block_on(connector.role_grants(&root, &token, 50)).unwrap();
//!     for grant in &page.grants {
//!         println!("{} -> {}", grant.entitlement, grant.principal);
//!     }
//!     if page.is_last() {
//!         break;
//!     }
//!     token = page.next_token;
//! }
//! # }
//! ```
//!
//! Caching database-to-server principal lookups (enable `memory-cache`):
//! ```no_run
//! # #[cfg(feature = "memory-cache")]
//! # {
//! use rs_sqlgrants::MemoryCache;
//! use std::time::Duration;
//! let cache = MemoryCache::new(4096).with_ttl(Duration::from_secs(300));
//! # let _ = cache;
//! # }
//! ```
#![forbid(unsafe_code)]

mod cache;
mod connector;
mod error;
mod grant;
mod identity;
mod pager;
mod permission;
mod principal;
mod provision;
mod statement;
mod store;
mod synthesizer;
mod token;
mod types;
mod vocabulary;
mod walker;
#[cfg(feature = "memory-cache")]
mod memory_cache;

#[cfg(feature = "memory-store")]
mod memory_store;

pub use crate::cache::{CachedMapping, NoCache, PrincipalCache};
pub use crate::connector::{Connector, ConnectorBuilder};
pub use crate::error::{Error, Result, StoreError};
pub use crate::grant::{EntitlementId, Grant, GrantPage, MEMBER_ENTITLEMENT, permission_slug};
pub use crate::pager::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, Pager};
pub use crate::permission::{
    PermissionRecord, PermissionRow, PermissionScope, PermissionState, decode_entitlements,
    split_codes,
};
pub use crate::principal::{PrincipalCategory, PrincipalRef, Scope, resolve as resolve_principal_type};
pub use crate::statement::Statement;
pub use crate::store::{
    Login, MemberRow, Page, PageRequest, PermissionStore, PrincipalMappingStore, ProvisioningStore,
    RoleMemberStore, Store,
};
pub use crate::token::{EntryKind, FrontierEntry, RoleKey, TraversalToken};
pub use crate::types::{DatabaseName, PrincipalId, PrincipalName, ResourceId, ResourceType};
pub use crate::vocabulary::{
    EntitlementDescriptor, PermissionVocabulary, VOCABULARY_VERSION, VocabularyCatalog,
    VocabularyScope, WITH_GRANT_SUFFIX,
};
pub use crate::walker::{DEFAULT_MAX_ROLES, VisitPolicy};

#[cfg(feature = "memory-store")]
pub use crate::memory_store::MemoryStore;

#[cfg(feature = "memory-cache")]
pub use crate::memory_cache::MemoryCache;
