use crate::error::StoreError;
use crate::permission::{PermissionRow, PermissionScope};
use crate::principal::PrincipalRef;
use crate::statement::Statement;
use crate::token::RoleKey;
use crate::types::{DatabaseName, PrincipalId, PrincipalName};
use async_trait::async_trait;

/// One page request against an upstream listing.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PageRequest {
    /// Opaque cursor returned by the previous page; `None` for the first.
    pub cursor: Option<String>,
    /// Page size hint.
    pub size: usize,
}

impl PageRequest {
    pub fn new(cursor: Option<String>, size: usize) -> Self {
        Self { cursor, size }
    }
}

/// One page of upstream rows.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Cursor of the following page; `None` when exhausted.
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next_cursor: Option<String>) -> Self {
        Self { items, next_cursor }
    }

    /// A final page.
    pub fn last(items: Vec<T>) -> Self {
        Self::new(items, None)
    }
}

/// Direct member of a role, as listed in the role's own scope.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MemberRow {
    pub id: PrincipalId,
    pub name: String,
    /// Raw principal-type tag (`sys.*_principals.type`).
    pub type_tag: String,
}

impl MemberRow {
    pub fn new(id: impl Into<PrincipalId>, name: impl Into<String>, type_tag: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            type_tag: type_tag.into(),
        }
    }
}

/// A server login.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Login {
    pub id: PrincipalId,
    pub name: PrincipalName,
}

/// Store interface for role membership listings.
#[async_trait]
pub trait RoleMemberStore {
    /// Returns one page of the direct members of `role`.
    async fn list_role_members(
        &self,
        role: &RoleKey,
        page: PageRequest,
    ) -> std::result::Result<Page<MemberRow>, StoreError>;
}

/// Store interface for cross-scope principal reconciliation.
#[async_trait]
pub trait PrincipalMappingStore {
    /// Returns the server principal sharing the security identifier of a
    /// database principal, or `None` when the database principal has no login.
    async fn server_principal_for_database_principal(
        &self,
        database: &DatabaseName,
        principal: PrincipalId,
    ) -> std::result::Result<Option<PrincipalRef>, StoreError>;
}

/// Store interface for aggregated permission rows.
#[async_trait]
pub trait PermissionStore {
    /// Returns one page of permission rows on a securable.
    async fn list_permissions(
        &self,
        scope: &PermissionScope,
        page: PageRequest,
    ) -> std::result::Result<Page<PermissionRow>, StoreError>;
}

/// Store interface for provisioning lookups and statement execution.
#[async_trait]
pub trait ProvisioningStore {
    /// Returns the name of the database with `database_id`.
    async fn database_name(
        &self,
        database_id: i64,
    ) -> std::result::Result<Option<DatabaseName>, StoreError>;

    /// Returns the login with the given server principal id.
    async fn login(&self, id: PrincipalId) -> std::result::Result<Option<Login>, StoreError>;

    /// Returns the name of a server role.
    async fn server_role(
        &self,
        id: PrincipalId,
    ) -> std::result::Result<Option<PrincipalName>, StoreError>;

    /// Returns the name of a database role.
    async fn database_role(
        &self,
        database: &DatabaseName,
        id: PrincipalId,
    ) -> std::result::Result<Option<PrincipalName>, StoreError>;

    /// Returns the database user mapped to a login, if one exists.
    async fn database_user_for_login(
        &self,
        database: &DatabaseName,
        login: PrincipalId,
    ) -> std::result::Result<Option<PrincipalName>, StoreError>;

    /// Executes one rendered statement.
    async fn execute(&self, statement: &Statement) -> std::result::Result<(), StoreError>;
}

/// Composite store trait.
pub trait Store: RoleMemberStore + PrincipalMappingStore + PermissionStore + Send + Sync {}

impl<T> Store for T where T: RoleMemberStore + PrincipalMappingStore + PermissionStore + Send + Sync {}
