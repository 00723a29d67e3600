use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::pager::Pager;
use crate::permission::{PermissionRow, PermissionScope};
use crate::principal::PrincipalRef;
use crate::statement::Statement;
use crate::store::{
    Login, MemberRow, Page, PageRequest, PermissionStore, PrincipalMappingStore, ProvisioningStore,
    RoleMemberStore,
};
use crate::token::RoleKey;
use crate::types::{DatabaseName, PrincipalId, PrincipalName};

/// In-memory store implementation for tests and demos.
///
/// Listings paginate with [`Pager`] offsets. Executed statements are
/// journaled; only `CREATE USER` changes the catalog.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    role_members: RwLock<HashMap<RoleKey, Vec<MemberRow>>>,
    mappings: RwLock<HashMap<(DatabaseName, PrincipalId), PrincipalRef>>,
    permissions: RwLock<HashMap<PermissionScope, Vec<PermissionRow>>>,
    databases: RwLock<HashMap<i64, DatabaseName>>,
    logins: RwLock<HashMap<PrincipalId, PrincipalName>>,
    server_roles: RwLock<HashMap<PrincipalId, PrincipalName>>,
    database_roles: RwLock<HashMap<(DatabaseName, PrincipalId), PrincipalName>>,
    database_users: RwLock<HashMap<(DatabaseName, PrincipalId), PrincipalName>>,
    executed: RwLock<Vec<Statement>>,
    member_fetches: AtomicUsize,
    mapping_lookups: AtomicUsize,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a direct member to a role.
    pub fn add_role_member(&self, role: RoleKey, member: MemberRow) {
        let mut guard = self.inner.role_members.write().expect("poisoned lock");
        guard.entry(role).or_default().push(member);
    }

    /// Maps a database principal to the server principal with the same SID.
    pub fn map_database_principal(
        &self,
        database: DatabaseName,
        principal: PrincipalId,
        server: PrincipalRef,
    ) {
        let mut guard = self.inner.mappings.write().expect("poisoned lock");
        guard.insert((database, principal), server);
    }

    /// Appends an aggregated permission row on a securable.
    pub fn add_permission_row(&self, scope: PermissionScope, row: PermissionRow) {
        let mut guard = self.inner.permissions.write().expect("poisoned lock");
        guard.entry(scope).or_default().push(row);
    }

    /// Registers a database by id.
    pub fn add_database(&self, database_id: i64, name: DatabaseName) {
        let mut guard = self.inner.databases.write().expect("poisoned lock");
        guard.insert(database_id, name);
    }

    /// Registers a login.
    pub fn add_login(&self, id: PrincipalId, name: PrincipalName) {
        let mut guard = self.inner.logins.write().expect("poisoned lock");
        guard.insert(id, name);
    }

    /// Registers a server role name.
    pub fn add_server_role(&self, id: PrincipalId, name: PrincipalName) {
        let mut guard = self.inner.server_roles.write().expect("poisoned lock");
        guard.insert(id, name);
    }

    /// Registers a database role name.
    pub fn add_database_role(&self, database: DatabaseName, id: PrincipalId, name: PrincipalName) {
        let mut guard = self.inner.database_roles.write().expect("poisoned lock");
        guard.insert((database, id), name);
    }

    /// Registers the database user of a login.
    pub fn add_database_user(&self, database: DatabaseName, login: PrincipalId, user: PrincipalName) {
        let mut guard = self.inner.database_users.write().expect("poisoned lock");
        guard.insert((database, login), user);
    }

    /// Statements executed so far, in order.
    pub fn executed(&self) -> Vec<Statement> {
        self.inner.executed.read().expect("poisoned lock").clone()
    }

    /// Number of role-member pages served.
    pub fn member_fetches(&self) -> usize {
        self.inner.member_fetches.load(Ordering::Relaxed)
    }

    /// Number of cross-scope principal lookups served.
    pub fn mapping_lookups(&self) -> usize {
        self.inner.mapping_lookups.load(Ordering::Relaxed)
    }

    fn login_id_by_name(&self, name: &PrincipalName) -> Option<PrincipalId> {
        let guard = self.inner.logins.read().expect("poisoned lock");
        guard
            .iter()
            .find(|(_, login)| *login == name)
            .map(|(id, _)| *id)
    }
}

fn page_of<T: Clone>(rows: &[T], request: PageRequest) -> std::result::Result<Page<T>, crate::StoreError> {
    let (offset, limit) = Pager::new(request.cursor, request.size).parse()?;
    let end = offset.saturating_add(limit + 1).min(rows.len());
    let mut items = rows.get(offset..end).map(<[T]>::to_vec).unwrap_or_default();
    let next_cursor = Pager::finish(offset, limit, &mut items);
    Ok(Page::new(items, next_cursor))
}

#[async_trait]
impl RoleMemberStore for MemoryStore {
    async fn list_role_members(
        &self,
        role: &RoleKey,
        page: PageRequest,
    ) -> std::result::Result<Page<MemberRow>, crate::StoreError> {
        self.inner.member_fetches.fetch_add(1, Ordering::Relaxed);
        let guard = self.inner.role_members.read().expect("poisoned lock");
        let rows = guard.get(role).map(Vec::as_slice).unwrap_or_default();
        page_of(rows, page)
    }
}

#[async_trait]
impl PrincipalMappingStore for MemoryStore {
    async fn server_principal_for_database_principal(
        &self,
        database: &DatabaseName,
        principal: PrincipalId,
    ) -> std::result::Result<Option<PrincipalRef>, crate::StoreError> {
        self.inner.mapping_lookups.fetch_add(1, Ordering::Relaxed);
        let guard = self.inner.mappings.read().expect("poisoned lock");
        Ok(guard.get(&(database.clone(), principal)).cloned())
    }
}

#[async_trait]
impl PermissionStore for MemoryStore {
    async fn list_permissions(
        &self,
        scope: &PermissionScope,
        page: PageRequest,
    ) -> std::result::Result<Page<PermissionRow>, crate::StoreError> {
        let guard = self.inner.permissions.read().expect("poisoned lock");
        let rows = guard.get(scope).map(Vec::as_slice).unwrap_or_default();
        page_of(rows, page)
    }
}

#[async_trait]
impl ProvisioningStore for MemoryStore {
    async fn database_name(
        &self,
        database_id: i64,
    ) -> std::result::Result<Option<DatabaseName>, crate::StoreError> {
        let guard = self.inner.databases.read().expect("poisoned lock");
        Ok(guard.get(&database_id).cloned())
    }

    async fn login(&self, id: PrincipalId) -> std::result::Result<Option<Login>, crate::StoreError> {
        let guard = self.inner.logins.read().expect("poisoned lock");
        Ok(guard.get(&id).map(|name| Login {
            id,
            name: name.clone(),
        }))
    }

    async fn server_role(
        &self,
        id: PrincipalId,
    ) -> std::result::Result<Option<PrincipalName>, crate::StoreError> {
        let guard = self.inner.server_roles.read().expect("poisoned lock");
        Ok(guard.get(&id).cloned())
    }

    async fn database_role(
        &self,
        database: &DatabaseName,
        id: PrincipalId,
    ) -> std::result::Result<Option<PrincipalName>, crate::StoreError> {
        let guard = self.inner.database_roles.read().expect("poisoned lock");
        Ok(guard.get(&(database.clone(), id)).cloned())
    }

    async fn database_user_for_login(
        &self,
        database: &DatabaseName,
        login: PrincipalId,
    ) -> std::result::Result<Option<PrincipalName>, crate::StoreError> {
        let guard = self.inner.database_users.read().expect("poisoned lock");
        Ok(guard.get(&(database.clone(), login)).cloned())
    }

    async fn execute(&self, statement: &Statement) -> std::result::Result<(), crate::StoreError> {
        statement.to_sql()?;
        if let Statement::CreateDatabaseUser {
            database,
            user,
            login,
        } = statement
        {
            let login_id = self
                .login_id_by_name(login)
                .ok_or_else(|| format!("login {login} does not exist"))?;
            self.add_database_user(database.clone(), login_id, user.clone());
        }
        self.inner
            .executed
            .write()
            .expect("poisoned lock")
            .push(statement.clone());
        Ok(())
    }
}
