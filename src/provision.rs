//! Grant and revoke actions against the engine.
//!
//! Each action resolves names through [`ProvisioningStore`], renders one or
//! two [`Statement`]s and executes them in order. There is no transaction
//! spanning the statements.

use crate::cache::PrincipalCache;
use crate::connector::Connector;
use crate::error::{Error, Result};
use crate::grant::{EntitlementId, Grant, MEMBER_ENTITLEMENT};
use crate::permission::PermissionState;
use crate::statement::Statement;
use crate::store::{Login, ProvisioningStore, Store};
use crate::token::RoleKey;
use crate::types::{DatabaseName, PrincipalName, ResourceId, ResourceType};
use crate::vocabulary::VocabularyScope;
use tracing::{debug, info};

impl<S, C> Connector<S, C>
where
    S: Store + ProvisioningStore,
    C: PrincipalCache,
{
    /// Gives `principal` the entitlement and returns the resulting grant.
    ///
    /// Database permissions and database role memberships create the
    /// login's database user first when it does not exist yet.
    pub async fn grant(&self, entitlement: &EntitlementId, principal: &ResourceId) -> Result<Grant> {
        let resource = entitlement.resource();
        match resource.resource_type {
            ResourceType::Database => {
                let login = self.user_login(principal).await?;
                let database = self.database_by_id(resource).await?;
                let (permission, state) = self.database_permission(entitlement)?;
                let user = self.ensure_database_user(&database, &login).await?;
                info!(
                    entitlement = %entitlement,
                    login = %login.name,
                    database = %database,
                    "granting database permission"
                );
                self.execute(&Statement::GrantDatabasePermission {
                    database,
                    permission,
                    user,
                    with_grant_option: state == PermissionState::GrantedWithOption,
                })
                .await?;
            }
            ResourceType::ServerRole => {
                require_member_slug(entitlement)?;
                let login = self.member_login(principal).await?;
                let role = self.server_role_name(resource).await?;
                info!(role = %role, login = %login.name, "adding server role member");
                self.execute(&Statement::AddServerRoleMember {
                    role,
                    login: login.name,
                })
                .await?;
            }
            ResourceType::DatabaseRole => {
                require_member_slug(entitlement)?;
                let login = self.member_login(principal).await?;
                let (database, role) = self.database_role_name(resource).await?;
                let user = self.ensure_database_user(&database, &login).await?;
                info!(
                    role = %role,
                    login = %login.name,
                    database = %database,
                    "adding database role member"
                );
                self.execute(&Statement::AddDatabaseRoleMember {
                    database,
                    role,
                    user,
                })
                .await?;
            }
            _ => return Err(unsupported(entitlement)),
        }
        Ok(Grant::new(entitlement.clone(), principal.clone()))
    }

    /// Takes the grant's entitlement away from its principal.
    ///
    /// Revoking from a login without a database user is a no-op.
    pub async fn revoke(&self, grant: &Grant) -> Result<()> {
        let entitlement = &grant.entitlement;
        let resource = entitlement.resource();
        match resource.resource_type {
            ResourceType::Database => {
                let login = self.user_login(&grant.principal).await?;
                let database = self.database_by_id(resource).await?;
                let (permission, state) = self.database_permission(entitlement)?;
                let Some(user) = self.existing_database_user(&database, &login).await? else {
                    return Ok(());
                };
                info!(
                    entitlement = %entitlement,
                    login = %login.name,
                    database = %database,
                    "revoking database permission"
                );
                self.execute(&Statement::RevokeDatabasePermission {
                    database,
                    permission,
                    user,
                    grant_option_only: state == PermissionState::GrantedWithOption,
                })
                .await
            }
            ResourceType::ServerRole => {
                require_member_slug(entitlement)?;
                let login = self.member_login(&grant.principal).await?;
                let role = self.server_role_name(resource).await?;
                info!(role = %role, login = %login.name, "dropping server role member");
                self.execute(&Statement::DropServerRoleMember {
                    role,
                    login: login.name,
                })
                .await
            }
            ResourceType::DatabaseRole => {
                require_member_slug(entitlement)?;
                let login = self.member_login(&grant.principal).await?;
                let (database, role) = self.database_role_name(resource).await?;
                let Some(user) = self.existing_database_user(&database, &login).await? else {
                    return Ok(());
                };
                info!(
                    role = %role,
                    login = %login.name,
                    database = %database,
                    "dropping database role member"
                );
                self.execute(&Statement::DropDatabaseRoleMember {
                    database,
                    role,
                    user,
                })
                .await
            }
            _ => Err(unsupported(entitlement)),
        }
    }

    async fn execute(&self, statement: &Statement) -> Result<()> {
        let sql = statement.to_sql()?;
        debug!(sql = %sql, destructive = statement.is_destructive(), "executing statement");
        self.store().execute(statement).await?;
        Ok(())
    }

    async fn user_login(&self, principal: &ResourceId) -> Result<Login> {
        if principal.resource_type != ResourceType::User {
            return Err(Error::InvalidResource(format!(
                "database permissions can only be granted to users, got {principal}"
            )));
        }
        self.login(principal).await
    }

    async fn member_login(&self, principal: &ResourceId) -> Result<Login> {
        match principal.resource_type {
            ResourceType::User | ResourceType::Group => self.login(principal).await,
            _ => Err(Error::InvalidResource(format!(
                "role members must be users or groups, got {principal}"
            ))),
        }
    }

    async fn login(&self, principal: &ResourceId) -> Result<Login> {
        let id = principal.principal_id()?;
        self.store()
            .login(id)
            .await?
            .ok_or_else(|| Error::NotFound {
                kind: "login",
                id: id.to_string(),
            })
    }

    async fn database_by_id(&self, resource: &ResourceId) -> Result<DatabaseName> {
        let database_id = resource.resource.parse::<i64>().map_err(|_| {
            Error::InvalidEntitlement(format!("database id must be numeric: {resource}"))
        })?;
        self.store()
            .database_name(database_id)
            .await?
            .ok_or_else(|| Error::NotFound {
                kind: "database",
                id: database_id.to_string(),
            })
    }

    async fn server_role_name(&self, resource: &ResourceId) -> Result<PrincipalName> {
        let id = resource.principal_id()?;
        self.store()
            .server_role(id)
            .await?
            .ok_or_else(|| Error::NotFound {
                kind: "server role",
                id: id.to_string(),
            })
    }

    async fn database_role_name(&self, resource: &ResourceId) -> Result<(DatabaseName, PrincipalName)> {
        let key = RoleKey::try_from(resource)?;
        let Some(database) = key.database_name().cloned() else {
            return Err(Error::InvalidResource(format!(
                "not a database role: {resource}"
            )));
        };
        let role = self
            .store()
            .database_role(&database, key.role_id())
            .await?
            .ok_or_else(|| Error::NotFound {
                kind: "database role",
                id: key.to_string(),
            })?;
        Ok((database, role))
    }

    /// Splits a database permission entitlement into its T-SQL permission
    /// name and grant state.
    fn database_permission(&self, entitlement: &EntitlementId) -> Result<(String, PermissionState)> {
        let (code, state) = entitlement.permission_parts();
        let permission = self
            .vocabulary()
            .get(VocabularyScope::Database)
            .permission_name(code)
            .ok_or_else(|| {
                Error::InvalidEntitlement(format!("unknown database permission: {entitlement}"))
            })?;
        Ok((permission, state))
    }

    async fn existing_database_user(
        &self,
        database: &DatabaseName,
        login: &Login,
    ) -> Result<Option<PrincipalName>> {
        let user = self
            .store()
            .database_user_for_login(database, login.id)
            .await?;
        if user.is_none() {
            debug!(
                database = %database,
                login = %login.name,
                "login has no database user; nothing to revoke"
            );
        }
        Ok(user)
    }

    async fn ensure_database_user(
        &self,
        database: &DatabaseName,
        login: &Login,
    ) -> Result<PrincipalName> {
        if let Some(user) = self
            .store()
            .database_user_for_login(database, login.id)
            .await?
        {
            return Ok(user);
        }

        info!(database = %database, login = %login.name, "creating database user for login");
        self.execute(&Statement::CreateDatabaseUser {
            database: database.clone(),
            user: login.name.clone(),
            login: login.name.clone(),
        })
        .await?;
        self.cache().invalidate_database(database).await;
        Ok(login.name.clone())
    }
}

fn require_member_slug(entitlement: &EntitlementId) -> Result<()> {
    if entitlement.slug() == MEMBER_ENTITLEMENT {
        Ok(())
    } else {
        Err(Error::InvalidEntitlement(format!(
            "role entitlements must be {MEMBER_ENTITLEMENT}: {entitlement}"
        )))
    }
}

fn unsupported(entitlement: &EntitlementId) -> Error {
    Error::InvalidEntitlement(format!("entitlement cannot be provisioned: {entitlement}"))
}
