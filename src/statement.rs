//! T-SQL statements issued by provisioning.
//!
//! Identifiers are spliced into the text bracket-quoted, so every identifier
//! is re-validated at render time. Permission names must be upper-case words.

use crate::error::{Error, Result};
use crate::types::{DatabaseName, PrincipalName};

const FORBIDDEN_IDENTIFIER_CHARS: &[char] = &['[', ']', '"', '\'', ';'];

/// One provisioning statement.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Statement {
    AddServerRoleMember {
        role: PrincipalName,
        login: PrincipalName,
    },
    DropServerRoleMember {
        role: PrincipalName,
        login: PrincipalName,
    },
    AddDatabaseRoleMember {
        database: DatabaseName,
        role: PrincipalName,
        user: PrincipalName,
    },
    DropDatabaseRoleMember {
        database: DatabaseName,
        role: PrincipalName,
        user: PrincipalName,
    },
    /// `CREATE USER [user] FOR LOGIN [login]` in `database`.
    CreateDatabaseUser {
        database: DatabaseName,
        user: PrincipalName,
        login: PrincipalName,
    },
    GrantDatabasePermission {
        database: DatabaseName,
        permission: String,
        user: PrincipalName,
        with_grant_option: bool,
    },
    /// Revokes the permission, or only the right to re-grant it.
    RevokeDatabasePermission {
        database: DatabaseName,
        permission: String,
        user: PrincipalName,
        grant_option_only: bool,
    },
}

impl Statement {
    /// Database the statement runs in; `None` for server-level statements.
    pub fn database(&self) -> Option<&DatabaseName> {
        match self {
            Statement::AddServerRoleMember { .. } | Statement::DropServerRoleMember { .. } => None,
            Statement::AddDatabaseRoleMember { database, .. }
            | Statement::DropDatabaseRoleMember { database, .. }
            | Statement::CreateDatabaseUser { database, .. }
            | Statement::GrantDatabasePermission { database, .. }
            | Statement::RevokeDatabasePermission { database, .. } => Some(database),
        }
    }

    /// Returns whether the statement removes access.
    pub fn is_destructive(&self) -> bool {
        matches!(
            self,
            Statement::DropServerRoleMember { .. }
                | Statement::DropDatabaseRoleMember { .. }
                | Statement::RevokeDatabasePermission { .. }
        )
    }

    /// Renders the statement text, prefixed with `USE [db];` when it runs in
    /// a database.
    pub fn to_sql(&self) -> Result<String> {
        let body = match self {
            Statement::AddServerRoleMember { role, login } => format!(
                "ALTER SERVER ROLE {} ADD MEMBER {};",
                quote(role.as_str())?,
                quote(login.as_str())?
            ),
            Statement::DropServerRoleMember { role, login } => format!(
                "ALTER SERVER ROLE {} DROP MEMBER {};",
                quote(role.as_str())?,
                quote(login.as_str())?
            ),
            Statement::AddDatabaseRoleMember { role, user, .. } => format!(
                "ALTER ROLE {} ADD MEMBER {};",
                quote(role.as_str())?,
                quote(user.as_str())?
            ),
            Statement::DropDatabaseRoleMember { role, user, .. } => format!(
                "ALTER ROLE {} DROP MEMBER {};",
                quote(role.as_str())?,
                quote(user.as_str())?
            ),
            Statement::CreateDatabaseUser { user, login, .. } => format!(
                "CREATE USER {} FOR LOGIN {};",
                quote(user.as_str())?,
                quote(login.as_str())?
            ),
            Statement::GrantDatabasePermission {
                database,
                permission,
                user,
                with_grant_option,
            } => format!(
                "GRANT {} ON DATABASE::{} TO {}{};",
                permission_keyword(permission)?,
                quote(database.as_str())?,
                quote(user.as_str())?,
                if *with_grant_option { " WITH GRANT OPTION" } else { "" }
            ),
            Statement::RevokeDatabasePermission {
                database,
                permission,
                user,
                grant_option_only,
            } => {
                let permission = permission_keyword(permission)?;
                let database = quote(database.as_str())?;
                let user = quote(user.as_str())?;
                if *grant_option_only {
                    format!(
                        "REVOKE GRANT OPTION FOR {permission} ON DATABASE::{database} FROM {user} CASCADE;"
                    )
                } else {
                    format!("REVOKE {permission} ON DATABASE::{database} FROM {user};")
                }
            }
        };
        match self.database() {
            Some(database) => Ok(format!("USE {}; {body}", quote(database.as_str())?)),
            None => Ok(body),
        }
    }
}

fn quote(identifier: &str) -> Result<String> {
    if identifier.is_empty()
        || identifier
            .chars()
            .any(|ch| ch.is_control() || FORBIDDEN_IDENTIFIER_CHARS.contains(&ch))
    {
        return Err(Error::InvalidId(format!(
            "identifier cannot be quoted: {identifier:?}"
        )));
    }
    Ok(format!("[{identifier}]"))
}

fn permission_keyword(permission: &str) -> Result<&str> {
    let valid = !permission.is_empty()
        && permission
            .split(' ')
            .all(|word| !word.is_empty() && word.chars().all(|ch| ch.is_ascii_uppercase()));
    if valid {
        Ok(permission)
    } else {
        Err(Error::InvalidEntitlement(format!(
            "not a permission name: {permission:?}"
        )))
    }
}
