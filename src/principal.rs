//! Principal-type resolution.
//!
//! `sys.server_principals.type` and `sys.database_principals.type` carry a
//! one or two letter tag. [`resolve`] is the only place those tags are
//! interpreted.

use crate::types::{DatabaseName, PrincipalId, ResourceId};

/// Namespace a principal lives in.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Scope {
    /// Server-wide principals (logins, server roles).
    Server,
    /// Principals local to one database (users, database roles).
    Database,
}

/// Semantic category of a principal.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum PrincipalCategory {
    User,
    Group,
    Role,
    Unknown,
}

impl PrincipalCategory {
    /// Resource reference for a user or group with the given server id.
    ///
    /// Returns `None` for roles and unknown principals, which do not map to
    /// a login resource.
    pub fn login_resource(self, id: PrincipalId) -> Option<ResourceId> {
        match self {
            PrincipalCategory::User => Some(ResourceId::user(id)),
            PrincipalCategory::Group => Some(ResourceId::group(id)),
            PrincipalCategory::Role | PrincipalCategory::Unknown => None,
        }
    }
}

// S: SQL login, U: Windows login, C: certificate-mapped login, E: external
// (Entra) login; G: Windows group, X: external group.
const SERVER_PRINCIPAL_TYPES: &[(&str, PrincipalCategory)] = &[
    ("R", PrincipalCategory::Role),
    ("G", PrincipalCategory::Group),
    ("X", PrincipalCategory::Group),
    ("S", PrincipalCategory::User),
    ("U", PrincipalCategory::User),
    ("C", PrincipalCategory::User),
    ("E", PrincipalCategory::User),
];

// Database users may also be mapped to an asymmetric key (K). Application
// roles (A) have no members and stay unknown.
const DATABASE_PRINCIPAL_TYPES: &[(&str, PrincipalCategory)] = &[
    ("R", PrincipalCategory::Role),
    ("G", PrincipalCategory::Group),
    ("X", PrincipalCategory::Group),
    ("S", PrincipalCategory::User),
    ("U", PrincipalCategory::User),
    ("C", PrincipalCategory::User),
    ("E", PrincipalCategory::User),
    ("K", PrincipalCategory::User),
];

/// Maps a principal-type tag to its category at `scope`.
pub fn resolve(type_tag: &str, scope: Scope) -> PrincipalCategory {
    let table = match scope {
        Scope::Server => SERVER_PRINCIPAL_TYPES,
        Scope::Database => DATABASE_PRINCIPAL_TYPES,
    };
    let tag = type_tag.trim();
    table
        .iter()
        .find(|(known, _)| *known == tag)
        .map(|(_, category)| *category)
        .unwrap_or(PrincipalCategory::Unknown)
}

/// A principal at a given scope.
///
/// Two refs with the same security identifier at different scopes are
/// distinct; [`crate::PrincipalMappingStore`] reconciles them.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct PrincipalRef {
    pub id: PrincipalId,
    pub category: PrincipalCategory,
    pub scope: Scope,
    pub database: Option<DatabaseName>,
}

impl PrincipalRef {
    /// A server-scope principal.
    pub fn server(id: PrincipalId, category: PrincipalCategory) -> Self {
        Self {
            id,
            category,
            scope: Scope::Server,
            database: None,
        }
    }

    /// A database-scope principal.
    pub fn database(database: DatabaseName, id: PrincipalId, category: PrincipalCategory) -> Self {
        Self {
            id,
            category,
            scope: Scope::Database,
            database: Some(database),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_maps_known_tags() {
        for scope in [Scope::Server, Scope::Database] {
            assert_eq!(resolve("R", scope), PrincipalCategory::Role);
            assert_eq!(resolve("G", scope), PrincipalCategory::Group);
            assert_eq!(resolve("X", scope), PrincipalCategory::Group);
            for tag in ["S", "U", "C", "E"] {
                assert_eq!(resolve(tag, scope), PrincipalCategory::User);
            }
        }
    }

    #[test]
    fn asymmetric_key_principals_are_users_only_in_databases() {
        assert_eq!(resolve("K", Scope::Database), PrincipalCategory::User);
        assert_eq!(resolve("K", Scope::Server), PrincipalCategory::Unknown);
    }

    #[test]
    fn resolve_trims_padded_char_columns() {
        assert_eq!(resolve("R ", Scope::Database), PrincipalCategory::Role);
    }

    #[test]
    fn resolve_returns_unknown_for_application_roles_and_garbage() {
        assert_eq!(resolve("A", Scope::Database), PrincipalCategory::Unknown);
        assert_eq!(resolve("", Scope::Server), PrincipalCategory::Unknown);
        assert_eq!(resolve("r", Scope::Server), PrincipalCategory::Unknown);
    }

    #[test]
    fn login_resource_only_for_users_and_groups() {
        let id = PrincipalId::new(7);
        assert_eq!(
            PrincipalCategory::Group.login_resource(id),
            Some(ResourceId::group(id))
        );
        assert!(PrincipalCategory::Role.login_resource(id).is_none());
    }
}
