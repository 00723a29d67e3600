use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

/// Maximum length of a `sysname` identifier.
const MAX_NAME_LEN: usize = 128;

fn validate_name(value: &str, kind: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidId(format!("{kind} must not be empty")));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(Error::InvalidId(format!(
            "{kind} length must be <= {MAX_NAME_LEN}"
        )));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(Error::InvalidId(format!(
            "{kind} contains invalid characters"
        )));
    }
    Ok(trimmed.to_string())
}

macro_rules! define_name_type {
    ($(#[$doc:meta])* $name:ident, $kind:expr) => {
        $(#[$doc])*
        #[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a validated name.
            pub fn new(value: impl AsRef<str>) -> Result<Self> {
                validate_name(value.as_ref(), $kind).map(Self)
            }

            /// Creates a name from a trusted string without validation.
            ///
            /// Statement rendering re-checks every identifier, so an unchecked
            /// name can never reach the engine unquoted.
            pub fn from_string(value: String) -> Self {
                Self(value)
            }

            /// Returns the underlying string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<&str> for $name {
            type Error = Error;

            fn try_from(value: &str) -> Result<Self> {
                Self::new(value)
            }
        }

        impl TryFrom<String> for $name {
            type Error = Error;

            fn try_from(value: String) -> Result<Self> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

define_name_type!(
    /// Database name (`sys.databases.name`).
    DatabaseName,
    "database name"
);
define_name_type!(
    /// Login, user, group or role name.
    PrincipalName,
    "principal name"
);

/// Numeric principal id (`principal_id` at server or database scope).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(i64);

impl PrincipalId {
    /// Wraps a raw principal id.
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw id.
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PrincipalId {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        value
            .trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|_| Error::InvalidId(format!("principal id must be numeric: {value:?}")))
    }
}

impl From<i64> for PrincipalId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Resource types exposed to the access-governance platform.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceType {
    Server,
    Database,
    Schema,
    Table,
    User,
    Group,
    ServerRole,
    DatabaseRole,
}

impl ResourceType {
    const ALL: [ResourceType; 8] = [
        ResourceType::Server,
        ResourceType::Database,
        ResourceType::Schema,
        ResourceType::Table,
        ResourceType::User,
        ResourceType::Group,
        ResourceType::ServerRole,
        ResourceType::DatabaseRole,
    ];

    /// Returns the stable type id.
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::Server => "server",
            ResourceType::Database => "database",
            ResourceType::Schema => "schema",
            ResourceType::Table => "table",
            ResourceType::User => "user",
            ResourceType::Group => "group",
            ResourceType::ServerRole => "server-role",
            ResourceType::DatabaseRole => "database-role",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|ty| ty.as_str() == value)
            .ok_or_else(|| Error::InvalidResource(format!("unknown resource type: {value}")))
    }
}

/// Typed resource reference.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ResourceId {
    pub resource_type: ResourceType,
    pub resource: String,
}

impl ResourceId {
    /// Creates a resource reference from its parts.
    pub fn new(resource_type: ResourceType, resource: impl Into<String>) -> Self {
        Self {
            resource_type,
            resource: resource.into(),
        }
    }

    /// The server itself, keyed by its name.
    pub fn server(name: impl Into<String>) -> Self {
        Self::new(ResourceType::Server, name)
    }

    /// A database keyed by `database_id`.
    pub fn database(database_id: i64) -> Self {
        Self::new(ResourceType::Database, database_id.to_string())
    }

    /// A server-level login.
    pub fn user(id: PrincipalId) -> Self {
        Self::new(ResourceType::User, id.to_string())
    }

    /// A server-level group login.
    pub fn group(id: PrincipalId) -> Self {
        Self::new(ResourceType::Group, id.to_string())
    }

    /// A fixed or user-defined server role.
    pub fn server_role(id: PrincipalId) -> Self {
        Self::new(ResourceType::ServerRole, id.to_string())
    }

    /// A database role, keyed as `<database>:<role id>`.
    pub fn database_role(database: &DatabaseName, id: PrincipalId) -> Self {
        Self::new(ResourceType::DatabaseRole, format!("{database}:{id}"))
    }

    /// Parses the resource part as a numeric principal id.
    pub fn principal_id(&self) -> Result<PrincipalId> {
        self.resource.parse()
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource_type, self.resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_name_accepts_quotes_and_brackets() {
        for value in ["O'Brien", "sales[eu]", "a\"b"] {
            assert_eq!(DatabaseName::new(value).unwrap().as_str(), value);
        }
    }

    #[test]
    fn database_name_rejects_empty_and_control_characters() {
        for value in ["", "   ", "sa\nles", "sa\0les"] {
            let err = DatabaseName::new(value).expect_err("must reject");
            assert!(err.to_string().contains("database name"));
        }
    }

    #[test]
    fn principal_name_trims_and_accepts_domain_logins() {
        let name = PrincipalName::new("  CORP\\alice ").expect("name");
        assert_eq!(name.as_str(), "CORP\\alice");
    }

    #[test]
    fn principal_name_rejects_overlong_values() {
        let value = "a".repeat(MAX_NAME_LEN + 1);
        assert!(matches!(PrincipalName::new(value), Err(Error::InvalidId(_))));
    }

    #[test]
    fn principal_id_parse_rejects_non_numeric() {
        assert_eq!("42".parse::<PrincipalId>().unwrap(), PrincipalId::new(42));
        assert!(matches!(
            "abc".parse::<PrincipalId>(),
            Err(Error::InvalidId(_))
        ));
    }

    #[test]
    fn resource_type_round_trips_through_str() {
        for ty in ResourceType::ALL {
            assert_eq!(ty.as_str().parse::<ResourceType>().unwrap(), ty);
        }
        assert!("login".parse::<ResourceType>().is_err());
    }

    #[test]
    fn database_role_resource_is_scope_qualified() {
        let db = DatabaseName::new("sales").unwrap();
        let id = ResourceId::database_role(&db, PrincipalId::new(16384));
        assert_eq!(id.to_string(), "database-role:sales:16384");
    }

    #[test]
    fn name_deserialization_validates() {
        let ok: DatabaseName = serde_json::from_str("\"sales\"").unwrap();
        assert_eq!(ok.as_str(), "sales");
        assert!(serde_json::from_str::<DatabaseName>("\"\"").is_err());
    }
}
