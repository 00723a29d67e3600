//! Resume tokens for role-membership traversal.
//!
//! A [`TraversalToken`] is the whole state of a traversal: a stack of roles
//! still being expanded and the set of roles already expanded. It travels to
//! the caller as an opaque string (URL-safe base64 over a versioned JSON
//! envelope) and comes back verbatim on the next call.

use crate::error::{Error, Result};
use crate::principal::Scope;
use crate::types::{DatabaseName, PrincipalId, ResourceId, ResourceType};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

const TOKEN_VERSION: u8 = 1;

/// Scope-qualified role identifier.
///
/// Server roles render as the bare principal id, database roles as
/// `<database>:<principal id>`.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum RoleKey {
    Server(PrincipalId),
    Database {
        database: DatabaseName,
        role: PrincipalId,
    },
}

impl RoleKey {
    pub fn server(role: PrincipalId) -> Self {
        RoleKey::Server(role)
    }

    pub fn database(database: DatabaseName, role: PrincipalId) -> Self {
        RoleKey::Database { database, role }
    }

    /// Principal id of the role within its scope.
    pub fn role_id(&self) -> PrincipalId {
        match self {
            RoleKey::Server(role) | RoleKey::Database { role, .. } => *role,
        }
    }

    /// Database the role belongs to; `None` for server roles.
    pub fn database_name(&self) -> Option<&DatabaseName> {
        match self {
            RoleKey::Server(_) => None,
            RoleKey::Database { database, .. } => Some(database),
        }
    }

    pub fn scope(&self) -> Scope {
        match self {
            RoleKey::Server(_) => Scope::Server,
            RoleKey::Database { .. } => Scope::Database,
        }
    }

    /// Resource reference of the role itself.
    pub fn resource_id(&self) -> ResourceId {
        match self {
            RoleKey::Server(role) => ResourceId::server_role(*role),
            RoleKey::Database { database, role } => ResourceId::database_role(database, *role),
        }
    }
}

impl fmt::Display for RoleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoleKey::Server(role) => write!(f, "{role}"),
            RoleKey::Database { database, role } => write!(f, "{database}:{role}"),
        }
    }
}

impl FromStr for RoleKey {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.rsplit_once(':') {
            None => Ok(RoleKey::Server(value.parse()?)),
            Some((database, role)) => Ok(RoleKey::Database {
                database: DatabaseName::new(database)?,
                role: role.parse()?,
            }),
        }
    }
}

impl TryFrom<&ResourceId> for RoleKey {
    type Error = Error;

    fn try_from(resource: &ResourceId) -> Result<Self> {
        match resource.resource_type {
            ResourceType::ServerRole => Ok(RoleKey::Server(resource.principal_id()?)),
            ResourceType::DatabaseRole => match resource.resource.parse::<RoleKey>()? {
                key @ RoleKey::Database { .. } => Ok(key),
                RoleKey::Server(_) => Err(Error::InvalidResource(format!(
                    "database role id must be <database>:<id>: {}",
                    resource.resource
                ))),
            },
            other => Err(Error::InvalidResource(format!(
                "{other} is not a role resource"
            ))),
        }
    }
}

impl Serialize for RoleKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RoleKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Kind of work a frontier entry represents.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum EntryKind {
    #[serde(rename = "role")]
    RoleExpansion,
}

/// A role whose direct members are (still) being listed.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct FrontierEntry {
    pub kind: EntryKind,
    pub role: RoleKey,
    /// Position within the role's membership listing; `None` is the first page.
    pub cursor: Option<String>,
}

impl FrontierEntry {
    /// Entry for a role that has not been listed yet.
    pub fn new(role: RoleKey) -> Self {
        Self {
            kind: EntryKind::RoleExpansion,
            role,
            cursor: None,
        }
    }

    pub(crate) fn with_cursor(mut self, cursor: String) -> Self {
        self.cursor = Some(cursor);
        self
    }
}

/// Decoded traversal state.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TraversalToken {
    frontier: Vec<FrontierEntry>,
    visited: BTreeSet<RoleKey>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    v: u8,
    frontier: Vec<FrontierEntry>,
    visited: BTreeSet<RoleKey>,
}

impl TraversalToken {
    /// Decodes a resume token. The empty string is the first call.
    pub fn decode(token: &str) -> Result<Self> {
        let token = token.trim();
        if token.is_empty() {
            return Ok(Self::default());
        }
        let bytes = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| Error::InvalidToken("token is not url-safe base64".to_string()))?;
        let envelope: Envelope = serde_json::from_slice(&bytes)
            .map_err(|err| Error::InvalidToken(format!("malformed token: {err}")))?;
        if envelope.v != TOKEN_VERSION {
            return Err(Error::InvalidToken(format!(
                "unsupported token version {}",
                envelope.v
            )));
        }
        if envelope.frontier.is_empty() {
            return Err(Error::InvalidToken(
                "token frontier must not be empty".to_string(),
            ));
        }
        Ok(Self {
            frontier: envelope.frontier,
            visited: envelope.visited,
        })
    }

    /// Encodes the token. An empty frontier encodes as the empty string.
    pub fn encode(&self) -> Result<String> {
        if self.frontier.is_empty() {
            return Ok(String::new());
        }
        let envelope = Envelope {
            v: TOKEN_VERSION,
            frontier: self.frontier.clone(),
            visited: self.visited.clone(),
        };
        let json = serde_json::to_vec(&envelope)?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    /// Returns whether no role is pending expansion.
    pub fn is_done(&self) -> bool {
        self.frontier.is_empty()
    }

    /// Pending entries, bottom of the stack first.
    pub fn frontier(&self) -> &[FrontierEntry] {
        &self.frontier
    }

    pub fn visited(&self) -> &BTreeSet<RoleKey> {
        &self.visited
    }

    pub fn is_visited(&self, role: &RoleKey) -> bool {
        self.visited.contains(role)
    }

    pub(crate) fn is_queued(&self, role: &RoleKey) -> bool {
        self.frontier.iter().any(|entry| &entry.role == role)
    }

    pub(crate) fn push(&mut self, entry: FrontierEntry) {
        self.frontier.push(entry);
    }

    pub(crate) fn pop(&mut self) -> Option<FrontierEntry> {
        self.frontier.pop()
    }

    pub(crate) fn mark_visited(&mut self, role: RoleKey) {
        self.visited.insert(role);
    }

    /// Number of distinct roles the token knows about.
    pub(crate) fn tracked_roles(&self) -> usize {
        let queued_only = self
            .frontier
            .iter()
            .map(|entry| &entry.role)
            .filter(|role| !self.visited.contains(*role))
            .collect::<BTreeSet<_>>()
            .len();
        self.visited.len() + queued_only
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db(name: &str) -> DatabaseName {
        DatabaseName::new(name).unwrap()
    }

    fn sample() -> TraversalToken {
        let mut token = TraversalToken::default();
        token.push(FrontierEntry::new(RoleKey::database(db("sales"), PrincipalId::new(16390))));
        token.push(
            FrontierEntry::new(RoleKey::database(db("sales"), PrincipalId::new(16384)))
                .with_cursor("50".to_string()),
        );
        token.mark_visited(RoleKey::database(db("sales"), PrincipalId::new(16400)));
        token.mark_visited(RoleKey::server(PrincipalId::new(3)));
        token
    }

    #[test]
    fn empty_string_is_first_call() {
        let token = TraversalToken::decode("").unwrap();
        assert!(token.is_done());
        assert!(token.visited().is_empty());
    }

    #[test]
    fn serialization_failures_are_not_reported_as_bad_tokens() {
        let json = serde_json::from_str::<Envelope>("[]").unwrap_err();
        let err = Error::from(json);
        assert!(matches!(err, Error::TokenEncoding(_)));
        assert!(err.to_string().starts_with("failed to encode resume token"));
    }

    #[test]
    fn role_keys_keep_quoted_database_names() {
        let key: RoleKey = "O'Brien[eu]:16384".parse().unwrap();
        assert_eq!(key, RoleKey::database(db("O'Brien[eu]"), PrincipalId::new(16384)));
        let mut token = TraversalToken::default();
        token.push(FrontierEntry::new(key.clone()));
        let decoded = TraversalToken::decode(&token.encode().unwrap()).unwrap();
        assert_eq!(decoded.frontier()[0].role, key);
    }

    #[test]
    fn empty_frontier_encodes_to_empty_string() {
        let mut token = TraversalToken::default();
        token.mark_visited(RoleKey::server(PrincipalId::new(3)));
        assert_eq!(token.encode().unwrap(), "");
    }

    #[test]
    fn round_trip_preserves_state() {
        let token = sample();
        let encoded = token.encode().unwrap();
        assert!(!encoded.is_empty());
        assert_eq!(TraversalToken::decode(&encoded).unwrap(), token);
    }

    #[test]
    fn encoding_is_deterministic() {
        assert_eq!(sample().encode().unwrap(), sample().encode().unwrap());
    }

    #[test]
    fn decode_rejects_garbage() {
        for raw in ["not base64!", "e30", "bnVsbA"] {
            let result = TraversalToken::decode(raw);
            assert!(matches!(result, Err(Error::InvalidToken(_))), "{raw}");
        }
    }

    #[test]
    fn decode_rejects_unknown_version_and_empty_frontier() {
        let encode = |json: &str| URL_SAFE_NO_PAD.encode(json);
        let future = encode(r#"{"v":9,"frontier":[{"kind":"role","role":"3","cursor":null}],"visited":[]}"#);
        assert!(matches!(
            TraversalToken::decode(&future),
            Err(Error::InvalidToken(msg)) if msg.contains("version")
        ));

        let empty = encode(r#"{"v":1,"frontier":[],"visited":["3"]}"#);
        assert!(matches!(
            TraversalToken::decode(&empty),
            Err(Error::InvalidToken(msg)) if msg.contains("frontier")
        ));
    }

    #[test]
    fn decode_rejects_bad_role_keys_and_kinds() {
        let encode = |json: &str| URL_SAFE_NO_PAD.encode(json);
        let bad_key = encode(r#"{"v":1,"frontier":[{"kind":"role","role":"sales:x","cursor":null}],"visited":[]}"#);
        assert!(TraversalToken::decode(&bad_key).is_err());

        let bad_kind = encode(r#"{"v":1,"frontier":[{"kind":"table","role":"3","cursor":null}],"visited":[]}"#);
        assert!(TraversalToken::decode(&bad_kind).is_err());
    }

    #[test]
    fn role_key_parses_both_scopes() {
        assert_eq!("3".parse::<RoleKey>().unwrap(), RoleKey::server(PrincipalId::new(3)));
        let key: RoleKey = "sales:16384".parse().unwrap();
        assert_eq!(key.database_name(), Some(&db("sales")));
        assert_eq!(key.role_id(), PrincipalId::new(16384));
        assert_eq!(key.to_string(), "sales:16384");
    }

    #[test]
    fn role_key_from_resource_checks_type() {
        let resource = ResourceId::database_role(&db("sales"), PrincipalId::new(7));
        assert_eq!(
            RoleKey::try_from(&resource).unwrap(),
            RoleKey::database(db("sales"), PrincipalId::new(7))
        );
        assert!(RoleKey::try_from(&ResourceId::user(PrincipalId::new(7))).is_err());
        assert!(RoleKey::try_from(&ResourceId::new(ResourceType::DatabaseRole, "7")).is_err());
    }

    #[test]
    fn tracked_roles_counts_distinct_keys() {
        let mut token = sample();
        assert_eq!(token.tracked_roles(), 4);
        token.push(FrontierEntry::new(RoleKey::server(PrincipalId::new(3))));
        assert_eq!(token.tracked_roles(), 4);
    }
}
