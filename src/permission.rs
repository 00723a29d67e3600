//! Permission-state decoding.
//!
//! Catalog queries return one row per (principal, state) with the permission
//! codes aggregated into a comma-joined string. This module turns such a row
//! into entitlement slugs.

use crate::grant::permission_slug;
use crate::principal::Scope;
use crate::types::{DatabaseName, PrincipalId};
use crate::vocabulary::{PermissionVocabulary, VocabularyScope};

/// Separator used by `STRING_AGG` in the permission queries.
const CODE_SEPARATOR: char = ',';

/// Grant state of a permission row.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum PermissionState {
    /// `G`: granted.
    Granted,
    /// `W`: granted with the right to re-grant.
    GrantedWithOption,
}

impl PermissionState {
    /// Parses the engine's state column. Deny (`D`) and revoke (`R`) rows
    /// carry no entitlement and yield `None`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim() {
            "G" => Some(PermissionState::Granted),
            "W" => Some(PermissionState::GrantedWithOption),
            _ => None,
        }
    }

    pub fn as_tag(self) -> &'static str {
        match self {
            PermissionState::Granted => "G",
            PermissionState::GrantedWithOption => "W",
        }
    }
}

/// Securable whose permissions are being listed.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum PermissionScope {
    Server,
    Database {
        database: DatabaseName,
    },
    Schema {
        database: DatabaseName,
        schema_id: i64,
    },
    Table {
        database: DatabaseName,
        object_id: i64,
    },
}

impl PermissionScope {
    pub fn database(database: DatabaseName) -> Self {
        PermissionScope::Database { database }
    }

    /// Vocabulary that applies to codes at this scope.
    pub fn vocabulary_scope(&self) -> VocabularyScope {
        match self {
            PermissionScope::Server => VocabularyScope::Server,
            PermissionScope::Database { .. } => VocabularyScope::Database,
            PermissionScope::Schema { .. } => VocabularyScope::Schema,
            PermissionScope::Table { .. } => VocabularyScope::Table,
        }
    }

    /// Database the grantees live in, if any.
    pub fn database_name(&self) -> Option<&DatabaseName> {
        match self {
            PermissionScope::Server => None,
            PermissionScope::Database { database }
            | PermissionScope::Schema { database, .. }
            | PermissionScope::Table { database, .. } => Some(database),
        }
    }

    /// Namespace of the grantee principals.
    pub fn principal_scope(&self) -> Scope {
        match self {
            PermissionScope::Server => Scope::Server,
            _ => Scope::Database,
        }
    }
}

/// Raw row as returned by a permission query.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PermissionRow {
    pub principal_id: PrincipalId,
    pub principal_name: String,
    pub principal_type: String,
    pub state: String,
    pub permissions: String,
}

/// A permission row with a recognized grant state.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PermissionRecord {
    pub principal_id: PrincipalId,
    pub principal_name: String,
    pub principal_type: String,
    pub state: PermissionState,
    pub codes: String,
}

impl PermissionRecord {
    pub fn from_row(row: PermissionRow, state: PermissionState) -> Self {
        Self {
            principal_id: row.principal_id,
            principal_name: row.principal_name,
            principal_type: row.principal_type,
            state,
            codes: row.permissions,
        }
    }
}

/// Splits an aggregated code list, trimming whitespace and dropping blanks.
pub fn split_codes(codes: &str) -> impl Iterator<Item = &str> {
    codes
        .split(CODE_SEPARATOR)
        .map(str::trim)
        .filter(|code| !code.is_empty())
}

/// Returns the entitlement slugs a record grants, in code order.
///
/// Codes outside `vocabulary` are ignored. Scopes without with-grant-option
/// entitlements report a `W` record as the plain grant.
pub fn decode_entitlements(record: &PermissionRecord, vocabulary: &PermissionVocabulary) -> Vec<String> {
    let state = if vocabulary.scope().supports_grant_option() {
        record.state
    } else {
        PermissionState::Granted
    };
    split_codes(&record.codes)
        .filter(|code| vocabulary.contains(code))
        .map(|code| permission_slug(code, state))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocabulary::VocabularyCatalog;

    fn record(state: PermissionState, codes: &str) -> PermissionRecord {
        PermissionRecord {
            principal_id: PrincipalId::new(5),
            principal_name: "alice".to_string(),
            principal_type: "S".to_string(),
            state,
            codes: codes.to_string(),
        }
    }

    fn database_vocabulary() -> PermissionVocabulary {
        VocabularyCatalog::builtin()
            .get(VocabularyScope::Database)
            .clone()
    }

    #[test]
    fn granted_codes_map_to_plain_entitlements() {
        let slugs = decode_entitlements(&record(PermissionState::Granted, "SL,IN"), &database_vocabulary());
        assert_eq!(slugs, vec!["SL", "IN"]);
    }

    #[test]
    fn with_option_codes_get_grant_suffix() {
        let slugs = decode_entitlements(
            &record(PermissionState::GrantedWithOption, "SL,IN"),
            &database_vocabulary(),
        );
        assert_eq!(slugs, vec!["SL-grant", "IN-grant"]);
    }

    #[test]
    fn with_option_folds_to_plain_where_scope_has_no_grant_entitlements() {
        let catalog = VocabularyCatalog::builtin();
        for scope in [VocabularyScope::Schema, VocabularyScope::Table] {
            let vocabulary = catalog.get(scope);
            let slugs = decode_entitlements(&record(PermissionState::GrantedWithOption, "SL"), vocabulary);
            assert_eq!(slugs, vec!["SL"], "{scope:?}");
            let listed: Vec<_> = vocabulary.entitlements().into_iter().map(|d| d.slug).collect();
            assert!(slugs.iter().all(|slug| listed.contains(slug)), "{scope:?}");
        }
    }

    #[test]
    fn unknown_codes_are_dropped_silently() {
        let slugs = decode_entitlements(&record(PermissionState::Granted, "SL,ZZ"), &database_vocabulary());
        assert_eq!(slugs, vec!["SL"]);
    }

    #[test]
    fn whitespace_and_empty_segments_are_ignored() {
        let slugs = decode_entitlements(
            &record(PermissionState::Granted, " SL , ,CO ,"),
            &database_vocabulary(),
        );
        assert_eq!(slugs, vec!["SL", "CO"]);
    }

    #[test]
    fn codes_are_scope_specific() {
        let server = VocabularyCatalog::builtin();
        let server = server.get(VocabularyScope::Server);
        let slugs = decode_entitlements(&record(PermissionState::Granted, "SL,COSQ"), server);
        assert_eq!(slugs, vec!["COSQ"]);
    }

    #[test]
    fn state_tags_parse() {
        assert_eq!(PermissionState::from_tag("G"), Some(PermissionState::Granted));
        assert_eq!(
            PermissionState::from_tag(" W"),
            Some(PermissionState::GrantedWithOption)
        );
        assert_eq!(PermissionState::from_tag("D"), None);
        assert_eq!(PermissionState::GrantedWithOption.as_tag(), "W");
    }

    #[test]
    fn scope_reports_vocabulary_and_database() {
        let db = DatabaseName::new("sales").unwrap();
        let table = PermissionScope::Table {
            database: db.clone(),
            object_id: 901,
        };
        assert_eq!(table.vocabulary_scope(), VocabularyScope::Table);
        assert_eq!(table.database_name(), Some(&db));
        assert_eq!(table.principal_scope(), Scope::Database);
        assert_eq!(PermissionScope::Server.database_name(), None);
    }
}
