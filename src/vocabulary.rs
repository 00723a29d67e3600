//! Permission code vocabularies.
//!
//! The engine reports permissions as short type codes (`SL`, `ALDB`, ...). Each
//! securable class has its own closed set; codes outside the set for a scope are
//! ignored by the decoder.

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

/// Version of the built-in code tables.
pub const VOCABULARY_VERSION: u32 = 1;

/// Suffix appended to a code for its "with grant option" entitlement.
pub const WITH_GRANT_SUFFIX: &str = "-grant";

/// Securable class a vocabulary applies to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum VocabularyScope {
    Server,
    Database,
    Schema,
    Table,
    Login,
}

impl VocabularyScope {
    /// Whether grants in this scope are modelled with a separate
    /// with-grant-option entitlement.
    pub fn supports_grant_option(self) -> bool {
        matches!(self, VocabularyScope::Server | VocabularyScope::Database)
    }
}

/// Entitlement exposed for one vocabulary entry.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EntitlementDescriptor {
    pub slug: String,
    pub display_name: String,
}

/// Immutable code table for one scope.
#[derive(Clone, Debug)]
pub struct PermissionVocabulary {
    scope: VocabularyScope,
    version: u32,
    codes: BTreeMap<String, String>,
}

impl PermissionVocabulary {
    /// Builds a vocabulary from `(code, display name)` pairs.
    pub fn new<I, K, V>(scope: VocabularyScope, version: u32, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            scope,
            version,
            codes: entries
                .into_iter()
                .map(|(code, name)| (code.into(), name.into()))
                .collect(),
        }
    }

    pub fn scope(&self) -> VocabularyScope {
        self.scope
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Returns whether `code` belongs to this vocabulary.
    pub fn contains(&self, code: &str) -> bool {
        self.codes.contains_key(code)
    }

    /// Returns the display name for `code`.
    pub fn display_name(&self, code: &str) -> Option<&str> {
        self.codes.get(code).map(String::as_str)
    }

    /// Returns the T-SQL permission name for `code` (e.g. `SL` -> `SELECT`).
    pub fn permission_name(&self, code: &str) -> Option<String> {
        self.display_name(code).map(str::to_ascii_uppercase)
    }

    /// Iterates `(code, display name)` pairs in code order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.codes
            .iter()
            .map(|(code, name)| (code.as_str(), name.as_str()))
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Lists every entitlement a resource of this scope exposes.
    pub fn entitlements(&self) -> Vec<EntitlementDescriptor> {
        let grant_option = self.scope.supports_grant_option();
        let mut out = Vec::with_capacity(self.codes.len() * if grant_option { 2 } else { 1 });
        for (code, name) in self.iter() {
            out.push(EntitlementDescriptor {
                slug: code.to_string(),
                display_name: name.to_string(),
            });
            if grant_option {
                out.push(EntitlementDescriptor {
                    slug: format!("{code}{WITH_GRANT_SUFFIX}"),
                    display_name: format!("{name} (With Grant)"),
                });
            }
        }
        out
    }
}

/// One vocabulary per scope.
#[derive(Clone, Debug)]
pub struct VocabularyCatalog {
    server: PermissionVocabulary,
    database: PermissionVocabulary,
    schema: PermissionVocabulary,
    table: PermissionVocabulary,
    login: PermissionVocabulary,
}

static BUILTIN: LazyLock<Arc<VocabularyCatalog>> = LazyLock::new(|| {
    let table = |scope, entries: &[(&str, &str)]| {
        PermissionVocabulary::new(scope, VOCABULARY_VERSION, entries.iter().copied())
    };
    Arc::new(VocabularyCatalog {
        server: table(VocabularyScope::Server, SERVER_PERMISSIONS),
        database: table(VocabularyScope::Database, DATABASE_PERMISSIONS),
        schema: table(VocabularyScope::Schema, SCHEMA_PERMISSIONS),
        table: table(VocabularyScope::Table, TABLE_PERMISSIONS),
        login: table(VocabularyScope::Login, LOGIN_PERMISSIONS),
    })
});

impl VocabularyCatalog {
    /// Shared built-in catalog; built once per process.
    pub fn builtin() -> Arc<Self> {
        Arc::clone(&BUILTIN)
    }

    /// Assembles a catalog from custom vocabularies.
    ///
    /// Each vocabulary is re-tagged with the scope it is installed under.
    pub fn new(
        server: PermissionVocabulary,
        database: PermissionVocabulary,
        schema: PermissionVocabulary,
        table: PermissionVocabulary,
        login: PermissionVocabulary,
    ) -> Self {
        let retag = |mut vocabulary: PermissionVocabulary, scope| {
            vocabulary.scope = scope;
            vocabulary
        };
        Self {
            server: retag(server, VocabularyScope::Server),
            database: retag(database, VocabularyScope::Database),
            schema: retag(schema, VocabularyScope::Schema),
            table: retag(table, VocabularyScope::Table),
            login: retag(login, VocabularyScope::Login),
        }
    }

    /// Returns the vocabulary for `scope`.
    pub fn get(&self, scope: VocabularyScope) -> &PermissionVocabulary {
        match scope {
            VocabularyScope::Server => &self.server,
            VocabularyScope::Database => &self.database,
            VocabularyScope::Schema => &self.schema,
            VocabularyScope::Table => &self.table,
            VocabularyScope::Login => &self.login,
        }
    }
}

const SERVER_PERMISSIONS: &[(&str, &str)] = &[
    ("AAES", "Alter Any Event Session"),
    ("ADBO", "Administer Bulk Operations"),
    ("ALAA", "Alter Any Server Audit"),
    ("ALAG", "Alter Any Availability Group"),
    ("ALCD", "Alter Any Credential"),
    ("ALCO", "Alter Any Connection"),
    ("ALDB", "Alter Any Database"),
    ("ALES", "Alter Any Event Notification"),
    ("ALHE", "Alter Any Endpoint"),
    ("ALLG", "Alter Any Login"),
    ("ALLS", "Alter Any Linked Server"),
    ("ALRS", "Alter Resources"),
    ("ALSR", "Alter Any Server Role"),
    ("ALSS", "Alter Server State"),
    ("ALST", "Alter Settings"),
    ("ALTR", "Alter Trace"),
    ("AUTH", "Authenticate Server"),
    ("CADB", "Connect Any Database"),
    ("CL", "Control Server"),
    ("COSQ", "Connect SQL"),
    ("CRAC", "Create Availability Group"),
    ("CRDB", "Create Any Database"),
    ("CRDE", "Create DDL Event Notification"),
    ("CRHE", "Create Endpoint"),
    ("CRSR", "Create Server Role"),
    ("CRTE", "Create Trace Event Notification"),
    ("IAL", "Impersonate Any Login"),
    ("SHDN", "Shutdown"),
    ("SUS", "Select All User Securables"),
    ("VW", "View Any Definition"),
    ("VWDB", "View Any Database"),
    ("VWSS", "View Server State"),
    ("XA", "External Access Assembly"),
    ("XU", "Unsafe Assembly"),
];

const DATABASE_PERMISSIONS: &[(&str, &str)] = &[
    ("AADS", "Alter Any Database Event Session"),
    ("AAMK", "Alter Any Mask"),
    ("AEDS", "Alter Any External Data Source"),
    ("AEFF", "Alter Any External File Format"),
    ("AL", "Alter"),
    ("ALAK", "Alter Any Asymmetric Key"),
    ("ALAR", "Alter Any Application Role"),
    ("ALAS", "Alter Any Assembly"),
    ("ALCF", "Alter Any Certificate"),
    ("ALDS", "Alter Any Dataspace"),
    ("ALED", "Alter Any Database Event Notification"),
    ("ALFT", "Alter Any Fulltext Catalog"),
    ("ALMT", "Alter Any Message Type"),
    ("ALRL", "Alter Any Role"),
    ("ALRT", "Alter Any Route"),
    ("ALSB", "Alter Any Remote Service Binding"),
    ("ALSC", "Alter Any Contract"),
    ("ALSK", "Alter Any Symmetric Key"),
    ("ALSM", "Alter Any Schema"),
    ("ALSV", "Alter Any Service"),
    ("ALTG", "Alter Any Database DDL Trigger"),
    ("ALUS", "Alter Any User"),
    ("AUTH", "Authenticate"),
    ("BADB", "Backup Database"),
    ("BALO", "Backup Log"),
    ("CL", "Control"),
    ("CO", "Connect"),
    ("CORP", "Connect Replication"),
    ("CP", "Checkpoint"),
    ("CRAG", "Create Aggregate"),
    ("CRAK", "Create Asymmetric Key"),
    ("CRAS", "Create Assembly"),
    ("CRCF", "Create Certificate"),
    ("CRDB", "Create Database"),
    ("CRDF", "Create Default"),
    ("CRED", "Create Database DDL Event Notification"),
    ("CRFN", "Create Function"),
    ("CRFT", "Create Fulltext Catalog"),
    ("CRMT", "Create Message Type"),
    ("CRPR", "Create Procedure"),
    ("CRQU", "Create Queue"),
    ("CRRL", "Create Role"),
    ("CRRT", "Create Route"),
    ("CRRU", "Create Rule"),
    ("CRSB", "Create Remote Service Binding"),
    ("CRSC", "Create Contract"),
    ("CRSK", "Create Symmetric Key"),
    ("CRSM", "Create Schema"),
    ("CRSN", "Create Synonym"),
    ("CRSO", "Create Sequence"),
    ("CRSV", "Create Service"),
    ("CRTB", "Create Table"),
    ("CRTY", "Create Type"),
    ("CRVW", "Create View"),
    ("CRXS", "Create XML Schema Collection"),
    ("DL", "Delete"),
    ("EX", "Execute"),
    ("IN", "Insert"),
    ("RF", "References"),
    ("SL", "Select"),
    ("SPLN", "Showplan"),
    ("SUQN", "Subscribe Query Notifications"),
    ("TO", "Take Ownership"),
    ("UP", "Update"),
    ("VW", "View Definition"),
    ("VWCT", "View Change Tracking"),
    ("VWDS", "View Database State"),
];

const SCHEMA_PERMISSIONS: &[(&str, &str)] = &[
    ("AL", "Alter"),
    ("CL", "Control"),
    ("DL", "Delete"),
    ("EX", "Execute"),
    ("IN", "Insert"),
    ("RF", "References"),
    ("SL", "Select"),
    ("TO", "Take Ownership"),
    ("UP", "Update"),
    ("VW", "View Definition"),
    ("VWCT", "View Change Tracking"),
];

const TABLE_PERMISSIONS: &[(&str, &str)] = &[
    ("AL", "Alter"),
    ("CL", "Control"),
    ("DL", "Delete"),
    ("EX", "Execute"),
    ("IN", "Insert"),
    ("RC", "Receive"),
    ("RF", "References"),
    ("SL", "Select"),
    ("TO", "Take Ownership"),
    ("UP", "Update"),
    ("VW", "View Definition"),
    ("VWCT", "View Change Tracking"),
];

const LOGIN_PERMISSIONS: &[(&str, &str)] = &[
    ("AL", "Alter"),
    ("CL", "Control"),
    ("IM", "Impersonate"),
    ("VW", "View Definition"),
];
