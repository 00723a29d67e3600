use crate::cache::{NoCache, PrincipalCache};
use crate::error::Result;
use crate::grant::{Grant, GrantPage};
use crate::pager::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::permission::{PermissionRow, PermissionScope};
use crate::store::{PageRequest, Store};
use crate::synthesizer::GrantSynthesizer;
use crate::token::{RoleKey, TraversalToken};
use crate::types::ResourceId;
use crate::vocabulary::VocabularyCatalog;
use crate::walker::{DEFAULT_MAX_ROLES, RoleWalker, VisitPolicy};
use std::sync::Arc;
use tracing::debug;

/// Access inventory over a pluggable store and optional mapping cache.
#[derive(Debug)]
pub struct Connector<S, C = NoCache> {
    store: S,
    cache: C,
    vocabulary: Arc<VocabularyCatalog>,
    visit_policy: VisitPolicy,
    max_roles: usize,
    default_page_size: usize,
    max_page_size: usize,
}

/// Builder for [`Connector`].
pub struct ConnectorBuilder<S, C = NoCache> {
    store: S,
    cache: C,
    vocabulary: Arc<VocabularyCatalog>,
    visit_policy: VisitPolicy,
    max_roles: usize,
    default_page_size: usize,
    max_page_size: usize,
}

impl<S> ConnectorBuilder<S, NoCache> {
    /// Creates a new builder with default configuration.
    pub fn new(store: S) -> Self {
        Self {
            store,
            cache: NoCache,
            vocabulary: VocabularyCatalog::builtin(),
            visit_policy: VisitPolicy::default(),
            max_roles: DEFAULT_MAX_ROLES,
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

impl<S, C> ConnectorBuilder<S, C> {
    /// Replaces the built-in permission vocabularies.
    pub fn vocabulary(mut self, vocabulary: Arc<VocabularyCatalog>) -> Self {
        self.vocabulary = vocabulary;
        self
    }

    /// Sets when traversed roles enter the visited set.
    pub fn visit_policy(mut self, policy: VisitPolicy) -> Self {
        self.visit_policy = policy;
        self
    }

    /// Sets the maximum number of distinct roles one traversal may track.
    pub fn max_roles(mut self, max_roles: usize) -> Self {
        self.max_roles = max_roles;
        self
    }

    /// Sets the page size used when the caller passes zero.
    pub fn default_page_size(mut self, size: usize) -> Self {
        self.default_page_size = size;
        self
    }

    /// Sets the upper bound on caller page size hints.
    pub fn max_page_size(mut self, size: usize) -> Self {
        self.max_page_size = size;
        self
    }

    /// Sets the cache implementation.
    pub fn cache<C2: PrincipalCache>(self, cache: C2) -> ConnectorBuilder<S, C2> {
        ConnectorBuilder {
            store: self.store,
            cache,
            vocabulary: self.vocabulary,
            visit_policy: self.visit_policy,
            max_roles: self.max_roles,
            default_page_size: self.default_page_size,
            max_page_size: self.max_page_size,
        }
    }

    /// Builds the connector.
    pub fn build(self) -> Connector<S, C> {
        let max_page_size = self.max_page_size.max(1);
        Connector {
            store: self.store,
            cache: self.cache,
            vocabulary: self.vocabulary,
            visit_policy: self.visit_policy,
            max_roles: self.max_roles,
            default_page_size: self.default_page_size.clamp(1, max_page_size),
            max_page_size,
        }
    }
}

impl<S, C> Connector<S, C> {
    /// Returns the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the permission vocabularies in use.
    pub fn vocabulary(&self) -> &VocabularyCatalog {
        &self.vocabulary
    }

    pub(crate) fn cache(&self) -> &C {
        &self.cache
    }

    fn page_size(&self, hint: usize) -> usize {
        match hint {
            0 => self.default_page_size,
            size => size.min(self.max_page_size),
        }
    }
}

impl<S, C> Connector<S, C>
where
    S: Store,
    C: PrincipalCache,
{
    /// Returns one page of flattened membership grants for a role.
    ///
    /// `root` must be a `server-role` or `database-role` resource. Pass the
    /// empty string as `token` on the first call and the returned
    /// `next_token` afterwards; an empty `next_token` ends the traversal.
    /// On error the caller's token is still the correct resumption point.
    pub async fn role_grants(
        &self,
        root: &ResourceId,
        token: &str,
        page_size: usize,
    ) -> Result<GrantPage> {
        let root = RoleKey::try_from(root)?;
        let token = TraversalToken::decode(token)?;
        let walker = RoleWalker::new(&self.store, &self.cache, self.visit_policy, self.max_roles);
        let step = walker.step(&root, token, self.page_size(page_size)).await?;
        Ok(GrantPage {
            grants: step.grants,
            next_token: step.token.encode()?,
        })
    }

    /// Decodes raw permission rows on `resource` into grants.
    pub async fn decode_permissions(
        &self,
        scope: &PermissionScope,
        resource: &ResourceId,
        rows: Vec<PermissionRow>,
    ) -> Result<Vec<Grant>> {
        let vocabulary = self.vocabulary.get(scope.vocabulary_scope());
        GrantSynthesizer::new(&self.store, &self.cache, vocabulary)
            .synthesize(scope, resource, rows)
            .await
    }

    /// Fetches one page of permission rows on `resource` and decodes it.
    ///
    /// `cursor` is the previous page's `next_token`, or empty for the first page.
    pub async fn permission_grants(
        &self,
        scope: &PermissionScope,
        resource: &ResourceId,
        cursor: &str,
        page_size: usize,
    ) -> Result<GrantPage> {
        let cursor = match cursor.trim() {
            "" => None,
            raw => Some(raw.to_string()),
        };
        let page = self
            .store
            .list_permissions(scope, PageRequest::new(cursor, self.page_size(page_size)))
            .await?;
        debug!(
            resource = %resource,
            rows = page.items.len(),
            more = page.next_cursor.is_some(),
            "fetched permission rows"
        );
        let grants = self.decode_permissions(scope, resource, page.items).await?;
        Ok(GrantPage {
            grants,
            next_token: page.next_cursor.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::principal::{PrincipalCategory, PrincipalRef};
    use crate::store::{MemberRow, Page, PermissionStore, PrincipalMappingStore, RoleMemberStore};
    use crate::types::{DatabaseName, PrincipalId, ResourceType};
    use crate::vocabulary::{PermissionVocabulary, VocabularyScope};
    use async_trait::async_trait;
    use futures::executor::block_on;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct TestStore {
        members: HashMap<RoleKey, Vec<MemberRow>>,
        permissions: Vec<PermissionRow>,
        page_sizes: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl RoleMemberStore for TestStore {
        async fn list_role_members(
            &self,
            role: &RoleKey,
            page: PageRequest,
        ) -> std::result::Result<Page<MemberRow>, crate::StoreError> {
            self.page_sizes.lock().unwrap().push(page.size);
            Ok(Page::last(self.members.get(role).cloned().unwrap_or_default()))
        }
    }

    #[async_trait]
    impl PrincipalMappingStore for TestStore {
        async fn server_principal_for_database_principal(
            &self,
            _database: &DatabaseName,
            principal: PrincipalId,
        ) -> std::result::Result<Option<PrincipalRef>, crate::StoreError> {
            Ok(Some(PrincipalRef::server(
                PrincipalId::new(principal.get() + 1000),
                PrincipalCategory::User,
            )))
        }
    }

    #[async_trait]
    impl PermissionStore for TestStore {
        async fn list_permissions(
            &self,
            _scope: &PermissionScope,
            page: PageRequest,
        ) -> std::result::Result<Page<PermissionRow>, crate::StoreError> {
            let offset: usize = page.cursor.as_deref().map_or(0, |c| c.parse().unwrap());
            let end = (offset + page.size).min(self.permissions.len());
            let next = (end < self.permissions.len()).then(|| end.to_string());
            Ok(Page::new(self.permissions[offset..end].to_vec(), next))
        }
    }

    fn permission_row(id: i64, codes: &str) -> PermissionRow {
        PermissionRow {
            principal_id: PrincipalId::new(id),
            principal_name: format!("user{id}"),
            principal_type: "S".to_string(),
            state: "G".to_string(),
            permissions: codes.to_string(),
        }
    }

    #[test]
    fn role_grants_rejects_non_role_roots() {
        let connector = ConnectorBuilder::new(TestStore::default()).build();
        let result = block_on(connector.role_grants(
            &ResourceId::user(PrincipalId::new(5)),
            "",
            10,
        ));
        assert!(matches!(result, Err(Error::InvalidResource(_))));
    }

    #[test]
    fn role_grants_rejects_corrupt_tokens() {
        let connector = ConnectorBuilder::new(TestStore::default()).build();
        let result = block_on(connector.role_grants(
            &ResourceId::server_role(PrincipalId::new(3)),
            "%%%",
            10,
        ));
        assert!(matches!(result, Err(Error::InvalidToken(_))));
    }

    #[test]
    fn database_names_with_quotes_are_traversable() {
        let obrien = DatabaseName::new("O'Brien").unwrap();
        let mut store = TestStore::default();
        store.members.insert(
            RoleKey::database(obrien.clone(), PrincipalId::new(16384)),
            vec![
                MemberRow::new(16385, "auditors", "R"),
                MemberRow::new(5, "alice", "S"),
            ],
        );
        let connector = ConnectorBuilder::new(store).build();

        let empty = block_on(connector.role_grants(
            &ResourceId::new(ResourceType::DatabaseRole, "O'Brien:16390"),
            "",
            10,
        ))
        .unwrap();
        assert!(empty.grants.is_empty());
        assert!(empty.is_last());

        let root = ResourceId::new(ResourceType::DatabaseRole, "O'Brien:16384");
        let first = block_on(connector.role_grants(&root, "", 10)).unwrap();
        let rendered: Vec<_> = first
            .grants
            .iter()
            .map(|grant| format!("{} <- {}", grant.entitlement, grant.principal))
            .collect();
        assert_eq!(
            rendered,
            vec![
                "database-role:O'Brien:16384:member <- database-role:O'Brien:16385",
                "database-role:O'Brien:16384:member <- user:1005",
            ]
        );

        let token = TraversalToken::decode(&first.next_token).unwrap();
        assert_eq!(
            token.frontier()[0].role,
            RoleKey::database(obrien, PrincipalId::new(16385))
        );
        let last = block_on(connector.role_grants(&root, &first.next_token, 10)).unwrap();
        assert!(last.is_last());
    }

    #[test]
    fn page_size_hints_are_defaulted_and_clamped() {
        let connector = ConnectorBuilder::new(TestStore::default())
            .default_page_size(25)
            .max_page_size(100)
            .build();
        let root = ResourceId::server_role(PrincipalId::new(3));
        block_on(connector.role_grants(&root, "", 0)).unwrap();
        block_on(connector.role_grants(&root, "", 5000)).unwrap();
        block_on(connector.role_grants(&root, "", 7)).unwrap();
        assert_eq!(*connector.store().page_sizes.lock().unwrap(), vec![25, 100, 7]);
    }

    #[test]
    fn single_page_traversal_returns_empty_token() {
        let mut store = TestStore::default();
        store.members.insert(
            RoleKey::server(PrincipalId::new(3)),
            vec![MemberRow::new(259, "alice", "S")],
        );
        let connector = ConnectorBuilder::new(store).build();
        let page = block_on(connector.role_grants(
            &ResourceId::server_role(PrincipalId::new(3)),
            "",
            10,
        ))
        .unwrap();
        assert!(page.is_last());
        assert_eq!(page.grants.len(), 1);
        assert_eq!(page.grants[0].entitlement.to_string(), "server-role:3:member");
    }

    #[test]
    fn permission_grants_pages_through_rows() {
        let store = TestStore {
            permissions: vec![
                permission_row(5, "SL"),
                permission_row(6, "IN"),
                permission_row(7, "UP"),
            ],
            ..TestStore::default()
        };
        let connector = ConnectorBuilder::new(store).build();
        let scope = PermissionScope::database(DatabaseName::new("sales").unwrap());
        let resource = ResourceId::database(7);

        let first = block_on(connector.permission_grants(&scope, &resource, "", 2)).unwrap();
        assert_eq!(first.grants.len(), 2);
        assert_eq!(first.next_token, "2");

        let second =
            block_on(connector.permission_grants(&scope, &resource, &first.next_token, 2)).unwrap();
        assert!(second.is_last());
        assert_eq!(second.grants[0].entitlement.to_string(), "database:7:UP");
        assert_eq!(second.grants[0].principal.resource_type, ResourceType::User);
        assert_eq!(second.grants[0].principal.resource, "1007");
    }

    #[test]
    fn custom_vocabulary_is_honoured() {
        let vocabulary = |scope, entries: &[(&str, &str)]| {
            PermissionVocabulary::new(scope, 2, entries.iter().copied())
        };
        let catalog = Arc::new(VocabularyCatalog::new(
            vocabulary(VocabularyScope::Server, &[("COSQ", "Connect SQL")]),
            vocabulary(VocabularyScope::Database, &[("SL", "Select")]),
            vocabulary(VocabularyScope::Schema, &[]),
            vocabulary(VocabularyScope::Table, &[]),
            vocabulary(VocabularyScope::Login, &[]),
        ));
        let connector = ConnectorBuilder::new(TestStore::default())
            .vocabulary(catalog)
            .build();
        let scope = PermissionScope::database(DatabaseName::new("sales").unwrap());
        let grants = block_on(connector.decode_permissions(
            &scope,
            &ResourceId::database(7),
            vec![permission_row(5, "SL,IN")],
        ))
        .unwrap();
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].entitlement.slug(), "SL");
    }
}
