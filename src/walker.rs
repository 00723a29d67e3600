//! Resumable role-membership traversal.
//!
//! Each call to [`RoleWalker::step`] fetches at most one page of direct
//! members for the role on top of the frontier and returns the grants that
//! page produces, plus the token to resume from. Nothing is retained between
//! calls; the token is the whole state.

use crate::cache::PrincipalCache;
use crate::error::{Error, Result};
use crate::grant::{EntitlementId, Grant};
use crate::identity::{Identity, IdentityResolver};
use crate::principal;
use crate::store::{PageRequest, PrincipalMappingStore, RoleMemberStore};
use crate::token::{FrontierEntry, RoleKey, TraversalToken};
use tracing::{debug, warn};

/// Default bound on distinct roles a single traversal may track.
pub const DEFAULT_MAX_ROLES: usize = 10_000;

/// When a role enters the visited set.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum VisitPolicy {
    /// A role is marked once its last membership page has been consumed.
    ///
    /// A role discovered again while an earlier frontier entry for it is
    /// still pending is queued a second time.
    #[default]
    MarkOnCompletion,
    /// A role is marked as soon as it is pushed, so it is queued at most once.
    MarkOnDiscovery,
}

/// Outcome of one traversal step.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct WalkStep {
    pub grants: Vec<Grant>,
    pub token: TraversalToken,
}

/// Expands role membership one page at a time.
pub(crate) struct RoleWalker<'a, S, C> {
    store: &'a S,
    cache: &'a C,
    policy: VisitPolicy,
    max_roles: usize,
}

impl<'a, S, C> RoleWalker<'a, S, C>
where
    S: RoleMemberStore + PrincipalMappingStore + Sync,
    C: PrincipalCache,
{
    pub(crate) fn new(store: &'a S, cache: &'a C, policy: VisitPolicy, max_roles: usize) -> Self {
        Self {
            store,
            cache,
            policy,
            max_roles,
        }
    }

    /// Advances the traversal rooted at `root` by one membership page.
    pub(crate) async fn step(
        &self,
        root: &RoleKey,
        mut token: TraversalToken,
        page_size: usize,
    ) -> Result<WalkStep> {
        if token.is_done() {
            debug!(root = %root, policy = ?self.policy, "starting role traversal");
            if self.policy == VisitPolicy::MarkOnDiscovery {
                token.mark_visited(root.clone());
            }
            token.push(FrontierEntry::new(root.clone()));
        }

        let Some(entry) = token.pop() else {
            return Ok(WalkStep::default());
        };

        let page = self
            .store
            .list_role_members(&entry.role, PageRequest::new(entry.cursor.clone(), page_size))
            .await?;
        debug!(
            root = %root,
            role = %entry.role,
            cursor = ?entry.cursor,
            members = page.items.len(),
            more = page.next_cursor.is_some(),
            "fetched role members"
        );

        let entitlement = EntitlementId::member(root.resource_id());
        let resolver = IdentityResolver::new(self.store, self.cache);
        let scope = entry.role.scope();
        let database = entry.role.database_name();
        let mut grants = Vec::with_capacity(page.items.len());
        let mut discovered: Vec<RoleKey> = Vec::new();

        for member in page.items {
            let category = principal::resolve(&member.type_tag, scope);
            match resolver.resolve(member.id, category, database).await? {
                Identity::Principal(resource) => {
                    grants.push(Grant::new(entitlement.clone(), resource));
                }
                Identity::Role(key) => {
                    grants.push(Grant::new(entitlement.clone(), key.resource_id()));
                    if self.should_enqueue(&token, &entry.role, &discovered, &key) {
                        discovered.push(key);
                    }
                }
                Identity::NoServerPrincipal => {
                    debug!(
                        role = %entry.role,
                        member = %member.id,
                        name = %member.name,
                        "skipping database principal without a server login"
                    );
                }
                Identity::Unknown => {
                    warn!(
                        role = %entry.role,
                        member = %member.id,
                        name = %member.name,
                        type_tag = %member.type_tag,
                        "skipping role member of unknown principal type"
                    );
                }
            }
        }

        let resume = match page.next_cursor {
            Some(cursor) => Some(entry.with_cursor(cursor)),
            None => {
                if self.policy == VisitPolicy::MarkOnCompletion {
                    token.mark_visited(entry.role);
                }
                None
            }
        };

        for key in discovered.into_iter().rev() {
            if self.policy == VisitPolicy::MarkOnDiscovery {
                token.mark_visited(key.clone());
            }
            token.push(FrontierEntry::new(key));
        }
        if let Some(resume) = resume {
            token.push(resume);
        }

        if token.tracked_roles() > self.max_roles {
            return Err(Error::TraversalLimitExceeded {
                root: root.to_string(),
                max_roles: self.max_roles,
            });
        }

        Ok(WalkStep { grants, token })
    }

    fn should_enqueue(
        &self,
        token: &TraversalToken,
        expanding: &RoleKey,
        discovered: &[RoleKey],
        key: &RoleKey,
    ) -> bool {
        if key == expanding || token.is_visited(key) || discovered.contains(key) {
            return false;
        }
        match self.policy {
            VisitPolicy::MarkOnCompletion => true,
            VisitPolicy::MarkOnDiscovery => !token.is_queued(key),
        }
    }
}
