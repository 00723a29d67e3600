//! Turns decoded permission rows into grants.

use crate::cache::PrincipalCache;
use crate::error::Result;
use crate::grant::{EntitlementId, Grant};
use crate::identity::{Identity, IdentityResolver};
use crate::permission::{PermissionRecord, PermissionRow, PermissionScope, PermissionState, decode_entitlements};
use crate::principal;
use crate::store::PrincipalMappingStore;
use crate::types::ResourceId;
use crate::vocabulary::PermissionVocabulary;
use tracing::{debug, warn};

pub(crate) struct GrantSynthesizer<'a, S, C> {
    resolver: IdentityResolver<'a, S, C>,
    vocabulary: &'a PermissionVocabulary,
}

impl<'a, S, C> GrantSynthesizer<'a, S, C>
where
    S: PrincipalMappingStore + Sync,
    C: PrincipalCache,
{
    pub(crate) fn new(store: &'a S, cache: &'a C, vocabulary: &'a PermissionVocabulary) -> Self {
        Self {
            resolver: IdentityResolver::new(store, cache),
            vocabulary,
        }
    }

    /// Produces grants on `resource` for `rows`, in row then code order.
    pub(crate) async fn synthesize(
        &self,
        scope: &PermissionScope,
        resource: &ResourceId,
        rows: Vec<PermissionRow>,
    ) -> Result<Vec<Grant>> {
        let mut grants = Vec::new();
        for row in rows {
            let Some(state) = PermissionState::from_tag(&row.state) else {
                warn!(
                    resource = %resource,
                    principal = %row.principal_id,
                    state = %row.state,
                    "skipping permission row with unsupported state"
                );
                continue;
            };
            let record = PermissionRecord::from_row(row, state);
            self.synthesize_record(scope, resource, &record, &mut grants)
                .await?;
        }
        Ok(grants)
    }

    async fn synthesize_record(
        &self,
        scope: &PermissionScope,
        resource: &ResourceId,
        record: &PermissionRecord,
        grants: &mut Vec<Grant>,
    ) -> Result<()> {
        let slugs = decode_entitlements(record, self.vocabulary);
        if slugs.is_empty() {
            return Ok(());
        }

        let category = principal::resolve(&record.principal_type, scope.principal_scope());
        let identity = self
            .resolver
            .resolve(record.principal_id, category, scope.database_name())
            .await?;
        let principal = match identity {
            Identity::NoServerPrincipal => {
                debug!(
                    resource = %resource,
                    principal = %record.principal_id,
                    name = %record.principal_name,
                    "skipping permissions of database principal without a server login"
                );
                return Ok(());
            }
            Identity::Unknown => {
                warn!(
                    resource = %resource,
                    principal = %record.principal_id,
                    name = %record.principal_name,
                    type_tag = %record.principal_type,
                    "skipping permissions of unknown principal type"
                );
                return Ok(());
            }
            identity => match identity.resource() {
                Some(principal) => principal,
                None => return Ok(()),
            },
        };

        grants.extend(
            slugs
                .into_iter()
                .map(|slug| Grant::new(EntitlementId::new(resource.clone(), slug), principal.clone())),
        );
        Ok(())
    }
}
