use crate::error::{Error, Result};
use crate::permission::PermissionState;
use crate::types::{ResourceId, ResourceType};
use crate::vocabulary::WITH_GRANT_SUFFIX;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Slug of the role-membership entitlement.
pub const MEMBER_ENTITLEMENT: &str = "member";

/// Entitlement identifier, rendered as `<resource type>:<resource>:<slug>`.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntitlementId {
    resource: ResourceId,
    slug: String,
}

impl EntitlementId {
    /// Creates an entitlement on `resource`.
    pub fn new(resource: ResourceId, slug: impl Into<String>) -> Self {
        Self {
            resource,
            slug: slug.into(),
        }
    }

    /// Role-membership entitlement of a role resource.
    pub fn member(role: ResourceId) -> Self {
        Self::new(role, MEMBER_ENTITLEMENT)
    }

    pub fn resource(&self) -> &ResourceId {
        &self.resource
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    /// Splits a permission slug into its base code and grant state.
    pub fn permission_parts(&self) -> (&str, PermissionState) {
        match self.slug.strip_suffix(WITH_GRANT_SUFFIX) {
            Some(code) => (code, PermissionState::GrantedWithOption),
            None => (self.slug.as_str(), PermissionState::Granted),
        }
    }
}

/// Returns the entitlement slug for `code` in `state`.
pub fn permission_slug(code: &str, state: PermissionState) -> String {
    match state {
        PermissionState::Granted => code.to_string(),
        PermissionState::GrantedWithOption => format!("{code}{WITH_GRANT_SUFFIX}"),
    }
}

impl fmt::Display for EntitlementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource, self.slug)
    }
}

impl FromStr for EntitlementId {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        let malformed = || Error::InvalidEntitlement(format!("malformed entitlement id: {value}"));
        let (resource_type, rest) = value.split_once(':').ok_or_else(malformed)?;
        let (resource, slug) = rest.rsplit_once(':').ok_or_else(malformed)?;
        if resource.is_empty() || slug.is_empty() {
            return Err(malformed());
        }
        let resource_type: ResourceType = resource_type.parse()?;
        Ok(Self::new(ResourceId::new(resource_type, resource), slug))
    }
}

impl TryFrom<String> for EntitlementId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<EntitlementId> for String {
    fn from(value: EntitlementId) -> Self {
        value.to_string()
    }
}

/// One principal holding one entitlement.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Grant {
    pub entitlement: EntitlementId,
    pub principal: ResourceId,
}

impl Grant {
    pub fn new(entitlement: EntitlementId, principal: ResourceId) -> Self {
        Self {
            entitlement,
            principal,
        }
    }
}

/// One page of grants plus the token for the next page.
///
/// An empty `next_token` means there is nothing left to fetch.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct GrantPage {
    pub grants: Vec<Grant>,
    pub next_token: String,
}

impl GrantPage {
    /// Returns whether this was the final page.
    pub fn is_last(&self) -> bool {
        self.next_token.is_empty()
    }
}
