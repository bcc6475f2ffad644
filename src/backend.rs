use crate::error::UpstreamError;
use crate::membership::GatewayGroups;
use crate::types::{Credential, GatewayId, GroupId, PrincipalId};
use async_trait::async_trait;

/// Backend interface for credential verification.
#[async_trait]
pub trait Authenticator {
    /// Verifies a credential against a gateway realm.
    ///
    /// Returns the principal the credential was issued to, or `None` when
    /// the credential is invalid or expired. Transport and token-service
    /// failures are errors, not denials.
    async fn authenticate(
        &self,
        credential: Credential,
        gateway: GatewayId,
    ) -> std::result::Result<Option<PrincipalId>, UpstreamError>;
}

/// Backend interface for group directory lookups.
#[async_trait]
pub trait GroupService {
    /// Returns the groups a principal belongs to within a gateway.
    async fn groups_of_user(
        &self,
        gateway: GatewayId,
        principal: PrincipalId,
    ) -> std::result::Result<Vec<GroupId>, UpstreamError>;

    /// Creates a group in the gateway's directory.
    ///
    /// The directory assigns and returns the group id; callers must not
    /// assume anything about its shape.
    async fn create_group(
        &self,
        gateway: GatewayId,
        display_name: String,
        description: String,
    ) -> std::result::Result<GroupId, UpstreamError>;
}

/// Backend interface for the per-gateway group set registry.
#[async_trait]
pub trait GroupsRegistry {
    /// Returns the registered group set for a gateway, if any.
    async fn gateway_groups(
        &self,
        gateway: GatewayId,
    ) -> std::result::Result<Option<GatewayGroups>, UpstreamError>;

    /// Registers a group set for a gateway unless one already exists.
    ///
    /// Returns the set that is registered after the call: the given one
    /// when the gateway had none, otherwise the previously stored set.
    async fn create_gateway_groups(
        &self,
        groups: GatewayGroups,
    ) -> std::result::Result<GatewayGroups, UpstreamError>;
}

/// Composite identity backend trait.
///
/// Implementations talk to external identity and registry services. Every
/// call must release its connection on all exit paths, including errors,
/// and should enforce its own timeout; this layer never retries.
pub trait IdentityBackend: Authenticator + GroupService + GroupsRegistry + Send + Sync {}

impl<T> IdentityBackend for T where T: Authenticator + GroupService + GroupsRegistry + Send + Sync {}
