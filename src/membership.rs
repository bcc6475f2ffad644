use crate::backend::{GroupService, GroupsRegistry};
use crate::error::{Error, Result};
use crate::types::{GatewayId, GroupId, PrincipalId};
use tracing::{debug, info};

/// Display name of the admins group provisioned per gateway.
pub const ADMINS_GROUP_NAME: &str = "Admin Users";
/// Display name of the read-only admins group provisioned per gateway.
pub const READ_ONLY_ADMINS_GROUP_NAME: &str = "Read Only Admin Users";
/// Display name of the default users group provisioned per gateway.
pub const DEFAULT_USERS_GROUP_NAME: &str = "Gateway Users";

const ADMINS_GROUP_DESCRIPTION: &str = "Admin users group.";
const READ_ONLY_ADMINS_GROUP_DESCRIPTION: &str = "Group of admin users with read-only access.";
const DEFAULT_USERS_GROUP_DESCRIPTION: &str = "Default group for users of the gateway.";

/// Flags describing which privileged groups a principal belongs to.
///
/// Everyday users carry neither flag and fall through to the
/// `gateway-user` role.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GroupMembership {
    /// Principal belongs to the gateway's admins group.
    pub in_admins_group: bool,
    /// Principal belongs to the gateway's read-only admins group.
    pub in_read_only_admins_group: bool,
}

/// The per-gateway group set consulted for membership checks.
///
/// Group ids are assigned by the directory when the set is provisioned;
/// only the registered set says which groups are privileged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayGroups {
    /// Gateway the group set belongs to.
    pub gateway: GatewayId,
    /// Group whose members are authorized for every action.
    pub admins_group: GroupId,
    /// Group whose members are evaluated against `admin-read-only`.
    pub read_only_admins_group: GroupId,
    /// Group newly registered users are placed in.
    pub default_users_group: GroupId,
}

impl GatewayGroups {
    /// Derives membership flags from the groups a principal belongs to.
    pub fn membership_of(&self, groups: &[GroupId]) -> GroupMembership {
        GroupMembership {
            in_admins_group: groups.contains(&self.admins_group),
            in_read_only_admins_group: groups.contains(&self.read_only_admins_group),
        }
    }
}

/// Returns the gateway's group set, provisioning the defaults on first use.
///
/// Registration is a conditional insert: when two callers race, the set
/// stored first wins and both observe it. Groups created by the losing
/// caller are left unreferenced.
pub async fn provision_gateway_groups<B>(backend: &B, gateway: &GatewayId) -> Result<GatewayGroups>
where
    B: GroupService + GroupsRegistry,
{
    if let Some(groups) = backend
        .gateway_groups(gateway.clone())
        .await
        .map_err(Error::from)?
    {
        return Ok(groups);
    }

    let default_users_group = backend
        .create_group(
            gateway.clone(),
            DEFAULT_USERS_GROUP_NAME.to_string(),
            DEFAULT_USERS_GROUP_DESCRIPTION.to_string(),
        )
        .await
        .map_err(Error::from)?;
    let admins_group = backend
        .create_group(
            gateway.clone(),
            ADMINS_GROUP_NAME.to_string(),
            ADMINS_GROUP_DESCRIPTION.to_string(),
        )
        .await
        .map_err(Error::from)?;
    let read_only_admins_group = backend
        .create_group(
            gateway.clone(),
            READ_ONLY_ADMINS_GROUP_NAME.to_string(),
            READ_ONLY_ADMINS_GROUP_DESCRIPTION.to_string(),
        )
        .await
        .map_err(Error::from)?;

    let fresh = GatewayGroups {
        gateway: gateway.clone(),
        admins_group,
        read_only_admins_group,
        default_users_group,
    };
    let stored = backend
        .create_gateway_groups(fresh.clone())
        .await
        .map_err(Error::from)?;
    if stored == fresh {
        info!(gateway = %gateway, "provisioned default gateway groups");
    } else {
        debug!(gateway = %gateway, "gateway groups were provisioned concurrently");
    }
    Ok(stored)
}

/// Resolves which privileged groups a principal belongs to within a gateway.
///
/// On the gateway's first resolution this provisions its default group set,
/// which is a write against the group directory and the registry.
pub async fn resolve_membership<B>(
    backend: &B,
    gateway: &GatewayId,
    principal: &PrincipalId,
) -> Result<GroupMembership>
where
    B: GroupService + GroupsRegistry,
{
    let groups = provision_gateway_groups(backend, gateway).await?;
    let member_of = backend
        .groups_of_user(gateway.clone(), principal.clone())
        .await
        .map_err(Error::from)?;
    Ok(groups.membership_of(&member_of))
}
