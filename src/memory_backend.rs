use crate::backend::{Authenticator, GroupService, GroupsRegistry};
use crate::membership::GatewayGroups;
use crate::types::{Credential, GatewayId, GroupId, PrincipalId};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

/// In-memory identity backend for tests and demos.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    subjects: RwLock<HashMap<(GatewayId, Credential), PrincipalId>>,
    groups: RwLock<HashMap<(GatewayId, GroupId), GroupRecord>>,
    user_groups: RwLock<HashMap<(GatewayId, PrincipalId), HashSet<GroupId>>>,
    gateway_groups: RwLock<HashMap<GatewayId, GatewayGroups>>,
}

#[derive(Debug, Clone)]
struct GroupRecord {
    display_name: String,
    description: String,
}

impl MemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a credential as authenticating to a principal.
    pub fn register_credential(
        &self,
        gateway: GatewayId,
        credential: Credential,
        subject: PrincipalId,
    ) {
        let mut guard = self.inner.subjects.write().expect("poisoned lock");
        guard.insert((gateway, credential), subject);
    }

    /// Places a principal in a group.
    pub fn add_user_to_group(&self, gateway: GatewayId, principal: PrincipalId, group: GroupId) {
        let mut guard = self.inner.user_groups.write().expect("poisoned lock");
        guard.entry((gateway, principal)).or_default().insert(group);
    }

    /// Returns the display name of a created group.
    pub fn group_display_name(&self, gateway: &GatewayId, group: &GroupId) -> Option<String> {
        let guard = self.inner.groups.read().expect("poisoned lock");
        guard
            .get(&(gateway.clone(), group.clone()))
            .map(|record| record.display_name.clone())
    }

    /// Returns the description of a created group.
    pub fn group_description(&self, gateway: &GatewayId, group: &GroupId) -> Option<String> {
        let guard = self.inner.groups.read().expect("poisoned lock");
        guard
            .get(&(gateway.clone(), group.clone()))
            .map(|record| record.description.clone())
    }
}

// Ids are slugs of the display name, suffixed when taken, so fixtures stay
// readable and repeated creates never collide.
fn assign_group_id(
    existing: &HashMap<(GatewayId, GroupId), GroupRecord>,
    gateway: &GatewayId,
    display_name: &str,
) -> GroupId {
    let base: String = display_name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let mut candidate = GroupId::from_string(base.clone());
    let mut suffix = 1usize;
    while existing.contains_key(&(gateway.clone(), candidate.clone())) {
        suffix += 1;
        candidate = GroupId::from_string(format!("{base}-{suffix}"));
    }
    candidate
}

#[async_trait]
impl Authenticator for MemoryBackend {
    async fn authenticate(
        &self,
        credential: Credential,
        gateway: GatewayId,
    ) -> std::result::Result<Option<PrincipalId>, crate::UpstreamError> {
        let guard = self.inner.subjects.read().expect("poisoned lock");
        Ok(guard.get(&(gateway, credential)).cloned())
    }
}

#[async_trait]
impl GroupService for MemoryBackend {
    async fn groups_of_user(
        &self,
        gateway: GatewayId,
        principal: PrincipalId,
    ) -> std::result::Result<Vec<GroupId>, crate::UpstreamError> {
        let guard = self.inner.user_groups.read().expect("poisoned lock");
        Ok(guard
            .get(&(gateway, principal))
            .map(|groups| groups.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn create_group(
        &self,
        gateway: GatewayId,
        display_name: String,
        description: String,
    ) -> std::result::Result<GroupId, crate::UpstreamError> {
        let mut guard = self.inner.groups.write().expect("poisoned lock");
        let group = assign_group_id(&guard, &gateway, &display_name);
        guard.insert(
            (gateway, group.clone()),
            GroupRecord {
                display_name,
                description,
            },
        );
        Ok(group)
    }
}

#[async_trait]
impl GroupsRegistry for MemoryBackend {
    async fn gateway_groups(
        &self,
        gateway: GatewayId,
    ) -> std::result::Result<Option<GatewayGroups>, crate::UpstreamError> {
        let guard = self.inner.gateway_groups.read().expect("poisoned lock");
        Ok(guard.get(&gateway).cloned())
    }

    async fn create_gateway_groups(
        &self,
        groups: GatewayGroups,
    ) -> std::result::Result<GatewayGroups, crate::UpstreamError> {
        let mut guard = self.inner.gateway_groups.write().expect("poisoned lock");
        Ok(guard.entry(groups.gateway.clone()).or_insert(groups).clone())
    }
}
