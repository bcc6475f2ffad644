use crate::backend::IdentityBackend;
use crate::cache::{CachedStatus, DecisionCache, DecisionKey, NoCache};
use crate::error::{Error, Result};
use crate::membership::resolve_membership;
use crate::roles::RoleTable;
use crate::types::{Action, Credential, GatewayId, PrincipalId};
use std::time::Duration;
use tracing::{debug, warn};

/// How long decisions stay valid in the cache unless configured otherwise.
pub const DEFAULT_DECISION_TTL: Duration = Duration::from_secs(60 * 60);

/// Authorization decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The action is permitted.
    Allow,
    /// The action is denied.
    Deny,
}

impl Decision {
    /// Returns `true` for [`Decision::Allow`].
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Authorization engine with pluggable identity backend and optional cache.
///
/// A decision combines two independent checks: the credential must
/// authenticate to the claimed principal, and the principal's group
/// membership must grant the action under the configured role table.
#[derive(Debug)]
pub struct Engine<B, C = NoCache> {
    backend: B,
    cache: C,
    role_table: RoleTable,
    enable_enforcement: bool,
    decision_ttl: Duration,
}

/// Builder for [`Engine`].
pub struct EngineBuilder<B, C = NoCache> {
    backend: B,
    cache: C,
    role_table: RoleTable,
    enable_enforcement: bool,
    decision_ttl: Duration,
}

impl<B> EngineBuilder<B, NoCache> {
    /// Creates a new builder with default configuration.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            cache: NoCache,
            role_table: RoleTable::gateway_defaults(),
            enable_enforcement: true,
            decision_ttl: DEFAULT_DECISION_TTL,
        }
    }
}

impl<B, C> EngineBuilder<B, C> {
    /// Enables or disables enforcement. When disabled, every check is
    /// authorized without consulting the backend or the cache.
    pub fn enable_enforcement(mut self, on: bool) -> Self {
        self.enable_enforcement = on;
        self
    }

    /// Sets how long cached decisions stay valid.
    pub fn decision_ttl(mut self, ttl: Duration) -> Self {
        self.decision_ttl = ttl;
        self
    }

    /// Replaces the built-in role table.
    pub fn role_table(mut self, table: RoleTable) -> Self {
        self.role_table = table;
        self
    }

    /// Sets the cache implementation.
    pub fn cache<C2: DecisionCache>(self, cache: C2) -> EngineBuilder<B, C2> {
        EngineBuilder {
            backend: self.backend,
            cache,
            role_table: self.role_table,
            enable_enforcement: self.enable_enforcement,
            decision_ttl: self.decision_ttl,
        }
    }

    /// Builds the engine.
    pub fn build(self) -> Engine<B, C> {
        Engine {
            backend: self.backend,
            cache: self.cache,
            role_table: self.role_table,
            enable_enforcement: self.enable_enforcement,
            decision_ttl: self.decision_ttl,
        }
    }
}

impl<B, C> Engine<B, C>
where
    B: IdentityBackend,
    C: DecisionCache,
{
    /// Authorizes a principal's action within a gateway.
    ///
    /// Fresh decisions are cached for the configured TTL, keyed by the
    /// full `(principal, gateway, credential, action)` tuple, so repeat
    /// checks with the same credential skip the backend entirely. A
    /// credential that fails to authenticate, or that authenticates to a
    /// different principal than claimed, yields [`Decision::Deny`] rather
    /// than an error.
    pub async fn is_authorized(
        &self,
        principal: PrincipalId,
        gateway: GatewayId,
        credential: Credential,
        action: Action,
    ) -> Result<Decision> {
        if !self.enable_enforcement {
            return Ok(Decision::Allow);
        }

        let key = DecisionKey::new(
            principal.clone(),
            gateway.clone(),
            credential.clone(),
            action.clone(),
        );
        match self
            .cache
            .get(&key)
            .await
            .map_err(Error::CacheInconsistency)?
        {
            CachedStatus::Authorized => {
                debug!(principal = %principal, gateway = %gateway, action = %action,
                    "authorization served from cache");
                return Ok(Decision::Allow);
            }
            CachedStatus::NotAuthorized => {
                debug!(principal = %principal, gateway = %gateway, action = %action,
                    "denial served from cache");
                return Ok(Decision::Deny);
            }
            CachedStatus::NotCached => {}
        }

        let decision = self.decide(&principal, &gateway, credential, &action).await?;
        self.cache
            .put(key, decision, self.decision_ttl)
            .await
            .map_err(Error::CacheInconsistency)?;

        debug!(principal = %principal, gateway = %gateway, action = %action, ?decision,
            "authorization decided");
        Ok(decision)
    }

    async fn decide(
        &self,
        principal: &PrincipalId,
        gateway: &GatewayId,
        credential: Credential,
        action: &Action,
    ) -> Result<Decision> {
        let authenticated = self
            .backend
            .authenticate(credential, gateway.clone())
            .await
            .map_err(Error::from)?;

        let Some(subject) = authenticated else {
            debug!(principal = %principal, gateway = %gateway, "credential rejected");
            return Ok(Decision::Deny);
        };
        if subject != *principal {
            warn!(claimed = %principal, authenticated = %subject, gateway = %gateway,
                "credential subject does not match claimed principal");
            return Ok(Decision::Deny);
        }

        let membership = resolve_membership(&self.backend, gateway, principal).await?;
        Ok(if self.role_table.evaluate(membership, action) {
            Decision::Allow
        } else {
            Decision::Deny
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Authenticator, GroupService, GroupsRegistry};
    use crate::error::UpstreamError;
    use crate::memory_cache::MemoryDecisionCache;
    use crate::membership::GatewayGroups;
    use crate::types::GroupId;
    use async_trait::async_trait;
    use futures::executor::block_on;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TestBackend {
        subjects: HashMap<Credential, PrincipalId>,
        user_groups: HashMap<PrincipalId, Vec<GroupId>>,
        stored_groups: Mutex<Option<GatewayGroups>>,
        authenticate_calls: AtomicUsize,
        groups_of_user_calls: AtomicUsize,
        fail_authenticate: bool,
    }

    impl TestBackend {
        fn with_credential(mut self, token: &str, subject: &str) -> Self {
            self.subjects.insert(
                Credential::try_from(token).unwrap(),
                PrincipalId::try_from(subject).unwrap(),
            );
            self
        }

        fn with_user_in(mut self, principal: &str, group: &str) -> Self {
            self.user_groups
                .entry(PrincipalId::try_from(principal).unwrap())
                .or_default()
                .push(GroupId::try_from(group).unwrap());
            self
        }
    }

    #[async_trait]
    impl Authenticator for TestBackend {
        async fn authenticate(
            &self,
            credential: Credential,
            _gateway: GatewayId,
        ) -> std::result::Result<Option<PrincipalId>, UpstreamError> {
            self.authenticate_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_authenticate {
                return Err("token service unreachable".into());
            }
            Ok(self.subjects.get(&credential).cloned())
        }
    }

    #[async_trait]
    impl GroupService for TestBackend {
        async fn groups_of_user(
            &self,
            _gateway: GatewayId,
            principal: PrincipalId,
        ) -> std::result::Result<Vec<GroupId>, UpstreamError> {
            self.groups_of_user_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .user_groups
                .get(&principal)
                .cloned()
                .unwrap_or_default())
        }

        async fn create_group(
            &self,
            _gateway: GatewayId,
            display_name: String,
            _description: String,
        ) -> std::result::Result<GroupId, UpstreamError> {
            Ok(GroupId::from_string(
                display_name.to_lowercase().replace(' ', "-"),
            ))
        }
    }

    #[async_trait]
    impl GroupsRegistry for TestBackend {
        async fn gateway_groups(
            &self,
            _gateway: GatewayId,
        ) -> std::result::Result<Option<GatewayGroups>, UpstreamError> {
            Ok(self.stored_groups.lock().unwrap().clone())
        }

        async fn create_gateway_groups(
            &self,
            groups: GatewayGroups,
        ) -> std::result::Result<GatewayGroups, UpstreamError> {
            let mut stored = self.stored_groups.lock().unwrap();
            Ok(stored.get_or_insert(groups).clone())
        }
    }

    struct FailingCache;

    #[async_trait]
    impl DecisionCache for FailingCache {
        async fn get(
            &self,
            _key: &DecisionKey,
        ) -> std::result::Result<CachedStatus, crate::CacheError> {
            Err("cache backend lost".into())
        }

        async fn put(
            &self,
            _key: DecisionKey,
            _decision: Decision,
            _ttl: Duration,
        ) -> std::result::Result<(), crate::CacheError> {
            Err("cache backend lost".into())
        }

        async fn invalidate_principal(
            &self,
            _gateway: &GatewayId,
            _principal: &PrincipalId,
        ) -> std::result::Result<(), crate::CacheError> {
            Ok(())
        }

        async fn clear(&self) -> std::result::Result<(), crate::CacheError> {
            Ok(())
        }
    }

    fn gateway() -> GatewayId {
        GatewayId::try_from("seagrid").unwrap()
    }

    fn principal(name: &str) -> PrincipalId {
        PrincipalId::try_from(name).unwrap()
    }

    fn credential(token: &str) -> Credential {
        Credential::try_from(token).unwrap()
    }

    fn action(value: &str) -> Action {
        Action::try_from(value).unwrap()
    }

    #[test]
    fn admin_should_be_authorized_for_elevated_action() {
        let backend = TestBackend::default()
            .with_credential("alice-token", "alice")
            .with_user_in("alice", "admin-users");
        let engine = EngineBuilder::new(backend).build();

        let decision = block_on(engine.is_authorized(
            principal("alice"),
            gateway(),
            credential("alice-token"),
            action("/airavata/deleteProject"),
        ))
        .unwrap();

        assert_eq!(decision, Decision::Allow);
    }

    #[test]
    fn admin_should_be_authorized_for_unlisted_action() {
        let backend = TestBackend::default()
            .with_credential("alice-token", "alice")
            .with_user_in("alice", "admin-users");
        let engine = EngineBuilder::new(backend).build();

        let decision = block_on(engine.is_authorized(
            principal("alice"),
            gateway(),
            credential("alice-token"),
            action("/airavata/someBrandNewMethod"),
        ))
        .unwrap();

        assert_eq!(decision, Decision::Allow);
    }

    #[test]
    fn everyday_user_should_reach_common_actions() {
        let backend = TestBackend::default().with_credential("bob-token", "bob");
        let engine = EngineBuilder::new(backend).build();

        let decision = block_on(engine.is_authorized(
            principal("bob"),
            gateway(),
            credential("bob-token"),
            action("/airavata/getAPIVersion"),
        ))
        .unwrap();

        assert_eq!(decision, Decision::Allow);
    }

    #[test]
    fn everyday_user_should_be_denied_elevated_action() {
        let backend = TestBackend::default().with_credential("bob-token", "bob");
        let engine = EngineBuilder::new(backend).build();

        let decision = block_on(engine.is_authorized(
            principal("bob"),
            gateway(),
            credential("bob-token"),
            action("/airavata/removeGroupResourceProfile"),
        ))
        .unwrap();

        assert_eq!(decision, Decision::Deny);
    }

    #[test]
    fn read_only_admin_should_reach_elevated_reads() {
        let backend = TestBackend::default()
            .with_credential("carol-token", "carol")
            .with_user_in("carol", "read-only-admin-users");
        let engine = EngineBuilder::new(backend).build();

        let decision = block_on(engine.is_authorized(
            principal("carol"),
            gateway(),
            credential("carol-token"),
            action("/airavata/getAllGatewaySSHPubKeys"),
        ))
        .unwrap();

        assert_eq!(decision, Decision::Allow);
    }

    #[test]
    fn mismatched_subject_should_be_denied_without_membership_lookup() {
        let backend = TestBackend::default()
            .with_credential("bob-token", "bob")
            .with_user_in("alice", "admin-users");
        let engine = EngineBuilder::new(backend).build();

        let decision = block_on(engine.is_authorized(
            principal("alice"),
            gateway(),
            credential("bob-token"),
            action("/airavata/getAPIVersion"),
        ))
        .unwrap();

        assert_eq!(decision, Decision::Deny);
        assert_eq!(
            engine.backend.groups_of_user_calls.load(Ordering::SeqCst),
            0
        );
    }

    #[test]
    fn invalid_credential_should_deny_not_error() {
        let backend = TestBackend::default();
        let engine = EngineBuilder::new(backend).build();

        let decision = block_on(engine.is_authorized(
            principal("mallory"),
            gateway(),
            credential("forged-token"),
            action("/airavata/getAPIVersion"),
        ))
        .unwrap();

        assert_eq!(decision, Decision::Deny);
    }

    #[test]
    fn disabled_enforcement_should_allow_without_backend_or_cache_calls() {
        let backend = TestBackend::default();
        // FailingCache errors on any access, so success proves the cache
        // was never consulted.
        let engine = EngineBuilder::new(backend)
            .enable_enforcement(false)
            .cache(FailingCache)
            .build();

        let decision = block_on(engine.is_authorized(
            principal("anyone"),
            gateway(),
            credential("anything"),
            action("/airavata/removeGroupResourceProfile"),
        ))
        .unwrap();

        assert_eq!(decision, Decision::Allow);
        assert_eq!(engine.backend.authenticate_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn repeat_checks_should_be_served_from_cache() {
        let backend = TestBackend::default().with_credential("bob-token", "bob");
        let engine = EngineBuilder::new(backend)
            .cache(MemoryDecisionCache::default())
            .build();

        for _ in 0..3 {
            let decision = block_on(engine.is_authorized(
                principal("bob"),
                gateway(),
                credential("bob-token"),
                action("/airavata/getAPIVersion"),
            ))
            .unwrap();
            assert_eq!(decision, Decision::Allow);
        }

        assert_eq!(engine.backend.authenticate_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            engine.backend.groups_of_user_calls.load(Ordering::SeqCst),
            1
        );
    }

    #[test]
    fn denials_should_be_cached_like_grants() {
        let backend = TestBackend::default().with_credential("bob-token", "bob");
        let engine = EngineBuilder::new(backend)
            .cache(MemoryDecisionCache::default())
            .build();

        for _ in 0..2 {
            let decision = block_on(engine.is_authorized(
                principal("bob"),
                gateway(),
                credential("bob-token"),
                action("/airavata/removeGroupResourceProfile"),
            ))
            .unwrap();
            assert_eq!(decision, Decision::Deny);
        }

        assert_eq!(engine.backend.authenticate_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backend_failure_should_surface_as_upstream_error() {
        let backend = TestBackend {
            fail_authenticate: true,
            ..TestBackend::default()
        };
        let engine = EngineBuilder::new(backend).build();

        let result = block_on(engine.is_authorized(
            principal("alice"),
            gateway(),
            credential("alice-token"),
            action("/airavata/getAPIVersion"),
        ));

        assert!(matches!(result, Err(Error::Upstream(_))));
    }

    #[test]
    fn cache_failure_should_surface_as_inconsistency() {
        let backend = TestBackend::default().with_credential("alice-token", "alice");
        let engine = EngineBuilder::new(backend).cache(FailingCache).build();

        let result = block_on(engine.is_authorized(
            principal("alice"),
            gateway(),
            credential("alice-token"),
            action("/airavata/getAPIVersion"),
        ));

        assert!(matches!(result, Err(Error::CacheInconsistency(_))));
    }
}
