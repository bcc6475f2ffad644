use crate::engine::Decision;
use crate::error::CacheError;
use crate::types::{Action, Credential, GatewayId, PrincipalId};
use async_trait::async_trait;
use std::time::Duration;

/// Key identifying one authorization question.
///
/// Two requests that agree on all four fields are the same question and share
/// a cached answer.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct DecisionKey {
    principal: PrincipalId,
    gateway: GatewayId,
    credential: Credential,
    action: Action,
}

impl DecisionKey {
    /// Creates a decision key.
    pub fn new(
        principal: PrincipalId,
        gateway: GatewayId,
        credential: Credential,
        action: Action,
    ) -> Self {
        Self {
            principal,
            gateway,
            credential,
            action,
        }
    }

    /// Returns the claimed principal.
    pub fn principal(&self) -> &PrincipalId {
        &self.principal
    }

    /// Returns the gateway.
    pub fn gateway(&self) -> &GatewayId {
        &self.gateway
    }

    /// Returns the credential.
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Returns the requested action.
    pub fn action(&self) -> &Action {
        &self.action
    }
}

/// Outcome of a cache lookup.
///
/// `NotCached` covers both an absent entry and one whose TTL has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachedStatus {
    /// A live entry recorded an allow decision.
    Authorized,
    /// A live entry recorded a deny decision.
    NotAuthorized,
    /// No live entry for the key.
    NotCached,
}

impl CachedStatus {
    /// Maps a decision to the status a later lookup would report.
    pub fn from_decision(decision: Decision) -> Self {
        match decision {
            Decision::Allow => Self::Authorized,
            Decision::Deny => Self::NotAuthorized,
        }
    }

    /// Returns the recorded decision, or `None` for `NotCached`.
    pub fn decision(self) -> Option<Decision> {
        match self {
            Self::Authorized => Some(Decision::Allow),
            Self::NotAuthorized => Some(Decision::Deny),
            Self::NotCached => None,
        }
    }
}

/// Cache interface for authorization decisions.
///
/// Implementations must be safe under arbitrary concurrent callers and must
/// never report an expired entry as live. A failure here is surfaced by the
/// engine as [`Error::CacheInconsistency`](crate::Error::CacheInconsistency)
/// rather than being folded into an allow or deny.
#[async_trait]
pub trait DecisionCache: Send + Sync {
    /// Looks up the cached status for a key.
    async fn get(&self, key: &DecisionKey) -> Result<CachedStatus, CacheError>;

    /// Inserts or overwrites a decision valid for `ttl` from now.
    ///
    /// Overwrite is last-write-wins; no merge semantics.
    async fn put(
        &self,
        key: DecisionKey,
        decision: Decision,
        ttl: Duration,
    ) -> Result<(), CacheError>;

    /// Drops every cached decision for a principal in a gateway.
    async fn invalidate_principal(
        &self,
        gateway: &GatewayId,
        principal: &PrincipalId,
    ) -> Result<(), CacheError>;

    /// Drops every cached decision.
    async fn clear(&self) -> Result<(), CacheError>;
}

/// No-op cache implementation; every lookup misses.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

#[async_trait]
impl DecisionCache for NoCache {
    async fn get(&self, _key: &DecisionKey) -> Result<CachedStatus, CacheError> {
        Ok(CachedStatus::NotCached)
    }

    async fn put(
        &self,
        _key: DecisionKey,
        _decision: Decision,
        _ttl: Duration,
    ) -> Result<(), CacheError> {
        Ok(())
    }

    async fn invalidate_principal(
        &self,
        _gateway: &GatewayId,
        _principal: &PrincipalId,
    ) -> Result<(), CacheError> {
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        Ok(())
    }
}
