//! Group-based authorization decisions for science-gateway APIs.
//!
//! This crate verifies a caller's credential and evaluates the caller's
//! group membership against a static role table, caching each decision for
//! a configurable TTL. The default behavior is deny-by-default. Use
//! [`Engine`] to obtain decisions and [`RoleTable`] to customize what each
//! role may do.
//!
//! # Examples
//!
//! Basic decision flow using the in-memory backend (enable `memory-backend`):
//! ```no_run
//! use gateway_authz::{Action, Credential, EngineBuilder, GatewayId, PrincipalId};
//! # #[cfg(feature = "memory-backend")]
//! # {
//! use gateway_authz::MemoryBackend;
//! let backend = MemoryBackend::new();
//! let engine = EngineBuilder::new(backend).build();
//! let principal = PrincipalId::try_from("alice").unwrap();
//! let gateway = GatewayId::try_from("seagrid").unwrap();
//! let credential = Credential::try_from("opaque-access-token").unwrap();
//! let action = Action::try_from("/airavata/createExperiment").unwrap();
//! let _ = engine.is_authorized(principal, gateway, credential, action);
//! # }
//! ```
//!
//! Creating a process-local decision cache:
//! ```no_run
//! use gateway_authz::MemoryDecisionCache;
//! let cache = MemoryDecisionCache::new(4096);
//! # let _ = cache;
//! ```
#![forbid(unsafe_code)]

mod backend;
mod cache;
mod engine;
mod error;
mod membership;
mod memory_cache;
mod roles;
mod types;

#[cfg(feature = "memory-backend")]
mod memory_backend;

#[cfg(feature = "axum")]
pub mod axum;

pub use crate::backend::{Authenticator, GroupService, GroupsRegistry, IdentityBackend};
pub use crate::cache::{CachedStatus, DecisionCache, DecisionKey, NoCache};
pub use crate::engine::{DEFAULT_DECISION_TTL, Decision, Engine, EngineBuilder};
pub use crate::error::{CacheError, Error, Result, UpstreamError};
pub use crate::membership::{
    ADMINS_GROUP_NAME, DEFAULT_USERS_GROUP_NAME, GatewayGroups, GroupMembership,
    READ_ONLY_ADMINS_GROUP_NAME, provision_gateway_groups, resolve_membership,
};
pub use crate::memory_cache::MemoryDecisionCache;
pub use crate::roles::{
    API_NAMESPACE, ActionMatcher, ROLE_ADMIN, ROLE_GATEWAY_USER, ROLE_READ_ONLY_ADMIN, RoleTable,
    RoleTableBuilder,
};
pub use crate::types::{Action, Credential, GatewayId, GroupId, PrincipalId, RoleName};

#[cfg(feature = "memory-backend")]
pub use crate::memory_backend::MemoryBackend;
