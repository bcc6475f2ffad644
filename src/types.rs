use crate::error::{Error, Result};
use std::borrow::Borrow;
use std::fmt;

const MAX_NAME_LEN: usize = 128;
const MAX_ACTION_LEN: usize = 256;
const MAX_CREDENTIAL_LEN: usize = 8192;

fn validate_simple_name(value: &str, kind: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidId(format!("{kind} must not be empty")));
    }
    if trimmed.len() > MAX_NAME_LEN {
        return Err(Error::InvalidId(format!(
            "{kind} length must be <= {MAX_NAME_LEN}"
        )));
    }
    if !trimmed.chars().all(is_allowed_name_char) {
        return Err(Error::InvalidId(format!(
            "{kind} contains invalid characters"
        )));
    }
    Ok(trimmed.to_string())
}

// Identity backends qualify user ids as `user@gateway`, so `@` and `.` are
// part of the identifier alphabet here.
fn is_allowed_name_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, ':' | '_' | '-' | '.' | '@')
}

macro_rules! define_id_type {
    ($(#[$doc:meta])* $name:ident, $kind:expr) => {
        $(#[$doc])*
        #[derive(Clone, Debug, Eq, PartialEq, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[cfg_attr(feature = "serde", serde(transparent))]
        pub struct $name(String);

        impl $name {
            /// Creates a validated identifier.
            pub fn new(value: impl AsRef<str>) -> Result<Self> {
                validate_simple_name(value.as_ref(), $kind).map(Self)
            }

            /// Creates an identifier from a trusted string without validation.
            pub fn from_string(value: String) -> Self {
                Self(value)
            }

            /// Returns the underlying string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<&str> for $name {
            type Error = Error;

            fn try_from(value: &str) -> Result<Self> {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::from_string(value)
            }
        }
    };
}

define_id_type!(
    /// Gateway (tenant) identifier.
    GatewayId,
    "gateway id"
);
define_id_type!(
    /// Principal identifier: the claimed identity of the caller.
    PrincipalId,
    "principal id"
);
define_id_type!(
    /// Group identifier as issued by the group-management collaborator.
    GroupId,
    "group id"
);
define_id_type!(
    /// Role name used as a key into the role permission table.
    RoleName,
    "role name"
);

impl PrincipalId {
    /// Creates the gateway-qualified principal form, `user@gateway`.
    ///
    /// Group registries key users by this qualified form rather than the bare
    /// username. Both segments are validated; callers should pass semantic
    /// pieces such as `("alice", &gateway)` instead of formatting the raw id
    /// string at call sites.
    pub fn qualified(user: impl AsRef<str>, gateway: &GatewayId) -> Result<Self> {
        let user = validate_simple_name(user.as_ref(), "principal user")?;
        Self::new(format!("{user}@{gateway}"))
    }
}

/// A namespaced API action of the form `"/<namespace>/<methodName>"`.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Action(String);

impl Action {
    /// Creates a validated action from its joined form.
    pub fn new(value: impl AsRef<str>) -> Result<Self> {
        let trimmed = value.as_ref().trim();
        if trimmed.len() > MAX_ACTION_LEN {
            return Err(Error::InvalidAction(format!(
                "action length must be <= {MAX_ACTION_LEN}"
            )));
        }
        let Some(rest) = trimmed.strip_prefix('/') else {
            return Err(Error::InvalidAction(
                "action must start with '/'".to_string(),
            ));
        };
        let Some((namespace, method)) = rest.split_once('/') else {
            return Err(Error::InvalidAction(
                "action must have the form /<namespace>/<method>".to_string(),
            ));
        };
        validate_action_segment(namespace, "action namespace")?;
        validate_action_segment(method, "action method")?;
        Ok(Self(trimmed.to_string()))
    }

    /// Creates an action by joining a namespace and a method name.
    pub fn from_parts(namespace: impl AsRef<str>, method: impl AsRef<str>) -> Result<Self> {
        let namespace = namespace.as_ref();
        let method = method.as_ref();
        Self::new(format!("/{namespace}/{method}"))
    }

    /// Creates an action from a trusted string without validation.
    pub fn from_string(value: String) -> Self {
        Self(value)
    }

    /// Returns the underlying string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the namespace segment.
    pub fn namespace(&self) -> &str {
        let rest = self.0.strip_prefix('/').unwrap_or(&self.0);
        rest.split('/').next().unwrap_or(rest)
    }

    /// Returns the method segment.
    pub fn method(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

fn validate_action_segment(segment: &str, kind: &str) -> Result<()> {
    if segment.is_empty() {
        return Err(Error::InvalidAction(format!("{kind} must not be empty")));
    }
    if !segment
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.'))
    {
        return Err(Error::InvalidAction(format!(
            "{kind} contains invalid characters"
        )));
    }
    Ok(())
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Action {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Action {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Action {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl From<String> for Action {
    fn from(value: String) -> Self {
        Self::from_string(value)
    }
}

/// An opaque bearer credential proving the caller's authentication.
///
/// The token body never appears in `Debug` output; decision logs carry the
/// principal and action, not the credential.
#[derive(Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Credential(String);

impl Credential {
    /// Creates a validated credential.
    pub fn new(value: impl AsRef<str>) -> Result<Self> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidCredential(
                "credential must not be empty".to_string(),
            ));
        }
        if trimmed.len() > MAX_CREDENTIAL_LEN {
            return Err(Error::InvalidCredential(format!(
                "credential length must be <= {MAX_CREDENTIAL_LEN}"
            )));
        }
        if trimmed
            .chars()
            .any(|ch| ch.is_whitespace() || ch.is_control())
        {
            return Err(Error::InvalidCredential(
                "credential contains whitespace or control characters".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Creates a credential from a trusted string without validation.
    pub fn from_string(value: String) -> Self {
        Self(value)
    }

    /// Returns the underlying string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

impl AsRef<str> for Credential {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Credential {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Credential {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl From<String> for Credential {
    fn from(value: String) -> Self {
        Self::from_string(value)
    }
}
