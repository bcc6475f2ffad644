use crate::error::{Error, Result};
use crate::membership::GroupMembership;
use crate::types::{Action, RoleName};
use std::collections::{HashMap, HashSet};

/// Role granted every action in the API namespace.
pub const ROLE_ADMIN: &str = "admin";
/// Role consulted for read-only administrators.
pub const ROLE_READ_ONLY_ADMIN: &str = "admin-read-only";
/// Role consulted for principals in no special group.
pub const ROLE_GATEWAY_USER: &str = "gateway-user";

/// Namespace of the built-in gateway API table.
pub const API_NAMESPACE: &str = "airavata";

// Self-service user-resource-profile management.
const USER_RESOURCE_PROFILE_ACTIONS: &[&str] = &[
    "/airavata/registerUserResourceProfile",
    "/airavata/getUserResourceProfile",
    "/airavata/updateUserResourceProfile",
    "/airavata/deleteUserResourceProfile",
    "/airavata/addUserComputeResourcePreference",
    "/airavata/addUserStoragePreference",
    "/airavata/getUserComputeResourcePreference",
    "/airavata/getUserStoragePreference",
    "/airavata/getAllUserComputeResourcePreferences",
    "/airavata/getAllUserStoragePreferences",
    "/airavata/updateUserComputeResourcePreference",
    "/airavata/updateUserStoragePreference",
    "/airavata/deleteUserComputeResourcePreference",
    "/airavata/deleteUserStoragePreference",
    "/airavata/generateAndRegisterSSHKeys",
    "/airavata/getAllCredentialSummaryForUsersInGateway",
    "/airavata/deleteSSHPubKey",
];

const SHARING_ACTIONS: &[&str] = &[
    "/airavata/shareResourceWithUsers",
    "/airavata/revokeSharingOfResourceFromUsers",
    "/airavata/getAllAccessibleUsers",
];

// getGatewayResourceProfile is needed to look up whether ssh account
// provisioning is configured for a compute resource preference.
const SSH_ACCOUNT_PROVISIONER_ACTIONS: &[&str] = &[
    "/airavata/getSSHAccountProvisioners",
    "/airavata/doesUserHaveSSHAccount",
    "/airavata/setupUserComputeResourcePreferencesForSSH",
    "/airavata/getGatewayResourceProfile",
];

// Group-resource-profile management is restricted to elevated roles.
const GROUP_RESOURCE_PROFILE_ACTIONS: &[&str] = &[
    "/airavata/createGroupResourceProfile",
    "/airavata/updateGroupResourceProfile",
    "/airavata/getGroupResourceProfile",
    "/airavata/removeGroupResourceProfile",
    "/airavata/getGroupResourceList",
    "/airavata/removeGroupComputePrefs",
    "/airavata/removeGroupComputeResourcePolicy",
    "/airavata/removeGroupBatchQueueResourcePolicy",
    "/airavata/getGroupComputeResourcePreference",
    "/airavata/getGroupComputeResourcePolicy",
    "/airavata/getBatchQueueResourcePolicy",
    "/airavata/getGroupComputeResourcePrefList",
    "/airavata/getGroupBatchQueueResourcePolicyList",
    "/airavata/getGroupComputeResourcePolicyList",
];

// Actions every gateway user may perform on their own projects, experiments
// and catalog reads.
const GATEWAY_USER_BASE_ACTIONS: &[&str] = &[
    "/airavata/getAPIVersion",
    "/airavata/getNotification",
    "/airavata/getAllNotifications",
    "/airavata/createProject",
    "/airavata/updateProject",
    "/airavata/getProject",
    "/airavata/deleteProject",
    "/airavata/getUserProjects",
    "/airavata/searchProjectsByProjectName",
    "/airavata/searchProjectsByProjectDesc",
    "/airavata/searchExperimentsByName",
    "/airavata/searchExperimentsByDesc",
    "/airavata/searchExperimentsByApplication",
    "/airavata/searchExperimentsByStatus",
    "/airavata/searchExperimentsByCreationTime",
    "/airavata/searchExperiments",
    "/airavata/getExperimentStatistics",
    "/airavata/getExperimentsInProject",
    "/airavata/getUserExperiments",
    "/airavata/createExperiment",
    "/airavata/deleteExperiment",
    "/airavata/getExperiment",
    "/airavata/getDetailedExperimentTree",
    "/airavata/updateExperiment",
    "/airavata/updateExperimentConfiguration",
    "/airavata/updateResourceScheduleing",
    "/airavata/validateExperiment",
    "/airavata/launchExperiment",
    "/airavata/getExperimentStatus",
    "/airavata/getExperimentOutputs",
    "/airavata/getIntermediateOutputs",
    "/airavata/getJobStatuses",
    "/airavata/getJobDetails",
    "/airavata/cloneExperiment",
    "/airavata/terminateExperiment",
    "/airavata/getApplicationInterface",
    "/airavata/getAllApplicationInterfaceNames",
    "/airavata/getAllApplicationInterfaces",
    "/airavata/getApplicationInputs",
    "/airavata/getApplicationOutputs",
    "/airavata/getAvailableAppInterfaceComputeResources",
    "/airavata/getComputeResource",
    "/airavata/getAllComputeResourceNames",
    "/airavata/getWorkflow",
    "/airavata/getWorkflowTemplateId",
    "/airavata/isWorkflowExistWithName",
    "/airavata/registerDataProduct",
    "/airavata/getDataProduct",
    "/airavata/registerReplicaLocation",
    "/airavata/getParentDataProduct",
    "/airavata/getChildDataProducts",
    "/airavata/getAllApplicationDeployments",
];

// Resource and credential reads visible to read-only administrators on top
// of the gateway-user set.
const READ_ONLY_ADMIN_EXTRA_ACTIONS: &[&str] = &[
    "/airavata/getSSHPubKey",
    "/airavata/getAllGatewaySSHPubKeys",
    "/airavata/getAllGatewayPWDCredentials",
    "/airavata/getApplicationModule",
    "/airavata/getAllAppModules",
    "/airavata/getApplicationDeployment",
    "/airavata/getAppModuleDeployedResources",
    "/airavata/getStorageResource",
    "/airavata/getAllStorageResourceNames",
    "/airavata/getSCPDataMovement",
    "/airavata/getUnicoreDataMovement",
    "/airavata/getGridFTPDataMovement",
    "/airavata/getResourceJobManager",
    "/airavata/deleteResourceJobManager",
    "/airavata/getGatewayComputeResourcePreference",
    "/airavata/getGatewayStoragePreference",
    "/airavata/getAllGatewayComputeResourcePreferences",
    "/airavata/getAllGatewayStoragePreferences",
    "/airavata/getAllGatewayResourceProfiles",
    "/airavata/getAllUserResourceProfiles",
    "/airavata/getExperimentByAdmin",
    "/airavata/cloneExperimentByAdmin",
    "/airavata/getAllCredentialSummaryForGateway",
    "/airavata/getGateway",
];

/// Predicate over action strings configured for one role.
#[derive(Clone, Debug)]
pub enum ActionMatcher {
    /// Matches every action in a namespace.
    Namespace(String),
    /// Matches exactly the listed actions.
    AnyOf(HashSet<Action>),
}

impl ActionMatcher {
    /// Creates a matcher covering every action in `namespace`.
    pub fn namespace(namespace: impl Into<String>) -> Self {
        Self::Namespace(namespace.into())
    }

    /// Creates a matcher covering exactly the given actions.
    pub fn any_of(actions: impl IntoIterator<Item = Action>) -> Self {
        Self::AnyOf(actions.into_iter().collect())
    }

    /// Tests an action against this matcher.
    pub fn matches(&self, action: &Action) -> bool {
        match self {
            Self::Namespace(namespace) => action.namespace() == namespace,
            Self::AnyOf(actions) => actions.contains(action),
        }
    }

    /// Returns the literal action set, or `None` for a namespace rule.
    pub fn actions(&self) -> Option<&HashSet<Action>> {
        match self {
            Self::Namespace(_) => None,
            Self::AnyOf(actions) => Some(actions),
        }
    }
}

/// Static table mapping role names to permitted actions.
///
/// Built once at startup and immutable afterwards. Evaluation follows a
/// fixed precedence: the admins group wins unconditionally, read-only
/// administrators are checked against `admin-read-only`, everyone else
/// against `gateway-user`.
#[derive(Clone, Debug)]
pub struct RoleTable {
    roles: HashMap<RoleName, ActionMatcher>,
}

impl RoleTable {
    /// Starts an empty role table builder.
    pub fn builder() -> RoleTableBuilder {
        RoleTableBuilder::default()
    }

    /// Returns the built-in table for the gateway API namespace.
    pub fn gateway_defaults() -> Self {
        let gateway_user = collect_actions(&[
            GATEWAY_USER_BASE_ACTIONS,
            USER_RESOURCE_PROFILE_ACTIONS,
            SHARING_ACTIONS,
            SSH_ACCOUNT_PROVISIONER_ACTIONS,
        ]);
        let read_only_admin = collect_actions(&[
            GATEWAY_USER_BASE_ACTIONS,
            READ_ONLY_ADMIN_EXTRA_ACTIONS,
            USER_RESOURCE_PROFILE_ACTIONS,
            SHARING_ACTIONS,
            SSH_ACCOUNT_PROVISIONER_ACTIONS,
            GROUP_RESOURCE_PROFILE_ACTIONS,
        ]);

        let mut roles = HashMap::new();
        roles.insert(
            RoleName::from_string(ROLE_ADMIN.to_string()),
            ActionMatcher::namespace(API_NAMESPACE),
        );
        roles.insert(
            RoleName::from_string(ROLE_READ_ONLY_ADMIN.to_string()),
            ActionMatcher::AnyOf(read_only_admin),
        );
        roles.insert(
            RoleName::from_string(ROLE_GATEWAY_USER.to_string()),
            ActionMatcher::AnyOf(gateway_user),
        );
        Self { roles }
    }

    /// Decides whether `action` is permitted for the given membership.
    ///
    /// Pure and deterministic; an action matching no configured rule for the
    /// selected role is denied, never an error.
    pub fn evaluate(&self, membership: GroupMembership, action: &Action) -> bool {
        if membership.in_admins_group {
            return true;
        }
        let role = if membership.in_read_only_admins_group {
            ROLE_READ_ONLY_ADMIN
        } else {
            ROLE_GATEWAY_USER
        };
        self.permits(role, action)
    }

    /// Tests an action against one named role; unknown roles deny.
    pub fn permits(&self, role: &str, action: &Action) -> bool {
        self.roles
            .get(role)
            .is_some_and(|matcher| matcher.matches(action))
    }

    /// Returns the matcher configured for a role.
    pub fn matcher(&self, role: &str) -> Option<&ActionMatcher> {
        self.roles.get(role)
    }

    /// Iterates over the configured roles.
    pub fn roles(&self) -> impl Iterator<Item = (&RoleName, &ActionMatcher)> {
        self.roles.iter()
    }
}

impl Default for RoleTable {
    fn default() -> Self {
        Self::gateway_defaults()
    }
}

fn collect_actions(lists: &[&[&str]]) -> HashSet<Action> {
    lists
        .iter()
        .flat_map(|list| list.iter())
        .map(|raw| Action::from_string((*raw).to_string()))
        .collect()
}

/// Builder for custom role tables.
#[derive(Debug, Default)]
pub struct RoleTableBuilder {
    roles: HashMap<RoleName, ActionMatcher>,
}

impl RoleTableBuilder {
    /// Adds or replaces a role.
    pub fn role(mut self, name: RoleName, matcher: ActionMatcher) -> Self {
        self.roles.insert(name, matcher);
        self
    }

    /// Validates that the consulted roles are present and builds the table.
    pub fn build(self) -> Result<RoleTable> {
        for required in [ROLE_READ_ONLY_ADMIN, ROLE_GATEWAY_USER] {
            if !self.roles.contains_key(required) {
                return Err(Error::Configuration(format!(
                    "role table is missing required role `{required}`"
                )));
            }
        }
        Ok(RoleTable { roles: self.roles })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(value: &str) -> Action {
        Action::try_from(value).unwrap()
    }

    fn membership(admin: bool, read_only_admin: bool) -> GroupMembership {
        GroupMembership {
            in_admins_group: admin,
            in_read_only_admins_group: read_only_admin,
        }
    }

    #[test]
    fn admin_membership_is_always_authorized() {
        let table = RoleTable::gateway_defaults();
        for raw in [
            "/airavata/deleteProject",
            "/airavata/removeGroupResourceProfile",
            "/airavata/someMethodNobodyConfigured",
        ] {
            assert!(table.evaluate(membership(true, false), &action(raw)));
            assert!(table.evaluate(membership(true, true), &action(raw)));
        }
    }

    #[test]
    fn gateway_user_is_limited_to_its_action_set() {
        let table = RoleTable::gateway_defaults();
        let everyday = membership(false, false);

        assert!(table.evaluate(everyday, &action("/airavata/getAPIVersion")));
        assert!(table.evaluate(everyday, &action("/airavata/createProject")));
        assert!(!table.evaluate(everyday, &action("/airavata/removeGroupResourceProfile")));
        assert!(!table.evaluate(everyday, &action("/airavata/getAllGatewaySSHPubKeys")));
    }

    #[test]
    fn read_only_admin_uses_elevated_table() {
        let table = RoleTable::gateway_defaults();
        let auditor = membership(false, true);

        assert!(table.evaluate(auditor, &action("/airavata/removeGroupResourceProfile")));
        assert!(table.evaluate(auditor, &action("/airavata/getExperimentByAdmin")));
        assert!(!table.evaluate(auditor, &action("/airavata/someMethodNobodyConfigured")));
    }

    #[test]
    fn unmatched_action_is_denied_not_error() {
        let table = RoleTable::gateway_defaults();
        let unknown = action("/airavata/frobnicateEverything");

        assert!(!table.evaluate(membership(false, false), &unknown));
        assert!(!table.permits("no-such-role", &unknown));
    }

    #[test]
    fn namespace_matcher_rejects_foreign_namespaces() {
        let table = RoleTable::gateway_defaults();
        assert!(table.permits(ROLE_ADMIN, &action("/airavata/anything")));
        assert!(!table.permits(ROLE_ADMIN, &action("/otherapi/anything")));
    }

    #[test]
    fn evaluate_is_deterministic() {
        let table = RoleTable::gateway_defaults();
        let everyday = membership(false, false);
        let action = action("/airavata/launchExperiment");

        let first = table.evaluate(everyday, &action);
        let second = table.evaluate(everyday, &action);
        assert_eq!(first, second);
    }

    #[test]
    fn read_only_admin_actions_are_contained_in_admin() {
        let table = RoleTable::gateway_defaults();
        let admin = table.matcher(ROLE_ADMIN).unwrap();
        let read_only = table
            .matcher(ROLE_READ_ONLY_ADMIN)
            .and_then(ActionMatcher::actions)
            .unwrap();

        for action in read_only {
            assert!(
                admin.matches(action),
                "{action} permitted for admin-read-only but not for admin"
            );
        }
        // The reverse does not hold: admin covers the whole namespace.
        assert!(!read_only.contains(&action("/airavata/deleteGateway")));
    }

    #[test]
    fn gateway_user_actions_are_contained_in_read_only_admin() {
        let table = RoleTable::gateway_defaults();
        let read_only = table
            .matcher(ROLE_READ_ONLY_ADMIN)
            .and_then(ActionMatcher::actions)
            .unwrap();
        let gateway_user = table
            .matcher(ROLE_GATEWAY_USER)
            .and_then(ActionMatcher::actions)
            .unwrap();

        for action in gateway_user {
            assert!(
                read_only.contains(action),
                "{action} permitted for gateway-user but not for admin-read-only"
            );
        }
        // Elevated reads stay out of the everyday set.
        assert!(!gateway_user.contains(&action("/airavata/getAllGatewaySSHPubKeys")));
    }

    #[test]
    fn builder_rejects_missing_required_roles() {
        let result = RoleTable::builder()
            .role(
                RoleName::try_from("admin-read-only").unwrap(),
                ActionMatcher::any_of([action("/airavata/getAPIVersion")]),
            )
            .build();

        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn builder_accepts_custom_tables() {
        let table = RoleTable::builder()
            .role(
                RoleName::try_from("admin-read-only").unwrap(),
                ActionMatcher::any_of([action("/tenantapi/readThing")]),
            )
            .role(
                RoleName::try_from("gateway-user").unwrap(),
                ActionMatcher::any_of([action("/tenantapi/readThing")]),
            )
            .build()
            .unwrap();

        assert!(table.evaluate(membership(false, false), &action("/tenantapi/readThing")));
        assert!(!table.evaluate(membership(false, false), &action("/tenantapi/writeThing")));
    }
}
