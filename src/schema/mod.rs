//! Declared schema
//!
//! The collections, their unique key tuples and the administrative
//! principal that together make up a provisioned repository database.

mod collections;
mod principal;

pub use collections::{
    find, CollectionSpec, APIKEYS_COLLECTION, APIKEY_POLICY_COLLECTION, COLLECTIONS,
    INSTANCES_COLLECTION, INSTANCE_POLICY_COLLECTION, K8S_RESOURCES_COLLECTION,
    PASSWORDS_COLLECTION, PROJECTS_COLLECTION, TEAMS_COLLECTION, TEAM_MEMBERS_COLLECTION,
    USERS_COLLECTION, USER_POLICY_COLLECTION,
};
pub use principal::{
    check_roles, expected_roles, AdminPrincipal, PrincipalInfo, RoleGrant, ADMIN_ROLE,
};
