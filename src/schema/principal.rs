//! Administrative principal provisioned alongside the schema

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroizing;

/// Role granted to the administrative principal
pub const ADMIN_ROLE: &str = "readWrite";

/// A role bound to a database, as reported by `usersInfo`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoleGrant {
    pub role: String,
    pub db: String,
}

impl RoleGrant {
    pub fn new(role: impl Into<String>, db: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            db: db.into(),
        }
    }
}

/// Existing user as seen in the store
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PrincipalInfo {
    pub user: String,
    pub db: String,
    #[serde(default)]
    pub roles: Vec<RoleGrant>,
}

/// The principal to provision: read-write on exactly one database
#[derive(Clone)]
pub struct AdminPrincipal {
    pub username: String,
    pub password: Zeroizing<String>,
    pub database: String,
}

impl fmt::Debug for AdminPrincipal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminPrincipal")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

impl AdminPrincipal {
    pub fn new(username: impl Into<String>, password: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Zeroizing::new(password.into()),
            database: database.into(),
        }
    }

    /// The only role set this principal may hold
    pub fn roles(&self) -> Vec<RoleGrant> {
        expected_roles(&self.database)
    }

    /// Check an existing user against the declared shape. Passwords are
    /// not compared.
    pub fn check_compatible(&self, existing: &PrincipalInfo) -> std::result::Result<(), String> {
        check_roles(&self.database, existing)
    }
}

/// Role set of the administrative principal of `database`
pub fn expected_roles(database: &str) -> Vec<RoleGrant> {
    vec![RoleGrant::new(ADMIN_ROLE, database)]
}

/// Describe the mismatch when `existing` holds anything other than
/// `readWrite` on `database`
pub fn check_roles(database: &str, existing: &PrincipalInfo) -> std::result::Result<(), String> {
    let mut actual = existing.roles.clone();
    actual.sort();
    actual.dedup();

    if actual == expected_roles(database) {
        return Ok(());
    }

    let held = actual
        .iter()
        .map(|r| format!("{}@{}", r.role, r.db))
        .collect::<Vec<_>>()
        .join(", ");
    Err(format!(
        "expected roles [{}@{}], found [{}]",
        ADMIN_ROLE, database, held
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn existing(roles: Vec<RoleGrant>) -> PrincipalInfo {
        PrincipalInfo {
            user: "zbiadmin".into(),
            db: "zbiRepo".into(),
            roles,
        }
    }

    #[test]
    fn test_roles_are_read_write_on_target_only() {
        let admin = AdminPrincipal::new("zbiadmin", "secret", "zbiRepo");
        assert_eq!(admin.roles(), vec![RoleGrant::new("readWrite", "zbiRepo")]);
    }

    #[test]
    fn test_compatible_principal() {
        let admin = AdminPrincipal::new("zbiadmin", "secret", "zbiRepo");
        let info = existing(vec![RoleGrant::new("readWrite", "zbiRepo")]);
        assert!(admin.check_compatible(&info).is_ok());
    }

    #[test]
    fn test_read_only_principal_conflicts() {
        let admin = AdminPrincipal::new("zbiadmin", "secret", "zbiRepo");
        let info = existing(vec![RoleGrant::new("read", "zbiRepo")]);
        let err = admin.check_compatible(&info).unwrap_err();
        assert!(err.contains("read@zbiRepo"));
    }

    #[test]
    fn test_extra_roles_conflict() {
        let admin = AdminPrincipal::new("zbiadmin", "secret", "zbiRepo");
        let info = existing(vec![
            RoleGrant::new("readWrite", "zbiRepo"),
            RoleGrant::new("dbAdminAnyDatabase", "admin"),
        ]);
        assert!(admin.check_compatible(&info).is_err());
    }

    #[test]
    fn test_debug_redacts_password() {
        let admin = AdminPrincipal::new("zbiadmin", "hunter2", "zbiRepo");
        let rendered = format!("{:?}", admin);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
