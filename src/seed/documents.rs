//! Record shapes written by the seed loader
//!
//! Only the fields the loader sets are modelled; application code owns the
//! rest of each record's lifecycle.

use bson::DateTime;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

/// Validity of a seeded API key
pub const API_KEY_LIFETIME_HOURS: i64 = 8760;

/// Record in `users`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UserDoc {
    pub userid: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub memberships: Vec<String>,
    pub active: bool,
    pub created: DateTime,
    pub last_update: DateTime,
}

impl UserDoc {
    pub fn new(userid: String, email: String, now: DateTime) -> Self {
        Self {
            userid,
            email,
            name: None,
            role: None,
            memberships: Vec::new(),
            active: true,
            created: now,
            last_update: now,
        }
    }
}

/// Record in `passwords`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PasswordDoc {
    pub userid: String,
    /// Argon2id PHC string
    pub password: String,
    pub created: DateTime,
}

/// Record in `user_policy`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UserPolicyDoc {
    pub userid: String,
    pub created: DateTime,
}

/// Record in `apikeys`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ApiKeyDoc {
    pub key: String,
    pub userid: String,
    pub created: DateTime,
    pub expires: DateTime,
}

impl ApiKeyDoc {
    /// Key issued at `created`, expiring after `API_KEY_LIFETIME_HOURS`
    pub fn new(key: String, userid: String, created: chrono::DateTime<Utc>) -> Self {
        Self {
            key,
            userid,
            created: DateTime::from_chrono(created),
            expires: DateTime::from_chrono(created + Duration::hours(API_KEY_LIFETIME_HOURS)),
        }
    }
}

/// Record in `apikey_policy`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ApiKeyPolicyDoc {
    pub key: String,
    pub active: bool,
    pub created: DateTime,
}

/// Record in `teams`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TeamDoc {
    pub teamid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub owner: String,
    pub created: DateTime,
    pub last_update: DateTime,
}

/// Record in `team_members`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TeamMemberDoc {
    pub teamid: String,
    pub email: String,
    /// Opaque; stored exactly as given
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub created_on: DateTime,
    pub last_update: DateTime,
}
