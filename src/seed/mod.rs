//! Seed loader
//!
//! Inserts initial users, passwords, API keys, teams and team members from
//! a YAML file, together with the policy records each user and key needs.
//! Records whose unique key already exists are reported as `existing`, so
//! loading the same file twice is safe.

pub mod documents;
pub mod password;

use bson::{DateTime, Document};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::initializer::{Outcome, Report};
use crate::schema::{
    APIKEYS_COLLECTION, APIKEY_POLICY_COLLECTION, PASSWORDS_COLLECTION, TEAMS_COLLECTION,
    TEAM_MEMBERS_COLLECTION, USERS_COLLECTION, USER_POLICY_COLLECTION,
};
use crate::store::SchemaStore;
use crate::types::{ObjectKind, RepoInitError, Result};

use documents::{
    ApiKeyDoc, ApiKeyPolicyDoc, PasswordDoc, TeamDoc, TeamMemberDoc, UserDoc, UserPolicyDoc,
};

/// Contents of a seed file
#[derive(Deserialize, Debug, Default, Clone)]
pub struct SeedFile {
    #[serde(default)]
    pub users: Vec<SeedUser>,
    /// Plaintext passwords keyed by userid; hashed before storage
    #[serde(default)]
    pub passwords: BTreeMap<String, String>,
    #[serde(default)]
    pub keys: Vec<SeedApiKey>,
    #[serde(default)]
    pub teams: Vec<SeedTeam>,
    #[serde(default)]
    pub members: Vec<SeedMember>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SeedUser {
    pub userid: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub memberships: Vec<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SeedApiKey {
    pub key: String,
    pub userid: String,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SeedTeam {
    pub teamid: String,
    #[serde(default)]
    pub name: Option<String>,
    pub owner: String,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SeedMember {
    pub teamid: String,
    pub email: String,
    pub key: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl SeedFile {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let seed: Self = serde_yaml::from_str(yaml)?;
        seed.validate()?;
        Ok(seed)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| RepoInitError::Seed(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_yaml_str(&yaml)
    }

    /// Reject entries with empty key fields; warn about dangling references
    pub fn validate(&self) -> Result<()> {
        for user in &self.users {
            if user.userid.is_empty() || user.email.is_empty() {
                return Err(RepoInitError::Seed(
                    "every user needs a userid and an email".to_string(),
                ));
            }
        }
        for key in &self.keys {
            if key.key.is_empty() || key.userid.is_empty() {
                return Err(RepoInitError::Seed(
                    "every API key needs a key and a userid".to_string(),
                ));
            }
        }
        for team in &self.teams {
            if team.teamid.is_empty() || team.owner.is_empty() {
                return Err(RepoInitError::Seed(
                    "every team needs a teamid and an owner".to_string(),
                ));
            }
        }

        let userids: BTreeSet<&str> = self.users.iter().map(|u| u.userid.as_str()).collect();
        for (userid, plain) in &self.passwords {
            if plain.trim().is_empty() {
                return Err(RepoInitError::Seed(format!(
                    "password for user '{}' is empty",
                    userid
                )));
            }
            if !userids.contains(userid.as_str()) {
                warn!(userid = %userid, "Password given for a user not in the seed file");
            }
        }
        let teamids: BTreeSet<&str> = self.teams.iter().map(|t| t.teamid.as_str()).collect();
        for member in &self.members {
            if !teamids.contains(member.teamid.as_str()) {
                warn!(teamid = %member.teamid, email = %member.email, "Member of a team not in the seed file");
            }
        }
        Ok(())
    }
}

/// Loads a `SeedFile` into a store
pub struct Seeder<'a, S: SchemaStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: SchemaStore + ?Sized> Seeder<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub async fn load(&self, seed: &SeedFile) -> Result<Report> {
        let mut report = Report::new(self.store.database());
        let now = Utc::now();
        let stamp = DateTime::from_chrono(now);

        for user in &seed.users {
            let mut doc = UserDoc::new(user.userid.clone(), user.email.clone(), stamp);
            doc.name = user.name.clone();
            doc.role = user.role.clone();
            doc.memberships = user.memberships.clone();
            self.put(&mut report, USERS_COLLECTION, &user.userid, &doc).await?;

            if let Some(plain) = seed.passwords.get(&user.userid) {
                let doc = PasswordDoc {
                    userid: user.userid.clone(),
                    password: password::hash_seed_password(&user.userid, plain)?,
                    created: stamp,
                };
                self.put(&mut report, PASSWORDS_COLLECTION, &user.userid, &doc).await?;
            }

            let policy = UserPolicyDoc {
                userid: user.userid.clone(),
                created: stamp,
            };
            self.put(&mut report, USER_POLICY_COLLECTION, &user.userid, &policy)
                .await?;
        }

        for key in &seed.keys {
            let doc = ApiKeyDoc::new(key.key.clone(), key.userid.clone(), now);
            self.put(&mut report, APIKEYS_COLLECTION, &key.key, &doc).await?;

            let policy = ApiKeyPolicyDoc {
                key: key.key.clone(),
                active: true,
                created: stamp,
            };
            self.put(&mut report, APIKEY_POLICY_COLLECTION, &key.key, &policy)
                .await?;
        }

        for team in &seed.teams {
            let doc = TeamDoc {
                teamid: team.teamid.clone(),
                name: team.name.clone(),
                owner: team.owner.clone(),
                created: stamp,
                last_update: stamp,
            };
            self.put(&mut report, TEAMS_COLLECTION, &team.teamid, &doc).await?;
        }

        for member in &seed.members {
            let doc = TeamMemberDoc {
                teamid: member.teamid.clone(),
                email: member.email.clone(),
                key: member.key.clone(),
                role: member.role.clone(),
                status: member.status.clone(),
                created_on: stamp,
                last_update: stamp,
            };
            let label = format!("{}/{}", member.teamid, member.email);
            self.put(&mut report, TEAM_MEMBERS_COLLECTION, &label, &doc).await?;
        }

        info!(
            database = %report.database,
            inserted = report.created(),
            existing = report.existing(),
            "Seed data loaded"
        );
        Ok(report)
    }

    /// Insert one record, treating a unique-key collision as already seeded
    async fn put<T: Serialize>(
        &self,
        report: &mut Report,
        collection: &str,
        label: &str,
        record: &T,
    ) -> Result<()> {
        let doc: Document = bson::to_document(record)?;
        let target = format!("{}:{}", collection, label);

        match self.store.insert(collection, doc).await {
            Ok(()) => {
                debug!(collection = %collection, record = %label, "Inserted seed record");
                report.push(ObjectKind::Record, target, Outcome::Created);
                Ok(())
            }
            Err(e) if e.is_duplicate() => {
                debug!(collection = %collection, record = %label, "Seed record already present");
                report.push(ObjectKind::Record, target, Outcome::Existing);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: &str = r#"
users:
  - userid: admin
    email: admin@example.com
    role: owner
passwords:
  admin: changeme
keys:
  - key: abc
    userid: admin
teams:
  - teamid: t1
    name: Platform
    owner: admin
members:
  - teamid: t1
    email: dev@example.com
    key: member
"#;

    #[test]
    fn test_parse_seed_file() {
        let seed = SeedFile::from_yaml_str(SEED).unwrap();
        assert_eq!(seed.users.len(), 1);
        assert_eq!(seed.users[0].role.as_deref(), Some("owner"));
        assert_eq!(seed.passwords["admin"], "changeme");
        assert_eq!(seed.keys[0].key, "abc");
        assert_eq!(seed.teams[0].owner, "admin");
        assert_eq!(seed.members[0].key, "member");
    }

    #[test]
    fn test_empty_seed_file() {
        let seed = SeedFile::from_yaml_str("{}").unwrap();
        assert!(seed.users.is_empty() && seed.keys.is_empty());
    }

    #[test]
    fn test_rejects_user_without_email() {
        let err = SeedFile::from_yaml_str("users:\n  - userid: u1\n    email: \"\"\n").unwrap_err();
        assert!(matches!(err, RepoInitError::Seed(_)));
    }

    #[test]
    fn test_rejects_empty_password() {
        let err = SeedFile::from_yaml_str(
            "users:\n  - userid: u1\n    email: u1@example.com\npasswords:\n  u1: \"\"\n",
        )
        .unwrap_err();
        assert!(matches!(&err, RepoInitError::Seed(msg) if msg.contains("'u1'")));
    }

    #[test]
    fn test_malformed_yaml() {
        let err = SeedFile::from_yaml_str("users: [userid: ").unwrap_err();
        assert!(matches!(err, RepoInitError::Seed(_)));
    }
}
