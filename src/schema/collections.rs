//! Declared collections and their unique key tuples

use bson::{Bson, Document};

pub const USERS_COLLECTION: &str = "users";
pub const PASSWORDS_COLLECTION: &str = "passwords";
pub const USER_POLICY_COLLECTION: &str = "user_policy";
pub const APIKEYS_COLLECTION: &str = "apikeys";
pub const APIKEY_POLICY_COLLECTION: &str = "apikey_policy";
pub const TEAMS_COLLECTION: &str = "teams";
pub const TEAM_MEMBERS_COLLECTION: &str = "team_members";
pub const PROJECTS_COLLECTION: &str = "projects";
pub const INSTANCES_COLLECTION: &str = "instances";
pub const K8S_RESOURCES_COLLECTION: &str = "k8s_resources";
pub const INSTANCE_POLICY_COLLECTION: &str = "instance_policy";

/// A collection and the field tuple that must be unique across its records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionSpec {
    pub name: &'static str,
    /// Key fields in index order, all ascending
    pub unique_keys: &'static [&'static str],
}

/// Every collection the initializer provisions, in provisioning order
pub static COLLECTIONS: &[CollectionSpec] = &[
    CollectionSpec {
        name: USERS_COLLECTION,
        unique_keys: &["userid", "email"],
    },
    CollectionSpec {
        name: PASSWORDS_COLLECTION,
        unique_keys: &["userid"],
    },
    CollectionSpec {
        name: USER_POLICY_COLLECTION,
        unique_keys: &["userid"],
    },
    CollectionSpec {
        name: APIKEYS_COLLECTION,
        unique_keys: &["key", "userid"],
    },
    CollectionSpec {
        name: APIKEY_POLICY_COLLECTION,
        unique_keys: &["key"],
    },
    CollectionSpec {
        name: TEAMS_COLLECTION,
        unique_keys: &["teamid", "owner"],
    },
    CollectionSpec {
        name: TEAM_MEMBERS_COLLECTION,
        // `key` is opaque: role identifier or API key reference, never interpreted
        unique_keys: &["teamid", "email", "key"],
    },
    CollectionSpec {
        name: PROJECTS_COLLECTION,
        unique_keys: &["name", "owner", "team"],
    },
    CollectionSpec {
        name: INSTANCES_COLLECTION,
        unique_keys: &["project", "name", "type", "owner"],
    },
    CollectionSpec {
        name: K8S_RESOURCES_COLLECTION,
        unique_keys: &["project", "instance", "type", "name"],
    },
    CollectionSpec {
        name: INSTANCE_POLICY_COLLECTION,
        unique_keys: &["project", "instance"],
    },
];

/// Look up a declared collection by name
pub fn find(name: &str) -> Option<&'static CollectionSpec> {
    COLLECTIONS.iter().find(|spec| spec.name == name)
}

impl CollectionSpec {
    /// Index name the store assigns by default to this key pattern
    /// (`userid_1_email_1`), so shell-provisioned databases line up.
    pub fn index_name(&self) -> String {
        self.unique_keys
            .iter()
            .map(|field| format!("{}_1", field))
            .collect::<Vec<_>>()
            .join("_")
    }

    /// Ordered ascending key pattern
    pub fn index_keys(&self) -> Document {
        let mut keys = Document::new();
        for field in self.unique_keys {
            keys.insert(*field, 1i32);
        }
        keys
    }

    /// Whether `keys` is exactly this collection's key pattern
    pub fn matches_keys(&self, keys: &Document) -> bool {
        keys.len() == self.unique_keys.len()
            && keys
                .iter()
                .zip(self.unique_keys.iter())
                .all(|((field, dir), expected)| field == expected && is_ascending(dir))
    }

    /// Extract the unique key tuple of a record; absent fields read as null
    pub fn key_tuple(&self, record: &Document) -> Vec<Bson> {
        self.unique_keys
            .iter()
            .map(|field| record.get(*field).cloned().unwrap_or(Bson::Null))
            .collect()
    }
}

/// Index directions come back as i32, i64 or f64 depending on who wrote them
fn is_ascending(dir: &Bson) -> bool {
    match dir {
        Bson::Int32(v) => *v == 1,
        Bson::Int64(v) => *v == 1,
        Bson::Double(v) => *v == 1.0,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use std::collections::HashSet;

    #[test]
    fn test_eleven_distinct_collections() {
        let names: HashSet<_> = COLLECTIONS.iter().map(|c| c.name).collect();
        assert_eq!(COLLECTIONS.len(), 11);
        assert_eq!(names.len(), 11);
        assert!(COLLECTIONS.iter().all(|c| !c.unique_keys.is_empty()));
    }

    #[test]
    fn test_index_name_follows_store_default() {
        let users = find(USERS_COLLECTION).unwrap();
        assert_eq!(users.index_name(), "userid_1_email_1");

        let instances = find(INSTANCES_COLLECTION).unwrap();
        assert_eq!(instances.index_name(), "project_1_name_1_type_1_owner_1");
    }

    #[test]
    fn test_index_keys_preserve_order() {
        let spec = find(K8S_RESOURCES_COLLECTION).unwrap();
        let keys = spec.index_keys();
        let fields: Vec<&str> = keys.keys().map(|k| k.as_str()).collect();
        assert_eq!(fields, vec!["project", "instance", "type", "name"]);
    }

    #[test]
    fn test_matches_keys() {
        let spec = find(APIKEYS_COLLECTION).unwrap();
        assert!(spec.matches_keys(&doc! { "key": 1, "userid": 1 }));
        assert!(spec.matches_keys(&doc! { "key": 1i64, "userid": 1.0 }));
        // Order matters for a compound index
        assert!(!spec.matches_keys(&doc! { "userid": 1, "key": 1 }));
        assert!(!spec.matches_keys(&doc! { "key": -1, "userid": 1 }));
        assert!(!spec.matches_keys(&doc! { "key": 1 }));
    }

    #[test]
    fn test_key_tuple_missing_field_is_null() {
        let spec = find(TEAMS_COLLECTION).unwrap();
        let tuple = spec.key_tuple(&doc! { "teamid": "t1", "name": "ops" });
        assert_eq!(tuple, vec![Bson::String("t1".into()), Bson::Null]);
    }

    #[test]
    fn test_find_unknown() {
        assert!(find("roles").is_none());
    }
}
