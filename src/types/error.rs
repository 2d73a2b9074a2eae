//! Error types for repo-init
//!
//! "Already exists, compatible" is never an error here; it is reported as
//! an `existing` step outcome. Everything below aborts the current run,
//! except `Duplicate`, which callers may choose to tolerate.

use serde::Serialize;
use std::fmt;

/// Kind of object a step or a conflict is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Principal,
    Collection,
    Index,
    Record,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Principal => write!(f, "principal"),
            Self::Collection => write!(f, "collection"),
            Self::Index => write!(f, "index"),
            Self::Record => write!(f, "record"),
        }
    }
}

/// Main error type for repo-init operations
#[derive(Debug, thiserror::Error)]
pub enum RepoInitError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store unreachable: {0}")]
    Unreachable(String),

    #[error("Conflicting {kind} '{name}': {detail}")]
    Conflict {
        kind: ObjectKind,
        name: String,
        detail: String,
    },

    #[error("Duplicate key in '{collection}': {detail}")]
    Duplicate { collection: String, detail: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Seed error: {0}")]
    Seed(String),
}

impl RepoInitError {
    pub fn conflict(kind: ObjectKind, name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Conflict {
            kind,
            name: name.into(),
            detail: detail.into(),
        }
    }

    /// True for unique-key violations raised by an insert
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}

impl From<serde_json::Error> for RepoInitError {
    fn from(err: serde_json::Error) -> Self {
        Self::Database(format!("JSON error: {}", err))
    }
}

impl From<serde_yaml::Error> for RepoInitError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Seed(format!("YAML error: {}", err))
    }
}

impl From<bson::ser::Error> for RepoInitError {
    fn from(err: bson::ser::Error) -> Self {
        Self::Database(format!("BSON encode error: {}", err))
    }
}

impl From<bson::de::Error> for RepoInitError {
    fn from(err: bson::de::Error) -> Self {
        Self::Database(format!("BSON decode error: {}", err))
    }
}

/// Result type alias for repo-init operations
pub type Result<T> = std::result::Result<T, RepoInitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_message_names_object() {
        let err = RepoInitError::conflict(ObjectKind::Index, "users.userid_1_email_1", "keys differ");
        assert_eq!(
            err.to_string(),
            "Conflicting index 'users.userid_1_email_1': keys differ"
        );
    }

    #[test]
    fn test_is_duplicate() {
        let dup = RepoInitError::Duplicate {
            collection: "apikeys".into(),
            detail: "E11000".into(),
        };
        assert!(dup.is_duplicate());
        assert!(!RepoInitError::Database("boom".into()).is_duplicate());
    }
}
