//! Read-only schema verification
//!
//! Compares the store with the declared schema and lists every difference.
//! Nothing is created or changed.

use serde::Serialize;
use tracing::{info, warn};

use crate::schema::{check_roles, CollectionSpec, COLLECTIONS};
use crate::store::{CollectionKind, SchemaStore};
use crate::types::Result;

/// One difference between store and declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "finding", rename_all = "snake_case")]
pub enum Finding {
    MissingPrincipal { user: String },
    ConflictingPrincipal { user: String, detail: String },
    MissingCollection { collection: String },
    IncompatibleCollection { collection: String, kind: CollectionKind },
    MissingIndex { collection: String, index: String },
    ConflictingIndex { collection: String, index: String, detail: String },
}

/// Check the principal (when `user` is given) and every collection in `collections`
pub async fn verify<S: SchemaStore + ?Sized>(
    store: &S,
    user: Option<&str>,
    collections: &[CollectionSpec],
) -> Result<Vec<Finding>> {
    let mut findings = Vec::new();

    if let Some(user) = user {
        match store.find_principal(user).await? {
            None => findings.push(Finding::MissingPrincipal {
                user: user.to_string(),
            }),
            Some(existing) => {
                if let Err(detail) = check_roles(store.database(), &existing) {
                    findings.push(Finding::ConflictingPrincipal {
                        user: user.to_string(),
                        detail,
                    });
                }
            }
        }
    }

    for spec in collections {
        match store.collection_kind(spec.name).await? {
            None => {
                findings.push(Finding::MissingCollection {
                    collection: spec.name.to_string(),
                });
                findings.push(Finding::MissingIndex {
                    collection: spec.name.to_string(),
                    index: spec.index_name(),
                });
                continue;
            }
            Some(CollectionKind::Collection) => {}
            Some(kind) => {
                findings.push(Finding::IncompatibleCollection {
                    collection: spec.name.to_string(),
                    kind,
                });
                continue;
            }
        }

        if let Some(finding) = verify_index(store, spec).await? {
            findings.push(finding);
        }
    }

    if findings.is_empty() {
        info!(database = %store.database(), "Schema matches declaration");
    } else {
        warn!(
            database = %store.database(),
            findings = findings.len(),
            "Schema drift detected"
        );
    }
    Ok(findings)
}

/// Verify the full declared schema
pub async fn verify_all<S: SchemaStore + ?Sized>(store: &S, user: Option<&str>) -> Result<Vec<Finding>> {
    verify(store, user, COLLECTIONS).await
}

async fn verify_index<S: SchemaStore + ?Sized>(store: &S, spec: &CollectionSpec) -> Result<Option<Finding>> {
    let name = spec.index_name();
    let indexes = store.list_indexes(spec.name).await?;

    if let Some(existing) = indexes.iter().find(|i| spec.matches_keys(&i.keys)) {
        return Ok(existing.uniqueness_gap().map(|detail| Finding::ConflictingIndex {
            collection: spec.name.to_string(),
            index: existing.name.clone(),
            detail,
        }));
    }

    if let Some(existing) = indexes.iter().find(|i| i.name == name) {
        return Ok(Some(Finding::ConflictingIndex {
            collection: spec.name.to_string(),
            index: name,
            detail: format!("keys {} expected {}", existing.keys, spec.index_keys()),
        }));
    }

    Ok(Some(Finding::MissingIndex {
        collection: spec.name.to_string(),
        index: name,
    }))
}
