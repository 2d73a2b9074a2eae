//! Purge, drop and count across the declared collections

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

use crate::schema::CollectionSpec;
use crate::store::SchemaStore;
use crate::types::Result;

/// Per-collection numbers, keyed by collection name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectionCounts {
    pub database: String,
    pub collections: BTreeMap<String, u64>,
}

impl CollectionCounts {
    fn new(database: &str) -> Self {
        Self {
            database: database.to_string(),
            collections: BTreeMap::new(),
        }
    }

    pub fn total(&self) -> u64 {
        self.collections.values().sum()
    }
}

/// Delete every record from each collection, keeping collections and indexes.
/// Returns the number of records removed per collection.
pub async fn purge<S: SchemaStore + ?Sized>(
    store: &S,
    collections: &[CollectionSpec],
) -> Result<CollectionCounts> {
    let mut deleted = CollectionCounts::new(store.database());
    for spec in collections {
        let count = store.delete_all(spec.name).await?;
        info!(collection = %spec.name, deleted = count, "Purged collection");
        deleted.collections.insert(spec.name.to_string(), count);
    }
    Ok(deleted)
}

/// Drop each collection. Returns the names that existed and were dropped.
pub async fn drop_all<S: SchemaStore + ?Sized>(
    store: &S,
    collections: &[CollectionSpec],
) -> Result<Vec<String>> {
    let mut dropped = Vec::new();
    for spec in collections {
        if store.drop_collection(spec.name).await? {
            info!(collection = %spec.name, "Dropped collection");
            dropped.push(spec.name.to_string());
        }
    }
    Ok(dropped)
}

/// Count records per collection; absent collections count as 0
pub async fn counts<S: SchemaStore + ?Sized>(
    store: &S,
    collections: &[CollectionSpec],
) -> Result<CollectionCounts> {
    let mut counts = CollectionCounts::new(store.database());
    for spec in collections {
        counts
            .collections
            .insert(spec.name.to_string(), store.count(spec.name).await?);
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::initializer::Initializer;
    use crate::schema::COLLECTIONS;
    use crate::store::MemoryStore;
    use bson::doc;

    async fn provisioned() -> MemoryStore {
        let store = MemoryStore::new("zbiRepo");
        Initializer::new(&store).run().await.unwrap();
        store
            .insert("users", doc! { "userid": "u1", "email": "u1@example.com" })
            .await
            .unwrap();
        store
            .insert("apikeys", doc! { "key": "abc", "userid": "u1" })
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_counts() {
        let store = provisioned().await;
        let counts = counts(&store, COLLECTIONS).await.unwrap();
        assert_eq!(counts.collections.len(), 11);
        assert_eq!(counts.collections["users"], 1);
        assert_eq!(counts.collections["teams"], 0);
        assert_eq!(counts.total(), 2);
    }

    #[tokio::test]
    async fn test_purge_keeps_indexes() {
        let store = provisioned().await;
        let deleted = purge(&store, COLLECTIONS).await.unwrap();
        assert_eq!(deleted.total(), 2);
        assert_eq!(counts(&store, COLLECTIONS).await.unwrap().total(), 0);

        // Unique index still enforced after purge
        store
            .insert("apikeys", doc! { "key": "abc", "userid": "u1" })
            .await
            .unwrap();
        assert!(store
            .insert("apikeys", doc! { "key": "abc", "userid": "u1" })
            .await
            .unwrap_err()
            .is_duplicate());
    }

    #[tokio::test]
    async fn test_drop_removes_collections() {
        let store = provisioned().await;
        let dropped = drop_all(&store, COLLECTIONS).await.unwrap();
        assert_eq!(dropped.len(), 11);
        assert!(store.collection_kind("users").await.unwrap().is_none());

        // Dropping again is a no-op
        assert!(drop_all(&store, COLLECTIONS).await.unwrap().is_empty());
    }
}
