//! Store layer for repo-init
//!
//! `SchemaStore` is the set of administrative operations the initializer,
//! verifier, maintenance commands and seed loader need. MongoDB is the
//! production backend; the in-memory backend enforces the same unique-index
//! semantics for dry runs and tests.

pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use bson::Document;
use serde::Serialize;

use crate::config::{Args, StoreKind};
use crate::schema::{AdminPrincipal, PrincipalInfo};
use crate::types::Result;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Name of the index every collection carries on `_id`
pub const ID_INDEX_NAME: &str = "_id_";

/// What a namespace in the database actually is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    Collection,
    View,
    Timeseries,
    Other,
}

/// An index as declared or as listed back from the store
#[derive(Debug, Clone, PartialEq)]
pub struct IndexInfo {
    pub name: String,
    pub keys: Document,
    pub unique: bool,
    /// Records missing every indexed field are left out of the index
    pub sparse: bool,
    /// Only records matching this filter are indexed
    pub partial_filter: Option<Document>,
    /// Locale of a non-simple collation
    pub collation: Option<String>,
}

impl IndexInfo {
    pub fn unique(name: impl Into<String>, keys: Document) -> Self {
        Self {
            name: name.into(),
            keys,
            unique: true,
            sparse: false,
            partial_filter: None,
            collation: None,
        }
    }

    /// Same keys, without the unique constraint
    pub fn non_unique(name: impl Into<String>, keys: Document) -> Self {
        Self {
            unique: false,
            ..Self::unique(name, keys)
        }
    }

    pub fn is_id_index(&self) -> bool {
        self.name == ID_INDEX_NAME
    }

    /// Why this index does not make its key tuple unique across all records,
    /// or `None` when it does
    pub fn uniqueness_gap(&self) -> Option<String> {
        if !self.unique {
            return Some("index is not unique".to_string());
        }
        if self.sparse {
            return Some("unique index is sparse".to_string());
        }
        if let Some(filter) = &self.partial_filter {
            return Some(format!("unique index only covers records matching {}", filter));
        }
        if let Some(locale) = &self.collation {
            return Some(format!("unique index compares under collation '{}'", locale));
        }
        None
    }
}

/// Administrative operations against one logical database
#[async_trait]
pub trait SchemaStore: Send + Sync {
    /// Target database name
    fn database(&self) -> &str;

    /// Round-trip to the store; fails with `Unreachable` when it is down
    async fn ping(&self) -> Result<()>;

    /// Kind of the namespace `name`, or `None` when absent
    async fn collection_kind(&self, name: &str) -> Result<Option<CollectionKind>>;

    /// Create a plain collection. Returns false if it already existed.
    async fn create_collection(&self, name: &str) -> Result<bool>;

    /// Indexes on `collection`, including `_id_`. Empty when the collection is absent.
    async fn list_indexes(&self, collection: &str) -> Result<Vec<IndexInfo>>;

    /// Create an index; conflicting definitions fail with `Conflict`
    async fn create_index(&self, collection: &str, index: &IndexInfo) -> Result<()>;

    /// Look up a user defined on the target database
    async fn find_principal(&self, username: &str) -> Result<Option<PrincipalInfo>>;

    /// Create a user. Returns false if it already existed.
    async fn create_principal(&self, principal: &AdminPrincipal) -> Result<bool>;

    /// Insert one record; unique violations fail with `Duplicate`
    async fn insert(&self, collection: &str, record: Document) -> Result<()>;

    /// Number of records in `collection` (0 when absent)
    async fn count(&self, collection: &str) -> Result<u64>;

    /// Delete every record, keeping the collection and its indexes
    async fn delete_all(&self, collection: &str) -> Result<u64>;

    /// Drop the collection and its indexes. Returns false if it was absent.
    async fn drop_collection(&self, collection: &str) -> Result<bool>;
}

/// Open the store selected by configuration; the MongoDB backend pings on connect
pub async fn open_store(args: &Args) -> Result<Box<dyn SchemaStore>> {
    let store: Box<dyn SchemaStore> = match args.store {
        StoreKind::Mongo => Box::new(
            MongoStore::connect(&args.mongodb_uri, &args.mongodb_db, args.connect_timeout_ms).await?,
        ),
        StoreKind::Memory => Box::new(MemoryStore::new(&args.mongodb_db)),
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn test_full_unique_index_has_no_gap() {
        let index = IndexInfo::unique("key_1", doc! { "key": 1 });
        assert_eq!(index.uniqueness_gap(), None);
    }

    #[test]
    fn test_restricted_unique_indexes_have_gaps() {
        let base = IndexInfo::unique("userid_1_email_1", doc! { "userid": 1, "email": 1 });

        assert!(IndexInfo::non_unique("x", doc! { "userid": 1 }).uniqueness_gap().is_some());

        let sparse = IndexInfo {
            sparse: true,
            ..base.clone()
        };
        assert_eq!(sparse.uniqueness_gap().unwrap(), "unique index is sparse");

        let partial = IndexInfo {
            partial_filter: Some(doc! { "active": true }),
            ..base.clone()
        };
        assert!(partial.uniqueness_gap().unwrap().contains("active"));

        let collated = IndexInfo {
            collation: Some("en".to_string()),
            ..base
        };
        assert!(collated.uniqueness_gap().unwrap().contains("'en'"));
    }
}
