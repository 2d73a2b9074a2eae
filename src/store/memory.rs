//! In-memory backend
//!
//! Mirrors the MongoDB behaviours the initializer depends on: implicit
//! `_id_` index, create-if-absent answers, index conflict detection and
//! unique-key enforcement. Missing fields index as null and numbers compare
//! by value across Int32, Int64 and Double. Sparse indexes skip records
//! lacking every key; partial filters are matched by top-level equality.
//! Collations are recorded but strings still compare binary.

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Bson, Document};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::{CollectionKind, IndexInfo, SchemaStore, ID_INDEX_NAME};
use crate::schema::{AdminPrincipal, PrincipalInfo};
use crate::types::{ObjectKind, RepoInitError, Result};

#[derive(Debug)]
struct MemCollection {
    kind: CollectionKind,
    indexes: Vec<IndexInfo>,
    records: Vec<Document>,
}

impl MemCollection {
    fn new(kind: CollectionKind) -> Self {
        let indexes = match kind {
            CollectionKind::View => Vec::new(),
            // The server reports `_id_` without a unique flag but enforces it
            _ => vec![IndexInfo::non_unique(ID_INDEX_NAME, doc! { "_id": 1 })],
        };
        Self {
            kind,
            indexes,
            records: Vec::new(),
        }
    }

    /// Indexes whose key tuple must be unique, `_id_` included
    fn unique_indexes(&self) -> impl Iterator<Item = &IndexInfo> {
        self.indexes.iter().filter(|i| i.unique || i.is_id_index())
    }
}

#[derive(Debug, Default)]
struct MemState {
    collections: BTreeMap<String, MemCollection>,
    principals: BTreeMap<String, PrincipalInfo>,
}

/// Schema store held entirely in memory
#[derive(Debug)]
pub struct MemoryStore {
    db_name: String,
    state: RwLock<MemState>,
    unreachable: bool,
}

impl MemoryStore {
    pub fn new(db_name: &str) -> Self {
        Self {
            db_name: db_name.to_string(),
            state: RwLock::new(MemState::default()),
            unreachable: false,
        }
    }

    /// A store whose every call fails as if the server were down
    pub fn unreachable(db_name: &str) -> Self {
        Self {
            unreachable: true,
            ..Self::new(db_name)
        }
    }

    /// Register a view under `name`, standing in for a namespace of the wrong shape
    pub async fn create_view(&self, name: &str) {
        self.state
            .write()
            .await
            .collections
            .insert(name.to_string(), MemCollection::new(CollectionKind::View));
    }

    /// Register a user with arbitrary roles, bypassing `create_principal`
    pub async fn put_principal(&self, info: PrincipalInfo) {
        self.state
            .write()
            .await
            .principals
            .insert(info.user.clone(), info);
    }

    /// Snapshot of the records in `collection`
    pub async fn records(&self, collection: &str) -> Vec<Document> {
        self.state
            .read()
            .await
            .collections
            .get(collection)
            .map(|c| c.records.clone())
            .unwrap_or_default()
    }

    fn check_reachable(&self) -> Result<()> {
        if self.unreachable {
            return Err(RepoInitError::Unreachable(format!(
                "in-memory store for '{}' marked unreachable",
                self.db_name
            )));
        }
        Ok(())
    }
}

/// Canonical form for key comparison: numbers compare by value
fn normalized(value: &Bson) -> Bson {
    const EXACT_F64: f64 = (1u64 << 53) as f64;
    match value {
        Bson::Int32(n) => Bson::Int64(i64::from(*n)),
        Bson::Double(f) if f.fract() == 0.0 && f.abs() <= EXACT_F64 => Bson::Int64(*f as i64),
        Bson::Array(items) => Bson::Array(items.iter().map(normalized).collect()),
        Bson::Document(doc) => Bson::Document(
            doc.iter()
                .map(|(field, v)| (field.clone(), normalized(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Values of `record` for the fields of `keys`, in index order
fn tuple_for(keys: &Document, record: &Document) -> Vec<Bson> {
    keys.keys()
        .map(|field| record.get(field).map(normalized).unwrap_or(Bson::Null))
        .collect()
}

/// Key patterns are equal field by field, in order
fn same_keys(a: &Document, b: &Document) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b.iter())
            .all(|((fa, va), (fb, vb))| fa == fb && normalized(va) == normalized(vb))
}

fn same_options(a: &IndexInfo, b: &IndexInfo) -> bool {
    a.unique == b.unique
        && a.sparse == b.sparse
        && a.partial_filter == b.partial_filter
        && a.collation == b.collation
}

/// Whether `record` has an entry in `index`
fn covers(index: &IndexInfo, record: &Document) -> bool {
    if index.sparse && index.keys.keys().all(|field| !record.contains_key(field)) {
        return false;
    }
    match &index.partial_filter {
        Some(filter) => filter.iter().all(|(field, expected)| {
            record.get(field).map(normalized) == Some(normalized(expected))
        }),
        None => true,
    }
}

fn render_tuple(keys: &Document, tuple: &[Bson]) -> String {
    keys.keys()
        .zip(tuple)
        .map(|(field, value)| format!("{}: {}", field, value))
        .collect::<Vec<_>>()
        .join(", ")
}

#[async_trait]
impl SchemaStore for MemoryStore {
    fn database(&self) -> &str {
        &self.db_name
    }

    async fn ping(&self) -> Result<()> {
        self.check_reachable()
    }

    async fn collection_kind(&self, name: &str) -> Result<Option<CollectionKind>> {
        self.check_reachable()?;
        Ok(self.state.read().await.collections.get(name).map(|c| c.kind))
    }

    async fn create_collection(&self, name: &str) -> Result<bool> {
        self.check_reachable()?;
        let mut state = self.state.write().await;
        if state.collections.contains_key(name) {
            return Ok(false);
        }
        state
            .collections
            .insert(name.to_string(), MemCollection::new(CollectionKind::Collection));
        Ok(true)
    }

    async fn list_indexes(&self, collection: &str) -> Result<Vec<IndexInfo>> {
        self.check_reachable()?;
        Ok(self
            .state
            .read()
            .await
            .collections
            .get(collection)
            .map(|c| c.indexes.clone())
            .unwrap_or_default())
    }

    async fn create_index(&self, collection: &str, index: &IndexInfo) -> Result<()> {
        self.check_reachable()?;
        let mut state = self.state.write().await;
        let coll = state
            .collections
            .entry(collection.to_string())
            .or_insert_with(|| MemCollection::new(CollectionKind::Collection));

        if coll.kind == CollectionKind::View {
            return Err(RepoInitError::conflict(
                ObjectKind::Collection,
                collection,
                "cannot create an index on a view",
            ));
        }

        for existing in &coll.indexes {
            let same_name = existing.name == index.name;
            let keys_match = same_keys(&existing.keys, &index.keys);
            match (same_name, keys_match) {
                (true, true) if same_options(existing, index) => return Ok(()),
                (true, _) | (false, true) => {
                    return Err(RepoInitError::conflict(
                        ObjectKind::Index,
                        format!("{}.{}", collection, index.name),
                        format!(
                            "existing index '{}' on {} (unique: {})",
                            existing.name, existing.keys, existing.unique
                        ),
                    ));
                }
                (false, false) => {}
            }
        }

        if index.unique {
            let mut seen: Vec<Vec<Bson>> = Vec::with_capacity(coll.records.len());
            for record in coll.records.iter().filter(|r| covers(index, r)) {
                let tuple = tuple_for(&index.keys, record);
                if seen.contains(&tuple) {
                    return Err(RepoInitError::Duplicate {
                        collection: collection.to_string(),
                        detail: format!(
                            "cannot build unique index '{}': duplicate {{ {} }}",
                            index.name,
                            render_tuple(&index.keys, &tuple)
                        ),
                    });
                }
                seen.push(tuple);
            }
        }

        coll.indexes.push(index.clone());
        Ok(())
    }

    async fn find_principal(&self, username: &str) -> Result<Option<PrincipalInfo>> {
        self.check_reachable()?;
        Ok(self.state.read().await.principals.get(username).cloned())
    }

    async fn create_principal(&self, principal: &AdminPrincipal) -> Result<bool> {
        self.check_reachable()?;
        let mut state = self.state.write().await;
        if state.principals.contains_key(&principal.username) {
            return Ok(false);
        }
        state.principals.insert(
            principal.username.clone(),
            PrincipalInfo {
                user: principal.username.clone(),
                db: self.db_name.clone(),
                roles: principal.roles(),
            },
        );
        Ok(true)
    }

    async fn insert(&self, collection: &str, mut record: Document) -> Result<()> {
        self.check_reachable()?;
        let mut state = self.state.write().await;
        let coll = state
            .collections
            .entry(collection.to_string())
            .or_insert_with(|| MemCollection::new(CollectionKind::Collection));

        if coll.kind == CollectionKind::View {
            return Err(RepoInitError::Database(format!(
                "'{}' is a view and does not accept inserts",
                collection
            )));
        }

        if !record.contains_key("_id") {
            record.insert("_id", ObjectId::new());
        }

        for index in coll.unique_indexes().filter(|i| covers(i, &record)) {
            let tuple = tuple_for(&index.keys, &record);
            if coll
                .records
                .iter()
                .filter(|existing| covers(index, existing))
                .any(|existing| tuple_for(&index.keys, existing) == tuple)
            {
                return Err(RepoInitError::Duplicate {
                    collection: collection.to_string(),
                    detail: format!(
                        "index {} dup key: {{ {} }}",
                        index.name,
                        render_tuple(&index.keys, &tuple)
                    ),
                });
            }
        }

        coll.records.push(record);
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<u64> {
        self.check_reachable()?;
        Ok(self
            .state
            .read()
            .await
            .collections
            .get(collection)
            .map(|c| c.records.len() as u64)
            .unwrap_or(0))
    }

    async fn delete_all(&self, collection: &str) -> Result<u64> {
        self.check_reachable()?;
        let mut state = self.state.write().await;
        Ok(state
            .collections
            .get_mut(collection)
            .map(|c| c.records.drain(..).count() as u64)
            .unwrap_or(0))
    }

    async fn drop_collection(&self, collection: &str) -> Result<bool> {
        self.check_reachable()?;
        Ok(self
            .state
            .write()
            .await
            .collections
            .remove(collection)
            .is_some())
    }
}
