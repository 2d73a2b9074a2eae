//! Schema initializer
//!
//! Runs the provisioning sequence against a `SchemaStore`: the principal
//! first, then each declared collection followed by its unique index.
//! Every step is create-if-absent; an object that exists with the declared
//! shape is reported as `existing`, one with a different shape aborts the
//! run with `RepoInitError::Conflict`.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::schema::{AdminPrincipal, CollectionSpec, PrincipalInfo, COLLECTIONS};
use crate::store::{CollectionKind, IndexInfo, SchemaStore};
use crate::types::{ObjectKind, RepoInitError, Result};

/// Outcome of a single provisioning step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Created,
    Existing,
}

/// One line of the run summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    pub kind: ObjectKind,
    pub target: String,
    pub outcome: Outcome,
}

/// The step a run stopped at
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedStep {
    pub kind: ObjectKind,
    pub target: String,
    pub error: String,
}

/// Summary of a run, printed for the operator
#[derive(Debug, Clone, Default, Serialize)]
pub struct Report {
    pub database: String,
    pub steps: Vec<Step>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed: Option<FailedStep>,
}

/// A run that stopped early, with the steps completed before the failure
#[derive(Debug, thiserror::Error)]
#[error("Provisioning aborted: {error}")]
pub struct Aborted {
    pub report: Report,
    #[source]
    pub error: RepoInitError,
}

impl From<Aborted> for RepoInitError {
    fn from(aborted: Aborted) -> Self {
        aborted.error
    }
}

impl Report {
    pub fn new(database: &str) -> Self {
        Self {
            database: database.to_string(),
            steps: Vec::new(),
            failed: None,
        }
    }

    pub fn push(&mut self, kind: ObjectKind, target: impl Into<String>, outcome: Outcome) {
        self.steps.push(Step {
            kind,
            target: target.into(),
            outcome,
        });
    }

    pub fn created(&self) -> usize {
        self.steps.iter().filter(|s| s.outcome == Outcome::Created).count()
    }

    pub fn existing(&self) -> usize {
        self.steps.iter().filter(|s| s.outcome == Outcome::Existing).count()
    }

    /// True when nothing had to be created
    pub fn is_noop(&self) -> bool {
        self.created() == 0
    }
}

type StepError = (ObjectKind, String, RepoInitError);

/// Provisions the declared schema on a store
pub struct Initializer<'a, S: SchemaStore + ?Sized> {
    store: &'a S,
    principal: Option<&'a AdminPrincipal>,
    collections: &'a [CollectionSpec],
}

impl<'a, S: SchemaStore + ?Sized> Initializer<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            principal: None,
            collections: COLLECTIONS,
        }
    }

    /// Also provision the administrative principal
    pub fn with_principal(mut self, principal: Option<&'a AdminPrincipal>) -> Self {
        self.principal = principal;
        self
    }

    /// Provision a different collection set
    pub fn with_collections(mut self, collections: &'a [CollectionSpec]) -> Self {
        self.collections = collections;
        self
    }

    /// Run every step in order, stopping at the first failure. On failure the
    /// report keeps the completed steps and names the one that failed.
    pub async fn run(&self) -> std::result::Result<Report, Aborted> {
        let mut report = Report::new(self.store.database());
        info!(
            database = %self.store.database(),
            collections = self.collections.len(),
            "Provisioning schema"
        );

        if let Err((kind, target, error)) = self.provision(&mut report).await {
            warn!(
                database = %report.database,
                completed = report.steps.len(),
                %kind,
                %target,
                "Provisioning aborted"
            );
            report.failed = Some(FailedStep {
                kind,
                target,
                error: error.to_string(),
            });
            return Err(Aborted { report, error });
        }

        info!(
            database = %report.database,
            created = report.created(),
            existing = report.existing(),
            "Schema provisioned"
        );
        Ok(report)
    }

    async fn provision(&self, report: &mut Report) -> std::result::Result<(), StepError> {
        if let Some(principal) = self.principal {
            let target = principal.username.clone();
            match self.ensure_principal(principal).await {
                Ok(outcome) => report.push(ObjectKind::Principal, target, outcome),
                Err(e) => return Err((ObjectKind::Principal, target, e)),
            }
        }

        for spec in self.collections {
            match self.ensure_collection(spec).await {
                Ok(outcome) => report.push(ObjectKind::Collection, spec.name, outcome),
                Err(e) => return Err((ObjectKind::Collection, spec.name.to_string(), e)),
            }

            let target = format!("{}.{}", spec.name, spec.index_name());
            match self.ensure_index(spec).await {
                Ok(outcome) => report.push(ObjectKind::Index, target, outcome),
                Err(e) => return Err((ObjectKind::Index, target, e)),
            }
        }
        Ok(())
    }

    async fn ensure_principal(&self, principal: &AdminPrincipal) -> Result<Outcome> {
        if let Some(existing) = self.store.find_principal(&principal.username).await? {
            return check_principal(principal, &existing);
        }

        if self.store.create_principal(principal).await? {
            info!(user = %principal.username, database = %principal.database, "Created principal");
            return Ok(Outcome::Created);
        }

        // Lost a race with another initializer; judge what it created
        let existing = self
            .store
            .find_principal(&principal.username)
            .await?
            .ok_or_else(|| {
                RepoInitError::Database(format!(
                    "user '{}' reported as existing but not found",
                    principal.username
                ))
            })?;
        check_principal(principal, &existing)
    }

    async fn ensure_collection(&self, spec: &CollectionSpec) -> Result<Outcome> {
        match self.store.collection_kind(spec.name).await? {
            Some(kind) => check_collection_kind(spec.name, kind),
            None => {
                if self.store.create_collection(spec.name).await? {
                    info!(collection = %spec.name, "Created collection");
                    return Ok(Outcome::Created);
                }
                match self.store.collection_kind(spec.name).await? {
                    Some(kind) => check_collection_kind(spec.name, kind),
                    None => Err(RepoInitError::Database(format!(
                        "collection '{}' reported as existing but not found",
                        spec.name
                    ))),
                }
            }
        }
    }

    async fn ensure_index(&self, spec: &CollectionSpec) -> Result<Outcome> {
        let name = spec.index_name();
        let indexes = self.store.list_indexes(spec.name).await?;

        if let Some(existing) = indexes.iter().find(|i| spec.matches_keys(&i.keys)) {
            if let Some(gap) = existing.uniqueness_gap() {
                return Err(RepoInitError::conflict(
                    ObjectKind::Index,
                    format!("{}.{}", spec.name, existing.name),
                    format!("index on {}: {}", existing.keys, gap),
                ));
            }
            if existing.name != name {
                warn!(
                    collection = %spec.name,
                    index = %existing.name,
                    expected = %name,
                    "Unique index present under a non-default name"
                );
            }
            debug!(collection = %spec.name, index = %existing.name, "Index already present");
            return Ok(Outcome::Existing);
        }

        if let Some(existing) = indexes.iter().find(|i| i.name == name) {
            return Err(RepoInitError::conflict(
                ObjectKind::Index,
                format!("{}.{}", spec.name, name),
                format!(
                    "existing index has keys {}, expected {}",
                    existing.keys,
                    spec.index_keys()
                ),
            ));
        }

        self.store
            .create_index(spec.name, &IndexInfo::unique(name.clone(), spec.index_keys()))
            .await?;
        info!(collection = %spec.name, index = %name, "Created unique index");
        Ok(Outcome::Created)
    }
}

fn check_principal(principal: &AdminPrincipal, existing: &PrincipalInfo) -> Result<Outcome> {
    match principal.check_compatible(existing) {
        Ok(()) => {
            debug!(user = %principal.username, "Principal already present");
            Ok(Outcome::Existing)
        }
        Err(detail) => Err(RepoInitError::conflict(
            ObjectKind::Principal,
            principal.username.clone(),
            detail,
        )),
    }
}

fn check_collection_kind(name: &str, kind: CollectionKind) -> Result<Outcome> {
    match kind {
        CollectionKind::Collection => {
            debug!(collection = %name, "Collection already present");
            Ok(Outcome::Existing)
        }
        other => Err(RepoInitError::conflict(
            ObjectKind::Collection,
            name,
            format!("namespace exists as {:?}, expected a plain collection", other),
        )),
    }
}
