//! repo-init - schema bootstrap for the repository database
//!
//! Provisions one MongoDB database for the repository service: a read-write
//! administrative user, eleven collections and a unique compound index on
//! each. Every step is create-if-absent, so the tool can run on every
//! container start.
//!
//! ## Commands
//!
//! - **init**: provision principal, collections and indexes (default)
//! - **verify**: report drift without changing anything
//! - **seed**: provision, then load initial users, keys and teams from YAML
//! - **purge** / **drop** / **counts**: operator maintenance

pub mod config;
pub mod initializer;
pub mod maintenance;
pub mod runner;
pub mod schema;
pub mod seed;
pub mod store;
pub mod types;
pub mod verify;

pub use config::Args;
pub use initializer::{Aborted, Initializer, Outcome, Report};
pub use runner::{run, CommandOutput};
pub use store::{MemoryStore, MongoStore, SchemaStore};
pub use types::{RepoInitError, Result};
