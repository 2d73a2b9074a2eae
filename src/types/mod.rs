//! Shared types for repo-init

pub mod error;

pub use error::{ObjectKind, RepoInitError, Result};
