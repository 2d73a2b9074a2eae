//! Configuration for repo-init
//!
//! CLI arguments and environment variable handling using clap. Every flag
//! has an environment fallback so the tool runs unattended as a container
//! startup hook.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::schema::AdminPrincipal;
use crate::types::{RepoInitError, Result};

/// repo-init - provision the repository database schema
#[derive(Parser, Debug, Clone)]
#[command(name = "repo-init")]
#[command(about = "Provision collections, unique indexes and the admin user of the repository database")]
pub struct Args {
    /// What to do (defaults to `init`)
    #[command(subcommand)]
    pub command: Option<Command>,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// Target database name
    #[arg(long, env = "MONGODB_DB", default_value = "zbiRepo")]
    pub mongodb_db: String,

    /// Store backend; `memory` performs a dry run against an empty in-memory store
    #[arg(long, env = "REPO_STORE", value_enum, default_value_t = StoreKind::Mongo)]
    pub store: StoreKind,

    /// Server selection and connect timeout in milliseconds
    #[arg(long, env = "CONNECT_TIMEOUT_MS", default_value = "3000")]
    pub connect_timeout_ms: u64,

    /// Administrative principal configuration
    #[command(flatten)]
    pub admin: AdminArgs,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Administrative principal configuration
#[derive(Parser, Debug, Clone)]
pub struct AdminArgs {
    /// Username of the read-write principal
    #[arg(long, env = "REPO_ADMIN_USER", default_value = "zbiadmin")]
    pub admin_user: String,

    /// Password of the read-write principal
    #[arg(long, env = "REPO_ADMIN_PASSWORD", hide_env_values = true)]
    pub admin_password: Option<String>,

    /// File holding the password (e.g. a mounted secret)
    #[arg(long, env = "REPO_ADMIN_PASSWORD_FILE", conflicts_with = "admin_password")]
    pub admin_password_file: Option<PathBuf>,

    /// Do not create or check the principal
    #[arg(long, env = "REPO_SKIP_PRINCIPAL", default_value = "false")]
    pub skip_principal: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create the principal, collections and unique indexes if absent
    Init,
    /// Report drift between the declared schema and the store, without changes
    Verify,
    /// Provision, then load users, keys, teams and members from a YAML file
    Seed {
        /// Seed file path
        #[arg(env = "REPO_SEED_FILE")]
        file: PathBuf,
    },
    /// Delete every record from the declared collections, keeping indexes
    Purge {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
    /// Drop the declared collections and their indexes
    Drop {
        /// Confirm the drop
        #[arg(long)]
        yes: bool,
    },
    /// Count records in each declared collection
    Counts,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Mongo,
    Memory,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl Args {
    /// Selected command, `init` when none was given
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Init)
    }

    /// Whether the selected command provisions the principal
    fn needs_principal(&self) -> bool {
        !self.admin.skip_principal && matches!(self.command(), Command::Init | Command::Seed { .. })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.mongodb_db.is_empty() {
            return Err(RepoInitError::Config("MONGODB_DB must not be empty".to_string()));
        }

        if self.mongodb_db.contains(['/', '\\', '.', ' ', '"', '$']) {
            return Err(RepoInitError::Config(format!(
                "invalid database name '{}'",
                self.mongodb_db
            )));
        }

        if self.needs_principal() {
            if self.admin.admin_user.is_empty() {
                return Err(RepoInitError::Config("REPO_ADMIN_USER must not be empty".to_string()));
            }
            if self.admin.admin_password.is_none() && self.admin.admin_password_file.is_none() {
                return Err(RepoInitError::Config(
                    "REPO_ADMIN_PASSWORD or REPO_ADMIN_PASSWORD_FILE is required (or pass --skip-principal)"
                        .to_string(),
                ));
            }
        }

        match self.command() {
            Command::Purge { yes: false } => Err(RepoInitError::Config(
                "purge deletes every record; pass --yes to confirm".to_string(),
            )),
            Command::Drop { yes: false } => Err(RepoInitError::Config(
                "drop removes every collection; pass --yes to confirm".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Build the principal to provision, or `None` when it is skipped
    pub fn admin_principal(&self) -> Result<Option<AdminPrincipal>> {
        if !self.needs_principal() {
            return Ok(None);
        }

        let password = match (&self.admin.admin_password, &self.admin.admin_password_file) {
            (Some(password), _) => password.clone(),
            (None, Some(path)) => std::fs::read_to_string(path)
                .map_err(|e| {
                    RepoInitError::Config(format!("cannot read {}: {}", path.display(), e))
                })?
                .trim_end_matches(['\r', '\n'])
                .to_string(),
            (None, None) => {
                return Err(RepoInitError::Config(
                    "no admin password configured".to_string(),
                ))
            }
        };

        if password.is_empty() {
            return Err(RepoInitError::Config("admin password must not be empty".to_string()));
        }

        Ok(Some(AdminPrincipal::new(
            self.admin.admin_user.clone(),
            password,
            self.mongodb_db.clone(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(args: &[&str]) -> Args {
        let mut full = vec!["repo-init"];
        full.extend_from_slice(args);
        Args::try_parse_from(full).unwrap()
    }

    #[test]
    fn test_defaults_to_init() {
        let args = parse(&["--admin-password", "pw"]);
        assert_eq!(args.command(), Command::Init);
        assert_eq!(args.mongodb_db, "zbiRepo");
        assert_eq!(args.admin.admin_user, "zbiadmin");
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_init_requires_password() {
        let mut args = parse(&["--mongodb-db", "otherRepo", "init"]);
        // REPO_ADMIN_* in the test environment must not satisfy the check
        args.admin.admin_password = None;
        args.admin.admin_password_file = None;
        args.admin.skip_principal = false;
        assert!(matches!(args.validate(), Err(RepoInitError::Config(_))));
    }

    #[test]
    fn test_skip_principal_needs_no_password() {
        let args = parse(&["--skip-principal", "init"]);
        assert!(args.validate().is_ok());
        assert!(args.admin_principal().unwrap().is_none());
    }

    #[test]
    fn test_verify_needs_no_password() {
        let args = parse(&["verify"]);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_destructive_commands_need_confirmation() {
        assert!(parse(&["purge"]).validate().is_err());
        assert!(parse(&["purge", "--yes"]).validate().is_ok());
        assert!(parse(&["drop"]).validate().is_err());
        assert!(parse(&["drop", "--yes"]).validate().is_ok());
    }

    #[test]
    fn test_invalid_database_name() {
        let args = parse(&["--mongodb-db", "bad.name", "verify"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_password_file_is_trimmed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "s3cret").unwrap();

        let args = parse(&[
            "--admin-password-file",
            file.path().to_str().unwrap(),
            "init",
        ]);
        let principal = args.admin_principal().unwrap().unwrap();
        assert_eq!(principal.password.as_str(), "s3cret");
        assert_eq!(principal.database, "zbiRepo");
    }

    #[test]
    fn test_memory_store_flag() {
        let args = parse(&["--store", "memory", "--skip-principal"]);
        assert_eq!(args.store, StoreKind::Memory);
    }
}
