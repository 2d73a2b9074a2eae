//! Command dispatch
//!
//! Opens the configured store and runs the selected command, producing the
//! JSON summary the binary prints.

use serde_json::{json, Value};
use tracing::{error, info};

use crate::config::{Args, Command};
use crate::initializer::Initializer;
use crate::maintenance;
use crate::schema::COLLECTIONS;
use crate::seed::{SeedFile, Seeder};
use crate::store::{open_store, SchemaStore};
use crate::types::Result;
use crate::verify;

/// Summary of a finished command
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutput {
    pub summary: Value,
    /// False when provisioning stopped early or verify found drift
    pub ok: bool,
}

impl CommandOutput {
    fn ok(summary: Value) -> Self {
        Self { summary, ok: true }
    }
}

/// Validate `args`, connect, and run the selected command
pub async fn run(args: &Args) -> Result<CommandOutput> {
    args.validate()?;
    let principal = args.admin_principal()?;
    let store = open_store(args).await?;
    run_with_store(args, store.as_ref(), principal.as_ref()).await
}

/// Run the selected command against an already opened store
pub async fn run_with_store(
    args: &Args,
    store: &dyn SchemaStore,
    principal: Option<&crate::schema::AdminPrincipal>,
) -> Result<CommandOutput> {
    let command = args.command();
    info!(command = ?command, database = %store.database(), "Running command");

    match command {
        Command::Init => match Initializer::new(store).with_principal(principal).run().await {
            Ok(report) => Ok(CommandOutput::ok(serde_json::to_value(&report)?)),
            Err(aborted) => {
                error!(error = %aborted.error, "Schema provisioning failed");
                Ok(CommandOutput {
                    summary: serde_json::to_value(&aborted.report)?,
                    ok: false,
                })
            }
        },
        Command::Verify => {
            let user = (!args.admin.skip_principal).then_some(args.admin.admin_user.as_str());
            let findings = verify::verify_all(store, user).await?;
            Ok(CommandOutput {
                ok: findings.is_empty(),
                summary: json!({
                    "database": store.database(),
                    "findings": findings,
                }),
            })
        }
        Command::Seed { file } => {
            let seed = SeedFile::from_path(&file)?;
            let schema = match Initializer::new(store).with_principal(principal).run().await {
                Ok(report) => report,
                Err(aborted) => {
                    error!(error = %aborted.error, "Schema provisioning failed, nothing seeded");
                    return Ok(CommandOutput {
                        summary: json!({
                            "database": store.database(),
                            "schema": aborted.report.steps,
                            "failed": aborted.report.failed,
                            "records": [],
                        }),
                        ok: false,
                    });
                }
            };
            let records = Seeder::new(store).load(&seed).await?;
            Ok(CommandOutput::ok(json!({
                "database": store.database(),
                "schema": schema.steps,
                "records": records.steps,
            })))
        }
        Command::Purge { .. } => {
            let deleted = maintenance::purge(store, COLLECTIONS).await?;
            Ok(CommandOutput::ok(json!({
                "database": deleted.database,
                "deleted": deleted.collections,
            })))
        }
        Command::Drop { .. } => {
            let dropped = maintenance::drop_all(store, COLLECTIONS).await?;
            Ok(CommandOutput::ok(json!({
                "database": store.database(),
                "dropped": dropped,
            })))
        }
        Command::Counts => {
            let counts = maintenance::counts(store, COLLECTIONS).await?;
            Ok(CommandOutput::ok(serde_json::to_value(&counts)?))
        }
    }
}
