//! repo-init - provision the repository database schema

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use repo_init::config::{Args, LogFormat};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    init_tracing(&args);

    info!(
        command = ?args.command(),
        database = %args.mongodb_db,
        store = ?args.store,
        "repo-init starting"
    );

    match repo_init::run(&args).await {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output.summary)?);
            if !output.ok {
                std::process::exit(1);
            }
            Ok(())
        }
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}

/// Logs go to stderr so stdout carries only the JSON summary
fn init_tracing(args: &Args) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("repo_init={},info", args.log_level).into());

    let registry = tracing_subscriber::registry().with(filter);
    match args.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}
