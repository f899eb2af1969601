mod api;
mod auth;
mod cli;
mod directory;
mod gateway;
mod router;
mod startup;
mod state;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use oncall_core::{Config, RotationStore};

use crate::cli::{CliArgs, Command};
use crate::directory::FileDirectory;

fn load_config() -> Config {
    oncall_core::config::load_dotenv();
    Config::from_env()
}

/// Print the effective assignee of one rotation and its next transition.
async fn on_call(config: &Config, rotation_id: &str, at: Option<DateTime<Utc>>) -> anyhow::Result<()> {
    let directory = FileDirectory::new(&config.storage.directory_file);
    let rotation = directory
        .get_rotation(rotation_id)
        .await?
        .filter(|r| !r.deleted)
        .with_context(|| format!("rotation not found: {rotation_id}"))?;
    rotation.validate()?;

    let view = api::on_call_view(&rotation, at.unwrap_or_else(Utc::now));
    println!("{} ({})", view.name, view.rotation_id);
    println!("  at:        {}", view.at.to_rfc3339());
    println!("  on call:   {}", view.assignee.as_deref().unwrap_or("Unassigned"));
    if let Some(override_id) = &view.override_id {
        println!(
            "  override:  {} (rotation order: {})",
            override_id,
            view.base_assignee.as_deref().unwrap_or("-")
        );
    }
    match view.next_transition {
        Some(next) => println!("  next:      {} ({})", next.time.to_rfc3339(), next.reason.phrase()),
        None => println!("  next:      none scheduled"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            config.log_summary();
            startup::serve(config).await
        }
        Command::OnCall { rotation_id, at } => on_call(&config, &rotation_id, at).await,
    }
}
