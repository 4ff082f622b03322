use anyhow::{Context, Result};
use clap::Parser;
use mongo_bridge_cli::{host_scope, load_config, CommonArgs};
use mongo_bridge_core::{log_debug, process_slot, run_scope_binder};
use std::io::{self, Write};

#[derive(Parser)]
#[command(name = "scope-binder-main")]
#[command(about = "Bind the host scope's 'db' symbol into the process slot")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    /// Bind 'db' to this JSON value instead of a database handle
    #[arg(long)]
    db_json: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.common)?;
    let scope = host_scope(&config, cli.db_json.as_deref())?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let db = run_scope_binder(&scope, process_slot(), &mut out)
        .context("Failed to bind database from scope")?;
    out.flush()?;

    log_debug!("process slot now holds '{}'", db.name());
    Ok(())
}
