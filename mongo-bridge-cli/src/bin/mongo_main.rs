use anyhow::{Context, Result};
use clap::Parser;
use mongo_bridge_cli::{load_config, open_database, CommonArgs};
use mongo_bridge_core::{log_info, run_exercise};
use std::io::{self, Write};

#[derive(Parser)]
#[command(name = "mongo-main")]
#[command(about = "Insert/query round-trip against the 'test' collection")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.common)?;

    let db = open_database(&config);
    log_info!("running exercise against database '{}'", db.name());

    let stdout = io::stdout();
    let mut out = stdout.lock();
    run_exercise(&db, &mut out).context("Exercise failed")?;
    out.flush()?;
    Ok(())
}
