// Shared command-line plumbing for the two entry programs

use anyhow::{Context, Result};
use clap::Args;
use mongo_bridge_core::scope::DB_SYMBOL;
use mongo_bridge_core::{
    set_log_level, AmbientScope, BridgeConfig, DatabaseFacade, LogLevel, MemoryFactory,
};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

/// Flags every entry program accepts
#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    /// Properties file (defaults to ./10gen.properties when present)
    #[arg(long)]
    pub properties: Option<PathBuf>,
    /// Log level: error, warn, info, debug, trace
    #[arg(long)]
    pub log_level: Option<String>,
}

/// Resolve configuration and apply its log level
pub fn load_config(args: &CommonArgs) -> Result<BridgeConfig> {
    let mut config = BridgeConfig::load(args.properties.as_deref())
        .context("Failed to load bridge configuration")?;

    if let Some(level) = &args.log_level {
        config.log_level = level
            .parse::<LogLevel>()
            .with_context(|| format!("Invalid --log-level: {}", level))?;
    }
    set_log_level(config.log_level);
    Ok(config)
}

/// Facade backed by the in-process client, named and namespaced per config
pub fn open_database(config: &BridgeConfig) -> Arc<DatabaseFacade> {
    DatabaseFacade::new(
        config.display_name.clone(),
        MemoryFactory::new(config.namespace.clone()),
    )
}

/// Scope as a host would hand it over: `db` bound to a database handle,
/// or to a plain script value when `db_json` is given
pub fn host_scope(config: &BridgeConfig, db_json: Option<&str>) -> Result<AmbientScope> {
    let scope = match db_json {
        Some(raw) => {
            let value: Value = serde_json::from_str(raw)
                .with_context(|| format!("--db-json is not valid JSON: {}", raw))?;
            AmbientScope::new().with(DB_SYMBOL, value)
        }
        None => AmbientScope::new().with(DB_SYMBOL, open_database(config)),
    };
    Ok(scope)
}
