//! bootstrap-config
//!
//! Merges INI sources into the process-wide configuration store and
//! prints the requested part of it as JSON.

use anyhow::Result;
use bootstrap_config::cli::{ClassMode, Cli};
use bootstrap_config::config::{Address, ConfigStore, INCLUDE_PATH, StoreOptions};
use bootstrap_config::constants;
use bootstrap_config::error::ConfigError;
use bootstrap_config::logging::{self, LogTarget};
use bootstrap_config::resolver::{ClassResolver, ResolveMode};
use bootstrap_config::runtime::ProcessSnapshot;
use clap::Parser;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let target: LogTarget = cli.log.parse()?;
    logging::init(&target, cli.verbose)?;

    let mut options = StoreOptions::from_env();
    if cli.export_constants {
        options.export_constants = true;
    }
    let store = ConfigStore::global_with(|| {
        ConfigStore::with_constant_table(
            Arc::new(ProcessSnapshot::discover()),
            options,
            constants::global(),
        )
    });

    match run(&cli, &store).await {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            let report = serde_json::to_string(&e.report())
                .unwrap_or_else(|_| json!({ "error": e.to_string() }).to_string());
            eprintln!("{}", report);
            std::process::exit(1);
        }
    }
}

async fn run(cli: &Cli, store: &Arc<ConfigStore>) -> Result<String, ConfigError> {
    if let Some(local) = &cli.include_path {
        // Merges into the directive, keeping its global value.
        store.set(INCLUDE_PATH, json!({ "local_value": local }));
    }

    for source in &cli.sources {
        debug!(source = %source, "Merging source");
        store.parse(source.as_str())?;
    }

    if cli.stdin {
        let deadline = Duration::from_millis(cli.stdin_timeout_ms);
        store
            .parse_with_deadline(std::io::stdin(), deadline)
            .await?;
    }

    if cli.export_constants {
        let defined = store.define_scalar_constants();
        info!(defined, "Constants exported");
    }

    if let Some(class) = &cli.class {
        let mode = match cli.class_mode {
            ClassMode::Strict => ResolveMode::FailFast,
            ClassMode::Lenient => ResolveMode::BestEffort,
        };
        let resolver = ClassResolver::with_include_once(Arc::clone(store)).with_mode(mode);
        let file = resolver.resolve(class)?;
        return Ok(json!({ "class": class, "file": file }).to_string());
    }

    if cli.peek {
        return Ok(serde_json::to_string(&store.peek())?);
    }

    let address = match (&cli.key, cli.path.is_empty()) {
        (Some(key), _) => Address::key(key.as_str()),
        (None, false) => Address::path(cli.path.iter().map(String::as_str)),
        (None, true) => Address::Root,
    };

    if cli.pretty {
        store.to_json_pretty(address)
    } else {
        store.to_json(address)
    }
}
