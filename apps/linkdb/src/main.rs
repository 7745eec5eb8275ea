//! # linkdb
//!
//! The command-line client for the linkdb associative triple store.
//!
//! ## Usage
//!
//! ```bash
//! # Create two links, then swap source and target of every link
//! linkdb query '() ((1 1) (1 2))'
//! linkdb query --after '(($i: $s $t)) (($i: $t $s))'
//!
//! # Inspect
//! linkdb list
//! linkdb structure 2
//! linkdb --json-mode status
//! ```

use clap::Parser;
use linkdb::cli::{self, Cli};
use linkdb::config::{Config, LogFormat, Settings};
use linkdb::tracer::ENGINE_TARGET;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    let cli = Cli::parse();

    // A broken config is reported once logging is up.
    let loaded = Config::load(cli.config.as_deref());
    let settings = Settings::resolve(
        &cli.overrides(),
        loaded.as_ref().unwrap_or(&Config::default()),
    );

    init_tracing(&cli, &settings);

    let result = loaded.and_then(|_| cli::execute(cli.command, &settings));
    if let Err(e) = result {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing. `LINKDB_LOG_FORMAT=json` enables machine-parseable
/// output and `RUST_LOG` replaces the configured filter.
fn init_tracing(cli: &Cli, settings: &Settings) {
    let log_format = std::env::var("LINKDB_LOG_FORMAT")
        .map(|value| LogFormat::from_env_value(&value))
        .unwrap_or(settings.log_format);

    let mut directives = settings.log_filter.clone();
    if cli.verbose {
        directives.push_str(",linkdb=debug");
    }
    if cli.trace {
        directives.push_str(&format!(",{}=debug", ENGINE_TARGET));
    }
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));

    match log_format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
