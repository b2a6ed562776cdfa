// Logging module - Logging infrastructure
use crate::domain::error::{NusTermError, NusTermResult};
use std::io;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter directive for the crate at the given level.
/// `--verbose` wins over the configured level.
pub fn filter_directive(level: &str, verbose: bool) -> String {
    let level = if verbose {
        "debug"
    } else {
        match level {
            "error" | "warn" | "info" | "debug" | "trace" | "off" => level,
            _ => "info",
        }
    };
    format!("nusterm={},btleplug=warn", level)
}

/// Initialize logging system. `RUST_LOG` takes precedence when set.
pub fn init_logging(level: &str, verbose: bool) -> NusTermResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(level, verbose)));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(true)
                .with_level(true)
                .with_thread_ids(false)
                .with_file(verbose)
                .with_line_number(verbose),
        )
        .try_init()
        .map_err(|e| NusTermError::Config {
            message: format!("Failed to initialize logging: {}", e),
        })?;

    tracing::debug!("NusTerm logging system initialized");
    Ok(())
}
