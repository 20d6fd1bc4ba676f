//! Tracing subscriber setup shared by the AnnSuraksha binaries.

use anyhow::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set. Otherwise `targets` (e.g.
/// `"annsuraksha_api,annsuraksha_ledger"`) are logged at the configured
/// level, or at `debug` together with `tower_http` and `sqlx` when `debug`
/// is set.
pub fn init(debug: bool, config: &LoggingConfig, targets: &[&str]) -> Result<()> {
    let level = if debug { "debug" } else { config.level.as_str() };
    let mut directives: Vec<String> = targets
        .iter()
        .map(|target| format!("{}={}", target, level))
        .collect();
    directives.push(format!("tower_http={}", level));
    if debug {
        directives.push("sqlx=debug".to_string());
    }

    let env_filter = if debug {
        EnvFilter::new(directives.join(","))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives.join(",")))
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    if config.format == "json" {
        registry
            .with(fmt::layer().json().with_target(true).with_line_number(true))
            .try_init()?;
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .try_init()?;
    }

    Ok(())
}
