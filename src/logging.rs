#![forbid(unsafe_code)]

use anyhow::{Result, anyhow};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Binary crates log under their own target names.
const OWN_TARGETS: [&str; 4] = ["crosspost_tools", "sync_channel", "reconcile_db", "scheduler"];

/// Default directives: our targets at `level`, dependencies at warn.
fn default_directives(level: &str) -> String {
    let mut directives = String::from("warn");
    for target in OWN_TARGETS {
        directives.push_str(&format!(",{target}={level}"));
    }
    directives
}

/// Builds the filter from `RUST_LOG` when set, otherwise from the defaults.
pub fn build_filter(verbose: bool) -> Result<EnvFilter> {
    let level = if verbose { "debug" } else { "info" };
    match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(directives)
            .map_err(|err| anyhow!("invalid RUST_LOG: {err}")),
        _ => EnvFilter::try_new(default_directives(level))
            .map_err(|err| anyhow!("invalid log filter: {err}")),
    }
}

/// Timestamped human-readable lines on stderr. Safe to call once per
/// process; a second call reports an error.
pub fn init_logging(verbose: bool) -> Result<()> {
    let filter = build_filter(verbose)?;
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|err| anyhow!("failed to initialize logging: {err}"))
}
