//! Tracing subscriber setup and the process-wide fail-fast hook.

use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_tracing(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);

    match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.try_init(),
    }
    .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

/// Terminate the whole process on any panic, after logging it.
///
/// Panics inside spawned tasks would otherwise only end that task.
pub fn install_fail_fast_hook() {
    std::panic::set_hook(Box::new(|info| {
        error!(panic = %info, "Unhandled failure, terminating");
        eprintln!("Unhandled failure: {info}");
        std::process::exit(1);
    }));
}
