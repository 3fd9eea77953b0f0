//! Logging setup.

use nyra_core::config::{GeneralConfig, LogFormat};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Target of the per-request dispatch event.
pub const DISPATCH_TARGET: &str = "nyra::dispatch";

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence; otherwise the configured level applies to
/// the Nyra crates and `warn` to everything else.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_logging(config: &GeneralConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    let level = &config.log_level;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("nyra={level},nyra_core={level},nyra_infer={level},warn"))
    });

    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(false),
            )
            .try_init(),
    }
}
