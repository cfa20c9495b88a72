//! Log output setup

use crate::error::{AppError, AppResult};
use tracing_subscriber::{
    Layer, filter::EnvFilter, filter::LevelFilter, fmt, layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over the verbosity flag. With `console` off
/// nothing is written, which keeps the monitor screen intact.
pub fn init(verbose: bool, console: bool) -> AppResult<()> {
    let default_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let console_layer = console.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(filter)
    });

    tracing_subscriber::registry()
        .with(console_layer)
        .try_init()
        .map_err(|e| AppError::Config(format!("Failed to install logger: {}", e)))
}
