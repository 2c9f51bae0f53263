use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{Result, config::LoggingConfig};

const DEFAULT_FILTER: &str = "info,reqwest=warn,hyper=warn,hyper_util=warn";

/// Logs go to stderr so command output on stdout stays pipeable.
pub fn init_logging(logging_config: &LoggingConfig) -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(logging_config.ansi)
                .with_writer(std::io::stderr),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)))
        .try_init()
        .map_err(|e| crate::Error::Logging(format!("Failed to install subscriber: {e}")))
}
