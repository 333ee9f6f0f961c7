//! Tracing subscriber setup

use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Build the filter: `RUST_LOG` wins, otherwise the configured level
#[must_use]
pub fn env_filter(logging: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "meteo_aggregator={level},meteo={level},tower_http=warn,{level}",
            level = logging.level
        ))
    })
}

/// Install the global subscriber in pretty or json format
pub fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(logging))
        .with_writer(std::io::stderr);

    let installed = if logging.format == "json" {
        builder.json().with_current_span(true).try_init()
    } else {
        builder.pretty().try_init()
    };
    installed.map_err(|e| anyhow!("Failed to install tracing subscriber: {e}"))?;

    tracing::debug!("tracing initialized ({} / {})", logging.level, logging.format);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_uses_configured_level() {
        let logging = LoggingConfig {
            level: "debug".into(),
            format: "json".into(),
        };
        if std::env::var("RUST_LOG").is_err() {
            assert!(env_filter(&logging).to_string().contains("meteo_aggregator=debug"));
        }
    }
}
