//! Tracing subscriber initialization

use segments_core::{ConfigError, LogConfig, SegmentsError, SegmentsResult};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `config.filter` when set. Call once at startup; a
/// second call returns an error instead of replacing the subscriber.
pub fn init_tracing(config: &LogConfig) -> SegmentsResult<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.filter).map_err(|e| {
            SegmentsError::Config(ConfigError::InvalidValue {
                field: "log.filter".to_string(),
                value: config.filter.clone(),
                reason: e.to_string(),
            })
        })?,
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if config.json {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    result.map_err(|e| {
        SegmentsError::Config(ConfigError::InvalidValue {
            field: "log".to_string(),
            value: config.filter.clone(),
            reason: format!("Failed to init subscriber: {}", e),
        })
    })?;

    tracing::info!(filter = %config.filter, json = config.json, "Tracing initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_an_error() {
        let config = LogConfig::default();
        // Another test in this binary may already own the global subscriber
        let _ = init_tracing(&config);
        assert!(matches!(
            init_tracing(&config),
            Err(SegmentsError::Config(_))
        ));
    }
}
