// Logging setup
//
// Structured logs via tracing-subscriber; the filter comes from RUST_LOG or
// LOG_LEVEL.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_LOG_FILTER: &str = "hr_workflow=debug,hr_workflow_server=debug,tower_http=debug";

#[derive(Debug, Clone, Default)]
pub struct TelemetryConfig {
    /// Log filter (e.g., "info", "hr_workflow=debug")
    pub log_filter: Option<String>,
}

impl TelemetryConfig {
    /// Create configuration from environment variables
    ///
    /// - `RUST_LOG` or `LOG_LEVEL`: log filter
    pub fn from_env() -> Self {
        Self {
            log_filter: std::env::var("RUST_LOG")
                .ok()
                .or_else(|| std::env::var("LOG_LEVEL").ok()),
        }
    }

    fn filter(&self) -> EnvFilter {
        self.log_filter
            .as_deref()
            .and_then(|f| EnvFilter::try_new(f).ok())
            .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
    }
}

/// Install the global subscriber. Returns false if one was already set.
pub fn init_telemetry(config: &TelemetryConfig) -> bool {
    tracing_subscriber::registry()
        .with(config.filter())
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_filter_falls_back_to_default() {
        let config = TelemetryConfig {
            log_filter: Some("hr_workflow=verbose".to_string()),
        };
        assert_eq!(config.filter().to_string(), EnvFilter::new(DEFAULT_LOG_FILTER).to_string());
    }

    #[test]
    fn test_custom_filter_kept() {
        let config = TelemetryConfig {
            log_filter: Some("warn".to_string()),
        };
        assert_eq!(config.filter().to_string(), EnvFilter::new("warn").to_string());
    }
}
