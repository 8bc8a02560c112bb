//! Metric sinks
//!
//! Sinks are write-only: each payload is sent at most once and a failed send
//! is reported to the caller, not retried or queued.

pub mod graphite;
pub mod influx;
pub mod record;

pub use graphite::GraphiteSink;
pub use influx::InfluxSink;

use crate::error::{Result, SinkError};
use crate::logging::{Logger, SinkLogger};
use crate::models::{ResolvedConfig, SinkConfig, SinkPayload};
use async_trait::async_trait;
use std::sync::Arc;

/// Delivers formatted payloads to a metrics backend
#[async_trait]
pub trait MetricSink: Send + Sync {
    async fn send(&self, payload: &SinkPayload) -> std::result::Result<(), SinkError>;

    /// Address or URL the sink writes to
    fn target(&self) -> &str;
}

/// Build the sink selected by the configuration
pub fn build_sink(config: &ResolvedConfig, logger: &Logger) -> Result<Arc<dyn MetricSink>> {
    let sink_logger = SinkLogger::new(logger);
    let sink: Arc<dyn MetricSink> = match &config.sink {
        SinkConfig::Graphite { address } => Arc::new(GraphiteSink::new(address.clone()).with_logger(sink_logger)),
        SinkConfig::Influx { url, credentials } => {
            Arc::new(InfluxSink::new(url.clone(), credentials.clone())?.with_logger(sink_logger))
        }
    };
    Ok(sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Credentials;

    #[test]
    fn test_build_graphite_sink() {
        let config = ResolvedConfig {
            sink: SinkConfig::Graphite { address: "carbon.example.com:2003".to_string() },
            ..Default::default()
        };
        let sink = build_sink(&config, &Logger::new("TEST")).unwrap();
        assert_eq!(sink.target(), "carbon.example.com:2003");
    }

    #[test]
    fn test_build_influx_sink() {
        let config = ResolvedConfig {
            sink: SinkConfig::Influx {
                url: "https://influx.example.com/api/v2/write".to_string(),
                credentials: Credentials::default(),
            },
            ..Default::default()
        };
        let sink = build_sink(&config, &Logger::new("TEST")).unwrap();
        assert_eq!(sink.target(), "https://influx.example.com/api/v2/write");
    }
}
