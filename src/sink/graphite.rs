//! Carbon plaintext sink over TCP

use super::MetricSink;
use crate::defaults;
use crate::error::SinkError;
use crate::logging::SinkLogger;
use crate::models::SinkPayload;
use async_trait::async_trait;
use std::io;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Opens a fresh connection to the payload's target for every payload
pub struct GraphiteSink {
    address: String,
    connect_timeout: Duration,
    logger: Option<SinkLogger>,
}

impl GraphiteSink {
    pub fn new<S: Into<String>>(address: S) -> Self {
        Self {
            address: address.into(),
            connect_timeout: defaults::SINK_CONNECT_TIMEOUT,
            logger: None,
        }
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn with_logger(mut self, logger: SinkLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    async fn connect(&self, target: &str) -> Result<TcpStream, SinkError> {
        let connect_error = |source: io::Error| SinkError::Connect { target: target.to_string(), source };
        match timeout(self.connect_timeout, TcpStream::connect(target)).await {
            Ok(result) => result.map_err(connect_error),
            Err(_) => Err(connect_error(io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))),
        }
    }
}

#[async_trait]
impl MetricSink for GraphiteSink {
    async fn send(&self, payload: &SinkPayload) -> Result<(), SinkError> {
        if let Some(logger) = &self.logger {
            logger.sending(&payload.target, &payload.body).await;
        }

        let mut stream = self.connect(&payload.target).await?;
        let write_error = |source: io::Error| SinkError::Write { target: payload.target.clone(), source };

        stream.write_all(payload.body.as_bytes()).await.map_err(write_error)?;
        stream.shutdown().await.map_err(write_error)?;
        Ok(())
    }

    fn target(&self) -> &str {
        &self.address
    }
}
