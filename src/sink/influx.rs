//! Influx line protocol sink over HTTP

use super::MetricSink;
use crate::defaults;
use crate::error::{AppError, Result, SinkError};
use crate::logging::SinkLogger;
use crate::models::{Credentials, SinkPayload};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};

pub const INFLUX_CONTENT_TYPE: &str = "application/influx";
pub const AUTH_EMAIL_HEADER: &str = "X-CH-Auth-Email";
pub const AUTH_TOKEN_HEADER: &str = "X-CH-Auth-API-Token";

/// POSTs each payload as its own request to the payload's target URL
pub struct InfluxSink {
    client: Client,
    url: String,
    credentials: Credentials,
    logger: Option<SinkLogger>,
}

impl InfluxSink {
    pub fn new<S: Into<String>>(url: S, credentials: Credentials) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(defaults::SINK_CONNECT_TIMEOUT)
            .timeout(defaults::SINK_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
            credentials,
            logger: None,
        })
    }

    pub fn with_logger(mut self, logger: SinkLogger) -> Self {
        self.logger = Some(logger);
        self
    }
}

#[async_trait]
impl MetricSink for InfluxSink {
    async fn send(&self, payload: &SinkPayload) -> std::result::Result<(), SinkError> {
        if let Some(logger) = &self.logger {
            logger.sending(&payload.target, &payload.body).await;
        }

        let response = self
            .client
            .post(&payload.target)
            .header(CONTENT_TYPE, INFLUX_CONTENT_TYPE)
            .header(AUTH_EMAIL_HEADER, &self.credentials.email)
            .header(AUTH_TOKEN_HEADER, &self.credentials.api_token)
            .body(payload.body.clone())
            .send()
            .await
            .map_err(|e| SinkError::Request { target: payload.target.clone(), message: e.to_string() })?;

        let status = response.status();
        // Drain the body before the connection goes back to the pool
        let body = response.text().await.unwrap_or_default();

        if let Some(logger) = &self.logger {
            logger.response(&payload.target, status.as_u16(), &body).await;
        }

        if status != StatusCode::OK {
            return Err(SinkError::UnexpectedStatus { status: status.as_u16(), body });
        }
        Ok(())
    }

    fn target(&self) -> &str {
        &self.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LINE: &str =
        "bandwidth,testType=bandwidth.download,iperfDestination=host1,iperfSource=probe-01 iperfResultsBps=12345000";

    fn credentials() -> Credentials {
        Credentials {
            email: "ops@example.com".to_string(),
            api_token: "token-123".to_string(),
        }
    }

    fn payload(server: &MockServer) -> SinkPayload {
        SinkPayload { target: format!("{}/write", server.uri()), body: LINE.to_string() }
    }

    #[tokio::test]
    async fn test_posts_line_with_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/write"))
            .and(header("Content-Type", "application/influx"))
            .and(header("X-CH-Auth-Email", "ops@example.com"))
            .and(header("X-CH-Auth-API-Token", "token-123"))
            .and(body_string(LINE))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let sink = InfluxSink::new(format!("{}/write", server.uri()), credentials()).unwrap();
        sink.send(&payload(&server)).await.unwrap();
    }

    #[tokio::test]
    async fn test_server_error_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("write failed"))
            .mount(&server)
            .await;

        let sink = InfluxSink::new(format!("{}/write", server.uri()), credentials()).unwrap();
        let err = sink.send(&payload(&server)).await.unwrap_err();

        assert_eq!(err.to_string(), "unexpected status code: 500");
        match err {
            SinkError::UnexpectedStatus { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "write failed");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_other_success_codes_are_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let sink = InfluxSink::new(format!("{}/write", server.uri()), credentials()).unwrap();
        let err = sink.send(&payload(&server)).await.unwrap_err();
        assert!(matches!(err, SinkError::UnexpectedStatus { status: 204, .. }));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_request_error() {
        // Bind and drop to get a port nobody listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/write", listener.local_addr().unwrap());
        drop(listener);

        let sink = InfluxSink::new(url.clone(), credentials()).unwrap();
        let err = sink
            .send(&SinkPayload { target: url, body: LINE.to_string() })
            .await
            .unwrap_err();
        assert!(matches!(err, SinkError::Request { .. }), "{:?}", err);
        assert_eq!(err.kind(), "request");
    }

    #[tokio::test]
    async fn test_payload_target_is_where_the_line_goes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/write"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let sink = InfluxSink::new("http://influx.invalid/write", credentials()).unwrap();
        sink.send(&payload(&server)).await.unwrap();
        assert_eq!(sink.target(), "http://influx.invalid/write");
    }
}
