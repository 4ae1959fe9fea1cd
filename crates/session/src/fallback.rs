//! Fallback Request Channel
//!
//! Delivers one message and receives one reply over plain HTTP, carrying the
//! same logical payload the duplex channel would. Used only when the channel
//! is not open; never retried automatically.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use tutorchat_core::protocol::{FallbackRequest, FallbackResponse};

/// Upper bound on one fallback round trip.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors raised by a fallback request.
#[derive(Debug, thiserror::Error)]
pub enum FallbackError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Server error (status {status:?}): {message}")]
    Server { status: Option<u16>, message: String },
}

/// Sends one message through the request/response endpoint.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FallbackChannel: Send + Sync {
    /// Sends `payload` and returns the agent's reply text.
    async fn request(&self, payload: FallbackRequest) -> Result<String, FallbackError>;
}

/// A `FallbackChannel` that POSTs JSON to a fixed URL.
#[derive(Debug, Clone)]
pub struct HttpFallback {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpFallback {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, FallbackError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self::with_client(client, endpoint))
    }

    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl FallbackChannel for HttpFallback {
    #[instrument(name = "fallback_request", skip_all, fields(endpoint = %self.endpoint))]
    async fn request(&self, payload: FallbackRequest) -> Result<String, FallbackError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(status = status.as_u16(), "Fallback response received.");

        let parsed: FallbackResponse = serde_json::from_str(&body).map_err(|e| {
            warn!(status = status.as_u16(), error = %e, "Unreadable fallback response body.");
            FallbackError::Server {
                status: Some(status.as_u16()),
                message: format!("unreadable response body: {}", e),
            }
        })?;

        parsed.into_result().map_err(|message| FallbackError::Server {
            status: Some(status.as_u16()),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tutorchat_core::{identity::SessionIdentity, protocol::HistoryTurn};
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_json, method, path},
    };

    fn payload() -> FallbackRequest {
        FallbackRequest::new(
            "How are you?",
            &SessionIdentity::new("Ana", "Spanish"),
            vec![HistoryTurn::user("Hello"), HistoryTurn::bot("Hi!")],
        )
    }

    #[tokio::test]
    async fn test_successful_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_json(json!({
                "message": "How are you?",
                "userName": "Ana",
                "language": "Spanish",
                "conversationHistory": [
                    { "sender": "user", "text": "Hello" },
                    { "sender": "bot", "text": "Hi!" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": { "response": "I'm well, thanks!" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let endpoint = format!("{}/api/chat", server.uri());
        let fallback = HttpFallback::new(endpoint.as_str()).unwrap();
        assert_eq!(fallback.endpoint(), endpoint);
        let reply = fallback.request(payload()).await.unwrap();
        assert_eq!(reply, "I'm well, thanks!");
    }

    #[tokio::test]
    async fn test_reported_failure_is_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "success": false,
                "error": "model overloaded"
            })))
            .mount(&server)
            .await;

        let fallback = HttpFallback::new(format!("{}/api/chat", server.uri())).unwrap();
        let err = fallback.request(payload()).await.unwrap_err();
        match err {
            FallbackError::Server { status, message } => {
                assert_eq!(status, Some(500));
                assert_eq!(message, "model overloaded");
            }
            other => panic!("Expected Server error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreadable_body_is_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(&server)
            .await;

        let fallback = HttpFallback::new(server.uri()).unwrap();
        let err = fallback.request(payload()).await.unwrap_err();
        assert!(matches!(
            err,
            FallbackError::Server {
                status: Some(502),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_network_error() {
        // Bind then drop to get a port nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let fallback = HttpFallback::new(format!("http://{}/api/chat", addr)).unwrap();
        let err = fallback.request(payload()).await.unwrap_err();
        assert!(matches!(err, FallbackError::Network(_)));
    }
}
