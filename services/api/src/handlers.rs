//! Axum Handlers for the REST API
//!
//! The fallback endpoint: one learner message in, one tutor reply out.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::{error, info, instrument};
use tutorchat_core::{
    identity::SessionIdentity,
    protocol::{FallbackRequest, FallbackResponse},
};

use crate::state::AppState;

pub enum ApiError {
    BadRequest(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(FallbackResponse::failure(message))).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(FallbackResponse::failure(
                        "The tutor could not answer right now.",
                    )),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

/// Answers one learner message sent through the fallback endpoint.
#[instrument(name = "fallback_chat", skip_all, fields(user = %payload.user_name, provider = ?state.config.provider))]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<FallbackRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".to_string()));
    }

    let identity = SessionIdentity::new(payload.user_name, payload.language);
    let reply = state
        .tutor
        .reply(&identity, &payload.conversation_history, &payload.message)
        .await?;
    info!(turns = payload.conversation_history.len(), "Fallback message answered.");

    Ok((StatusCode::OK, Json(FallbackResponse::reply(reply))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Provider};
    use async_trait::async_trait;
    use tracing::Level;
    use tutorchat_core::{
        protocol::HistoryTurn,
        tutor::{EchoTutor, TutorAgent},
    };

    struct FailingTutor;

    #[async_trait]
    impl TutorAgent for FailingTutor {
        async fn reply(
            &self,
            _identity: &SessionIdentity,
            _history: &[HistoryTurn],
            _message: &str,
        ) -> anyhow::Result<String> {
            anyhow::bail!("model unavailable")
        }
    }

    fn app_state(tutor: Arc<dyn TutorAgent>) -> Arc<AppState> {
        Arc::new(AppState {
            tutor,
            config: Arc::new(Config {
                bind_address: "127.0.0.1:0".parse().unwrap(),
                provider: Provider::Echo,
                openai_api_key: None,
                gemini_api_key: None,
                chat_model: "gpt-4o".to_string(),
                log_level: Level::INFO,
            }),
        })
    }

    async fn body_of(response: Response) -> FallbackResponse {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn request(message: &str, history: Vec<HistoryTurn>) -> FallbackRequest {
        FallbackRequest::new(message, &SessionIdentity::new("Ana", "Spanish"), history)
    }

    #[tokio::test]
    async fn test_chat_returns_tutor_reply() {
        let response = chat(
            State(app_state(Arc::new(EchoTutor))),
            Json(request("Hello", vec![])),
        )
        .await
        .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_of(response).await;
        assert_eq!(body.into_result(), Ok("Hi Ana! You said: Hello".to_string()));
    }

    #[tokio::test]
    async fn test_chat_passes_history_to_tutor() {
        let history = vec![HistoryTurn::user("Hello"), HistoryTurn::bot("Hi Ana!")];
        let response = chat(
            State(app_state(Arc::new(EchoTutor))),
            Json(request("How are you?", history)),
        )
        .await
        .into_response();

        let body = body_of(response).await;
        assert_eq!(body.into_result(), Ok("You said: How are you?".to_string()));
    }

    #[tokio::test]
    async fn test_chat_tutor_failure_is_500() {
        let response = chat(
            State(app_state(Arc::new(FailingTutor))),
            Json(request("Hello", vec![])),
        )
        .await
        .into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_of(response).await;
        assert!(!body.success);
        assert!(body.error.is_some());
    }

    #[tokio::test]
    async fn test_chat_rejects_empty_message() {
        let response = chat(
            State(app_state(Arc::new(EchoTutor))),
            Json(request("  ", vec![])),
        )
        .await
        .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
