//! Axum Router Configuration

use crate::{handlers, state::AppState, ws::ws_handler};

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/api/chat", post(handlers::chat))
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Provider};
    use futures_util::{SinkExt, Stream, StreamExt};
    use tokio::net::TcpListener;
    use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
    use tracing::Level;
    use tutorchat_core::tutor::EchoTutor;

    async fn serve() -> std::net::SocketAddr {
        let state = Arc::new(AppState {
            tutor: Arc::new(EchoTutor),
            config: Arc::new(Config {
                bind_address: "127.0.0.1:0".parse().unwrap(),
                provider: Provider::Echo,
                openai_api_key: None,
                gemini_api_key: None,
                chat_model: "gpt-4o".to_string(),
                log_level: Level::INFO,
            }),
        });
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, create_router(state)).await.unwrap();
        });
        addr
    }

    async fn next_text<S>(ws: &mut S) -> Option<String>
    where
        S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        while let Some(message) = ws.next().await {
            match message {
                Ok(Message::Text(text)) => return Some(text.as_str().to_string()),
                Ok(Message::Close(_)) | Err(_) => return None,
                Ok(_) => continue,
            }
        }
        None
    }

    #[tokio::test]
    async fn test_ws_answers_after_handshake() {
        let addr = serve().await;
        let (mut ws, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();

        ws.send(Message::Text(r#"{"name":"Ana","language":"Spanish"}"#.into()))
            .await
            .unwrap();
        ws.send(Message::Text(r#"{"user":"Hello"}"#.into()))
            .await
            .unwrap();
        let reply: serde_json::Value =
            serde_json::from_str(&next_text(&mut ws).await.unwrap()).unwrap();
        assert_eq!(
            reply,
            serde_json::json!({ "user": "Hello", "bot": "Hi Ana! You said: Hello" })
        );

        ws.send(Message::Text(r#"{"user":"Bye"}"#.into()))
            .await
            .unwrap();
        let reply: serde_json::Value =
            serde_json::from_str(&next_text(&mut ws).await.unwrap()).unwrap();
        assert_eq!(reply["bot"], "You said: Bye");
    }

    #[tokio::test]
    async fn test_ws_closes_without_handshake() {
        let addr = serve().await;
        let (mut ws, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();

        ws.send(Message::Text(r#"{"user":"Hello"}"#.into()))
            .await
            .unwrap();
        assert_eq!(next_text(&mut ws).await, None);
    }

    #[tokio::test]
    async fn test_fallback_route_answers() {
        let addr = serve().await;
        let response = reqwest::Client::new()
            .post(format!("http://{}/api/chat", addr))
            .json(&serde_json::json!({
                "message": "Hello",
                "userName": "Ana",
                "language": "Spanish",
                "conversationHistory": []
            }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 200);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["response"], "Hi Ana! You said: Hello");
    }
}
