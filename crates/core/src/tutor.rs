//! Tutor agents
//!
//! The remote side of a practice conversation. The reference server answers
//! both the duplex channel and the fallback endpoint through a `TutorAgent`,
//! so either transport produces the same kind of reply.

use crate::{
    identity::SessionIdentity,
    protocol::{HistorySender, HistoryTurn},
};
use anyhow::{Context, Result};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;

/// Produces the agent's reply to one learner message.
#[async_trait]
pub trait TutorAgent: Send + Sync {
    /// Replies to `message`, given who is speaking and the turns before it.
    async fn reply(
        &self,
        identity: &SessionIdentity,
        history: &[HistoryTurn],
        message: &str,
    ) -> Result<String>;
}

/// A `TutorAgent` backed by any OpenAI-compatible chat completion API.
pub struct OpenAICompatibleTutor {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAICompatibleTutor {
    /// Creates a tutor for an OpenAI-compatible service.
    ///
    /// # Arguments
    ///
    /// * `config` - The client configuration, including API key and base URL.
    /// * `model` - The chat model identifier (e.g., "gpt-4o").
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
        }
    }
}

fn system_prompt(identity: &SessionIdentity) -> String {
    format!(
        "You are a friendly English conversation partner. The learner's name is {}. \
         Keep replies short and natural. When it helps, explain in {}.",
        identity.display_name, identity.preferred_language
    )
}

#[async_trait]
impl TutorAgent for OpenAICompatibleTutor {
    async fn reply(
        &self,
        identity: &SessionIdentity,
        history: &[HistoryTurn],
        message: &str,
    ) -> Result<String> {
        let mut messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system_prompt(identity))
                .build()?
                .into(),
        ];
        for turn in history {
            match turn.sender {
                HistorySender::User => messages.push(
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(turn.text.clone())
                        .build()?
                        .into(),
                ),
                HistorySender::Bot => messages.push(
                    ChatCompletionRequestAssistantMessageArgs::default()
                        .content(turn.text.clone())
                        .build()?
                        .into(),
                ),
            }
        }
        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(message.to_string())
                .build()?
                .into(),
        );

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .build()?;

        let response = self.client.chat().create(request).await?;
        let answer = response
            .choices
            .first()
            .context("No response choice from LLM")?
            .message
            .content
            .clone()
            .context("No content in LLM response")?;
        Ok(answer)
    }
}

/// A deterministic `TutorAgent` for local development and tests.
///
/// Greets the learner by name on the first turn and echoes afterwards.
pub struct EchoTutor;

#[async_trait]
impl TutorAgent for EchoTutor {
    async fn reply(
        &self,
        identity: &SessionIdentity,
        history: &[HistoryTurn],
        message: &str,
    ) -> Result<String> {
        if history.is_empty() {
            Ok(format!("Hi {}! You said: {}", identity.display_name, message))
        } else {
            Ok(format!("You said: {}", message))
        }
    }
}
