//! Chat completion backends.

use crate::config::RagSettings;
use crate::error::{Result, TyrewiseError};
use crate::openai::create_client;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A message sent to the completion service.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Trait for chat completion.
#[async_trait]
pub trait Completer: Send + Sync {
    /// Complete the conversation in `messages`, returning the reply text.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// OpenAI chat completions.
pub struct OpenAICompleter {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl OpenAICompleter {
    /// Create a completer with the given model.
    pub fn new(model: &str, temperature: f32) -> Result<Self> {
        Ok(Self::with_client(create_client()?, model, temperature))
    }

    pub fn from_settings(settings: &RagSettings) -> Result<Self> {
        Self::new(&settings.model, settings.temperature)
    }

    /// Create a completer with a custom client.
    pub fn with_client(client: Client<OpenAIConfig>, model: &str, temperature: f32) -> Self {
        Self {
            client,
            model: model.to_string(),
            temperature,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn to_request_message(message: &ChatMessage) -> Result<ChatCompletionRequestMessage> {
        let content = message.content.clone();
        let built: ChatCompletionRequestMessage = match message.role {
            Role::System => ChatCompletionRequestSystemMessageArgs::default()
                .content(content)
                .build()
                .map_err(|e| TyrewiseError::Rag(e.to_string()))?
                .into(),
            Role::User => ChatCompletionRequestUserMessageArgs::default()
                .content(content)
                .build()
                .map_err(|e| TyrewiseError::Rag(e.to_string()))?
                .into(),
            Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                .content(content)
                .build()
                .map_err(|e| TyrewiseError::Rag(e.to_string()))?
                .into(),
        };
        Ok(built)
    }
}

#[async_trait]
impl Completer for OpenAICompleter {
    #[instrument(skip_all, fields(model = %self.model, messages = messages.len()))]
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let messages = messages
            .iter()
            .map(Self::to_request_message)
            .collect::<Result<Vec<_>>>()?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .build()
            .map_err(|e| TyrewiseError::Rag(e.to_string()))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            TyrewiseError::OpenAI(format!("Failed to generate response: {}", e))
        })?;

        let answer = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| TyrewiseError::Rag("Empty response from LLM".to_string()))?
            .clone();

        debug!("Completion of {} characters", answer.len());
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_conversion() {
        let message = ChatMessage::assistant("Torque to 700 Nm.");
        let converted = OpenAICompleter::to_request_message(&message).unwrap();
        assert!(matches!(converted, ChatCompletionRequestMessage::Assistant(_)));

        let converted = OpenAICompleter::to_request_message(&ChatMessage::system("Be safe.")).unwrap();
        assert!(matches!(converted, ChatCompletionRequestMessage::System(_)));
    }
}
