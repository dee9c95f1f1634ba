//! services/app/src/adapters/chat_llm.rs
//!
//! This module contains the adapter for the streaming chat completion
//! endpoint. It implements the `CompletionService` port from the `core`
//! crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use studio_core::domain::Role;
use studio_core::ports::{
    CompletionRequest, CompletionService, CompletionStream, PortError, PortResult,
};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `CompletionService` against an
/// OpenAI-compatible chat-completions endpoint.
#[derive(Clone)]
pub struct OpenAiChatAdapter {
    client: Client<OpenAIConfig>,
}

impl OpenAiChatAdapter {
    /// Creates a new `OpenAiChatAdapter`.
    pub fn new(client: Client<OpenAIConfig>) -> Self {
        Self { client }
    }

    fn build_messages(
        request: &CompletionRequest,
    ) -> PortResult<Vec<ChatCompletionRequestMessage>> {
        let mut messages: Vec<ChatCompletionRequestMessage> = Vec::with_capacity(
            request.messages.len() + 1,
        );
        messages.push(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(request.system.clone())
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        );
        for message in &request.messages {
            let built = match message.role {
                Role::System => ChatCompletionRequestSystemMessageArgs::default()
                    .content(message.content.clone())
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?
                    .into(),
                Role::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(message.content.clone())
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?
                    .into(),
                Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(message.content.clone())
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?
                    .into(),
            };
            messages.push(built);
        }
        Ok(messages)
    }
}

//=========================================================================================
// `CompletionService` Trait Implementation
//=========================================================================================

#[async_trait]
impl CompletionService for OpenAiChatAdapter {
    async fn stream_chat(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
    ) -> PortResult<CompletionStream> {
        let messages = Self::build_messages(&request)?;

        let wire_request = CreateChatCompletionRequestArgs::default()
            .model(&request.model)
            .messages(messages)
            .temperature(request.temperature)
            .stream(true)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let mut wire_stream = self
            .client
            .chat()
            .create_stream(wire_request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        // Adapt the wire stream to the port's chunk stream. The token is
        // checked between chunks; dropping the wire stream tears the request
        // down.
        enum Step {
            Chunk(Option<String>),
            Failed(String),
            Cancelled,
            Done,
        }

        let chunks = stream! {
            loop {
                let step = tokio::select! {
                    _ = cancel.cancelled() => Step::Cancelled,
                    next = wire_stream.next() => match next {
                        Some(Ok(response)) => Step::Chunk(
                            response
                                .choices
                                .into_iter()
                                .next()
                                .and_then(|choice| choice.delta.content),
                        ),
                        Some(Err(e)) => Step::Failed(e.to_string()),
                        None => Step::Done,
                    },
                };
                match step {
                    Step::Chunk(Some(content)) if !content.is_empty() => yield Ok(content),
                    Step::Chunk(_) => {}
                    Step::Failed(message) => {
                        yield Err(PortError::Unexpected(message));
                        return;
                    }
                    Step::Cancelled => {
                        yield Err(PortError::Aborted);
                        return;
                    }
                    Step::Done => return,
                }
            }
        };

        Ok(Box::pin(chunks))
    }
}

//=========================================================================================
// Unconfigured Fallback
//=========================================================================================

/// Stand-in completion backend used when no API key is configured. Every
/// request fails with a configuration message; the chat manager surfaces it
/// inline like any other request failure.
pub struct UnconfiguredCompletion;

#[async_trait]
impl CompletionService for UnconfiguredCompletion {
    async fn stream_chat(
        &self,
        _request: CompletionRequest,
        _cancel: CancellationToken,
    ) -> PortResult<CompletionStream> {
        Err(PortError::Unexpected(
            "OpenAI API key not configured. Set OPENAI_API_KEY in your environment.".to_string(),
        ))
    }
}
