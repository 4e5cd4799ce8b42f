//! Chat-completions client for the script-writing model.
//!
//! The request/response DTOs follow the OpenAI-compatible wire shape. Both
//! invocation preconditions (temperature range, user-turn cap) are checked
//! before any network traffic.

use crate::conversation::Conversation;
use crate::error::EngineError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Handle to the generative model. Implementations must be strictly
/// sequential per call; the engine never issues overlapping invocations for
/// one session.
#[async_trait]
pub trait ModelInvoker {
    /// Send the conversation and return the assistant's reply text.
    async fn invoke(
        &self,
        conversation: &Conversation,
        temperature: f64,
        max_user_turns: Option<u32>,
    ) -> Result<String, EngineError>;
}

/// Reject invocations that violate the collaborator contract.
pub(crate) fn validate_invocation(
    conversation: &Conversation,
    temperature: f64,
    max_user_turns: Option<u32>,
) -> Result<(), EngineError> {
    if !(0.0..=1.0).contains(&temperature) {
        return Err(EngineError::InvalidTemperature(temperature));
    }
    if let Some(max) = max_user_turns {
        if conversation.user_turns() > max as usize {
            return Err(EngineError::TooManyUserTurns { max });
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f64,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    content: String,
}

/// Production invoker talking to an OpenAI-compatible endpoint.
///
/// No client-side timeout is set on the model call; the endpoint's own
/// limits apply.
pub struct OpenAiInvoker {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl OpenAiInvoker {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: DEFAULT_API_URL.to_string(),
            api_key,
            model,
        }
    }

    /// Point the invoker at a non-default endpoint (proxies, test servers).
    pub fn with_api_url(mut self, api_url: String) -> Self {
        self.api_url = api_url;
        self
    }
}

#[async_trait]
impl ModelInvoker for OpenAiInvoker {
    async fn invoke(
        &self,
        conversation: &Conversation,
        temperature: f64,
        max_user_turns: Option<u32>,
    ) -> Result<String, EngineError> {
        validate_invocation(conversation, temperature, max_user_turns)?;

        let request = ChatRequest {
            model: &self.model,
            temperature,
            messages: conversation
                .messages()
                .iter()
                .map(|message| WireMessage {
                    role: message.role.as_str(),
                    content: &message.content,
                })
                .collect(),
        };
        debug!(model = %self.model, messages = conversation.len(), "sending chat request");

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|err| EngineError::ModelApi(format!("request failed: {err}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::ModelApi(format!("API error {status}: {body}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|err| EngineError::ModelApi(format!("failed to parse response: {err}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| EngineError::ModelApi("response carried no choices".to_string()))
    }
}
