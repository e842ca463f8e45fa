//! Adapter from rig's `CompletionModel` to our `LlmProvider` trait.

use async_trait::async_trait;
use rig::completion::{AssistantContent, CompletionError, CompletionModel, Message};
use serde_json::{Value, json};
use tracing::debug;

use crate::error::LlmError;

use super::provider::{
    ChatMessage, CompletionRequest, CompletionResponse, LlmProvider, ResponseFormat, Role,
};

/// Wraps any rig completion model behind `LlmProvider`.
pub struct RigAdapter<M> {
    model: M,
    model_name: String,
    provider: &'static str,
}

impl<M: CompletionModel> RigAdapter<M> {
    pub fn new(model: M, model_name: &str, provider: &'static str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
            provider,
        }
    }

    fn request_failed(&self, reason: impl Into<String>) -> LlmError {
        LlmError::RequestFailed {
            provider: self.provider.to_string(),
            reason: reason.into(),
        }
    }

    fn map_error(&self, err: CompletionError) -> LlmError {
        match err {
            CompletionError::ProviderError(msg) if is_auth_failure(&msg) => LlmError::AuthFailed {
                provider: self.provider.to_string(),
            },
            CompletionError::ResponseError(msg) => LlmError::InvalidResponse {
                provider: self.provider.to_string(),
                reason: msg,
            },
            other => self.request_failed(other.to_string()),
        }
    }
}

/// Split chat messages into a preamble, prior turns, and the final prompt.
///
/// System messages are joined into the preamble. The last non-system
/// message becomes the prompt.
pub(crate) fn split_messages(
    messages: &[ChatMessage],
) -> (Option<String>, Vec<&ChatMessage>, Option<&ChatMessage>) {
    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();
    let preamble = (!system.is_empty()).then(|| system.join("\n\n"));

    let mut turns: Vec<&ChatMessage> = messages.iter().filter(|m| m.role != Role::System).collect();
    let prompt = turns.pop();
    (preamble, turns, prompt)
}

/// Provider parameters for the requested output shape.
pub(crate) fn format_params(format: ResponseFormat) -> Option<Value> {
    match format {
        ResponseFormat::Text => None,
        ResponseFormat::Json => Some(json!({
            "generationConfig": { "responseMimeType": "application/json" }
        })),
    }
}

fn is_auth_failure(msg: &str) -> bool {
    let msg = msg.to_ascii_lowercase();
    msg.contains("api key") || msg.contains("permission_denied") || msg.contains("unauthenticated")
}

fn to_rig(message: &ChatMessage) -> Message {
    match message.role {
        Role::Assistant => Message::assistant(message.content.clone()),
        _ => Message::user(message.content.clone()),
    }
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + Send + Sync + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let (preamble, history, prompt) = split_messages(&request.messages);
        let prompt = prompt.ok_or_else(|| self.request_failed("request has no user message"))?;

        let mut builder = self
            .model
            .completion_request(to_rig(prompt))
            .messages(history.into_iter().map(to_rig).collect::<Vec<_>>());
        if let Some(preamble) = preamble {
            builder = builder.preamble(preamble);
        }
        if let Some(temperature) = request.temperature {
            builder = builder.temperature(f64::from(temperature));
        }
        if let Some(max_tokens) = request.max_tokens {
            builder = builder.max_tokens(u64::from(max_tokens));
        }
        if let Some(params) = format_params(request.format) {
            builder = builder.additional_params(params);
        }

        let response = builder.send().await.map_err(|e| self.map_error(e))?;

        let content: String = response
            .choice
            .iter()
            .filter_map(|c| match c {
                AssistantContent::Text(text) => Some(text.text.as_str()),
                _ => None,
            })
            .collect();
        if content.trim().is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: self.provider.to_string(),
                reason: "response contained no text".to_string(),
            });
        }
        debug!(model = %self.model_name, chars = content.len(), "completion received");
        Ok(CompletionResponse { content })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_messages_become_the_preamble() {
        let messages = vec![
            ChatMessage::system("You are a travel planner."),
            ChatMessage::user("Hello"),
            ChatMessage::system("Answer in JSON."),
            ChatMessage::assistant("Hi"),
            ChatMessage::user("List three flights"),
        ];
        let (preamble, history, prompt) = split_messages(&messages);
        assert_eq!(
            preamble.as_deref(),
            Some("You are a travel planner.\n\nAnswer in JSON.")
        );
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].role, Role::Assistant);
        assert_eq!(prompt.unwrap().content, "List three flights");
    }

    #[test]
    fn system_only_request_has_no_prompt() {
        let messages = vec![ChatMessage::system("rules")];
        let (preamble, history, prompt) = split_messages(&messages);
        assert!(preamble.is_some());
        assert!(history.is_empty());
        assert!(prompt.is_none());
    }

    #[test]
    fn json_format_sets_response_mime_type() {
        let params = format_params(ResponseFormat::Json).unwrap();
        assert_eq!(
            params["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert!(format_params(ResponseFormat::Text).is_none());
    }

    #[test]
    fn auth_messages_are_detected() {
        assert!(is_auth_failure("API key not valid. Please pass a valid API key."));
        assert!(is_auth_failure("status: PERMISSION_DENIED"));
        assert!(!is_auth_failure("quota exceeded"));
    }
}
