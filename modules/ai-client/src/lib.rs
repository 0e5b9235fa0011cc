mod client;
pub mod error;
pub mod schema;
pub(crate) mod types;

pub use error::{LlmError, Result};
pub use schema::StructuredOutput;

use client::ClaudeClient;
use types::{ChatRequest, ContentBlock, ToolDefinitionWire, WireMessage};

// =============================================================================
// Claude
// =============================================================================

/// Handle on one model at one provider. Cheap to clone.
#[derive(Clone)]
pub struct Claude {
    api_key: String,
    model: String,
    base_url: Option<String>,
}

impl Claude {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
        }
    }

    pub fn from_env(model: impl Into<String>) -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| LlmError::Api {
            status: 0,
            message: "ANTHROPIC_API_KEY environment variable not set".to_string(),
        })?;
        Ok(Self::new(api_key, model))
    }

    /// Point at a different endpoint (test servers, proxies).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn client(&self) -> ClaudeClient {
        let client = ClaudeClient::new(&self.api_key);
        if let Some(ref url) = self.base_url {
            client.with_base_url(url)
        } else {
            client
        }
    }

    /// Force the model to answer through a tool whose input schema is `T`'s
    /// JSON schema, and deserialize the tool input into `T`. A response with
    /// no tool-use block, or one that fails to deserialize, is a
    /// `MalformedResponse`.
    pub async fn extract<T: StructuredOutput>(
        &self,
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
    ) -> Result<T> {
        let tool_name = "structured_response";
        let mut request = ChatRequest::new(&self.model)
            .system(system_prompt)
            .message(WireMessage::user(user_prompt))
            .tool(ToolDefinitionWire {
                name: tool_name.to_string(),
                description: "Record the structured result of the analysis.".to_string(),
                input_schema: T::input_schema(),
            });
        request.tool_choice = Some(serde_json::json!({
            "type": "tool",
            "name": tool_name,
        }));

        let response = self.client().chat(&request).await?;

        for block in &response.content {
            if let ContentBlock::ToolUse { input, .. } = block {
                return serde_json::from_value(input.clone())
                    .map_err(|e| LlmError::MalformedResponse(e.to_string()));
            }
        }

        Err(LlmError::MalformedResponse(
            "no tool-use block in response".to_string(),
        ))
    }

    /// Plain text completion.
    pub async fn chat_completion(
        &self,
        system: impl Into<String>,
        user: impl Into<String>,
        temperature: f32,
    ) -> Result<String> {
        let request = ChatRequest::new(&self.model)
            .system(system)
            .message(WireMessage::user(user))
            .temperature(temperature);

        let response = self.client().chat(&request).await?;

        response
            .text()
            .ok_or_else(|| LlmError::MalformedResponse("no text block in response".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claude_new() {
        let ai = Claude::new("sk-ant-test", "claude-haiku-4-5-20251001");
        assert_eq!(ai.model(), "claude-haiku-4-5-20251001");
    }

    #[test]
    fn claude_with_base_url() {
        let ai = Claude::new("sk-ant-test", "claude-haiku-4-5-20251001")
            .with_base_url("http://127.0.0.1:9999");
        assert_eq!(ai.base_url.as_deref(), Some("http://127.0.0.1:9999"));
    }
}
