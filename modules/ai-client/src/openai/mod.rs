mod client;
pub(crate) mod schema;
pub(crate) mod types;

pub use schema::StructuredOutput;

use std::time::Duration;

use tracing::debug;

use crate::error::{AiError, Result};
use crate::util::strip_code_blocks;
use client::{OpenAiClient, OPENAI_API_URL};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

// =============================================================================
// OpenAi Agent
// =============================================================================

#[derive(Clone)]
pub struct OpenAi {
    api_key: String,
    pub(crate) model: String,
    base_url: Option<String>,
    timeout: Duration,
}

impl OpenAi {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn from_env(model: impl Into<String>) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| AiError::Config("OPENAI_API_KEY environment variable not set".into()))?;
        Ok(Self::new(api_key, model))
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Upper bound on a single request, connect through last body byte.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn client(&self) -> Result<OpenAiClient> {
        OpenAiClient::new(
            &self.api_key,
            self.base_url.as_deref().unwrap_or(OPENAI_API_URL),
            self.timeout,
        )
    }

    /// Type-safe structured output extraction under a strict schema.
    ///
    /// The schema is derived from `T`; the answer must deserialize into `T`
    /// or the call fails with [`AiError::Parse`]. No retry.
    pub async fn extract<T: StructuredOutput>(
        &self,
        schema_name: &str,
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
    ) -> Result<T> {
        let json_str = self
            .structured_output(schema_name, system_prompt, user_prompt, T::openai_schema())
            .await?;

        serde_json::from_str(strip_code_blocks(&json_str))
            .map_err(|e| AiError::Parse(format!("Failed to deserialize response: {e}")))
    }

    /// Structured output with a caller-supplied schema. Returns the raw JSON text.
    pub async fn structured_output(
        &self,
        schema_name: &str,
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
        schema: serde_json::Value,
    ) -> Result<String> {
        let request = self.structured_request(schema_name, system_prompt, user_prompt, schema);
        debug!(model = %self.model, schema_name, "Sending structured output request");
        self.client()?.structured_output(&request).await
    }

    fn structured_request(
        &self,
        schema_name: &str,
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
        schema: serde_json::Value,
    ) -> types::StructuredRequest {
        types::StructuredRequest {
            model: self.model.clone(),
            messages: vec![
                types::WireMessage::system(system_prompt),
                types::WireMessage::user(user_prompt),
            ],
            temperature: types::supports_temperature(&self.model).then_some(0.0),
            response_format: types::ResponseFormat {
                format_type: "json_schema".to_string(),
                json_schema: types::JsonSchemaFormat {
                    name: schema_name.to_string(),
                    strict: true,
                    schema,
                },
            },
        }
    }
}
