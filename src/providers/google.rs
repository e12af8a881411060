use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{
    error::LLMError,
    providers::{join_endpoint, LLMProvider},
    types::{ChatMessage, CompletionRequest, CompletionResponse, MessageRole, TokenUsage},
};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub api_key: String,
    pub base_url: String,
    pub request_timeout: Duration,
}

impl GoogleConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}

/// Gemini `generateContent` client.
#[derive(Debug, Clone)]
pub struct Google {
    client: Client,
    config: GoogleConfig,
}

impl Google {
    pub fn from_config(config: GoogleConfig) -> Result<Self, LLMError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self { client, config })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentBody {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorEnvelope {
    error: GoogleError,
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    message: String,
}

// The request URL carries the API key, so it must not reach error messages.
fn redact_url(error: reqwest::Error) -> LLMError {
    LLMError::Http(error.without_url())
}

fn text_content(role: Option<&str>, text: Option<String>) -> Content {
    Content {
        role: role.map(str::to_string),
        parts: vec![Part { text }],
    }
}

#[async_trait]
impl LLMProvider for Google {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LLMError> {
        let CompletionRequest {
            model,
            messages,
            max_tokens,
        } = request;

        let mut system_instruction = None;
        let mut contents = Vec::with_capacity(messages.len());
        for ChatMessage { role, content } in messages {
            match role {
                MessageRole::System => system_instruction = Some(text_content(None, content)),
                MessageRole::User => contents.push(text_content(Some("user"), content)),
                MessageRole::Assistant => contents.push(text_content(Some("model"), content)),
            }
        }

        let body = GenerateContentBody {
            contents,
            system_instruction,
            generation_config: max_tokens.map(|max_output_tokens| GenerationConfig { max_output_tokens }),
        };

        let url = join_endpoint(
            &self.config.base_url,
            &format!("models/{model}:generateContent"),
        );
        let response = self
            .client
            .post(url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(redact_url)?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.map_err(redact_url)?;
            if let Ok(error) = serde_json::from_str::<GoogleErrorEnvelope>(&text) {
                return Err(LLMError::Provider(error.error.message));
            }

            return Err(LLMError::Provider(format!("unexpected status {status}")));
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(redact_url)?;
        // No candidates (e.g. blocked by safety filters) still counts as answered, with empty text.
        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .and_then(|content| content.parts.into_iter().find_map(|part| part.text))
            .unwrap_or_default();

        Ok(CompletionResponse {
            message: ChatMessage::assistant(text),
            usage: parsed.usage_metadata.map(|usage| TokenUsage {
                prompt_tokens: usage.prompt_token_count,
                completion_tokens: usage.candidates_token_count,
                total_tokens: usage.total_token_count,
            }),
        })
    }

    fn name(&self) -> &'static str {
        "google"
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::{
        matchers::{body_partial_json, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    use super::{Google, GoogleConfig};
    use crate::{providers::LLMProvider, types::CompletionRequest, LLMError};

    #[tokio::test]
    async fn passes_key_as_query_parameter() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.5-flash:generateContent"))
            .and(query_param("key", "g-key"))
            .and(body_partial_json(json!({
                "contents": [{ "role": "user", "parts": [{ "text": "ping" }] }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "role": "model", "parts": [{ "text": "pong" }] } }],
                "usageMetadata": { "promptTokenCount": 1, "candidatesTokenCount": 1, "totalTokenCount": 2 }
            })))
            .mount(&server)
            .await;

        let client = Google::from_config(GoogleConfig::new("g-key").with_base_url(server.uri()))
            .expect("client");
        let response = client
            .complete(CompletionRequest::prompt("gemini-2.5-flash", "ping"))
            .await
            .expect("completion");

        assert_eq!(response.text(), "pong");
        assert_eq!(response.usage.map(|u| u.total_tokens), Some(2));
    }

    #[tokio::test]
    async fn missing_candidates_yield_empty_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
            .mount(&server)
            .await;

        let client = Google::from_config(GoogleConfig::new("k").with_base_url(server.uri()))
            .expect("client");
        let response = client
            .complete(CompletionRequest::prompt("gemini-2.5-flash", "ping"))
            .await
            .expect("completion");
        assert_eq!(response.text(), "");
    }

    #[tokio::test]
    async fn error_messages_never_carry_the_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = Google::from_config(GoogleConfig::new("secret-key").with_base_url(server.uri()))
            .expect("client");
        let error = client
            .complete(CompletionRequest::prompt("gemini-2.5-flash", "ping"))
            .await
            .unwrap_err();
        assert!(matches!(error, LLMError::Http(_)));
        assert!(!error.to_string().contains("secret-key"));
    }
}
