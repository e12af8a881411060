use std::{sync::Arc, time::Duration, time::Instant};

use async_trait::async_trait;

use crate::{
    catalog,
    error::LLMError,
    providers::{
        anthropic::{Anthropic, AnthropicConfig},
        google::{Google, GoogleConfig},
        openai::{OpenAI, OpenAIConfig},
        LLMProvider,
    },
    types::CompletionRequest,
};

const LIVE_MAX_TOKENS: u32 = 300;

/// Reply from one successful live call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveResponse {
    pub text: String,
    pub elapsed: Duration,
}

impl LiveResponse {
    pub fn new(text: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            text: text.into(),
            elapsed,
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.elapsed.as_millis()).unwrap_or(u64::MAX)
    }
}

/// One best-effort call to a provider. Every failure collapses to `None`.
#[async_trait]
pub trait LiveCallAdapter: Send + Sync {
    async fn try_call(
        &self,
        provider_id: &str,
        model: &str,
        prompt: &str,
        credential: &str,
    ) -> Option<LiveResponse>;
}

/// Builds a client for `(provider_id, credential)`. `None` means the provider has no live client.
pub type ProviderFactory =
    dyn Fn(&str, &str) -> Option<Result<Arc<dyn LLMProvider>, LLMError>> + Send + Sync;

#[derive(Debug, Clone)]
pub struct LiveEndpoints {
    pub openai: Option<String>,
    pub anthropic: Option<String>,
    pub google: Option<String>,
    pub request_timeout: Duration,
}

impl Default for LiveEndpoints {
    fn default() -> Self {
        Self {
            openai: None,
            anthropic: None,
            google: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl LiveEndpoints {
    /// Points every provider at the same base URL.
    pub fn all(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            openai: Some(base_url.clone()),
            anthropic: Some(base_url.clone()),
            google: Some(base_url),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    fn client(&self, provider_id: &str, credential: &str) -> Option<Result<Arc<dyn LLMProvider>, LLMError>> {
        let timeout = self.request_timeout;
        let client: Result<Arc<dyn LLMProvider>, LLMError> = match provider_id {
            "openai" => {
                let mut config = OpenAIConfig::new(credential).with_timeout(timeout);
                if let Some(base_url) = &self.openai {
                    config = config.with_base_url(base_url.clone());
                }
                OpenAI::from_config(config).map(|client| Arc::new(client) as Arc<dyn LLMProvider>)
            }
            "anthropic" => {
                let mut config = AnthropicConfig::new(credential).with_timeout(timeout);
                if let Some(base_url) = &self.anthropic {
                    config = config.with_base_url(base_url.clone());
                }
                Anthropic::from_config(config).map(|client| Arc::new(client) as Arc<dyn LLMProvider>)
            }
            "google" => {
                let mut config = GoogleConfig::new(credential).with_timeout(timeout);
                if let Some(base_url) = &self.google {
                    config = config.with_base_url(base_url.clone());
                }
                Google::from_config(config).map(|client| Arc::new(client) as Arc<dyn LLMProvider>)
            }
            _ => return None,
        };
        Some(client)
    }
}

/// Live adapter backed by [`LLMProvider`] clients.
pub struct ProviderLiveAdapter {
    factory: Arc<ProviderFactory>,
    max_tokens: u32,
}

impl ProviderLiveAdapter {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&str, &str) -> Option<Result<Arc<dyn LLMProvider>, LLMError>> + Send + Sync + 'static,
    {
        Self {
            factory: Arc::new(factory),
            max_tokens: LIVE_MAX_TOKENS,
        }
    }

    /// OpenAI, Anthropic and Google over HTTP; other providers are never dialed.
    pub fn http(endpoints: LiveEndpoints) -> Self {
        Self::new(move |provider_id, credential| endpoints.client(provider_id, credential))
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

impl Default for ProviderLiveAdapter {
    fn default() -> Self {
        Self::http(LiveEndpoints::default())
    }
}

#[async_trait]
impl LiveCallAdapter for ProviderLiveAdapter {
    async fn try_call(
        &self,
        provider_id: &str,
        model: &str,
        prompt: &str,
        credential: &str,
    ) -> Option<LiveResponse> {
        if credential.trim().is_empty() {
            return None;
        }

        let client = match (self.factory)(provider_id, credential)? {
            Ok(client) => client,
            Err(err) => {
                tracing::warn!(provider = provider_id, error = %err, "could not build live client");
                return None;
            }
        };

        // Live calls dial the provider's reference model, not the display model.
        let live_model = catalog::live_model(provider_id).unwrap_or(model);
        let request = CompletionRequest::prompt(live_model, prompt).with_max_tokens(self.max_tokens);

        let started = Instant::now();
        match client.complete(request).await {
            Ok(response) => {
                let elapsed = started.elapsed();
                tracing::debug!(
                    provider = provider_id,
                    model = live_model,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "live call succeeded"
                );
                Some(LiveResponse::new(response.text(), elapsed))
            }
            Err(err) => {
                tracing::warn!(provider = provider_id, model = live_model, error = %err, "live call failed");
                None
            }
        }
    }
}
