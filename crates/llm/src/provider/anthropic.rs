mod input;
mod output;

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderValue};
use config::ProviderConfig;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::Client;
use secrecy::ExposeSecret;

use self::{
    input::AnthropicRequest,
    output::{AnthropicResponse, AnthropicStreamEvent, AnthropicStreamProcessor},
};

use crate::{
    error::LlmError,
    messages::{CompletionRequest, CompletionResponse, Platform},
    provider::{CompletionStream, Provider, error_from_response, error_from_transport, resolve_upstream_model},
};

const DEFAULT_ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub(crate) struct AnthropicProvider {
    client: Client,
    base_url: String,
    config: ProviderConfig,
}

impl AnthropicProvider {
    pub(crate) fn new(config: ProviderConfig) -> crate::Result<Self> {
        let mut headers = HeaderMap::new();

        let api_key = HeaderValue::from_str(config.api_key.expose_secret()).map_err(|e| {
            log::error!("Invalid Anthropic API key format: {e}");
            LlmError::Internal(None)
        })?;
        headers.insert("x-api-key", api_key);

        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));

        let client = Client::builder()
            .timeout(super::REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()
            .map_err(|e| {
                log::error!("Failed to create HTTP client for Anthropic provider: {e}");
                LlmError::Internal(None)
            })?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_ANTHROPIC_API_URL.to_string());

        Ok(Self {
            client,
            base_url,
            config,
        })
    }

    async fn send(&self, body: &AnthropicRequest) -> crate::Result<reqwest::Response> {
        let url = format!("{}/messages", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| error_from_transport(self.platform(), e))?;

        if !response.status().is_success() {
            return Err(error_from_response(self.platform(), response).await);
        }

        Ok(response)
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn platform(&self) -> Platform {
        Platform::Anthropic
    }

    fn default_model(&self) -> &str {
        self.config.default_model()
    }

    fn upstream_model(&self, request: &CompletionRequest) -> crate::Result<String> {
        resolve_upstream_model(&self.config, request)
    }

    async fn complete(&self, request: &CompletionRequest) -> crate::Result<CompletionResponse> {
        let body = AnthropicRequest::from_request(self.upstream_model(request)?, request, false);
        let response = self.send(&body).await?;

        let response_text = response.text().await.map_err(|e| {
            log::error!("Failed to read Anthropic response body: {e}");
            LlmError::Protocol("Failed to read Anthropic response body".to_string())
        })?;

        let anthropic_response: AnthropicResponse = sonic_rs::from_str(&response_text).map_err(|e| {
            log::error!("Failed to parse Anthropic messages response: {e}");
            log::error!("Raw response that failed to parse: {response_text}");
            LlmError::Protocol("Unexpected Anthropic response shape".to_string())
        })?;

        Ok(anthropic_response.into())
    }

    async fn stream_complete(&self, request: &CompletionRequest) -> crate::Result<CompletionStream> {
        let body = AnthropicRequest::from_request(self.upstream_model(request)?, request, true);
        let response = self.send(&body).await?;

        let event_stream = response.bytes_stream().eventsource();

        let chunk_stream = event_stream
            .scan(AnthropicStreamProcessor::default(), |processor, event| {
                let item: Option<crate::Result<crate::messages::StreamChunk>> = match event {
                    Err(e) => {
                        log::warn!("SSE parsing error in Anthropic stream: {e}");
                        None
                    }
                    Ok(event) => match sonic_rs::from_str::<AnthropicStreamEvent>(&event.data) {
                        Err(e) => {
                            log::warn!("Failed to parse Anthropic streaming event: {e}");
                            None
                        }
                        Ok(event) => processor.process_event(event).map(Ok),
                    },
                };

                futures::future::ready(Some(item))
            })
            .filter_map(futures::future::ready);

        Ok(Box::pin(chunk_stream))
    }

    fn supports_streaming(&self) -> bool {
        true
    }
}
