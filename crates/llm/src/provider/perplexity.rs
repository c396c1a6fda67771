mod input;
mod output;

use async_trait::async_trait;
use config::ProviderConfig;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::{Client, header::AUTHORIZATION};
use secrecy::ExposeSecret;

use self::{
    input::PerplexityRequest,
    output::{PerplexityResponse, PerplexityStreamChunk, map_finish_reason},
};

use crate::{
    error::LlmError,
    messages::{CompletionRequest, CompletionResponse, Platform, StreamChunk},
    provider::{CompletionStream, Provider, error_from_response, error_from_transport, resolve_upstream_model},
};

const DEFAULT_PERPLEXITY_API_URL: &str = "https://api.perplexity.ai";

pub(crate) struct PerplexityProvider {
    client: Client,
    base_url: String,
    config: ProviderConfig,
}

impl PerplexityProvider {
    pub(crate) fn new(config: ProviderConfig) -> crate::Result<Self> {
        let client = Client::builder()
            .timeout(super::REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                log::error!("Failed to create HTTP client for Perplexity provider: {e}");
                LlmError::Internal(None)
            })?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_PERPLEXITY_API_URL.to_string());

        Ok(Self {
            client,
            base_url,
            config,
        })
    }

    async fn send(&self, body: &PerplexityRequest) -> crate::Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .header(
                AUTHORIZATION,
                format!("Bearer {}", self.config.api_key.expose_secret()),
            )
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
impl Provider for PerplexityProvider {
    fn platform(&self) -> Platform {
        Platform::Perplexity
    }

    fn default_model(&self) -> &str {
        self.config.default_model()
    }

    fn upstream_model(&self, request: &CompletionRequest) -> crate::Result<String> {
        resolve_upstream_model(&self.config, request)
    }

    async fn complete(&self, request: &CompletionRequest) -> crate::Result<CompletionResponse> {
        let body = PerplexityRequest::from_request(self.upstream_model(request)?, request, false);
        let response = self.send(&body).await?;

        let response_text = response.text().await.map_err(|e| {
            log::error!("Failed to read Perplexity response body: {e}");
            LlmError::Protocol("Failed to read Perplexity response body".to_string())
        })?;

        let perplexity_response: PerplexityResponse = sonic_rs::from_str(&response_text).map_err(|e| {
            log::error!("Failed to parse Perplexity chat completion response: {e}");
            log::error!("Raw response that failed to parse: {response_text}");
            LlmError::Protocol("Unexpected Perplexity response shape".to_string())
        })?;

        Ok(perplexity_response.into())
    }

    async fn stream_complete(&self, request: &CompletionRequest) -> crate::Result<CompletionStream> {
        let body = PerplexityRequest::from_request(self.upstream_model(request)?, request, true);
        let response = self.send(&body).await?;

        let event_stream = response.bytes_stream().eventsource();

        // The last chunk carries both the finish reason and the usage, so
        // a delta and a final chunk can come out of one event.
        let chunk_stream = event_stream
            .flat_map(|event| {
                let chunks: Vec<crate::Result<StreamChunk>> = match event {
                    Err(e) => {
                        log::warn!("SSE parsing error in Perplexity stream: {e}");
                        Vec::new()
                    }
                    Ok(event) if event.data == "[DONE]" => Vec::new(),
                    Ok(event) => match sonic_rs::from_str::<PerplexityStreamChunk>(&event.data) {
                        Err(e) => {
                            log::warn!("Failed to parse Perplexity streaming chunk: {e}");
                            Vec::new()
                        }
                        Ok(chunk) => {
                            let mut out = Vec::new();

                            let finish_reason = chunk
                                .choices
                                .first()
                                .and_then(|c| c.finish_reason.as_deref())
                                .map(map_finish_reason);

                            if let Some(content) = chunk
                                .choices
                                .into_iter()
                                .next()
                                .and_then(|c| c.delta.content)
                                .filter(|content| !content.is_empty())
                            {
                                out.push(Ok(StreamChunk::delta(content)));
                            }

                            if let Some(reason) = finish_reason {
                                out.push(Ok(StreamChunk::finish(chunk.usage.map(Into::into), Some(reason))));
                            }

                            out
                        }
                    },
                };

                futures::stream::iter(chunks)
            })
            .boxed();

        Ok(chunk_stream)
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    fn supports_search(&self) -> bool {
        true
    }
}
