mod input;
mod output;

use async_trait::async_trait;
use axum::http::HeaderMap;
use config::ProviderConfig;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::{Client, header::AUTHORIZATION};
use secrecy::ExposeSecret;

use self::{
    input::OpenAiRequest,
    output::{OpenAiResponse, OpenAiStreamChunk, map_finish_reason},
};

use crate::{
    error::LlmError,
    messages::{CompletionRequest, CompletionResponse, FinishReason, Platform, StreamChunk},
    provider::{CompletionStream, Provider, error_from_response, error_from_transport, resolve_upstream_model},
};

const DEFAULT_OPENAI_API_URL: &str = "https://api.openai.com/v1";

pub(crate) struct OpenAiProvider {
    client: Client,
    base_url: String,
    config: ProviderConfig,
}

impl OpenAiProvider {
    pub(crate) fn new(config: ProviderConfig) -> crate::Result<Self> {
        let client = Client::builder()
            .timeout(super::REQUEST_TIMEOUT)
            .default_headers(HeaderMap::new())
            .build()
            .map_err(|e| {
                log::error!("Failed to create HTTP client for OpenAI provider: {e}");
                LlmError::Internal(None)
            })?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_OPENAI_API_URL.to_string());

        Ok(Self {
            client,
            base_url,
            config,
        })
    }

    async fn send(&self, body: &OpenAiRequest) -> crate::Result<reqwest::Response> {
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
impl Provider for OpenAiProvider {
    fn platform(&self) -> Platform {
        Platform::Openai
    }

    fn default_model(&self) -> &str {
        self.config.default_model()
    }

    fn upstream_model(&self, request: &CompletionRequest) -> crate::Result<String> {
        resolve_upstream_model(&self.config, request)
    }

    async fn complete(&self, request: &CompletionRequest) -> crate::Result<CompletionResponse> {
        let body = OpenAiRequest::from_request(self.upstream_model(request)?, request, false);
        let response = self.send(&body).await?;

        let response_text = response.text().await.map_err(|e| {
            log::error!("Failed to read OpenAI response body: {e}");
            LlmError::Protocol("Failed to read OpenAI response body".to_string())
        })?;

        let openai_response: OpenAiResponse = sonic_rs::from_str(&response_text).map_err(|e| {
            log::error!("Failed to parse OpenAI chat completion response: {e}");
            log::error!("Raw response that failed to parse: {response_text}");
            LlmError::Protocol("Unexpected OpenAI response shape".to_string())
        })?;

        Ok(openai_response.into())
    }

    async fn stream_complete(&self, request: &CompletionRequest) -> crate::Result<CompletionStream> {
        let body = OpenAiRequest::from_request(self.upstream_model(request)?, request, true);
        let response = self.send(&body).await?;

        let event_stream = response.bytes_stream().eventsource();

        // OpenAI sends the finish reason on the last content chunk and the
        // usage in a trailing chunk with no choices; stash the former until
        // the latter arrives and fold both into one final chunk.
        let chunk_stream = event_stream
            .scan(None::<FinishReason>, |pending, event| {
                let item: Option<crate::Result<StreamChunk>> = match event {
                    Err(e) => {
                        log::warn!("SSE parsing error in OpenAI stream: {e}");
                        None
                    }
                    Ok(event) if event.data == "[DONE]" => None,
                    Ok(event) => match sonic_rs::from_str::<OpenAiStreamChunk>(&event.data) {
                        Err(e) => {
                            log::warn!("Failed to parse OpenAI streaming chunk: {e}");
                            None
                        }
                        Ok(chunk) => {
                            if let Some(reason) = chunk.choices.first().and_then(|c| c.finish_reason.as_deref()) {
                                *pending = Some(map_finish_reason(reason));
                            }

                            if let Some(usage) = chunk.usage {
                                Some(Ok(StreamChunk::finish(Some(usage.into()), pending.take())))
                            } else {
                                chunk
                                    .choices
                                    .into_iter()
                                    .next()
                                    .and_then(|c| c.delta.content)
                                    .filter(|content| !content.is_empty())
                                    .map(|content| Ok(StreamChunk::delta(content)))
                            }
                        }
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
