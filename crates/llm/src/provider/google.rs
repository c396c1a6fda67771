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
    input::GoogleGenerateRequest,
    output::{GoogleGenerateResponse, into_response},
};

use crate::{
    error::LlmError,
    messages::{CompletionRequest, CompletionResponse, Platform, StreamChunk},
    provider::{CompletionStream, Provider, error_from_response, error_from_transport, resolve_upstream_model},
};

const DEFAULT_GOOGLE_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub(crate) struct GoogleProvider {
    client: Client,
    base_url: String,
    config: ProviderConfig,
}

impl GoogleProvider {
    pub(crate) fn new(config: ProviderConfig) -> crate::Result<Self> {
        let mut headers = HeaderMap::new();

        let api_key = HeaderValue::from_str(config.api_key.expose_secret()).map_err(|e| {
            log::error!("Invalid Google API key format: {e}");
            LlmError::Internal(None)
        })?;
        headers.insert("x-goog-api-key", api_key);

        let client = Client::builder()
            .timeout(super::REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()
            .map_err(|e| {
                log::error!("Failed to create HTTP client for Google provider: {e}");
                LlmError::Internal(None)
            })?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_GOOGLE_API_URL.to_string());

        Ok(Self {
            client,
            base_url,
            config,
        })
    }

    async fn send(&self, url: String, body: &GoogleGenerateRequest) -> crate::Result<reqwest::Response> {
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
impl Provider for GoogleProvider {
    fn platform(&self) -> Platform {
        Platform::Google
    }

    fn default_model(&self) -> &str {
        self.config.default_model()
    }

    fn upstream_model(&self, request: &CompletionRequest) -> crate::Result<String> {
        resolve_upstream_model(&self.config, request)
    }

    async fn complete(&self, request: &CompletionRequest) -> crate::Result<CompletionResponse> {
        let model = self.upstream_model(request)?;
        let url = format!("{}/models/{}:generateContent", self.base_url, model);

        let body = GoogleGenerateRequest::from_request(request);
        let response = self.send(url, &body).await?;

        let response_text = response.text().await.map_err(|e| {
            log::error!("Failed to read Google response body: {e}");
            LlmError::Protocol("Failed to read Google response body".to_string())
        })?;

        let google_response: GoogleGenerateResponse = sonic_rs::from_str(&response_text).map_err(|e| {
            log::error!("Failed to parse Google generate content response: {e}");
            log::error!("Raw response that failed to parse: {response_text}");
            LlmError::Protocol("Unexpected Google response shape".to_string())
        })?;

        Ok(into_response(google_response, &model))
    }

    async fn stream_complete(&self, request: &CompletionRequest) -> crate::Result<CompletionStream> {
        let model = self.upstream_model(request)?;
        let url = format!("{}/models/{}:streamGenerateContent?alt=sse", self.base_url, model);

        let body = GoogleGenerateRequest::from_request(request);
        let response = self.send(url, &body).await?;

        let event_stream = response.bytes_stream().eventsource();

        let chunk_stream = event_stream
            .flat_map(|event| {
                let chunks: Vec<crate::Result<StreamChunk>> = match event {
                    Err(e) => {
                        log::warn!("SSE parsing error in Google stream: {e}");
                        Vec::new()
                    }
                    Ok(event) => match sonic_rs::from_str::<GoogleGenerateResponse>(&event.data) {
                        Err(e) => {
                            log::warn!("Failed to parse Google streaming event: {e}");
                            Vec::new()
                        }
                        Ok(response) => response.into_chunks().into_iter().map(Ok).collect(),
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
}
