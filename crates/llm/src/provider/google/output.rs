use serde::Deserialize;

use crate::messages::{CompletionResponse, FinishReason, StreamChunk, Usage};

/// Response body of `generateContent`. Streaming responses reuse the
/// same shape, one object per SSE event.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct GoogleGenerateResponse {
    #[serde(default)]
    pub(super) candidates: Vec<GoogleCandidate>,
    pub(super) usage_metadata: Option<GoogleUsageMetadata>,
    pub(super) model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct GoogleCandidate {
    pub(super) content: Option<GoogleContent>,
    pub(super) finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct GoogleContent {
    #[serde(default)]
    pub(super) parts: Vec<GooglePart>,
}

#[derive(Debug, Deserialize)]
pub(super) struct GooglePart {
    #[serde(default)]
    pub(super) text: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(rename_all = "camelCase")]
pub(super) struct GoogleUsageMetadata {
    #[serde(default)]
    pub(super) prompt_token_count: u32,
    #[serde(default)]
    pub(super) candidates_token_count: u32,
}

impl From<GoogleUsageMetadata> for Usage {
    fn from(metadata: GoogleUsageMetadata) -> Self {
        Usage::new(metadata.prompt_token_count, metadata.candidates_token_count)
    }
}

pub(super) fn map_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "STOP" => FinishReason::Stop,
        "MAX_TOKENS" => FinishReason::Length,
        "SAFETY" | "PROHIBITED_CONTENT" | "BLOCKLIST" => FinishReason::ContentFilter,
        _ => FinishReason::Other,
    }
}

impl GoogleGenerateResponse {
    pub(super) fn candidate_text(&self) -> String {
        self.candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|part| part.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default()
    }

    pub(super) fn finish_reason(&self) -> Option<FinishReason> {
        self.candidates
            .first()
            .and_then(|candidate| candidate.finish_reason.as_deref())
            .map(map_finish_reason)
    }

    /// One streaming event becomes a content delta, plus a final chunk
    /// when the event carries a finish reason.
    pub(super) fn into_chunks(self) -> Vec<StreamChunk> {
        let text = self.candidate_text();
        let finish_reason = self.finish_reason();
        let usage = self.usage_metadata.map(Usage::from);

        let mut chunks = Vec::new();

        if !text.is_empty() {
            chunks.push(StreamChunk::delta(text));
        }

        if finish_reason.is_some() {
            chunks.push(StreamChunk::finish(usage, finish_reason));
        }

        chunks
    }
}

pub(super) fn into_response(response: GoogleGenerateResponse, fallback_model: &str) -> CompletionResponse {
    let content = response.candidate_text();
    let finish_reason = response.finish_reason();

    CompletionResponse {
        content,
        model: response
            .model_version
            .unwrap_or_else(|| fallback_model.to_string()),
        usage: response.usage_metadata.map(Into::into).unwrap_or_default(),
        finish_reason,
        citations: None,
        source_urls: Vec::new(),
        latency_ms: 0,
    }
}
