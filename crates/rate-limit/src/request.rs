//! Request information for admission control.

use config::Platform;

/// Information about an outbound call that needs admission.
#[derive(Debug, Clone)]
pub struct AdmissionRequest {
    /// Target platform.
    pub platform: Platform,
    /// Credential the call is made with. Buckets are independent per
    /// credential.
    pub credential: String,
    /// Estimated prompt tokens the call will consume.
    pub estimated_tokens: u32,
}

impl AdmissionRequest {
    /// Create a new builder for an admission request.
    pub fn builder(platform: Platform) -> AdmissionRequestBuilder {
        AdmissionRequestBuilder {
            platform,
            credential: None,
            estimated_tokens: 0,
        }
    }
}

/// Builder for creating admission requests.
#[derive(Debug)]
pub struct AdmissionRequestBuilder {
    platform: Platform,
    credential: Option<String>,
    estimated_tokens: u32,
}

impl AdmissionRequestBuilder {
    /// Set the calling credential.
    pub fn credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    /// Set the estimated prompt token count.
    pub fn estimated_tokens(mut self, tokens: u32) -> Self {
        self.estimated_tokens = tokens;
        self
    }

    /// Build the admission request.
    pub fn build(self) -> AdmissionRequest {
        AdmissionRequest {
            platform: self.platform,
            credential: self.credential.unwrap_or_else(|| "default".to_string()),
            estimated_tokens: self.estimated_tokens,
        }
    }
}
