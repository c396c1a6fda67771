//! Signed webhook delivery for monitoring events.
//!
//! Events are posted as JSON over HTTPS with an HMAC-SHA256 signature, a
//! bounded per-delivery timeout and a capped retry budget. Delivery is
//! at-least-once: a receiver may see the same event twice, never a silently
//! dropped one.

#![deny(missing_docs)]

mod signature;

use std::time::Duration;

use config::WebhookConfig;
use jiff::Timestamp;
use serde::Serialize;
use telemetry::metrics::{Recorder, WEBHOOK_DELIVERY_DURATION};
use url::Url;
use uuid::Uuid;

pub use signature::{SignatureValidation, SignatureValidator, sign};

/// Delay before the first redelivery attempt, doubled per attempt.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Header carrying the payload signature.
pub const SIGNATURE_HEADER: &str = "X-Brandlens-Signature";

/// Kinds of events delivered to webhook endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WebhookEventType {
    /// A monitor job reached a terminal state.
    #[serde(rename = "monitor.job.completed")]
    MonitorJobCompleted,
    /// Admission control rejected an unusual share of calls.
    #[serde(rename = "rate_limit.anomaly")]
    RateLimitAnomaly,
    /// Accounted cost crossed a configured threshold.
    #[serde(rename = "cost.anomaly")]
    CostAnomaly,
}

/// An event payload before signing.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookEvent {
    /// What happened.
    pub event_type: WebhookEventType,
    /// The job the event concerns.
    pub job_id: Uuid,
    /// When the event was produced.
    pub timestamp: Timestamp,
}

impl WebhookEvent {
    /// Create an event stamped with the current time.
    pub fn new(event_type: WebhookEventType, job_id: Uuid) -> Self {
        Self {
            event_type,
            job_id,
            timestamp: Timestamp::now(),
        }
    }
}

/// Outcome of delivering one event to one endpoint.
#[derive(Debug, Clone)]
pub struct DeliveryReport {
    /// The endpoint the delivery targeted.
    pub endpoint: Url,
    /// Attempts made, including the first.
    pub attempts: u32,
    /// Whether any attempt got a success response.
    pub delivered: bool,
}

/// Errors preparing a delivery. Transport failures are not errors here, they
/// are reflected in the [`DeliveryReport`].
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The event payload could not be serialized.
    #[error("Failed to serialize webhook payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Delivers signed events to the configured endpoints.
pub struct WebhookNotifier {
    endpoints: Vec<WebhookConfig>,
    http: reqwest::Client,
}

impl WebhookNotifier {
    /// Create a notifier for the given endpoints.
    pub fn new(endpoints: Vec<WebhookConfig>) -> Self {
        Self {
            endpoints,
            http: reqwest::Client::new(),
        }
    }

    /// Whether any endpoints are configured.
    pub fn has_endpoints(&self) -> bool {
        !self.endpoints.is_empty()
    }

    /// Deliver an event to every configured endpoint, sequentially per
    /// endpoint with capped retries. Returns one report per endpoint.
    pub async fn notify(&self, event: &WebhookEvent) -> Result<Vec<DeliveryReport>, WebhookError> {
        // Canonical JSON (sorted keys) so the receiver can reproduce the
        // signed bytes by stripping the signature field.
        let canonical = serde_json::to_value(event)?;
        let signed_bytes = serde_json::to_vec(&canonical)?;

        let mut reports = Vec::with_capacity(self.endpoints.len());

        for endpoint in &self.endpoints {
            let signature = signature::sign(&endpoint.secret, &signed_bytes);

            let mut payload = canonical.clone();
            payload["signature"] = serde_json::Value::String(signature.clone());
            let body = serde_json::to_vec(&payload)?;

            reports.push(self.deliver(endpoint, &signature, body).await);
        }

        Ok(reports)
    }

    async fn deliver(&self, endpoint: &WebhookConfig, signature: &str, body: Vec<u8>) -> DeliveryReport {
        let max_attempts = endpoint.max_retries + 1;
        let mut delay = RETRY_BASE_DELAY;

        for attempt in 1..=max_attempts {
            let mut recorder = Recorder::new(WEBHOOK_DELIVERY_DURATION);
            recorder.push_attribute("endpoint", endpoint.url.to_string());

            let response = self
                .http
                .post(endpoint.url.clone())
                .header("content-type", "application/json")
                .header(SIGNATURE_HEADER, signature)
                .timeout(endpoint.timeout)
                .body(body.clone())
                .send()
                .await;

            match response {
                Ok(response) if response.status().is_success() => {
                    recorder.push_attribute("outcome", "delivered");
                    recorder.record();

                    return DeliveryReport {
                        endpoint: endpoint.url.clone(),
                        attempts: attempt,
                        delivered: true,
                    };
                }
                Ok(response) => {
                    recorder.push_attribute("outcome", "rejected");
                    recorder.record();

                    log::warn!(
                        "Webhook delivery to {} got status {} on attempt {attempt}/{max_attempts}",
                        endpoint.url,
                        response.status()
                    );
                }
                Err(e) => {
                    recorder.push_attribute("outcome", "error");
                    recorder.record();

                    log::warn!(
                        "Webhook delivery to {} failed on attempt {attempt}/{max_attempts}: {e}",
                        endpoint.url
                    );
                }
            }

            if attempt < max_attempts {
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }

        log::error!("Webhook delivery to {} gave up after {max_attempts} attempts", endpoint.url);

        DeliveryReport {
            endpoint: endpoint.url.clone(),
            attempts: max_attempts,
            delivered: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    use super::*;

    fn endpoint(server: &MockServer, max_retries: u32) -> WebhookConfig {
        WebhookConfig {
            url: format!("{}/hook", server.uri()).parse().unwrap(),
            secret: SecretString::from("whsec-test"),
            timeout: Duration::from_secs(5),
            max_retries,
        }
    }

    fn event() -> WebhookEvent {
        WebhookEvent::new(WebhookEventType::MonitorJobCompleted, Uuid::new_v4())
    }

    #[tokio::test]
    async fn successful_delivery_is_signed() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(vec![endpoint(&server, 3)]);
        let reports = notifier.notify(&event()).await.unwrap();

        assert_eq!(reports.len(), 1);
        assert!(reports[0].delivered);
        assert_eq!(reports[0].attempts, 1);

        let request: Request = server.received_requests().await.unwrap().remove(0);
        let header = request.headers.get(SIGNATURE_HEADER).unwrap().to_str().unwrap().to_string();

        // The signature covers the payload without its signature field.
        let mut payload: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
        let embedded = payload
            .as_object_mut()
            .unwrap()
            .remove("signature")
            .unwrap()
            .as_str()
            .unwrap()
            .to_string();
        assert_eq!(embedded, header);

        let body = serde_json::to_vec(&payload).unwrap();
        let validator = SignatureValidator::new(SecretString::from("whsec-test"));
        assert_eq!(validator.validate(Some(&header), &body), SignatureValidation::Valid);
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(vec![endpoint(&server, 3)]);
        let reports = notifier.notify(&event()).await.unwrap();

        assert!(reports[0].delivered);
        assert_eq!(reports[0].attempts, 3);
    }

    #[tokio::test]
    async fn exhausted_retries_are_reported_not_dropped() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(vec![endpoint(&server, 1)]);
        let reports = notifier.notify(&event()).await.unwrap();

        assert!(!reports[0].delivered);
        assert_eq!(reports[0].attempts, 2);
    }
}
