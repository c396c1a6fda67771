use std::collections::BTreeMap;

use serde::Serialize;
use uuid::Uuid;

use crate::messages::{CompletionResponse, Platform};

/// Lifecycle of a brand monitor job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Result of one query against one platform.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum PlatformOutcome {
    Success(CompletionResponse),
    Error { error_type: String, message: String },
}

impl PlatformOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PlatformOutcome::Success(_))
    }
}

/// A brand monitor job fans a set of queries out over a set of
/// platforms and collects what each one said about the brand.
#[derive(Debug, Serialize)]
pub struct MonitorJob {
    job_id: Uuid,
    brand_name: String,
    platforms: Vec<Platform>,
    queries: Vec<String>,
    status: JobStatus,
    results: BTreeMap<Platform, Vec<PlatformOutcome>>,
}

impl MonitorJob {
    pub fn new(brand_name: impl Into<String>, platforms: Vec<Platform>, queries: Vec<String>) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            brand_name: brand_name.into(),
            platforms,
            queries,
            status: JobStatus::Pending,
            results: BTreeMap::new(),
        }
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn brand_name(&self) -> &str {
        &self.brand_name
    }

    pub fn platforms(&self) -> &[Platform] {
        &self.platforms
    }

    pub fn queries(&self) -> &[String] {
        &self.queries
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn results(&self) -> &BTreeMap<Platform, Vec<PlatformOutcome>> {
        &self.results
    }

    pub(crate) fn mark_running(&mut self) {
        self.status = JobStatus::Running;
    }

    pub(crate) fn record_outcome(&mut self, platform: Platform, outcome: PlatformOutcome) {
        self.results.entry(platform).or_default().push(outcome);
    }

    /// A job completes when at least one query succeeded somewhere.
    /// Only a fully failed job is marked failed.
    pub(crate) fn finalize(&mut self) {
        let any_success = self
            .results
            .values()
            .flatten()
            .any(PlatformOutcome::is_success);

        self.status = if any_success {
            JobStatus::Completed
        } else {
            JobStatus::Failed
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::Usage;

    fn response(content: &str) -> CompletionResponse {
        CompletionResponse {
            content: content.to_string(),
            model: "gpt-4o".to_string(),
            usage: Usage::new(10, 5),
            finish_reason: None,
            citations: None,
            source_urls: Vec::new(),
            latency_ms: 12,
        }
    }

    #[test]
    fn one_success_completes_the_job() {
        let mut job = MonitorJob::new(
            "Acme",
            vec![Platform::Openai, Platform::Anthropic],
            vec!["best anvil maker".to_string()],
        );

        job.mark_running();
        job.record_outcome(Platform::Openai, PlatformOutcome::Success(response("Acme is great")));
        job.record_outcome(
            Platform::Anthropic,
            PlatformOutcome::Error {
                error_type: "timeout_error".to_string(),
                message: "request timed out".to_string(),
            },
        );
        job.finalize();

        assert_eq!(job.status(), JobStatus::Completed);
    }

    #[test]
    fn all_failures_fail_the_job() {
        let mut job = MonitorJob::new("Acme", vec![Platform::Openai], vec!["q".to_string()]);

        job.mark_running();
        job.record_outcome(
            Platform::Openai,
            PlatformOutcome::Error {
                error_type: "authentication_error".to_string(),
                message: "bad key".to_string(),
            },
        );
        job.finalize();

        assert_eq!(job.status(), JobStatus::Failed);
    }
}
