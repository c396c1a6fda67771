//! The monitoring client façade.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use config::Config;
use cost::{CostTracker, PricingTable, UsageSnapshot};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use rate_limit::{AdmissionRequest, RateLimitManager};
use telemetry::KeyValue;
use telemetry::metrics::{
    self, LLM_CLIENT_COST_USD, LLM_CLIENT_INPUT_TOKEN_USAGE, LLM_CLIENT_OPERATION_DURATION,
    LLM_CLIENT_OUTPUT_TOKEN_USAGE, LLM_CLIENT_RATE_LIMIT_REJECTIONS, Recorder,
};
use uuid::Uuid;
use webhook::{WebhookEvent, WebhookEventType, WebhookNotifier};

use crate::{
    error::LlmError,
    messages::{CompletionRequest, CompletionResponse, Platform, Usage},
    monitor::{MonitorJob, PlatformOutcome},
    provider::{
        CompletionStream, Provider, anthropic::AnthropicProvider, google::GoogleProvider, openai::OpenAiProvider,
        perplexity::PerplexityProvider,
    },
    request::RequestContext,
    retry::Backoff,
    token_counter,
};

/// Unified client over every configured platform.
///
/// Owns the provider adapters, admission control, cost accounting and the
/// webhook sink. One instance serves all tenants; per-call identity comes in
/// through the [`RequestContext`].
pub struct MonitorClient {
    providers: BTreeMap<Platform, Box<dyn Provider>>,
    rate_limits: RateLimitManager,
    costs: Arc<CostTracker>,
    webhooks: Arc<WebhookNotifier>,
    retry: config::RetryConfig,
}

impl MonitorClient {
    /// Build a client from the application configuration.
    ///
    /// Platforms without an adapter implementation are skipped with a
    /// warning, so a config naming them still starts.
    pub fn new(config: &Config) -> crate::Result<Self> {
        let mut providers: BTreeMap<Platform, Box<dyn Provider>> = BTreeMap::new();

        for (platform, provider_config) in &config.providers {
            let provider: Box<dyn Provider> = match platform {
                Platform::Openai => Box::new(OpenAiProvider::new(provider_config.clone())?),
                Platform::Anthropic => Box::new(AnthropicProvider::new(provider_config.clone())?),
                Platform::Perplexity => Box::new(PerplexityProvider::new(provider_config.clone())?),
                Platform::Google => Box::new(GoogleProvider::new(provider_config.clone())?),
                Platform::Cohere | Platform::Mistral => {
                    log::warn!("No adapter available for platform '{platform}', skipping");
                    continue;
                }
            };

            log::debug!(
                "Configured adapter for '{platform}' (streaming: {}, search: {})",
                provider.supports_streaming(),
                provider.supports_search()
            );

            providers.insert(*platform, provider);
        }

        Ok(Self {
            providers,
            rate_limits: RateLimitManager::from_providers(&config.providers),
            costs: Arc::new(CostTracker::new(PricingTable::with_overrides(&config.pricing))),
            webhooks: Arc::new(WebhookNotifier::new(config.webhooks.clone())),
            retry: config.retry.clone(),
        })
    }

    /// The platforms this client has adapters for.
    pub fn platforms(&self) -> Vec<Platform> {
        self.providers.keys().copied().collect()
    }

    /// Run one completion against the platform named in the request.
    ///
    /// Admission control runs before every provider call, retryable failures
    /// are retried with backoff, and the result is reconciled and priced
    /// before it is returned.
    pub async fn complete(
        &self,
        request: &CompletionRequest,
        context: &RequestContext,
    ) -> crate::Result<CompletionResponse> {
        let mut recorder = Recorder::new(LLM_CLIENT_OPERATION_DURATION);
        recorder.push_attribute("platform", request.platform.as_str());

        let result = self.complete_with_retry(request, context).await;

        recorder.push_attribute("outcome", if result.is_ok() { "success" } else { "error" });
        recorder.record();

        result
    }

    async fn complete_with_retry(
        &self,
        request: &CompletionRequest,
        context: &RequestContext,
    ) -> crate::Result<CompletionResponse> {
        let provider = self
            .providers
            .get(&request.platform)
            .ok_or(LlmError::ProviderNotFound(request.platform))?;

        validate_request(provider.as_ref(), request)?;

        let estimated = token_counter::count_input_tokens(&request.messages) as u32;
        let mut backoff = Backoff::new(&self.retry);

        loop {
            let started = Instant::now();

            match self.attempt(provider.as_ref(), request, context, estimated).await {
                Ok(mut response) => {
                    response.latency_ms = started.elapsed().as_millis() as u64;
                    self.settle(request.platform, context, estimated, &response).await;

                    return Ok(response);
                }
                Err(e) if e.is_retryable() => {
                    let Some(delay) = backoff.next_delay(e.retry_after()) else {
                        log::debug!(
                            "Giving up on {} call after {} attempts: {e}",
                            request.platform,
                            backoff.attempts()
                        );
                        return Err(e);
                    };

                    log::debug!("Retrying {} call in {delay:?} after: {e}", request.platform);

                    // The backoff wait is a suspension point too.
                    tokio::select! {
                        _ = context.cancel.cancelled() => return Err(LlmError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn attempt(
        &self,
        provider: &dyn Provider,
        request: &CompletionRequest,
        context: &RequestContext,
        estimated: u32,
    ) -> crate::Result<CompletionResponse> {
        self.admit(request.platform, context, estimated).await?;

        tokio::select! {
            _ = context.cancel.cancelled() => Err(LlmError::Cancelled),
            result = provider.complete(request) => result,
        }
    }

    async fn admit(&self, platform: Platform, context: &RequestContext, estimated: u32) -> crate::Result<()> {
        let admission = AdmissionRequest::builder(platform)
            .credential(&context.credential)
            .estimated_tokens(estimated)
            .build();

        self.rate_limits.try_admit(&admission).await.map_err(|e| {
            metrics::meter()
                .u64_counter(LLM_CLIENT_RATE_LIMIT_REJECTIONS)
                .build()
                .add(1, &[KeyValue::new("platform", platform.as_str())]);

            LlmError::from(e)
        })
    }

    /// Reconcile the token bucket against reported usage, price the call and
    /// emit usage metrics.
    async fn settle(&self, platform: Platform, context: &RequestContext, estimated: u32, response: &CompletionResponse) {
        self.rate_limits
            .reconcile(platform, &context.credential, estimated, response.usage.total_tokens)
            .await;

        let record = self.costs.record(
            platform,
            &context.tenant,
            &response.model,
            Uuid::new_v4(),
            response.usage.prompt_tokens,
            response.usage.completion_tokens,
        );

        record_usage_metrics(platform, response.usage, record.usd_cost);
    }

    /// Run a streaming completion.
    ///
    /// Admission happens before the stream is opened. Reconciliation and
    /// pricing run when the final chunk reports usage; an abandoned stream
    /// keeps its estimate, never less.
    pub async fn stream_complete(
        &self,
        request: &CompletionRequest,
        context: &RequestContext,
    ) -> crate::Result<CompletionStream> {
        let provider = self
            .providers
            .get(&request.platform)
            .ok_or(LlmError::ProviderNotFound(request.platform))?;

        if !provider.supports_streaming() {
            return Err(LlmError::UnsupportedCapability(format!(
                "{} does not support streaming completions",
                request.platform
            )));
        }

        validate_request(provider.as_ref(), request)?;

        let estimated = token_counter::count_input_tokens(&request.messages) as u32;
        self.admit(request.platform, context, estimated).await?;

        let inner = provider.stream_complete(request).await?;

        let platform = request.platform;
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| provider.default_model().to_string());
        let tenant = context.tenant.clone();
        let credential = context.credential.clone();
        let rate_limits = self.rate_limits.clone();
        let costs = self.costs.clone();

        let accounted = inner.map(move |item| {
            if let Ok(chunk) = &item {
                if let Some(usage) = chunk.usage.filter(|_| chunk.is_final) {
                    let rate_limits = rate_limits.clone();
                    let costs = costs.clone();
                    let model = model.clone();
                    let tenant = tenant.clone();
                    let credential = credential.clone();

                    tokio::spawn(async move {
                        rate_limits
                            .reconcile(platform, &credential, estimated, usage.total_tokens)
                            .await;

                        let record = costs.record(
                            platform,
                            &tenant,
                            &model,
                            Uuid::new_v4(),
                            usage.prompt_tokens,
                            usage.completion_tokens,
                        );

                        record_usage_metrics(platform, usage, record.usd_cost);
                    });
                }
            }

            item
        });

        Ok(Box::pin(accounted))
    }

    /// Fan the same conversation out to several platforms concurrently.
    ///
    /// Every requested platform gets an entry in the result map. One
    /// platform failing or timing out never disturbs the others.
    pub async fn complete_all(
        &self,
        request: &CompletionRequest,
        platforms: &[Platform],
        context: &RequestContext,
        per_call_timeout: Duration,
    ) -> BTreeMap<Platform, crate::Result<CompletionResponse>> {
        let mut calls = FuturesUnordered::new();

        for &platform in platforms {
            let mut request = request.clone();
            request.platform = platform;

            calls.push(async move {
                let result = match tokio::time::timeout(per_call_timeout, self.complete(&request, context)).await {
                    Ok(result) => result,
                    Err(_) => Err(LlmError::Timeout {
                        elapsed: per_call_timeout,
                    }),
                };

                (platform, result)
            });
        }

        let mut results = BTreeMap::new();

        while let Some((platform, result)) = calls.next().await {
            results.insert(platform, result);
        }

        results
    }

    /// Run a brand monitor job to completion.
    ///
    /// Every query is fanned out to every platform of the job; successful
    /// answers go through citation extraction for the job's brand. The job
    /// completes when anything succeeded and fails only when everything
    /// failed, then the webhook sink is notified. `per_call_timeout` bounds
    /// each platform call, retries included.
    pub async fn monitor_brand(
        &self,
        mut job: MonitorJob,
        context: &RequestContext,
        per_call_timeout: Duration,
    ) -> MonitorJob {
        job.mark_running();

        let platforms = job.platforms().to_vec();
        let queries = job.queries().to_vec();
        let brands = [job.brand_name().to_string()];

        for query in queries {
            let request = CompletionRequest::new(platforms.first().copied().unwrap_or(Platform::Openai), query);

            let results = self
                .complete_all(&request, &platforms, context, per_call_timeout)
                .await;

            for (platform, result) in results {
                let outcome = match result {
                    Ok(mut response) => {
                        response.citations = Some(citation::extract(&response.content, &brands));
                        PlatformOutcome::Success(response)
                    }
                    Err(e) => PlatformOutcome::Error {
                        error_type: e.error_type().to_string(),
                        message: e.to_string(),
                    },
                };

                job.record_outcome(platform, outcome);
            }
        }

        job.finalize();

        if self.webhooks.has_endpoints() {
            let event = WebhookEvent::new(WebhookEventType::MonitorJobCompleted, job.job_id());

            match self.webhooks.notify(&event).await {
                Ok(reports) => {
                    for report in reports.iter().filter(|r| !r.delivered) {
                        log::error!(
                            "Webhook delivery to {} failed after {} attempts",
                            report.endpoint,
                            report.attempts
                        );
                    }
                }
                Err(e) => log::error!("Failed to send job completion webhook: {e}"),
            }
        }

        job
    }

    /// Read-only snapshot of the accumulated usage totals.
    pub fn usage_snapshot(&self) -> UsageSnapshot {
        self.costs.snapshot()
    }

    /// Reset the usage totals, for new accounting periods.
    pub fn reset_usage(&self) {
        self.costs.reset()
    }
}

/// Reject malformed requests before a quota slot or a network call is spent.
fn validate_request(provider: &dyn Provider, request: &CompletionRequest) -> crate::Result<()> {
    if request.messages.is_empty() {
        return Err(LlmError::InvalidRequest(
            "A completion request needs at least one message".to_string(),
        ));
    }

    provider.upstream_model(request)?;

    Ok(())
}

fn record_usage_metrics(platform: Platform, usage: Usage, usd_cost: Option<f64>) {
    let attributes = [KeyValue::new("platform", platform.as_str())];
    let meter = metrics::meter();

    meter
        .u64_counter(LLM_CLIENT_INPUT_TOKEN_USAGE)
        .build()
        .add(u64::from(usage.prompt_tokens), &attributes);

    meter
        .u64_counter(LLM_CLIENT_OUTPUT_TOKEN_USAGE)
        .build()
        .add(u64::from(usage.completion_tokens), &attributes);

    if let Some(usd) = usd_cost {
        meter.f64_counter(LLM_CLIENT_COST_USD).build().add(usd, &attributes);
    }
}
