//! End-to-end client tests against mock provider servers.

#![allow(clippy::panic)]

use std::time::Duration;

use citation::CitationKind;
use config::Config;
use futures::StreamExt;
use indoc::formatdoc;
use llm::{
    CompletionRequest, JobStatus, LlmError, MonitorClient, MonitorJob, Platform, PlatformOutcome, RequestContext,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(openai_url: &str, anthropic_url: &str, perplexity_url: &str) -> Config {
    let config = formatdoc! {r#"
        [retry]
        max_attempts = 2
        base_delay = "10ms"
        max_delay = "40ms"

        [providers.openai]
        api_key = "sk-openai"
        base_url = "{openai_url}"

        [providers.openai.models.gpt-4o]

        [providers.anthropic]
        api_key = "sk-anthropic"
        base_url = "{anthropic_url}"

        [providers.anthropic.models.claude-sonnet-4]

        [providers.perplexity]
        api_key = "pplx-test"
        base_url = "{perplexity_url}"

        [providers.perplexity.models.sonar]
    "#};

    toml::from_str(&config).unwrap()
}

fn openai_completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "model": "gpt-4o",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }],
        "usage": { "prompt_tokens": 12, "completion_tokens": 5, "total_tokens": 17 }
    })
}

#[tokio::test]
async fn completion_round_trip_with_cost_accounting() {
    let openai = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_completion("Acme makes the best anvils.")))
        .expect(1)
        .mount(&openai)
        .await;

    let config = test_config(&openai.uri(), "http://unused.invalid", "http://unused.invalid");
    let client = MonitorClient::new(&config).unwrap();

    let request = CompletionRequest::new(Platform::Openai, "Who makes the best anvils?");
    let response = client.complete(&request, &RequestContext::default()).await.unwrap();

    assert_eq!(response.content, "Acme makes the best anvils.");
    assert_eq!(response.model, "gpt-4o");
    assert_eq!(response.usage.prompt_tokens, 12);
    assert_eq!(response.usage.completion_tokens, 5);

    let snapshot = client.usage_snapshot();
    let totals = snapshot.platforms.get("openai").unwrap();

    assert_eq!(totals.requests, 1);
    assert_eq!(totals.prompt_tokens, 12);
    assert_eq!(totals.completion_tokens, 5);

    // gpt-4o is in the built-in pricing table.
    let expected_usd = 12.0 / 1000.0 * 0.0025 + 5.0 / 1000.0 * 0.01;
    assert!((totals.usd - expected_usd).abs() < 1e-12);
    assert!(snapshot.tenants.contains_key("default"));
}

#[tokio::test]
async fn transient_failures_retry_a_bounded_number_of_times() {
    let openai = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(2)
        .mount(&openai)
        .await;

    let config = test_config(&openai.uri(), "http://unused.invalid", "http://unused.invalid");
    let client = MonitorClient::new(&config).unwrap();

    let request = CompletionRequest::new(Platform::Openai, "hello");
    let error = client.complete(&request, &RequestContext::default()).await.unwrap_err();

    assert!(matches!(error, LlmError::Transient { status: 503, .. }));
}

#[tokio::test]
async fn fan_out_isolates_platform_failures() {
    let openai = MockServer::start().await;
    let perplexity = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&openai)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "sonar",
            "choices": [{
                "message": { "content": "Acme leads the anvil market." },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 9, "completion_tokens": 6 },
            "citations": ["https://anvils.example.com/report"]
        })))
        .mount(&perplexity)
        .await;

    let config = test_config(&openai.uri(), "http://unused.invalid", &perplexity.uri());
    let client = MonitorClient::new(&config).unwrap();

    let request = CompletionRequest::new(Platform::Openai, "Who leads the anvil market?");
    let results = client
        .complete_all(
            &request,
            &[Platform::Openai, Platform::Perplexity],
            &RequestContext::default(),
            Duration::from_secs(5),
        )
        .await;

    assert_eq!(results.len(), 2);
    assert!(matches!(
        results.get(&Platform::Openai).unwrap(),
        Err(LlmError::Transient { status: 500, .. })
    ));

    let response = results.get(&Platform::Perplexity).unwrap().as_ref().unwrap();
    assert_eq!(response.content, "Acme leads the anvil market.");
    assert_eq!(response.source_urls, vec!["https://anvils.example.com/report"]);
}

#[tokio::test]
async fn unknown_model_is_rejected_before_any_call() {
    let openai = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_completion("unreachable")))
        .expect(0)
        .mount(&openai)
        .await;

    let config = test_config(&openai.uri(), "http://unused.invalid", "http://unused.invalid");
    let client = MonitorClient::new(&config).unwrap();

    let mut request = CompletionRequest::new(Platform::Openai, "hello");
    request.model = Some("gpt-imaginary".to_string());

    let error = client.complete(&request, &RequestContext::default()).await.unwrap_err();

    assert!(matches!(error, LlmError::ModelNotFound(_)));
}

#[tokio::test]
async fn empty_conversations_are_rejected_locally() {
    let config = test_config(
        "http://unused.invalid",
        "http://unused.invalid",
        "http://unused.invalid",
    );
    let client = MonitorClient::new(&config).unwrap();

    let mut request = CompletionRequest::new(Platform::Openai, "hello");
    request.messages.clear();

    let error = client.complete(&request, &RequestContext::default()).await.unwrap_err();

    assert!(matches!(error, LlmError::InvalidRequest(_)));
}

#[tokio::test]
async fn completion_tokens_count_against_the_token_bucket() {
    let openai = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": "a long answer" },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 8, "completion_tokens": 292, "total_tokens": 300 }
        })))
        .mount(&openai)
        .await;

    let openai_url = openai.uri();
    let config = formatdoc! {r#"
        [retry]
        max_attempts = 1

        [providers.openai]
        api_key = "sk-openai"
        base_url = "{openai_url}"

        [providers.openai.models.gpt-4o]

        [providers.openai.rate_limits.tokens]
        limit = 900
        interval = "60s"
    "#};
    let config: Config = toml::from_str(&config).unwrap();

    let client = MonitorClient::new(&config).unwrap();
    let context = RequestContext::default();
    let request = CompletionRequest::new(Platform::Openai, "hello");

    // Each call reports 300 total tokens, so three exhaust the 900-token
    // window even though the prompts alone would fit many more.
    for _ in 0..3 {
        client.complete(&request, &context).await.unwrap();
    }

    let error = client.complete(&request, &context).await.unwrap_err();

    assert!(matches!(error, LlmError::RateLimited { .. }));
}

#[tokio::test]
async fn cancellation_interrupts_the_retry_backoff() {
    let openai = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&openai)
        .await;

    let openai_url = openai.uri();
    let config = formatdoc! {r#"
        [retry]
        max_attempts = 3
        base_delay = "30s"
        max_delay = "30s"

        [providers.openai]
        api_key = "sk-openai"
        base_url = "{openai_url}"

        [providers.openai.models.gpt-4o]
    "#};
    let config: Config = toml::from_str(&config).unwrap();

    let client = MonitorClient::new(&config).unwrap();
    let context = RequestContext::default();

    let cancel = context.cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
    });

    let started = std::time::Instant::now();
    let request = CompletionRequest::new(Platform::Openai, "hello");
    let error = client.complete(&request, &context).await.unwrap_err();

    // Cancelled during the 30s backoff wait, not after it.
    assert!(matches!(error, LlmError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn admission_control_rejects_over_the_request_limit() {
    let openai = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_completion("ok")))
        .expect(1)
        .mount(&openai)
        .await;

    let openai_url = openai.uri();
    let config = formatdoc! {r#"
        [retry]
        max_attempts = 1

        [providers.openai]
        api_key = "sk-openai"
        base_url = "{openai_url}"

        [providers.openai.models.gpt-4o]

        [providers.openai.rate_limits.requests]
        limit = 1
        interval = "60s"
    "#};
    let config: Config = toml::from_str(&config).unwrap();

    let client = MonitorClient::new(&config).unwrap();
    let context = RequestContext::default();
    let request = CompletionRequest::new(Platform::Openai, "hello");

    client.complete(&request, &context).await.unwrap();

    let error = client.complete(&request, &context).await.unwrap_err();
    assert!(matches!(error, LlmError::RateLimited { .. }));
}

#[tokio::test]
async fn cancelled_requests_surface_without_retrying() {
    let openai = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(openai_completion("slow"))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&openai)
        .await;

    let config = test_config(&openai.uri(), "http://unused.invalid", "http://unused.invalid");
    let client = MonitorClient::new(&config).unwrap();

    let context = RequestContext::default();
    context.cancel.cancel();

    let request = CompletionRequest::new(Platform::Openai, "hello");
    let error = client.complete(&request, &context).await.unwrap_err();

    assert!(matches!(error, LlmError::Cancelled));
}

#[tokio::test]
async fn monitor_job_extracts_citations_and_tolerates_a_hung_platform() {
    let openai = MockServer::start().await;
    let anthropic = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_completion("Acme is great at making anvils.")))
        .mount(&openai)
        .await;

    // Answers eventually, but well past the per-call deadline.
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({
                    "model": "claude-sonnet-4",
                    "content": [{ "type": "text", "text": "too late" }],
                    "stop_reason": "end_turn",
                    "usage": { "input_tokens": 8, "output_tokens": 2 }
                }))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&anthropic)
        .await;

    let config = test_config(&openai.uri(), &anthropic.uri(), "http://unused.invalid");
    let client = MonitorClient::new(&config).unwrap();

    let job = MonitorJob::new(
        "Acme",
        vec![Platform::Openai, Platform::Anthropic],
        vec!["Tell me about Acme".to_string()],
    );

    let job = client
        .monitor_brand(job, &RequestContext::default(), Duration::from_secs(2))
        .await;

    // One platform succeeded, so the job completes.
    assert_eq!(job.status(), JobStatus::Completed);

    let openai_outcomes = job.results().get(&Platform::Openai).unwrap();
    let PlatformOutcome::Success(response) = &openai_outcomes[0] else {
        panic!("expected a successful OpenAI outcome");
    };

    let citations = response.citations.as_ref().unwrap();
    assert_eq!(citations.len(), 1);
    assert_eq!(citations[0].matched_text, "Acme");
    assert_eq!(citations[0].kind, CitationKind::DirectMention);

    let anthropic_outcomes = job.results().get(&Platform::Anthropic).unwrap();
    let PlatformOutcome::Error { error_type, .. } = &anthropic_outcomes[0] else {
        panic!("expected a timed out Anthropic outcome");
    };
    assert_eq!(error_type, "timeout_error");
}

#[tokio::test]
async fn streaming_concatenates_to_the_full_completion() {
    let openai = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({ "stream": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_completion("Acme rocks")))
        .mount(&openai)
        .await;

    let sse_body = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"Acme \"},\"finish_reason\":null}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"rocks\"},\"finish_reason\":\"stop\"}]}\n\n",
        "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":10,\"completion_tokens\":2}}\n\n",
        "data: [DONE]\n\n",
    );

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({ "stream": true })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sse_body, "text/event-stream"))
        .mount(&openai)
        .await;

    let config = test_config(&openai.uri(), "http://unused.invalid", "http://unused.invalid");
    let client = MonitorClient::new(&config).unwrap();
    let context = RequestContext::default();

    let request = CompletionRequest::new(Platform::Openai, "Tell me about Acme");
    let full = client.complete(&request, &context).await.unwrap();

    let stream = client.stream_complete(&request, &context).await.unwrap();
    let chunks: Vec<_> = stream.map(Result::unwrap).collect().await;

    let concatenated: String = chunks.iter().map(|c| c.delta.as_str()).collect();
    assert_eq!(concatenated, full.content);

    let last = chunks.last().unwrap();
    assert!(last.is_final);

    let usage = last.usage.unwrap();
    assert_eq!(usage.prompt_tokens, 10);
    assert_eq!(usage.completion_tokens, 2);
}
