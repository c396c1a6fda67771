//! The HTTP surface over the monitoring client.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Request, State},
    http::HeaderMap,
    middleware::{self, Next},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use config::Config;
use cost::UsageSnapshot;
use futures::StreamExt;
use llm::{CompletionRequest, LlmError, MonitorClient, MonitorJob, Platform, extract_context};
use serde::Deserialize;
use telemetry::metrics::{HTTP_SERVER_REQUEST_DURATION, Recorder};

/// Deadline for each platform call made by a monitor job, retries included.
const MONITOR_CALL_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) struct ServeConfig {
    pub listen_address: SocketAddr,
    pub config: Config,
}

pub(crate) async fn serve(ServeConfig { listen_address, config }: ServeConfig) -> anyhow::Result<()> {
    for warning in config.validate()? {
        log::warn!("{warning}");
    }

    let _telemetry = telemetry::init(&config.telemetry).await?;

    if !config.has_providers() {
        log::warn!("No LLM providers configured, completion requests will fail");
    }

    let client = Arc::new(MonitorClient::new(&config)?);
    let app = router(client);

    let listener = tokio::net::TcpListener::bind(&listen_address).await?;
    log::info!("Brandlens listening on {listen_address}");

    axum::serve(listener, app).await?;

    Ok(())
}

fn router(client: Arc<MonitorClient>) -> Router {
    Router::new()
        .route("/v1/completions", post(complete))
        .route("/v1/monitor-jobs", post(run_monitor_job))
        .route("/v1/usage", get(usage))
        .route("/health", get(health))
        .layer(middleware::from_fn(record_request_metrics))
        .with_state(client)
}

/// One endpoint serves both response modes: `"stream": true` in the body
/// switches to server-sent events.
async fn complete(
    State(client): State<Arc<MonitorClient>>,
    headers: HeaderMap,
    Json(request): Json<CompletionRequest>,
) -> Result<Response, LlmError> {
    let context = extract_context(&headers);

    if request.stream.unwrap_or_default() {
        let stream = client.stream_complete(&request, &context).await?;

        let events = stream.map(|item| match item {
            Ok(chunk) => Event::default().json_data(&chunk),
            Err(e) => Event::default().event("error").json_data(serde_json::json!({
                "message": e.to_string(),
                "type": e.error_type(),
            })),
        });

        Ok(Sse::new(events).keep_alive(KeepAlive::default()).into_response())
    } else {
        let response = client.complete(&request, &context).await?;
        Ok(Json(response).into_response())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MonitorJobRequest {
    brand_name: String,
    platforms: Vec<Platform>,
    queries: Vec<String>,
}

/// Runs a monitor job to its terminal state and returns it, results and
/// all. Fan-out bounds the wall time per platform call, so the response
/// arrives even when a platform hangs.
async fn run_monitor_job(
    State(client): State<Arc<MonitorClient>>,
    headers: HeaderMap,
    Json(request): Json<MonitorJobRequest>,
) -> Result<Json<MonitorJob>, LlmError> {
    if request.platforms.is_empty() || request.queries.is_empty() {
        return Err(LlmError::InvalidRequest(
            "A monitor job needs at least one platform and one query".to_string(),
        ));
    }

    let context = extract_context(&headers);
    let job = MonitorJob::new(request.brand_name, request.platforms, request.queries);

    log::info!("Running monitor job {} for brand '{}'", job.job_id(), job.brand_name());

    Ok(Json(client.monitor_brand(job, &context, MONITOR_CALL_TIMEOUT).await))
}

async fn usage(State(client): State<Arc<MonitorClient>>) -> Json<UsageSnapshot> {
    Json(client.usage_snapshot())
}

async fn health(State(client): State<Arc<MonitorClient>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "platforms": client.platforms(),
    }))
}

async fn record_request_metrics(request: Request, next: Next) -> Response {
    let mut recorder = Recorder::new(HTTP_SERVER_REQUEST_DURATION);
    recorder.push_attribute("http.request.method", request.method().to_string());
    recorder.push_attribute("url.path", request.uri().path().to_string());

    let response = next.run(request).await;

    recorder.push_attribute("http.response.status_code", i64::from(response.status().as_u16()));
    recorder.record();

    response
}
