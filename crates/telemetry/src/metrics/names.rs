//! Standard metric names following OpenTelemetry semantic conventions
//! See: https://opentelemetry.io/docs/specs/semconv/gen-ai/gen-ai-metrics/

/// HTTP server request duration in milliseconds
/// Note: Histograms automatically provide count and sum, so a separate counter is not needed
pub const HTTP_SERVER_REQUEST_DURATION: &str = "http.server.request.duration";

/// End-to-end LLM client operation duration in milliseconds, including
/// admission control, retries and accounting
pub const LLM_CLIENT_OPERATION_DURATION: &str = "llm.client.operation.duration";

/// Prompt tokens consumed per operation
pub const LLM_CLIENT_INPUT_TOKEN_USAGE: &str = "llm.client.input.token.usage";

/// Completion tokens consumed per operation
pub const LLM_CLIENT_OUTPUT_TOKEN_USAGE: &str = "llm.client.output.token.usage";

/// USD cost attributed per operation
pub const LLM_CLIENT_COST_USD: &str = "llm.client.cost.usd";

/// Requests rejected by local admission control
pub const LLM_CLIENT_RATE_LIMIT_REJECTIONS: &str = "llm.client.rate_limit.rejections";

/// Webhook delivery duration in milliseconds
pub const WEBHOOK_DELIVERY_DURATION: &str = "webhook.delivery.duration";
