//! Per-call runtime context.

use axum::http::HeaderMap;
use tokio_util::sync::CancellationToken;

/// Header identifying the calling tenant.
const TENANT_HEADER: &str = "X-Tenant-Id";

/// Runtime context for one client operation.
///
/// Carries the identity used for cost attribution and rate-limit bucketing,
/// plus a cancellation handle. There is no hidden process-global state: every
/// operation receives its context explicitly.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Tenant the call is attributed to.
    pub tenant: String,
    /// Credential key for rate-limit bucketing. Defaults to the tenant.
    pub credential: String,
    /// Cancels the call when triggered.
    pub cancel: CancellationToken,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self {
            tenant: "default".to_string(),
            credential: "default".to_string(),
            cancel: CancellationToken::new(),
        }
    }
}

impl RequestContext {
    /// A context for the given tenant, with the tenant doubling as the
    /// rate-limit credential.
    pub fn for_tenant(tenant: impl Into<String>) -> Self {
        let tenant = tenant.into();

        Self {
            credential: tenant.clone(),
            tenant,
            cancel: CancellationToken::new(),
        }
    }
}

/// Extract a request context from HTTP request headers.
pub fn extract_context(headers: &HeaderMap) -> RequestContext {
    headers
        .get(TENANT_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(RequestContext::for_tenant)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_header_falls_back_to_default_tenant() {
        let context = extract_context(&HeaderMap::new());
        assert_eq!(context.tenant, "default");
        assert_eq!(context.credential, "default");
    }

    #[test]
    fn tenant_header_is_used_for_both_identities() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Tenant-Id", "acme-inc".parse().unwrap());

        let context = extract_context(&headers);
        assert_eq!(context.tenant, "acme-inc");
        assert_eq!(context.credential, "acme-inc");
    }
}
