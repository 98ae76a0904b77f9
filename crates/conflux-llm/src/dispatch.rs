//! Vendor dispatch with uniform retry/timeout policy
//!
//! Every outbound vendor call goes through [`Dispatcher`] so the retry
//! policy cannot be bypassed by individual call sites. Endpoints are
//! either fully-qualified URLs called directly or bare routes resolved
//! through the AI-gateway indirection.

use std::pin::Pin;

use bytes::Bytes;
use conflux_config::{AiGatewayConfig, RetryPolicy};
use conflux_core::GatewayError;
use futures_util::{Stream, StreamExt};
use http::HeaderMap;
use reqwest::{Client, Method, StatusCode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

/// Header carrying the gateway's own authentication token
const GATEWAY_AUTH_HEADER: &str = "cf-aig-authorization";

/// Response headers carrying vendor trace metadata
const EVENT_ID_HEADER: &str = "cf-aig-event-id";
const LOG_ID_HEADER: &str = "cf-aig-log-id";
const CACHE_STATUS_HEADER: &str = "cf-aig-cache-status";

/// Where a vendor call should be sent
#[derive(Debug, Clone)]
pub enum Endpoint {
    /// Bare route resolved as `{gateway}/{provider}/{route}`
    Route(String),
    /// Fully-qualified address called directly
    Direct(Url),
}

/// Trace metadata read from vendor response headers
///
/// Attached to the normalized response so the entry point and the
/// feedback API can reference the vendor-side log entry later.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorTrace {
    /// Vendor event id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    /// Vendor log id, referenced by feedback submissions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_id: Option<String>,
    /// Gateway cache status (HIT/MISS)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_status: Option<String>,
}

impl VendorTrace {
    /// Extract trace metadata from response headers
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let read = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        };
        Self {
            event_id: read(EVENT_ID_HEADER),
            log_id: read(LOG_ID_HEADER),
            cache_status: read(CACHE_STATUS_HEADER),
        }
    }

    /// Whether no trace headers were present
    pub const fn is_empty(&self) -> bool {
        self.event_id.is_none() && self.log_id.is_none() && self.cache_status.is_none()
    }
}

/// Raw vendor reply before normalization
#[derive(Debug, Clone)]
pub struct RawReply {
    /// Response body bytes
    pub body: Bytes,
    /// Content type of the body
    pub content_type: String,
    /// Trace metadata from response headers
    pub trace: VendorTrace,
}

/// A live byte stream plus the trace metadata from its response headers
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, GatewayError>> + Send>>;

/// Outbound vendor call executor
pub struct Dispatcher {
    client: Client,
    gateway: Option<AiGatewayConfig>,
    retry: RetryPolicy,
}

impl Dispatcher {
    /// Create a dispatcher with the given gateway indirection and policy
    pub fn new(gateway: Option<AiGatewayConfig>, retry: RetryPolicy) -> Self {
        Self {
            client: Client::new(),
            gateway,
            retry,
        }
    }

    /// Resolve an endpoint to a concrete URL
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Configuration` when a bare route is used
    /// without a configured AI gateway, or the resolved URL is invalid.
    pub fn resolve_url(&self, provider: &str, endpoint: &Endpoint) -> Result<Url, GatewayError> {
        match endpoint {
            Endpoint::Direct(url) => Ok(url.clone()),
            Endpoint::Route(route) => {
                let Some(gateway) = &self.gateway else {
                    return Err(GatewayError::Configuration(format!(
                        "provider '{provider}' has no base_url and no ai_gateway is configured"
                    )));
                };
                let base = gateway.base_url.as_str().trim_end_matches('/');
                let route = route.trim_start_matches('/');
                Url::parse(&format!("{base}/{provider}/{route}"))
                    .map_err(|e| GatewayError::Configuration(format!("invalid gateway route '{route}': {e}")))
            }
        }
    }

    /// Execute a non-streaming vendor call
    ///
    /// The retry policy applies uniformly: network errors, timeouts,
    /// rate limits, and retryable provider errors are retried with the
    /// configured backoff; authentication, authorization, and
    /// configuration failures are not.
    ///
    /// # Errors
    ///
    /// Returns the classified error of the final attempt.
    pub async fn execute(
        &self,
        provider: &str,
        endpoint: &Endpoint,
        headers: HeaderMap,
        payload: &Value,
    ) -> Result<RawReply, GatewayError> {
        self.send(Method::POST, provider, endpoint, headers, payload).await
    }

    /// Execute a vendor call with an explicit method
    ///
    /// Used by feedback forwarding, which PUTs to the trace-annotation
    /// endpoint. Same retry semantics as [`Self::execute`].
    ///
    /// # Errors
    ///
    /// Returns the classified error of the final attempt.
    pub async fn send(
        &self,
        method: Method,
        provider: &str,
        endpoint: &Endpoint,
        headers: HeaderMap,
        payload: &Value,
    ) -> Result<RawReply, GatewayError> {
        let url = self.resolve_url(provider, endpoint)?;
        let via_gateway = matches!(endpoint, Endpoint::Route(_));

        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = self
                .attempt(method.clone(), provider, url.clone(), via_gateway, headers.clone(), payload)
                .await;

            match result {
                Ok(reply) => return Ok(reply),
                Err(err) if attempt < self.retry.max_attempts && err.is_retryable() => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        provider = %provider,
                        attempt,
                        delay_ms = delay.as_millis(),
                        error = %err,
                        "dispatch attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Open a streaming vendor call
    ///
    /// Retries apply to establishing the connection; once the stream is
    /// open, chunks flow through untouched and transport errors surface
    /// as stream items.
    ///
    /// # Errors
    ///
    /// Returns the classified error of the final connection attempt.
    pub async fn execute_stream(
        &self,
        provider: &str,
        endpoint: &Endpoint,
        headers: HeaderMap,
        payload: &Value,
    ) -> Result<(ByteStream, VendorTrace), GatewayError> {
        let url = self.resolve_url(provider, endpoint)?;
        let via_gateway = matches!(endpoint, Endpoint::Route(_));
        let provider_name = provider.to_owned();

        let mut attempt = 0;
        let response = loop {
            attempt += 1;
            let result = self
                .open(Method::POST, provider, url.clone(), via_gateway, headers.clone(), payload)
                .await;

            match result {
                Ok(response) => break response,
                Err(err) if attempt < self.retry.max_attempts && err.is_retryable() => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        provider = %provider,
                        attempt,
                        error = %err,
                        "stream connection failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        };

        let trace = VendorTrace::from_headers(response.headers());
        let stream = response.bytes_stream().map(move |chunk| {
            chunk.map_err(|e| GatewayError::Provider {
                provider: provider_name.clone(),
                status: "stream".to_owned(),
                detail: e.to_string(),
            })
        });

        Ok((Box::pin(stream), trace))
    }

    /// One attempt of a buffered call
    async fn attempt(
        &self,
        method: Method,
        provider: &str,
        url: Url,
        via_gateway: bool,
        headers: HeaderMap,
        payload: &Value,
    ) -> Result<RawReply, GatewayError> {
        let response = self.open(method, provider, url, via_gateway, headers, payload).await?;

        let trace = VendorTrace::from_headers(response.headers());
        let content_type = response
            .headers()
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/json")
            .to_owned();

        let body = response.bytes().await.map_err(|e| GatewayError::Provider {
            provider: provider.to_owned(),
            status: "body".to_owned(),
            detail: e.to_string(),
        })?;

        Ok(RawReply {
            body,
            content_type,
            trace,
        })
    }

    /// Send the request and classify a non-success status
    async fn open(
        &self,
        method: Method,
        provider: &str,
        url: Url,
        via_gateway: bool,
        headers: HeaderMap,
        payload: &Value,
    ) -> Result<reqwest::Response, GatewayError> {
        let mut builder = self.client.request(method, url).headers(headers).json(payload);

        if via_gateway
            && let Some(token) = self.gateway.as_ref().and_then(|g| g.token.as_ref())
        {
            builder = builder.header(GATEWAY_AUTH_HEADER, format!("Bearer {}", token.expose_secret()));
        }

        let send = builder.send();
        let response = tokio::time::timeout(self.retry.request_timeout, send)
            .await
            .map_err(|_| {
                GatewayError::Unknown(anyhow::anyhow!(
                    "request to '{provider}' timed out after {:?}",
                    self.retry.request_timeout
                ))
            })?
            .map_err(|e| GatewayError::Unknown(anyhow::anyhow!("request to '{provider}' failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(http::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let body = response.text().await.unwrap_or_default();

        Err(classify_status(provider, status, retry_after, body))
    }
}

/// Map a non-success vendor status onto the error taxonomy
fn classify_status(provider: &str, status: StatusCode, retry_after: Option<u64>, body: String) -> GatewayError {
    match status {
        StatusCode::UNAUTHORIZED => GatewayError::Authentication(format!("provider '{provider}' rejected credentials")),
        StatusCode::FORBIDDEN => GatewayError::Forbidden(format!("provider '{provider}' denied access")),
        StatusCode::NOT_FOUND => GatewayError::NotFound(format!("provider '{provider}' endpoint not found")),
        StatusCode::TOO_MANY_REQUESTS => GatewayError::RateLimited {
            retry_after: retry_after.unwrap_or(1),
        },
        _ => GatewayError::Provider {
            provider: provider.to_owned(),
            status: status.to_string(),
            detail: body,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> AiGatewayConfig {
        serde_json::from_value(serde_json::json!({
            "base_url": "https://gateway.example.com/v1/acct/gw/"
        }))
        .unwrap()
    }

    #[test]
    fn bare_route_resolves_through_gateway() {
        let dispatcher = Dispatcher::new(Some(gateway()), RetryPolicy::default());
        let url = dispatcher
            .resolve_url("openai", &Endpoint::Route("chat/completions".to_owned()))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://gateway.example.com/v1/acct/gw/openai/chat/completions"
        );
    }

    #[test]
    fn bare_route_without_gateway_is_a_configuration_error() {
        let dispatcher = Dispatcher::new(None, RetryPolicy::default());
        let result = dispatcher.resolve_url("openai", &Endpoint::Route("chat/completions".to_owned()));
        assert!(matches!(result, Err(GatewayError::Configuration(_))));
    }

    #[test]
    fn direct_endpoint_bypasses_gateway() {
        let dispatcher = Dispatcher::new(None, RetryPolicy::default());
        let direct = Url::parse("https://api.example.com/v1/chat").unwrap();
        let url = dispatcher.resolve_url("openai", &Endpoint::Direct(direct.clone())).unwrap();
        assert_eq!(url, direct);
    }

    #[test]
    fn trace_headers_are_extracted() {
        let mut headers = HeaderMap::new();
        headers.insert(LOG_ID_HEADER, "log-123".parse().unwrap());
        headers.insert(CACHE_STATUS_HEADER, "HIT".parse().unwrap());

        let trace = VendorTrace::from_headers(&headers);
        assert_eq!(trace.log_id.as_deref(), Some("log-123"));
        assert_eq!(trace.cache_status.as_deref(), Some("HIT"));
        assert!(trace.event_id.is_none());
        assert!(!trace.is_empty());
        assert!(VendorTrace::from_headers(&HeaderMap::new()).is_empty());
    }

    #[test]
    fn status_codes_map_to_the_taxonomy() {
        assert!(matches!(
            classify_status("p", StatusCode::UNAUTHORIZED, None, String::new()),
            GatewayError::Authentication(_)
        ));
        assert!(matches!(
            classify_status("p", StatusCode::FORBIDDEN, None, String::new()),
            GatewayError::Forbidden(_)
        ));
        assert!(matches!(
            classify_status("p", StatusCode::TOO_MANY_REQUESTS, Some(7), String::new()),
            GatewayError::RateLimited { retry_after: 7 }
        ));
        let provider_err = classify_status("p", StatusCode::BAD_GATEWAY, None, "upstream down".to_owned());
        assert!(matches!(provider_err, GatewayError::Provider { .. }));
        assert!(provider_err.is_retryable());
    }
}
