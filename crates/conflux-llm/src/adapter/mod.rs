//! Provider adapters: one wire dialect per vendor family
//!
//! Each adapter owns payload construction, endpoint resolution, header
//! construction, and response normalization for its dialect. New
//! vendors are added by extending this table, never by branching
//! inside call sites:
//!
//! | dialect   | token field             | functions                         | thinking                     | system placement                  | media branch        |
//! |-----------|-------------------------|-----------------------------------|------------------------------|-----------------------------------|---------------------|
//! | openai    | `max_tokens`, o-family `max_completion_tokens` | `tools`, parallel off for two ids | n/a                | inline; o-family role `developer` | no                  |
//! | anthropic | `max_tokens`            | `tools`                           | `thinking` budget, excludes `top_p` | top-level `system` field    | no                  |
//! | google    | `maxOutputTokens`       | `functionDeclarations`            | n/a                          | top-level `systemInstruction`     | no                  |
//! | cohere    | `max_tokens`            | `tools`                           | n/a                          | leading `SYSTEM` message, with an exception list | no     |
//! | workers   | `max_tokens`            | `tools`                           | n/a                          | inline                            | prompt/image pair   |

pub mod anthropic;
pub mod cohere;
pub mod google;
pub mod openai;
pub mod workers;

use std::sync::Arc;

use conflux_config::{Config, ProviderConfig};
use conflux_core::{FunctionDescriptor, GatewayError};
use conflux_routing::ModelDescriptor;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use indexmap::IndexMap;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use url::Url;

use crate::dispatch::{Endpoint, RawReply};
use crate::types::{ChatCompletionRequest, NormalizedResponse};

pub use anthropic::AnthropicAdapter;
pub use cohere::CohereAdapter;
pub use google::GoogleAdapter;
pub use openai::OpenAiAdapter;
pub use workers::WorkersAdapter;

/// Normalization outcome
///
/// Media-generation dialects may return raw binary output; the pipeline
/// uploads it to blob storage and substitutes a textual reference.
#[derive(Debug, Clone)]
pub enum Normalized {
    /// Canonical text/tool-call response
    Response(NormalizedResponse),
    /// Binary media output awaiting blob-store upload
    Media {
        /// Raw media bytes
        bytes: Vec<u8>,
        /// Content type reported by the vendor
        content_type: String,
    },
}

/// Vendor-specific payload construction, endpoint resolution, and
/// response extraction
///
/// One instance per configured provider, stateless, constructed at
/// startup, safe for unsynchronized concurrent reads.
pub trait ProviderAdapter: Send + Sync {
    /// Provider name this adapter serves
    fn name(&self) -> &str;

    /// Translate the canonical request into this dialect's wire payload
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Params` when the request cannot be
    /// expressed in this dialect.
    fn build_payload(
        &self,
        request: &ChatCompletionRequest,
        model: &ModelDescriptor,
        functions: &[FunctionDescriptor],
    ) -> Result<Value, GatewayError>;

    /// Resolve the endpoint for a request/model pair
    fn endpoint(&self, request: &ChatCompletionRequest, model: &ModelDescriptor) -> Endpoint;

    /// Request headers for this provider
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Configuration` when configured header
    /// names or values are invalid.
    fn headers(&self) -> Result<HeaderMap, GatewayError>;

    /// Extract the canonical response from a raw vendor reply
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Provider` when the reply cannot be
    /// decoded in this dialect.
    fn normalize(&self, reply: &RawReply) -> Result<Normalized, GatewayError>;
}

/// Connection settings shared by every dialect
#[derive(Debug, Clone, Default)]
pub(crate) struct AdapterSettings {
    pub api_key: Option<SecretString>,
    pub base_url: Option<Url>,
    pub extra_headers: IndexMap<String, String>,
}

impl AdapterSettings {
    fn from_config(config: &ProviderConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            extra_headers: config.headers.clone(),
        }
    }

    /// Endpoint for a route: direct when a base URL is configured,
    /// otherwise a bare route for the gateway indirection
    pub(crate) fn endpoint(&self, route: &str) -> Endpoint {
        self.base_url.as_ref().map_or_else(
            || Endpoint::Route(route.to_owned()),
            |base| {
                let joined = format!("{}/{}", base.as_str().trim_end_matches('/'), route.trim_start_matches('/'));
                Url::parse(&joined).map_or_else(|_| Endpoint::Route(route.to_owned()), Endpoint::Direct)
            },
        )
    }

    /// Configured extra headers as a typed header map
    pub(crate) fn base_headers(&self) -> Result<HeaderMap, GatewayError> {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in &self.extra_headers {
            let name = HeaderName::try_from(name.as_str())
                .map_err(|e| GatewayError::Configuration(format!("invalid header name '{name}': {e}")))?;
            let value = HeaderValue::try_from(value.as_str())
                .map_err(|e| GatewayError::Configuration(format!("invalid header value for '{name:?}': {e}")))?;
            headers.insert(name, value);
        }
        Ok(headers)
    }

    /// Base headers plus a bearer authorization, when a key is set
    pub(crate) fn bearer_headers(&self) -> Result<HeaderMap, GatewayError> {
        let mut headers = self.base_headers()?;
        if let Some(key) = &self.api_key {
            let value = HeaderValue::try_from(format!("Bearer {}", key.expose_secret()))
                .map_err(|e| GatewayError::Configuration(format!("invalid api key: {e}")))?;
            headers.insert(http::header::AUTHORIZATION, value);
        }
        Ok(headers)
    }
}

/// Decode a JSON reply body
pub(crate) fn decode_json(provider: &str, reply: &RawReply) -> Result<Value, GatewayError> {
    serde_json::from_slice(&reply.body).map_err(|e| GatewayError::Provider {
        provider: provider.to_owned(),
        status: "decode".to_owned(),
        detail: format!("failed to parse response body: {e}"),
    })
}

/// Name-to-adapter lookup with a documented default fallback
pub struct AdapterRegistry {
    adapters: IndexMap<String, Arc<dyn ProviderAdapter>>,
    fallback: Arc<dyn ProviderAdapter>,
}

impl AdapterRegistry {
    /// Build one adapter per configured provider
    ///
    /// The `dialect` field selects the wire dialect; it defaults to the
    /// provider name. Unknown dialects get the openai-compatible
    /// adapter, which is the de-facto ecosystem default.
    pub fn from_config(config: &Config) -> Self {
        let mut adapters: IndexMap<String, Arc<dyn ProviderAdapter>> = IndexMap::new();

        for (name, provider) in &config.providers {
            let dialect = provider.dialect.as_deref().unwrap_or(name.as_str());
            let adapter: Arc<dyn ProviderAdapter> = match dialect {
                "anthropic" => Arc::new(AnthropicAdapter::new(name.clone(), provider)),
                "google" => Arc::new(GoogleAdapter::new(name.clone(), provider)),
                "cohere" => Arc::new(CohereAdapter::new(name.clone(), provider)),
                "workers" => Arc::new(WorkersAdapter::new(name.clone(), provider)),
                other => {
                    if other != "openai" {
                        tracing::warn!(provider = %name, dialect = %other, "unknown dialect, using openai-compatible adapter");
                    }
                    Arc::new(OpenAiAdapter::new(name.clone(), provider))
                }
            };
            adapters.insert(name.clone(), adapter);
        }

        Self {
            adapters,
            fallback: Arc::new(OpenAiAdapter::new("default".to_owned(), &ProviderConfig::default())),
        }
    }

    /// Adapter for a provider name, falling back to the default adapter
    pub fn get(&self, provider: &str) -> Arc<dyn ProviderAdapter> {
        self.adapters
            .get(provider)
            .map_or_else(|| Arc::clone(&self.fallback), Arc::clone)
    }
}
