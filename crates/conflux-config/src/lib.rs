//! Configuration for the conflux gateway
//!
//! TOML-driven configuration with `{{ env.VAR }}` expansion. Provider
//! and model maps are order-preserving: registry iteration order is a
//! documented tie-break in model routing.

mod env;
mod gateway;
mod loader;
mod models;
mod retry;
mod routing;

use indexmap::IndexMap;
use serde::Deserialize;

pub use gateway::{AiGatewayConfig, ProviderConfig};
pub use models::{ModelDescriptorConfig, ModelType};
pub use retry::{Backoff, RetryPolicy};
pub use routing::RoutingConfig;

/// Top-level gateway configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Provider configurations keyed by name
    #[serde(default)]
    pub providers: IndexMap<String, ProviderConfig>,
    /// AI-gateway indirection for providers without a direct base URL
    #[serde(default)]
    pub ai_gateway: Option<AiGatewayConfig>,
    /// Retry/timeout/backoff policy applied at the dispatch boundary
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Model routing defaults
    #[serde(default)]
    pub routing: RoutingConfig,
    /// Model capability descriptors, loaded once at process start
    #[serde(default)]
    pub models: Vec<ModelDescriptorConfig>,
}
