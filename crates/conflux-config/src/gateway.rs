use indexmap::IndexMap;
use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Configuration for a single provider backend
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// API key for authentication
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Fully-qualified base URL; absent means calls go through the
    /// AI-gateway indirection
    #[serde(default)]
    pub base_url: Option<Url>,
    /// Wire dialect override; defaults to the provider name
    #[serde(default)]
    pub dialect: Option<String>,
    /// Extra headers sent on every request to this provider
    #[serde(default)]
    pub headers: IndexMap<String, String>,
}

/// AI-gateway indirection configuration
///
/// Bare routes are resolved as `{base_url}/{provider}/{route}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AiGatewayConfig {
    /// Gateway base URL (account and gateway id already encoded)
    pub base_url: Url,
    /// Gateway authentication token
    #[serde(default)]
    pub token: Option<SecretString>,
}
