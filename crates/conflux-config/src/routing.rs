use serde::Deserialize;

/// Model routing defaults
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingConfig {
    /// Model used when no candidate scores above zero or the request
    /// pins an unknown id
    #[serde(default = "default_model")]
    pub default_model: String,
    /// Model used for prompt requirement classification
    #[serde(default)]
    pub classifier_model: Option<String>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            classifier_model: None,
        }
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_owned()
}
