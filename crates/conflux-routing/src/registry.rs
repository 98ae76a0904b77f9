//! Model capability registry
//!
//! Static table of model descriptors loaded once at process start.
//! Read-only afterwards and safe for unsynchronized concurrent reads.

use conflux_config::{ModelDescriptorConfig, ModelType};
use conflux_core::GatewayError;
use indexmap::IndexMap;

/// Runtime model descriptor
#[derive(Debug, Clone)]
pub struct ModelDescriptor {
    /// Internal model identifier
    pub id: String,
    /// Provider name
    pub provider: String,
    /// Vendor-native identifier sent on the wire
    pub wire_name: String,
    /// Supported task families
    pub model_types: Vec<ModelType>,
    /// Capability strength tags
    pub strengths: Vec<String>,
    /// Context window in tokens
    pub context_window: u32,
    /// Maximum output tokens
    pub max_tokens: u32,
    /// Cost per 1k input tokens (USD)
    pub cost_per_1k_input: f64,
    /// Cost per 1k output tokens (USD)
    pub cost_per_1k_output: f64,
    /// Context-complexity rank, 1-5
    pub context_complexity: u8,
    /// Reliability rank, 1-5; `None` when unobserved
    pub reliability: Option<u8>,
    /// Speed rank, 1-5; `None` when unobserved
    pub speed: Option<u8>,
    /// Accepts image inputs
    pub multimodal: bool,
    /// Supports tool/function declarations
    pub supports_functions: bool,
    /// Has an extended-thinking mode
    pub has_thinking: bool,
    /// May be selected by the router
    pub router_eligible: bool,
}

impl ModelDescriptor {
    /// Whether this model produces media output instead of text
    pub fn is_media_generation(&self) -> bool {
        self.model_types.iter().any(|t| t.is_media_generation())
    }

    /// Estimated request cost in USD for the given token counts
    pub fn estimate_cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        (f64::from(input_tokens) / 1000.0) * self.cost_per_1k_input
            + (f64::from(output_tokens) / 1000.0) * self.cost_per_1k_output
    }

    fn from_config(config: &ModelDescriptorConfig) -> Self {
        Self {
            id: config.id.clone(),
            provider: config.provider.clone(),
            wire_name: config.wire_name.clone().unwrap_or_else(|| config.id.clone()),
            model_types: config.model_types.clone(),
            strengths: config.strengths.clone(),
            context_window: config.context_window,
            max_tokens: config.max_tokens,
            cost_per_1k_input: config.cost_per_1k_input,
            cost_per_1k_output: config.cost_per_1k_output,
            context_complexity: config.context_complexity,
            reliability: config.reliability,
            speed: config.speed,
            multimodal: config.multimodal,
            supports_functions: config.supports_functions,
            has_thinking: config.has_thinking,
            router_eligible: config.router_eligible,
        }
    }
}

/// Read-only lookup table of model descriptors
///
/// Iteration order follows declaration order; the router documents this
/// as its tie-break.
#[derive(Debug)]
pub struct CapabilityRegistry {
    models: IndexMap<String, ModelDescriptor>,
    default_id: String,
}

impl CapabilityRegistry {
    /// Build the registry from configuration
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Configuration` if the default model is
    /// not among the declared descriptors.
    pub fn from_config(configs: &[ModelDescriptorConfig], default_id: &str) -> Result<Self, GatewayError> {
        let models: IndexMap<String, ModelDescriptor> = configs
            .iter()
            .map(|c| (c.id.clone(), ModelDescriptor::from_config(c)))
            .collect();

        if !models.contains_key(default_id) {
            return Err(GatewayError::Configuration(format!(
                "default model '{default_id}' is not a declared model"
            )));
        }

        Ok(Self {
            models,
            default_id: default_id.to_owned(),
        })
    }

    /// Look up a descriptor by internal id, falling back to the default
    ///
    /// Never returns nothing: unknown ids resolve to the configured
    /// default descriptor.
    pub fn get(&self, id: &str) -> &ModelDescriptor {
        self.models.get(id).unwrap_or_else(|| self.default_model())
    }

    /// Whether an id is actually declared (no fallback)
    pub fn contains(&self, id: &str) -> bool {
        self.models.contains_key(id)
    }

    /// Reverse lookup by the vendor's native model identifier
    ///
    /// Responses and webhooks reference the wire name, not the internal
    /// id.
    pub fn by_matching_wire_name(&self, name: &str) -> Option<&ModelDescriptor> {
        self.models
            .values()
            .find(|m| m.wire_name == name || m.id == name)
    }

    /// The configured default descriptor
    pub fn default_model(&self) -> &ModelDescriptor {
        self.models
            .get(&self.default_id)
            .unwrap_or_else(|| unreachable!("default model validated at construction"))
    }

    /// Router-eligible descriptors in declaration order
    pub fn router_eligible(&self) -> impl Iterator<Item = &ModelDescriptor> {
        self.models.values().filter(|m| m.router_eligible)
    }

    /// Union of every capability tag across all models
    pub fn capability_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = Vec::new();
        for model in self.models.values() {
            for tag in &model.strengths {
                if !tags.contains(tag) {
                    tags.push(tag.clone());
                }
            }
        }
        tags
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn descriptor(id: &str, provider: &str) -> ModelDescriptorConfig {
        ModelDescriptorConfig {
            id: id.to_owned(),
            provider: provider.to_owned(),
            wire_name: None,
            model_types: vec![],
            strengths: vec![],
            context_window: 128_000,
            max_tokens: 4096,
            cost_per_1k_input: 0.001,
            cost_per_1k_output: 0.002,
            context_complexity: 3,
            reliability: None,
            speed: None,
            multimodal: false,
            supports_functions: false,
            has_thinking: false,
            router_eligible: false,
        }
    }

    #[test]
    fn unknown_id_falls_back_to_default() {
        let registry =
            CapabilityRegistry::from_config(&[descriptor("a", "openai"), descriptor("b", "openai")], "a").unwrap();
        assert_eq!(registry.get("nope").id, "a");
        assert_eq!(registry.get("b").id, "b");
    }

    #[test]
    fn missing_default_is_a_configuration_error() {
        let result = CapabilityRegistry::from_config(&[descriptor("a", "openai")], "zzz");
        assert!(matches!(result, Err(GatewayError::Configuration(_))));
    }

    #[test]
    fn wire_name_reverse_lookup() {
        let mut config = descriptor("claude-sonnet", "anthropic");
        config.wire_name = Some("claude-sonnet-4-20250514".to_owned());
        let registry = CapabilityRegistry::from_config(&[config], "claude-sonnet").unwrap();

        let hit = registry.by_matching_wire_name("claude-sonnet-4-20250514").unwrap();
        assert_eq!(hit.id, "claude-sonnet");
        // Internal id also matches
        assert!(registry.by_matching_wire_name("claude-sonnet").is_some());
        assert!(registry.by_matching_wire_name("unknown").is_none());
    }

    #[test]
    fn capability_tags_are_deduplicated() {
        let mut a = descriptor("a", "openai");
        a.strengths = vec!["coding".to_owned(), "math".to_owned()];
        let mut b = descriptor("b", "openai");
        b.strengths = vec!["math".to_owned(), "vision".to_owned()];

        let registry = CapabilityRegistry::from_config(&[a, b], "a").unwrap();
        assert_eq!(registry.capability_tags(), ["coding", "math", "vision"]);
    }
}
