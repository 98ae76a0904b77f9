use std::path::Path;

use crate::Config;

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, environment
    /// variable expansion fails, TOML parsing fails, or validation
    /// fails.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        let expanded =
            crate::env::expand_env(&raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        tracing::debug!(
            path = %path.display(),
            providers = config.providers.len(),
            models = config.models.len(),
            "configuration loaded"
        );

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error if model descriptors reference unknown
    /// providers or the routing defaults point at missing models.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_model_providers()?;
        self.validate_routing_defaults()?;
        Ok(())
    }

    /// Every model descriptor must reference a configured provider
    fn validate_model_providers(&self) -> anyhow::Result<()> {
        for model in &self.models {
            if !self.providers.contains_key(&model.provider) {
                anyhow::bail!(
                    "model '{}' references unknown provider '{}'",
                    model.id,
                    model.provider
                );
            }
        }
        Ok(())
    }

    /// Routing defaults must reference declared models
    fn validate_routing_defaults(&self) -> anyhow::Result<()> {
        if self.models.is_empty() {
            return Ok(());
        }

        if !self.models.iter().any(|m| m.id == self.routing.default_model) {
            anyhow::bail!(
                "routing.default_model '{}' is not a declared model",
                self.routing.default_model
            );
        }

        if let Some(classifier) = &self.routing.classifier_model
            && !self.models.iter().any(|m| &m.id == classifier)
        {
            anyhow::bail!("routing.classifier_model '{classifier}' is not a declared model");
        }

        Ok(())
    }
}
