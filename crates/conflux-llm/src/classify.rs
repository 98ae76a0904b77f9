//! Classification backend wired through the dispatch layer
//!
//! The requirement analyzer needs a cheap completion call; this
//! implementation routes it through the configured classifier model's
//! own adapter so the classification prompt speaks the right dialect.

use std::sync::Arc;

use async_trait::async_trait;
use conflux_core::{Content, GatewayError, Message, Role};
use conflux_routing::{CapabilityRegistry, Classifier};

use crate::adapter::{AdapterRegistry, Normalized};
use crate::dispatch::Dispatcher;
use crate::types::ChatCompletionRequest;

/// Classifier backed by a configured model
pub struct DispatchClassifier {
    dispatcher: Arc<Dispatcher>,
    adapters: Arc<AdapterRegistry>,
    registry: Arc<CapabilityRegistry>,
    model_id: String,
}

impl DispatchClassifier {
    /// Create a classifier pinned to a model id
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        adapters: Arc<AdapterRegistry>,
        registry: Arc<CapabilityRegistry>,
        model_id: impl Into<String>,
    ) -> Self {
        Self {
            dispatcher,
            adapters,
            registry,
            model_id: model_id.into(),
        }
    }
}

#[async_trait]
impl Classifier for DispatchClassifier {
    async fn classify(&self, system_prompt: &str, prompt: &str) -> Result<String, GatewayError> {
        let model = self.registry.get(&self.model_id).clone();
        let adapter = self.adapters.get(&model.provider);

        let request = ChatCompletionRequest {
            model: Some(model.id.clone()),
            messages: vec![
                Message::new(Role::System, Content::Text(system_prompt.to_owned())),
                Message::new(Role::User, Content::Text(prompt.to_owned())),
            ],
            use_tools: false,
            store: false,
            ..ChatCompletionRequest::default()
        };

        let payload = adapter.build_payload(&request, &model, &[])?;
        let headers = adapter.headers()?;
        let endpoint = adapter.endpoint(&request, &model);

        let reply = self
            .dispatcher
            .execute(&model.provider, &endpoint, headers, &payload)
            .await?;

        match adapter.normalize(&reply)? {
            Normalized::Response(normalized) => Ok(normalized.response),
            Normalized::Media { .. } => Err(GatewayError::Configuration(format!(
                "classifier model '{}' is a media-generation model",
                self.model_id
            ))),
        }
    }
}
