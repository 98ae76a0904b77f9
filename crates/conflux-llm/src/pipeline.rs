//! Orchestration entry point
//!
//! Composes requirement analysis, routing, parameter mapping, dispatch,
//! normalization, guardrails, tool execution, and persistence into one
//! request lifecycle. Collaborators are optional; an unwired pipeline
//! simply skips the corresponding step.

use std::sync::Arc;

use conflux_core::{
    BlobStore, Content, ContextRetriever, ConversationStore, FunctionDescriptor, FunctionRegistry, GatewayError,
    GuardrailsValidator, Message, RequestContext, Role,
};
use conflux_routing::{CapabilityRegistry, ModelDescriptor, RequirementAnalyzer, select_model};
use serde_json::json;

use crate::adapter::{AdapterRegistry, Normalized};
use crate::dispatch::{ByteStream, Dispatcher, VendorTrace};
use crate::mapper;
use crate::stream::PostProcessor;
use crate::tools::ToolOrchestrator;
use crate::types::{ChatCompletionRequest, NormalizedResponse, RequestMode};

/// Outcome of one completion request
pub enum CompletionOutcome {
    /// Non-streaming completion
    Completed(Message),
    /// A guardrails check rejected the request or the response
    ValidationFailed {
        /// Which check failed: "input" or "output"
        validation: &'static str,
        /// Transport error from the validator, when it failed outright
        error: Option<String>,
        /// Violations reported by the validator
        violations: Vec<String>,
    },
    /// Live post-processed stream
    Streaming(ByteStream),
}

/// The completion orchestration pipeline
pub struct CompletionPipeline {
    registry: Arc<CapabilityRegistry>,
    adapters: Arc<AdapterRegistry>,
    dispatcher: Arc<Dispatcher>,
    analyzer: Option<RequirementAnalyzer>,
    guardrails: Option<Arc<dyn GuardrailsValidator>>,
    store: Option<Arc<dyn ConversationStore>>,
    functions: Option<Arc<dyn FunctionRegistry>>,
    blobs: Option<Arc<dyn BlobStore>>,
    retriever: Option<Arc<dyn ContextRetriever>>,
}

impl CompletionPipeline {
    /// Create a pipeline over the core components
    pub fn new(registry: Arc<CapabilityRegistry>, adapters: Arc<AdapterRegistry>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            registry,
            adapters,
            dispatcher,
            analyzer: None,
            guardrails: None,
            store: None,
            functions: None,
            blobs: None,
            retriever: None,
        }
    }

    /// Attach the requirement analyzer (enables model routing)
    #[must_use]
    pub fn with_analyzer(mut self, analyzer: Option<RequirementAnalyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    /// Attach the guardrails collaborator
    #[must_use]
    pub fn with_guardrails(mut self, guardrails: Option<Arc<dyn GuardrailsValidator>>) -> Self {
        self.guardrails = guardrails;
        self
    }

    /// Attach the conversation store
    #[must_use]
    pub fn with_store(mut self, store: Option<Arc<dyn ConversationStore>>) -> Self {
        self.store = store;
        self
    }

    /// Attach the function registry (enables tool execution)
    #[must_use]
    pub fn with_functions(mut self, functions: Option<Arc<dyn FunctionRegistry>>) -> Self {
        self.functions = functions;
        self
    }

    /// Attach blob storage (required for media-generation output)
    #[must_use]
    pub fn with_blobs(mut self, blobs: Option<Arc<dyn BlobStore>>) -> Self {
        self.blobs = blobs;
        self
    }

    /// Attach the retrieval collaborator (enables RAG augmentation)
    #[must_use]
    pub fn with_retriever(mut self, retriever: Option<Arc<dyn ContextRetriever>>) -> Self {
        self.retriever = retriever;
        self
    }

    /// Run one request through the full lifecycle
    ///
    /// # Errors
    ///
    /// Propagates configuration, params, and dispatch errors. Guardrail
    /// rejections are a [`CompletionOutcome::ValidationFailed`] value,
    /// not an error.
    pub async fn complete(
        &self,
        mut request: ChatCompletionRequest,
        context: RequestContext,
    ) -> Result<CompletionOutcome, GatewayError> {
        // Input guardrails short-circuit before any vendor call
        if let Some(guardrails) = &self.guardrails
            && let Some(text) = request.last_user_text()
        {
            match guardrails.validate_input(&text).await {
                Ok(report) if !report.is_valid => {
                    return Ok(CompletionOutcome::ValidationFailed {
                        validation: "input",
                        error: None,
                        violations: report.violations,
                    });
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(error = %err, "input guardrails unavailable");
                    return Ok(CompletionOutcome::ValidationFailed {
                        validation: "input",
                        error: Some(err.to_string()),
                        violations: Vec::new(),
                    });
                }
            }
        }

        if request.mode == RequestMode::NoSystem {
            request.messages = mapper::strip_system(std::mem::take(&mut request.messages));
        }

        if request.use_rag {
            self.augment_with_context(&mut request).await?;
        }

        let functions = self.function_descriptors(&request);
        let model = self.resolve_model(&request, &functions).await?;
        let adapter = self.adapters.get(&model.provider);

        let payload = adapter.build_payload(&request, &model, &functions)?;
        let headers = adapter.headers()?;
        let endpoint = adapter.endpoint(&request, &model);

        if request.stream {
            let (upstream, trace) = self
                .dispatcher
                .execute_stream(&model.provider, &endpoint, headers, &payload)
                .await?;

            let store = if request.store { self.store.clone() } else { None };
            let tools = self.tool_orchestrator();
            let processor = PostProcessor::new(context, model.id.clone(), request.mode, trace)
                .with_guardrails(self.guardrails.clone())
                .with_store(store)
                .with_tools(tools);

            return Ok(CompletionOutcome::Streaming(processor.process(upstream)));
        }

        let reply = self
            .dispatcher
            .execute(&model.provider, &endpoint, headers, &payload)
            .await?;
        let trace = reply.trace.clone();
        let normalized = adapter.normalize(&reply)?;

        self.handle_normalized(normalized, trace, &request, &context, &model).await
    }

    /// Post-dispatch half of the non-streaming lifecycle
    async fn handle_normalized(
        &self,
        normalized: Normalized,
        trace: VendorTrace,
        request: &ChatCompletionRequest,
        context: &RequestContext,
        model: &ModelDescriptor,
    ) -> Result<CompletionOutcome, GatewayError> {
        let normalized = match normalized {
            Normalized::Response(response) => response,
            Normalized::Media { bytes, content_type } => {
                let reference = self.store_media(bytes, &content_type).await?;
                NormalizedResponse::text(reference).with_trace(trace.clone())
            }
        };

        if normalized.is_empty() {
            return Err(GatewayError::Params("No response generated by the model".to_owned()));
        }

        // Output guardrails: a rejected response is surfaced as a
        // validation result and never persisted
        if !normalized.response.is_empty()
            && let Some(guardrails) = &self.guardrails
        {
            match guardrails.validate_output(&normalized.response).await {
                Ok(report) if !report.is_valid => {
                    return Ok(CompletionOutcome::ValidationFailed {
                        validation: "output",
                        error: None,
                        violations: report.violations,
                    });
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(error = %err, "output guardrails unavailable");
                    return Ok(CompletionOutcome::ValidationFailed {
                        validation: "output",
                        error: Some(err.to_string()),
                        violations: Vec::new(),
                    });
                }
            }
        }

        let completion_id = uuid::Uuid::new_v4().to_string();

        // Tool calls run inline on the non-streaming path
        if let Some(tool_calls) = &normalized.tool_calls
            && !context.restricted
            && let (Some(tools), Some(conversation_id)) = (self.tool_orchestrator(), &context.conversation_id)
        {
            let messages = tools
                .run(
                    &completion_id,
                    &normalized.response,
                    tool_calls,
                    conversation_id,
                    context,
                    &model.id,
                )
                .await?;
            // The audit record is the canonical assistant message
            let assistant = messages
                .into_iter()
                .next()
                .ok_or_else(|| GatewayError::Unknown(anyhow::anyhow!("tool orchestration returned no messages")))?;
            return Ok(CompletionOutcome::Completed(assistant));
        }

        let mut message = Message::new(Role::Assistant, Content::Text(normalized.response.clone()))
            .with_model(model.id.clone())
            .with_platform(context.platform.clone())
            .with_data(json!({
                "usage": normalized.usage,
                "log_id": trace.log_id,
                "mode": request.mode,
            }));
        message.citations = normalized.citations.clone();
        if let Some(tool_calls) = &normalized.tool_calls {
            message = message.with_tool_calls(tool_calls.clone());
        }

        if request.store
            && let (Some(store), Some(conversation_id)) = (&self.store, &context.conversation_id)
        {
            message = store.add(conversation_id, message).await?;
        }

        Ok(CompletionOutcome::Completed(message))
    }

    /// Resolve exactly one effective model for the request
    async fn resolve_model(
        &self,
        request: &ChatCompletionRequest,
        functions: &[FunctionDescriptor],
    ) -> Result<ModelDescriptor, GatewayError> {
        if let Some(id) = &request.model {
            return Ok(self.registry.get(id).clone());
        }

        let Some(analyzer) = &self.analyzer else {
            return Ok(self.registry.default_model().clone());
        };

        let prompt = request.last_user_text().unwrap_or_default();
        let requirements = analyzer
            .analyze(
                &prompt,
                request.has_images(),
                &self.registry.capability_tags(),
                functions,
                request.budget_constraint,
            )
            .await?;

        let id = select_model(&self.registry, &requirements);
        Ok(self.registry.get(&id).clone())
    }

    /// Prepend retrieved context as a system message
    async fn augment_with_context(&self, request: &mut ChatCompletionRequest) -> Result<(), GatewayError> {
        let Some(retriever) = &self.retriever else {
            return Ok(());
        };
        let Some(query) = request.last_user_text() else {
            return Ok(());
        };

        let top_k = request.rag.as_ref().map_or(3, |r| r.top_k);
        let snippets = retriever.retrieve(&query, top_k).await?;
        if snippets.is_empty() {
            return Ok(());
        }

        let context_block = format!("Relevant context:\n{}", snippets.join("\n---\n"));
        request
            .messages
            .insert(0, Message::new(Role::System, Content::Text(context_block)));
        Ok(())
    }

    /// Upload media output and return its textual reference
    async fn store_media(&self, bytes: Vec<u8>, content_type: &str) -> Result<String, GatewayError> {
        let Some(blobs) = &self.blobs else {
            return Err(GatewayError::Configuration(
                "media output requires a configured blob store".to_owned(),
            ));
        };
        let extension = content_type.rsplit('/').next().unwrap_or("bin");
        let key = format!("generated/{}.{extension}", uuid::Uuid::new_v4());
        blobs.put(&key, bytes, content_type).await
    }

    /// Descriptors for the functions available to this request
    fn function_descriptors(&self, request: &ChatCompletionRequest) -> Vec<FunctionDescriptor> {
        if !request.use_tools {
            return Vec::new();
        }
        self.functions.as_ref().map(|f| f.descriptors()).unwrap_or_default()
    }

    /// Tool orchestrator when both collaborators are wired
    fn tool_orchestrator(&self) -> Option<ToolOrchestrator> {
        match (&self.functions, &self.store) {
            (Some(functions), Some(store)) => {
                Some(ToolOrchestrator::new(Arc::clone(functions), Arc::clone(store)))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use conflux_config::{Config, ModelDescriptorConfig, RetryPolicy};
    use conflux_core::{MessageStatus, ValidationReport};
    use serde_json::Value;
    use std::sync::Mutex;

    fn registry() -> Arc<CapabilityRegistry> {
        let config = ModelDescriptorConfig {
            id: "gpt-4o-mini".to_owned(),
            provider: "openai".to_owned(),
            wire_name: None,
            model_types: vec![],
            strengths: vec![],
            context_window: 128_000,
            max_tokens: 16_384,
            cost_per_1k_input: 0.000_15,
            cost_per_1k_output: 0.0006,
            context_complexity: 2,
            reliability: Some(4),
            speed: Some(5),
            multimodal: false,
            supports_functions: true,
            has_thinking: false,
            router_eligible: true,
        };
        Arc::new(CapabilityRegistry::from_config(&[config], "gpt-4o-mini").unwrap())
    }

    fn pipeline() -> CompletionPipeline {
        CompletionPipeline::new(
            registry(),
            Arc::new(AdapterRegistry::from_config(&Config::default())),
            Arc::new(Dispatcher::new(None, RetryPolicy::default())),
        )
    }

    fn request(text: &str) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: Some("gpt-4o-mini".to_owned()),
            messages: vec![Message::new(Role::User, Content::Text(text.to_owned()))],
            ..ChatCompletionRequest::default()
        }
    }

    fn model() -> ModelDescriptor {
        registry().default_model().clone()
    }

    struct RejectingGuardrails;

    #[async_trait]
    impl GuardrailsValidator for RejectingGuardrails {
        async fn validate_input(&self, _text: &str) -> Result<ValidationReport, GatewayError> {
            Ok(ValidationReport {
                is_valid: false,
                violations: vec!["blocked".to_owned()],
                raw_response: None,
            })
        }

        async fn validate_output(&self, _text: &str) -> Result<ValidationReport, GatewayError> {
            Ok(ValidationReport {
                is_valid: false,
                violations: vec!["unsafe output".to_owned()],
                raw_response: None,
            })
        }
    }

    struct RecordingStore {
        messages: Mutex<Vec<Message>>,
    }

    #[async_trait]
    impl ConversationStore for RecordingStore {
        async fn add(&self, _conversation_id: &str, message: Message) -> Result<Message, GatewayError> {
            self.messages.lock().unwrap().push(message.clone());
            Ok(message)
        }

        async fn get(&self, _conversation_id: &str) -> Result<Vec<Message>, GatewayError> {
            Ok(self.messages.lock().unwrap().clone())
        }
    }

    struct EchoRegistry;

    #[async_trait]
    impl FunctionRegistry for EchoRegistry {
        fn descriptors(&self) -> Vec<FunctionDescriptor> {
            vec![FunctionDescriptor {
                name: "echo".to_owned(),
                description: "echoes".to_owned(),
                parameters: None,
            }]
        }

        async fn invoke(
            &self,
            _name: &str,
            _completion_id: &str,
            arguments: Value,
            _context: &RequestContext,
        ) -> Result<conflux_core::FunctionOutcome, GatewayError> {
            Ok(conflux_core::FunctionOutcome {
                content: arguments.to_string(),
                status: MessageStatus::Success,
                data: None,
            })
        }
    }

    #[tokio::test]
    async fn failing_input_guardrails_short_circuit_before_dispatch() {
        // No gateway and no base URL: any dispatch attempt would be a
        // configuration error, so reaching ValidationFailed proves the
        // vendor call never happened
        let pipeline = pipeline().with_guardrails(Some(Arc::new(RejectingGuardrails)));

        let outcome = pipeline
            .complete(request("something nasty"), RequestContext::new())
            .await
            .unwrap();

        match outcome {
            CompletionOutcome::ValidationFailed {
                validation,
                error,
                violations,
            } => {
                assert_eq!(validation, "input");
                assert!(error.is_none());
                assert_eq!(violations, ["blocked"]);
            }
            _ => panic!("expected input validation failure"),
        }
    }

    #[tokio::test]
    async fn empty_model_output_is_a_params_error() {
        let result = pipeline()
            .handle_normalized(
                Normalized::Response(NormalizedResponse::default()),
                VendorTrace::default(),
                &request("hi"),
                &RequestContext::new(),
                &model(),
            )
            .await;

        match result {
            Err(GatewayError::Params(message)) => {
                assert_eq!(message, "No response generated by the model");
            }
            _ => panic!("expected params error"),
        }
    }

    #[tokio::test]
    async fn rejected_output_is_not_persisted() {
        let store = Arc::new(RecordingStore {
            messages: Mutex::new(Vec::new()),
        });
        let pipeline = pipeline()
            .with_guardrails(Some(Arc::new(RejectingGuardrails)))
            .with_store(Some(Arc::clone(&store) as Arc<dyn ConversationStore>));

        let context = RequestContext::new().with_conversation("conv-1");
        let outcome = pipeline
            .handle_normalized(
                Normalized::Response(NormalizedResponse::text("questionable")),
                VendorTrace::default(),
                &request("hi"),
                &context,
                &model(),
            )
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            CompletionOutcome::ValidationFailed { validation: "output", .. }
        ));
        assert!(store.messages.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn tool_calls_run_inline_and_return_the_audit_record() {
        let store = Arc::new(RecordingStore {
            messages: Mutex::new(Vec::new()),
        });
        let pipeline = pipeline()
            .with_functions(Some(Arc::new(EchoRegistry)))
            .with_store(Some(Arc::clone(&store) as Arc<dyn ConversationStore>));

        let normalized = NormalizedResponse {
            tool_calls: Some(serde_json::json!([
                {"id": "c1", "function": {"name": "echo", "arguments": "{\"x\":1}"}}
            ])),
            ..NormalizedResponse::default()
        };

        let context = RequestContext::new().with_conversation("conv-1");
        let outcome = pipeline
            .handle_normalized(
                Normalized::Response(normalized),
                VendorTrace::default(),
                &request("hi"),
                &context,
                &model(),
            )
            .await
            .unwrap();

        let CompletionOutcome::Completed(message) = outcome else {
            panic!("expected completion");
        };
        assert_eq!(message.role, Role::Assistant);
        assert!(message.tool_calls.is_some());
        // Audit record plus one tool result were persisted
        assert_eq!(store.messages.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn media_without_blob_store_is_a_configuration_error() {
        let result = pipeline()
            .handle_normalized(
                Normalized::Media {
                    bytes: vec![1, 2, 3],
                    content_type: "image/png".to_owned(),
                },
                VendorTrace::default(),
                &request("draw"),
                &RequestContext::new(),
                &model(),
            )
            .await;

        assert!(matches!(result, Err(GatewayError::Configuration(_))));
    }

    #[tokio::test]
    async fn restricted_callers_never_trigger_tools() {
        let store = Arc::new(RecordingStore {
            messages: Mutex::new(Vec::new()),
        });
        let pipeline = pipeline()
            .with_functions(Some(Arc::new(EchoRegistry)))
            .with_store(Some(Arc::clone(&store) as Arc<dyn ConversationStore>));

        let normalized = NormalizedResponse {
            response: "done".to_owned(),
            tool_calls: Some(serde_json::json!([{"name": "echo", "arguments": "{}"}])),
            ..NormalizedResponse::default()
        };

        let mut context = RequestContext::new().with_conversation("conv-1");
        context.restricted = true;

        let outcome = pipeline
            .handle_normalized(
                Normalized::Response(normalized),
                VendorTrace::default(),
                &request("hi"),
                &context,
                &model(),
            )
            .await
            .unwrap();

        let CompletionOutcome::Completed(message) = outcome else {
            panic!("expected completion");
        };
        assert_eq!(message.content.as_text(), "done");
        // Only the assistant message itself was persisted
        assert_eq!(store.messages.lock().unwrap().len(), 1);
    }
}
