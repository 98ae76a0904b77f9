//! Tool-call execution against the function registry
//!
//! Runs vendor-declared tool calls sequentially to keep transcript
//! ordering deterministic. No call's failure aborts the batch: lookup,
//! parsing, and handler errors each become an in-transcript error
//! message for that call only.

use std::sync::Arc;

use conflux_core::{
    Content, ConversationStore, FunctionRegistry, GatewayError, Message, MessageStatus, RequestContext, Role,
};
use serde_json::Value;

use crate::types::ToolInvocation;

/// Executes requested function calls and persists the results
pub struct ToolOrchestrator {
    registry: Arc<dyn FunctionRegistry>,
    store: Arc<dyn ConversationStore>,
}

impl ToolOrchestrator {
    /// Create an orchestrator over a function registry and store
    pub fn new(registry: Arc<dyn FunctionRegistry>, store: Arc<dyn ConversationStore>) -> Self {
        Self { registry, store }
    }

    /// Execute a batch of tool calls and persist the transcript
    ///
    /// First persists one assistant message recording the raw
    /// `tool_calls` array verbatim, so the request is auditable even if
    /// later steps fail. Then each call runs sequentially; its result
    /// (or error) is persisted as a tool-role message. Returns the
    /// ordered list of persisted messages: the assistant record
    /// followed by one tool message per call.
    ///
    /// # Errors
    ///
    /// Returns an error only when the conversation store itself fails;
    /// individual call failures are converted into error messages.
    pub async fn run(
        &self,
        completion_id: &str,
        content: &str,
        tool_calls: &Value,
        conversation_id: &str,
        context: &RequestContext,
        model: &str,
    ) -> Result<Vec<Message>, GatewayError> {
        let audit = Message::new(Role::Assistant, Content::Text(content.to_owned()))
            .with_tool_calls(tool_calls.clone())
            .with_model(model)
            .with_platform(context.platform.clone());

        let mut results = vec![self.store.add(conversation_id, audit).await?];

        let calls = tool_calls.as_array().cloned().unwrap_or_default();
        for call in &calls {
            let message = match self.execute_call(completion_id, call, context).await {
                Ok(message) => message,
                Err(detail) => {
                    tracing::warn!(error = %detail, "tool call failed");
                    Message::new(Role::Tool, Content::Text(format!("Error: {detail}")))
                        .with_status(MessageStatus::Error)
                }
            };
            let message = message.with_model(model).with_platform(context.platform.clone());
            results.push(self.store.add(conversation_id, message).await?);
        }

        Ok(results)
    }

    /// Resolve, parse, and invoke one call
    async fn execute_call(
        &self,
        completion_id: &str,
        call: &Value,
        context: &RequestContext,
    ) -> Result<Message, String> {
        let invocation = ToolInvocation::from_value(call)?;

        let outcome = self
            .registry
            .invoke(&invocation.name, completion_id, invocation.arguments, context)
            .await
            .map_err(|e| e.to_string())?;

        let mut message = Message::new(Role::Tool, Content::Text(outcome.content)).with_status(outcome.status);
        if let Some(data) = outcome.data {
            message = message.with_data(data);
        }
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use conflux_core::{FunctionDescriptor, FunctionOutcome};
    use serde_json::json;
    use std::sync::Mutex;

    struct RecordingStore {
        messages: Mutex<Vec<Message>>,
    }

    impl RecordingStore {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                messages: Mutex::new(Vec::new()),
            })
        }
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

    struct FlakyRegistry;

    #[async_trait]
    impl FunctionRegistry for FlakyRegistry {
        fn descriptors(&self) -> Vec<FunctionDescriptor> {
            vec![]
        }

        async fn invoke(
            &self,
            name: &str,
            _completion_id: &str,
            _arguments: Value,
            _context: &RequestContext,
        ) -> Result<FunctionOutcome, GatewayError> {
            match name {
                "works" => Ok(FunctionOutcome {
                    content: "42".to_owned(),
                    status: MessageStatus::Success,
                    data: Some(json!({"answer": 42})),
                }),
                other => Err(GatewayError::Unknown(anyhow::anyhow!("handler '{other}' exploded"))),
            }
        }
    }

    fn orchestrator(store: Arc<RecordingStore>) -> ToolOrchestrator {
        ToolOrchestrator::new(Arc::new(FlakyRegistry), store)
    }

    #[tokio::test]
    async fn failing_call_does_not_abort_the_batch() {
        let store = RecordingStore::new();
        let calls = json!([
            {"id": "c1", "function": {"name": "works", "arguments": "{}"}},
            {"id": "c2", "function": {"name": "explodes", "arguments": "{}"}}
        ]);

        let results = orchestrator(Arc::clone(&store))
            .run("cmpl-1", "let me check", &calls, "conv-1", &RequestContext::new(), "gpt-4o")
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].role, Role::Assistant);
        assert!(results[0].tool_calls.is_some());
        assert_eq!(results[1].status, Some(MessageStatus::Success));
        assert_eq!(results[1].content.as_text(), "42");
        assert_eq!(results[2].status, Some(MessageStatus::Error));
        assert!(results[2].content.as_text().starts_with("Error: "));

        // Everything was persisted in order
        assert_eq!(store.messages.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn audit_record_carries_raw_tool_calls_verbatim() {
        let store = RecordingStore::new();
        let calls = json!([{"name": "works", "arguments": {"q": 1}}]);

        let results = orchestrator(store)
            .run("cmpl-1", "", &calls, "conv-1", &RequestContext::new(), "gpt-4o")
            .await
            .unwrap();

        assert_eq!(results[0].tool_calls.as_ref().unwrap(), &calls);
    }

    #[tokio::test]
    async fn nameless_call_errors_in_place() {
        let store = RecordingStore::new();
        let calls = json!([{"arguments": "{}"}]);

        let results = orchestrator(store)
            .run("cmpl-1", "", &calls, "conv-1", &RequestContext::new(), "gpt-4o")
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[1].status, Some(MessageStatus::Error));
    }

    #[tokio::test]
    async fn malformed_arguments_error_in_place() {
        let store = RecordingStore::new();
        let calls = json!([
            {"name": "works", "arguments": "{broken"},
            {"name": "works", "arguments": "{}"}
        ]);

        let results = orchestrator(store)
            .run("cmpl-1", "", &calls, "conv-1", &RequestContext::new(), "gpt-4o")
            .await
            .unwrap();

        assert_eq!(results[1].status, Some(MessageStatus::Error));
        // The second call still ran
        assert_eq!(results[2].status, Some(MessageStatus::Success));
    }
}
