//! Streaming post-processing state machine
//!
//! Wraps a live vendor byte stream. Frames flow through verbatim while
//! an accumulator gathers partial state; on the terminal marker the
//! finalize routine runs exactly once (guardrails, tool execution,
//! persistence), a synthetic metadata frame is emitted, and then the
//! terminal marker. Finalize failures are logged and swallowed; the
//! stream always closes normally.

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use conflux_core::{Content, ConversationStore, GatewayError, GuardrailsValidator, Message, RequestContext, Role};
use futures_util::StreamExt;
use serde_json::{Value, json};

use crate::dispatch::{ByteStream, VendorTrace};
use crate::tools::ToolOrchestrator;
use crate::types::RequestMode;

/// Terminal stream marker payload
const TERMINAL: &str = "[DONE]";

/// Frame delimiter in the event-stream wire format
const FRAME_DELIMITER: &[u8] = b"\n\n";

/// Partial state gathered while a stream is live
///
/// Scoped to one stream's lifetime and discarded when it closes.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    /// Append-only response text
    pub full_content: String,
    /// Append-only tool-call entries
    pub tool_calls: Vec<Value>,
    /// Vendor usage report, last write wins
    pub usage: Option<Value>,
}

impl StreamAccumulator {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Best-effort merge of one frame's data payload
    ///
    /// Malformed payloads are swallowed; accumulation never aborts the
    /// stream. Understands both the already-normalized `{response}`
    /// delta shape and the `choices[0].delta` vendor shape.
    pub fn ingest(&mut self, data: &str) {
        let Ok(value) = serde_json::from_str::<Value>(data) else {
            return;
        };

        if let Some(response) = value.get("response").and_then(Value::as_str) {
            self.full_content.push_str(response);
        } else if let Some(delta) = value["choices"][0]["delta"]["content"].as_str() {
            self.full_content.push_str(delta);
        }

        if let Some(usage) = value.get("usage").filter(|u| !u.is_null()) {
            self.usage = Some(usage.clone());
        }

        let calls = value
            .get("tool_calls")
            .or_else(|| value["choices"][0]["delta"].get("tool_calls"))
            .and_then(Value::as_array);
        if let Some(calls) = calls {
            self.tool_calls.extend(calls.iter().cloned());
        }
    }
}

/// Extract the data payload of an event-stream frame
fn frame_data(frame: &[u8]) -> Option<&str> {
    let text = std::str::from_utf8(frame).ok()?;
    text.lines()
        .find_map(|line| line.strip_prefix("data:"))
        .map(str::trim)
}

/// Streaming post-processor
///
/// Built once per streaming request; consumed by [`Self::process`].
pub struct PostProcessor {
    context: RequestContext,
    model: String,
    mode: RequestMode,
    trace: VendorTrace,
    completion_id: String,
    guardrails: Option<Arc<dyn GuardrailsValidator>>,
    store: Option<Arc<dyn ConversationStore>>,
    tools: Option<ToolOrchestrator>,
}

impl PostProcessor {
    /// Create a post-processor for one stream
    pub fn new(context: RequestContext, model: impl Into<String>, mode: RequestMode, trace: VendorTrace) -> Self {
        Self {
            context,
            model: model.into(),
            mode,
            trace,
            completion_id: uuid::Uuid::new_v4().to_string(),
            guardrails: None,
            store: None,
            tools: None,
        }
    }

    /// Attach the output guardrails collaborator
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

    /// Attach the tool orchestrator
    #[must_use]
    pub fn with_tools(mut self, tools: Option<ToolOrchestrator>) -> Self {
        self.tools = tools;
        self
    }

    /// Wrap an upstream byte stream with post-processing
    ///
    /// Chunk handling is strictly sequential and order-preserving:
    /// frames are never reordered or dropped, only parsed best-effort.
    /// A duplicate terminal marker after the finalize latch is set is
    /// swallowed, so downstream sees exactly one terminal frame.
    pub fn process(self, upstream: ByteStream) -> ByteStream {
        let state = ProcessState {
            upstream,
            processor: self,
            buffer: Vec::new(),
            pending: VecDeque::new(),
            accumulator: StreamAccumulator::new(),
            finalized: false,
            upstream_done: false,
        };

        Box::pin(futures_util::stream::unfold(state, |mut state| async move {
            loop {
                if let Some(item) = state.pending.pop_front() {
                    return Some((item, state));
                }
                if state.upstream_done {
                    return None;
                }
                match state.upstream.next().await {
                    Some(Ok(chunk)) => state.handle_chunk(&chunk).await,
                    Some(Err(err)) => state.pending.push_back(Err(err)),
                    None => {
                        state.upstream_done = true;
                        state.flush_remainder().await;
                    }
                }
            }
        }))
    }

    /// Run the one-shot finalize side effects and build the metadata
    /// object
    ///
    /// Side effects run sequentially: output guardrails, then tool
    /// execution, then persistence. Each failure is logged and recorded
    /// in the metadata rather than propagated.
    async fn finalize(&self, accumulator: &StreamAccumulator) -> Value {
        let mut guardrails_summary = json!({"passed": true, "error": null, "violations": []});
        if !accumulator.full_content.is_empty()
            && let Some(guardrails) = &self.guardrails
        {
            match guardrails.validate_output(&accumulator.full_content).await {
                Ok(report) => {
                    guardrails_summary = json!({
                        "passed": report.is_valid,
                        "error": null,
                        "violations": report.violations,
                    });
                }
                Err(err) => {
                    tracing::warn!(error = %err, "output guardrails failed during finalize");
                    guardrails_summary = json!({"passed": false, "error": err.to_string(), "violations": []});
                }
            }
        }

        let mut tool_calls_processed = false;
        let mut tool_results = 0;
        if !accumulator.tool_calls.is_empty()
            && !self.context.restricted
            && let (Some(tools), Some(conversation_id)) = (&self.tools, &self.context.conversation_id)
        {
            let batch = Value::Array(accumulator.tool_calls.clone());
            match tools
                .run(
                    &self.completion_id,
                    &accumulator.full_content,
                    &batch,
                    conversation_id,
                    &self.context,
                    &self.model,
                )
                .await
            {
                Ok(messages) => {
                    tool_calls_processed = true;
                    tool_results = messages.len();
                }
                Err(err) => {
                    tracing::warn!(error = %err, "tool execution failed during finalize");
                }
            }
        }

        let mut conversation_saved = false;
        if let (Some(store), Some(conversation_id)) = (&self.store, &self.context.conversation_id) {
            let message = Message::new(Role::Assistant, Content::Text(accumulator.full_content.clone()))
                .with_model(self.model.clone())
                .with_platform(self.context.platform.clone())
                .with_data(json!({
                    "mode": self.mode,
                    "log_id": self.trace.log_id,
                }));
            match store.add(conversation_id, message).await {
                Ok(_) => conversation_saved = true,
                Err(err) => {
                    tracing::warn!(error = %err, "failed to persist assistant message during finalize");
                }
            }
        }

        json!({
            "nonce": uuid::Uuid::new_v4().to_string(),
            "response": "",
            "post_processing": {
                "guardrails": guardrails_summary,
                "tool_calls_processed": tool_calls_processed,
                "tool_results": tool_results,
                "conversation_saved": conversation_saved,
            },
            "usage": accumulator.usage,
        })
    }
}

/// Live state of one wrapped stream
struct ProcessState {
    upstream: ByteStream,
    processor: PostProcessor,
    buffer: Vec<u8>,
    pending: VecDeque<Result<Bytes, GatewayError>>,
    accumulator: StreamAccumulator,
    finalized: bool,
    upstream_done: bool,
}

impl ProcessState {
    /// Split an inbound chunk into frames and process each
    async fn handle_chunk(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);

        while let Some(pos) = find_delimiter(&self.buffer) {
            let rest = self.buffer.split_off(pos + FRAME_DELIMITER.len());
            let frame = std::mem::replace(&mut self.buffer, rest);
            self.process_frame(frame).await;
        }
    }

    /// Process one complete frame
    async fn process_frame(&mut self, frame: Vec<u8>) {
        match frame_data(&frame) {
            Some(TERMINAL) => {
                if self.finalized {
                    // Finalize latch: a duplicate terminal is swallowed
                    return;
                }
                self.finalized = true;

                let metadata = self.processor.finalize(&self.accumulator).await;
                self.pending.push_back(Ok(Bytes::from(format!("data: {metadata}\n\n"))));
                self.pending.push_back(Ok(Bytes::from_static(b"data: [DONE]\n\n")));
            }
            Some(data) => {
                self.accumulator.ingest(data);
                self.pending.push_back(Ok(Bytes::from(frame)));
            }
            // Comment/event frames flow through untouched
            None => self.pending.push_back(Ok(Bytes::from(frame))),
        }
    }

    /// Forward any trailing bytes when the upstream closes mid-frame
    async fn flush_remainder(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let frame = std::mem::take(&mut self.buffer);
        self.process_frame(frame).await;
    }
}

/// Position of the next frame delimiter
fn find_delimiter(buffer: &[u8]) -> Option<usize> {
    buffer.windows(FRAME_DELIMITER.len()).position(|w| w == FRAME_DELIMITER)
}
