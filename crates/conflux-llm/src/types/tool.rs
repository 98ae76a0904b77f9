use serde_json::Value;

/// Canonical tool invocation
///
/// Vendors declare tool calls in two shapes: nested
/// (`{"id", "function": {"name", "arguments"}}`) and flat
/// (`{"id", "name", "arguments"}`). Both are normalized into this
/// struct at the ingestion boundary so downstream code only ever sees
/// one shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    /// Vendor-assigned call id, if any
    pub id: Option<String>,
    /// Function name to invoke
    pub name: String,
    /// Parsed arguments object
    pub arguments: Value,
}

impl ToolInvocation {
    /// Normalize one raw vendor tool-call entry
    ///
    /// String-encoded arguments are JSON-decoded here; a decode
    /// failure is this call's error, not the batch's.
    ///
    /// # Errors
    ///
    /// Returns a message describing the malformed entry when no
    /// function name resolves or the arguments fail to decode.
    pub fn from_value(call: &Value) -> Result<Self, String> {
        let id = call.get("id").and_then(Value::as_str).map(str::to_owned);

        let (name, raw_arguments) = if let Some(function) = call.get("function") {
            (
                function.get("name").and_then(Value::as_str),
                function.get("arguments"),
            )
        } else {
            (call.get("name").and_then(Value::as_str), call.get("arguments"))
        };

        let Some(name) = name else {
            return Err("tool call has no function name".to_owned());
        };

        let arguments = match raw_arguments {
            None | Some(Value::Null) => Value::Object(serde_json::Map::new()),
            Some(Value::String(raw)) => serde_json::from_str(raw)
                .map_err(|e| format!("tool call '{name}' has malformed arguments: {e}"))?,
            Some(other) => other.clone(),
        };

        Ok(Self {
            id,
            name: name.to_owned(),
            arguments,
        })
    }
}
