use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role of a message participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instruction
    System,
    /// Developer instruction (system-adjacent, some vendors distinguish)
    Developer,
    /// User message
    User,
    /// Assistant response
    Assistant,
    /// Tool/function result
    Tool,
}

/// Outcome status of a persisted message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Handler completed normally
    Success,
    /// Handler failed; content carries the error text
    Error,
}

/// Message content, either plain text or structured parts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    /// Plain text content
    Text(String),
    /// Ordered list of typed parts
    Parts(Vec<ContentPart>),
}

impl Content {
    /// Extract text content, joining parts if necessary
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::Image { .. } | ContentPart::Audio { .. } => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }

    /// Whether any part is an image attachment
    pub fn has_images(&self) -> bool {
        match self {
            Self::Text(_) => false,
            Self::Parts(parts) => parts.iter().any(|p| matches!(p, ContentPart::Image { .. })),
        }
    }

    /// First image reference, if any
    pub fn first_image(&self) -> Option<&str> {
        match self {
            Self::Text(_) => None,
            Self::Parts(parts) => parts.iter().find_map(|p| match p {
                ContentPart::Image { url, .. } => Some(url.as_str()),
                _ => None,
            }),
        }
    }
}

/// Individual part within a multipart message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Text content block
    Text {
        /// The text string
        text: String,
    },
    /// Image reference
    Image {
        /// URL or base64 data URI for the image
        url: String,
        /// Detail level hint (e.g. "auto", "low", "high")
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    /// Audio reference
    Audio {
        /// URL or base64 data URI for the audio clip
        url: String,
        /// Encoding format (e.g. "wav", "mp3")
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<String>,
    },
}

/// Message in a conversation
///
/// Immutable once persisted; the orchestration core never mutates a
/// stored message in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message identifier
    #[serde(default = "fresh_id")]
    pub id: String,
    /// Role of the message author
    pub role: Role,
    /// Message content
    pub content: Content,
    /// Raw vendor tool-call array, kept verbatim for auditability
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Value>,
    /// Source citations attached to the content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citations: Option<Vec<String>>,
    /// Outcome status (tool messages)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<MessageStatus>,
    /// Free-form data bag (vendor trace ids, handler output, mode)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Unix timestamp of creation
    #[serde(default = "unix_timestamp")]
    pub created_at: u64,
    /// Model that produced this message, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Platform tag from the originating request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
}

impl Message {
    /// Create a new message with a fresh id and current timestamp
    pub fn new(role: Role, content: Content) -> Self {
        Self {
            id: fresh_id(),
            role,
            content,
            tool_calls: None,
            citations: None,
            status: None,
            data: None,
            created_at: unix_timestamp(),
            model: None,
            platform: None,
        }
    }

    /// Attach the producing model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Attach the platform tag
    #[must_use]
    pub fn with_platform(mut self, platform: Option<String>) -> Self {
        self.platform = platform;
        self
    }

    /// Attach an outcome status
    #[must_use]
    pub const fn with_status(mut self, status: MessageStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Attach the free-form data bag
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Attach the raw vendor tool-call array
    #[must_use]
    pub fn with_tool_calls(mut self, tool_calls: Value) -> Self {
        self.tool_calls = Some(tool_calls);
        self
    }
}

fn fresh_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Current unix timestamp in seconds
pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_as_text_joins_parts() {
        let content = Content::Parts(vec![
            ContentPart::Text { text: "Hel".to_owned() },
            ContentPart::Image {
                url: "https://example.com/cat.png".to_owned(),
                detail: None,
            },
            ContentPart::Text { text: "lo".to_owned() },
        ]);
        assert_eq!(content.as_text(), "Hello");
        assert!(content.has_images());
    }

    #[test]
    fn plain_text_has_no_images() {
        let content = Content::Text("hello".to_owned());
        assert!(!content.has_images());
        assert!(content.first_image().is_none());
    }

    #[test]
    fn messages_get_unique_ids() {
        let a = Message::new(Role::User, Content::Text("hi".to_owned()));
        let b = Message::new(Role::User, Content::Text("hi".to_owned()));
        assert_ne!(a.id, b.id);
    }
}
