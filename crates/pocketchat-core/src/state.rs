//! UI-agnostic conversation types
//!
//! `ChatMessage` is what the chat surface owns and renders. `ModelMessage`
//! is the clean role/content pair handed to the model; it never carries
//! thinking text or the raw streaming buffer.

use serde::{Deserialize, Serialize};

use crate::splitter::{split_thinking, Markers};

/// A chat message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: u64,
    pub role: ChatRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    /// Raw model output, present only while the message is streaming.
    #[serde(skip)]
    pub raw: Option<String>,
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatMessage {
    pub fn user(id: u64, content: impl Into<String>) -> Self {
        Self {
            id,
            role: ChatRole::User,
            content: content.into(),
            thinking: None,
            raw: None,
        }
    }

    /// Finished assistant message, e.g. a synthetic notice.
    pub fn assistant(id: u64, content: impl Into<String>) -> Self {
        Self {
            id,
            role: ChatRole::Assistant,
            content: content.into(),
            thinking: None,
            raw: None,
        }
    }

    /// Empty assistant message waiting for its first fragment.
    pub fn pending_assistant(id: u64) -> Self {
        Self {
            raw: Some(String::new()),
            ..Self::assistant(id, "")
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.raw.is_some()
    }

    /// True when streaming started but nothing has arrived yet.
    pub fn is_awaiting_output(&self) -> bool {
        self.raw.as_deref().is_some_and(str::is_empty)
    }

    /// Whether the streamed output currently ends inside a thinking region.
    pub fn is_thinking(&self, markers: &Markers) -> bool {
        self.raw
            .as_deref()
            .is_some_and(|raw| split_thinking(raw, markers).in_thinking)
    }

    /// Append a streamed fragment and recompute content and thinking from
    /// the whole buffer. No-op once the message is finished.
    pub fn append_fragment(&mut self, fragment: &str, markers: &Markers) {
        let Some(raw) = self.raw.as_mut() else {
            return;
        };
        raw.push_str(fragment);

        let split = split_thinking(raw, markers);
        self.content = split.content;
        self.thinking = (!split.thinking.is_empty()).then_some(split.thinking);
    }

    /// Drop the raw buffer; the message is immutable from here on.
    pub fn finish(&mut self) {
        self.raw = None;
    }
}

/// Role on the model side of the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelRole {
    System,
    User,
    Assistant,
}

impl From<ChatRole> for ModelRole {
    fn from(role: ChatRole) -> Self {
        match role {
            ChatRole::User => ModelRole::User,
            ChatRole::Assistant => ModelRole::Assistant,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelMessage {
    pub role: ModelRole,
    pub content: String,
}

impl ModelMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ModelRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ModelRole::User,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_fragment_splits_thinking() {
        let markers = Markers::default();
        let mut msg = ChatMessage::pending_assistant(2);
        assert!(msg.is_awaiting_output());

        msg.append_fragment("<think>hmm", &markers);
        assert_eq!(msg.content, "");
        assert_eq!(msg.thinking.as_deref(), Some("hmm"));
        assert!(msg.is_thinking(&markers));

        msg.append_fragment("</think>Hi!", &markers);
        assert_eq!(msg.content, "Hi!");
        assert_eq!(msg.thinking.as_deref(), Some("hmm"));
        assert!(!msg.is_thinking(&markers));
    }

    #[test]
    fn test_char_by_char_stream_matches_whole_reply() {
        let markers = Markers::default();
        let reply = "<think>plan</think>Hola, ¿qué tal?<think>more</think> Bien.";
        let mut msg = ChatMessage::pending_assistant(3);
        for c in reply.chars() {
            msg.append_fragment(&c.to_string(), &markers);
        }

        let whole = split_thinking(reply, &markers);
        assert_eq!(msg.content, whole.content);
        assert_eq!(msg.content, "Hola, ¿qué tal? Bien.");
        assert_eq!(msg.thinking.as_deref(), Some("planmore"));
    }

    #[test]
    fn test_no_thinking_leaves_none() {
        let markers = Markers::default();
        let mut msg = ChatMessage::pending_assistant(1);
        msg.append_fragment("plain", &markers);
        assert_eq!(msg.thinking, None);
        assert_eq!(msg.content, "plain");
    }

    #[test]
    fn test_finished_message_is_immutable() {
        let markers = Markers::default();
        let mut msg = ChatMessage::pending_assistant(1);
        msg.append_fragment("done", &markers);
        msg.finish();
        msg.append_fragment(" more", &markers);
        assert_eq!(msg.content, "done");
        assert!(!msg.is_streaming());
    }

    #[test]
    fn test_model_message_serializes_lowercase_role() {
        let json = serde_json::to_string(&ModelMessage::system("be nice")).unwrap();
        assert_eq!(json, r#"{"role":"system","content":"be nice"}"#);
    }
}
