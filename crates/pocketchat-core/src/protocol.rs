//! Typed messages crossing the worker boundary.

use serde::{Deserialize, Serialize};

use crate::error::WorkerError;
use crate::state::ModelMessage;
use crate::status::DownloadProgress;

/// Request sent to the worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum GenerationRequest {
    /// Full ordered conversation, system message included.
    History { messages: Vec<ModelMessage> },
    /// Legacy single prompt, answered without any earlier turns.
    Prompt { prompt: String },
}

impl GenerationRequest {
    /// Messages to feed the model for this request.
    pub fn into_messages(self, system_prompt: &str) -> Vec<ModelMessage> {
        match self {
            GenerationRequest::History { messages } => messages,
            GenerationRequest::Prompt { prompt } => {
                vec![ModelMessage::system(system_prompt), ModelMessage::user(prompt)]
            }
        }
    }
}

/// Event delivered back from the worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum GenerationEvent {
    DownloadProgress(DownloadProgress),
    Ready,
    Token(String),
    GenerationComplete,
    Error(WorkerError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_wire_shape() {
        let token = serde_json::to_value(GenerationEvent::Token("Hi".into())).unwrap();
        assert_eq!(token, json!({"type": "token", "payload": "Hi"}));

        let ready = serde_json::to_value(GenerationEvent::Ready).unwrap();
        assert_eq!(ready, json!({"type": "ready"}));

        let progress = serde_json::to_value(GenerationEvent::DownloadProgress(DownloadProgress::new(
            12.5,
            "model.gguf",
        )))
        .unwrap();
        assert_eq!(
            progress,
            json!({"type": "download-progress", "payload": {"progress": 12.5, "file": "model.gguf"}})
        );

        let error = serde_json::to_value(GenerationEvent::Error(WorkerError::Load("gone".into()))).unwrap();
        assert_eq!(
            error,
            json!({"type": "error", "payload": {"kind": "load", "message": "gone"}})
        );
    }

    #[test]
    fn test_prompt_request_wraps_in_system_and_user() {
        let messages = GenerationRequest::Prompt {
            prompt: "Hello, how are you?".into(),
        }
        .into_messages("You are a friendly assistant.");

        assert_eq!(
            messages,
            vec![
                ModelMessage::system("You are a friendly assistant."),
                ModelMessage::user("Hello, how are you?"),
            ]
        );
    }

    #[test]
    fn test_history_request_is_passed_through() {
        let history = vec![ModelMessage::system("s"), ModelMessage::user("u")];
        let messages = GenerationRequest::History {
            messages: history.clone(),
        }
        .into_messages("ignored");
        assert_eq!(messages, history);
    }
}
