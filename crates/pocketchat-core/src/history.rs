use crate::state::{ChatMessage, ModelMessage};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a friendly assistant.";

/// Convert chat messages to model messages, keeping only the visible
/// content of each (no thinking, no raw buffer).
pub fn to_model_messages(messages: &[ChatMessage]) -> Vec<ModelMessage> {
    messages
        .iter()
        .map(|msg| ModelMessage {
            role: msg.role.into(),
            content: msg.content.clone(),
        })
        .collect()
}

/// Full conversation for the model: the system prompt followed by every
/// chat message in order.
pub fn prepare_conversation_history(messages: &[ChatMessage], system_prompt: &str) -> Vec<ModelMessage> {
    let mut history = Vec::with_capacity(messages.len() + 1);
    history.push(ModelMessage::system(system_prompt));
    history.extend(to_model_messages(messages));
    history
}
