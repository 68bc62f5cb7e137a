//! Chat surface state and the reducer for worker events.

use crate::history::{prepare_conversation_history, DEFAULT_SYSTEM_PROMPT};
use crate::protocol::GenerationEvent;
use crate::splitter::Markers;
use crate::state::{ChatMessage, ChatRole, ModelMessage};
use crate::status::{DownloadProgress, ModelStatus};

pub const APOLOGY_MESSAGE: &str = "Sorry, something went wrong. Please try again.";

#[derive(Debug, Clone)]
pub struct ChatState {
    messages: Vec<ChatMessage>,
    drawer_open: bool,
    generating: bool,
    status: ModelStatus,
    progress: Option<DownloadProgress>,
    markers: Markers,
    system_prompt: String,
    next_id: u64,
}

impl Default for ChatState {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_PROMPT)
    }
}

impl ChatState {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: Vec::new(),
            drawer_open: false,
            generating: false,
            status: ModelStatus::Initializing,
            progress: None,
            markers: Markers::default(),
            system_prompt: system_prompt.into(),
            next_id: 1,
        }
    }

    pub fn with_markers(mut self, markers: Markers) -> Self {
        self.markers = markers;
        self
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_drawer_open(&self) -> bool {
        self.drawer_open
    }

    pub fn is_generating(&self) -> bool {
        self.generating
    }

    pub fn status(&self) -> ModelStatus {
        self.status
    }

    pub fn progress(&self) -> Option<&DownloadProgress> {
        self.progress.as_ref()
    }

    pub fn markers(&self) -> &Markers {
        &self.markers
    }

    pub fn toggle_drawer(&mut self) {
        self.drawer_open = !self.drawer_open;
    }

    pub fn open_drawer(&mut self) {
        self.drawer_open = true;
    }

    pub fn close_drawer(&mut self) {
        self.drawer_open = false;
    }

    /// Start a turn from user input.
    ///
    /// Returns the history to send to the worker, or `None` when the text is
    /// blank or a turn is already running.
    pub fn submit(&mut self, text: &str) -> Option<Vec<ModelMessage>> {
        let text = text.trim();
        if text.is_empty() || self.generating {
            return None;
        }

        let id = self.next_id();
        self.messages.push(ChatMessage::user(id, text));
        let history = prepare_conversation_history(&self.messages, &self.system_prompt);

        let id = self.next_id();
        self.messages.push(ChatMessage::pending_assistant(id));
        self.generating = true;

        Some(history)
    }

    pub fn apply(&mut self, event: GenerationEvent) {
        match event {
            GenerationEvent::DownloadProgress(progress) => {
                self.status = ModelStatus::Initializing;
                self.progress = Some(progress);
            }
            GenerationEvent::Ready => {
                self.status = ModelStatus::Ready;
                self.progress = None;
            }
            GenerationEvent::Token(fragment) => {
                let markers = self.markers.clone();
                self.streaming_message().append_fragment(&fragment, &markers);
            }
            GenerationEvent::GenerationComplete => {
                if let Some(msg) = self.messages.last_mut() {
                    msg.finish();
                }
                self.generating = false;
            }
            GenerationEvent::Error(err) => {
                tracing::warn!(error = %err, "showing apology for worker error");
                if self.status != ModelStatus::Ready {
                    self.status = ModelStatus::Error;
                    self.progress = None;
                }
                // One apology per failure streak; a retried load failing
                // again after the turn already ended adds nothing.
                if self.generating || !self.ends_with_apology() {
                    self.push_apology();
                }
                self.generating = false;
            }
        }
    }

    fn ends_with_apology(&self) -> bool {
        matches!(
            self.messages.last(),
            Some(msg) if msg.role == ChatRole::Assistant
                && !msg.is_streaming()
                && msg.content == APOLOGY_MESSAGE
        )
    }

    /// The assistant message receiving fragments, created when a fragment
    /// arrives without one (e.g. a legacy prompt sent outside `submit`).
    fn streaming_message(&mut self) -> &mut ChatMessage {
        let needs_new = !matches!(
            self.messages.last(),
            Some(msg) if msg.role == ChatRole::Assistant && msg.is_streaming()
        );
        if needs_new {
            let id = self.next_id();
            self.messages.push(ChatMessage::pending_assistant(id));
            self.generating = true;
        }
        let last = self.messages.len() - 1;
        &mut self.messages[last]
    }

    fn push_apology(&mut self) {
        if let Some(msg) = self.messages.last_mut() {
            if msg.is_awaiting_output() {
                *msg = ChatMessage::assistant(msg.id, APOLOGY_MESSAGE);
                return;
            }
            msg.finish();
        }
        let id = self.next_id();
        self.messages.push(ChatMessage::assistant(id, APOLOGY_MESSAGE));
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}
