//! Proxy to the background generation worker.

use anyhow::{anyhow, Result};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::pipeline::PipelineHandle;
use crate::protocol::{GenerationEvent, GenerationRequest};
use crate::state::ModelMessage;
use crate::worker;

pub use crate::worker::WorkerSettings;

pub struct GenerationBridge {
    requests: UnboundedSender<GenerationRequest>,
    events: UnboundedReceiver<GenerationEvent>,
    worker: JoinHandle<()>,
}

impl GenerationBridge {
    /// Start the worker. It begins loading the pipeline right away.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(handle: PipelineHandle, settings: WorkerSettings) -> Self {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let worker = tokio::spawn(worker::run(handle, settings, request_rx, event_tx));

        Self {
            requests: request_tx,
            events: event_rx,
            worker,
        }
    }

    /// Legacy entry point: answer a single prompt with no earlier turns.
    pub fn generate(&self, prompt: impl Into<String>) -> Result<()> {
        self.send(GenerationRequest::Prompt {
            prompt: prompt.into(),
        })
    }

    /// Start a turn from the full ordered conversation.
    pub fn generate_with_history(&self, messages: Vec<ModelMessage>) -> Result<()> {
        self.send(GenerationRequest::History { messages })
    }

    fn send(&self, request: GenerationRequest) -> Result<()> {
        self.requests
            .send(request)
            .map_err(|_| anyhow!("generation worker is no longer running"))
    }

    /// Next event from the worker, `None` once the worker has stopped.
    pub async fn next_event(&mut self) -> Option<GenerationEvent> {
        self.events.recv().await
    }

    pub fn try_next_event(&mut self) -> Option<GenerationEvent> {
        self.events.try_recv().ok()
    }

    /// Stop the worker. Any in-flight generation is dropped.
    pub fn terminate(self) {
        self.worker.abort();
    }
}
