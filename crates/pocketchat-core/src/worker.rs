//! Body of the background generation task.
//!
//! Owns the pipeline handle, loads it once at start-up and then serves
//! requests one at a time. Every failure is turned into an `Error` event;
//! nothing escapes the task.

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use crate::error::WorkerError;
use crate::pipeline::{GenerationOptions, PipelineHandle};
use crate::protocol::{GenerationEvent, GenerationRequest};
use crate::state::ModelMessage;
use crate::status::DownloadProgress;

/// Settings fixed for the lifetime of a worker
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub options: GenerationOptions,
    /// System prompt used for legacy single-prompt requests.
    pub system_prompt: String,
}

pub(crate) async fn run(
    handle: PipelineHandle,
    settings: WorkerSettings,
    mut requests: UnboundedReceiver<GenerationRequest>,
    events: UnboundedSender<GenerationEvent>,
) {
    tracing::debug!("generation worker started");

    // A request queued during a failed start-up load retries the load
    // itself, so its turn gets exactly one outcome.
    let mut queued = None;
    let mut on_progress = progress_sender(&events);
    match handle.get(&mut on_progress).await {
        Ok(pipeline) => {
            tracing::info!(model = pipeline.name(), "model ready");
            let _ = events.send(GenerationEvent::Ready);
        }
        Err(err) => match requests.try_recv() {
            Ok(request) => {
                tracing::warn!(error = %format!("{:#}", err), "model failed to load, retrying for queued request");
                queued = Some(request);
            }
            Err(_) => {
                tracing::error!(error = %format!("{:#}", err), "model failed to load");
                let _ = events.send(GenerationEvent::Error(WorkerError::load(err)));
            }
        },
    }

    loop {
        let request = match queued.take() {
            Some(request) => request,
            None => match requests.recv().await {
                Some(request) => request,
                None => break,
            },
        };
        let messages = request.into_messages(&settings.system_prompt);
        tracing::debug!(messages = messages.len(), "generation requested");

        let event = match serve(&handle, &settings.options, &messages, &events).await {
            Ok(()) => GenerationEvent::GenerationComplete,
            Err(err) => {
                tracing::error!(error = %err, "generation request failed");
                GenerationEvent::Error(err)
            }
        };
        if events.send(event).is_err() {
            break;
        }
    }

    tracing::debug!("generation worker stopped");
}

async fn serve(
    handle: &PipelineHandle,
    options: &GenerationOptions,
    messages: &[ModelMessage],
    events: &UnboundedSender<GenerationEvent>,
) -> Result<(), WorkerError> {
    let was_loaded = handle.is_loaded();
    let mut on_progress = progress_sender(events);
    let pipeline = handle.get(&mut on_progress).await.map_err(WorkerError::load)?;
    if !was_loaded {
        tracing::info!(model = pipeline.name(), "model ready");
        let _ = events.send(GenerationEvent::Ready);
    }

    let mut fragments = 0usize;
    let mut on_token = |fragment: String| {
        fragments += 1;
        let _ = events.send(GenerationEvent::Token(fragment));
    };
    pipeline
        .generate(messages, options, &mut on_token)
        .await
        .map_err(WorkerError::generation)?;

    tracing::debug!(fragments, "generation finished");
    Ok(())
}

fn progress_sender(events: &UnboundedSender<GenerationEvent>) -> impl FnMut(DownloadProgress) + Send + '_ {
    move |progress| {
        let _ = events.send(GenerationEvent::DownloadProgress(progress));
    }
}
