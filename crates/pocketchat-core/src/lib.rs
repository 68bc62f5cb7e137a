pub mod ai;
pub mod bridge;
pub mod chat;
pub mod config;
pub mod error;
pub mod history;
pub mod pipeline;
pub mod protocol;
pub mod splitter;
pub mod state;
pub mod status;
mod worker;

// Re-export main types for convenience
pub use ai::{OllamaClient, OllamaLoader, OllamaPipeline};
pub use bridge::GenerationBridge;
pub use chat::{ChatState, APOLOGY_MESSAGE};
pub use config::Config;
pub use error::WorkerError;
pub use history::{prepare_conversation_history, to_model_messages, DEFAULT_SYSTEM_PROMPT};
pub use pipeline::{GenerationOptions, PipelineHandle, PipelineLoader, TextGenerationPipeline};
pub use protocol::{GenerationEvent, GenerationRequest};
pub use splitter::{split_thinking, Markers, Split};
pub use state::{ChatMessage, ChatRole, ModelMessage, ModelRole};
pub use status::{DownloadProgress, ModelStatus};
