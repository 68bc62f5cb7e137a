use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure reported by the generation worker
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "lowercase")]
pub enum WorkerError {
    #[error("failed to load model: {0}")]
    Load(String),
    #[error("generation failed: {0}")]
    Generation(String),
}

impl WorkerError {
    pub fn load(err: anyhow::Error) -> Self {
        WorkerError::Load(format!("{:#}", err))
    }

    pub fn generation(err: anyhow::Error) -> Self {
        WorkerError::Generation(format!("{:#}", err))
    }
}
