use serde::{Deserialize, Serialize};

/// Lifecycle of the model backend as seen by the chat surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelStatus {
    #[default]
    Initializing,
    Ready,
    Error,
}

impl ModelStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ModelStatus::Initializing => "Loading model",
            ModelStatus::Ready => "Ready",
            ModelStatus::Error => "Model unavailable",
        }
    }
}

/// Download progress reported while the pipeline loads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadProgress {
    /// Percentage in `0.0..=100.0`.
    pub progress: f64,
    pub file: String,
}

impl DownloadProgress {
    pub fn new(progress: f64, file: impl Into<String>) -> Self {
        Self {
            progress: progress.clamp(0.0, 100.0),
            file: file.into(),
        }
    }

    /// Progress from byte counts, `0` when the total is not known yet.
    pub fn from_bytes(completed: u64, total: u64, file: impl Into<String>) -> Self {
        let progress = if total == 0 {
            0.0
        } else {
            completed as f64 / total as f64 * 100.0
        };
        Self::new(progress, file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_from_bytes() {
        assert_eq!(DownloadProgress::from_bytes(50, 200, "blob").progress, 25.0);
        assert_eq!(DownloadProgress::from_bytes(10, 0, "blob").progress, 0.0);
        assert_eq!(DownloadProgress::from_bytes(300, 200, "blob").progress, 100.0);
    }
}
