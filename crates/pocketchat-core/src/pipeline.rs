//! The seam to the model runtime.
//!
//! A [`PipelineLoader`] knows how to bring a model up (downloading it if
//! needed). [`PipelineHandle`] owns one loader and memoizes the first
//! pipeline it successfully produces, so every later turn reuses it.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::state::ModelMessage;
use crate::status::DownloadProgress;

pub const DEFAULT_MAX_NEW_TOKENS: u32 = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationOptions {
    pub max_new_tokens: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_new_tokens: DEFAULT_MAX_NEW_TOKENS,
        }
    }
}

/// A loaded text generation model.
#[async_trait]
pub trait TextGenerationPipeline: Send + Sync {
    /// Short description for logs (model name).
    fn name(&self) -> &str;

    /// Run the model over `messages`, calling `on_token` with each decoded
    /// fragment as it arrives. Returns once generation has finished.
    async fn generate(
        &self,
        messages: &[ModelMessage],
        options: &GenerationOptions,
        on_token: &mut (dyn FnMut(String) + Send),
    ) -> Result<()>;
}

/// Produces a pipeline, reporting download progress along the way.
#[async_trait]
pub trait PipelineLoader: Send + Sync {
    async fn load(
        &self,
        on_progress: &mut (dyn FnMut(DownloadProgress) + Send),
    ) -> Result<Arc<dyn TextGenerationPipeline>>;
}

/// Lazily initialized, memoized pipeline.
///
/// A failed load is not cached; the next `get` tries again.
pub struct PipelineHandle {
    loader: Box<dyn PipelineLoader>,
    pipeline: OnceCell<Arc<dyn TextGenerationPipeline>>,
}

impl PipelineHandle {
    pub fn new(loader: impl PipelineLoader + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            pipeline: OnceCell::new(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.pipeline.initialized()
    }

    pub async fn get(
        &self,
        on_progress: &mut (dyn FnMut(DownloadProgress) + Send),
    ) -> Result<Arc<dyn TextGenerationPipeline>> {
        let pipeline = self
            .pipeline
            .get_or_try_init(|| self.loader.load(on_progress))
            .await?;
        Ok(Arc::clone(pipeline))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted in-memory pipeline for worker and bridge tests.

    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    pub struct ScriptedPipeline {
        pub fragments: Vec<String>,
        pub fail_with: Option<String>,
        pub seen: Arc<Mutex<Vec<Vec<ModelMessage>>>>,
    }

    #[async_trait]
    impl TextGenerationPipeline for ScriptedPipeline {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(
            &self,
            messages: &[ModelMessage],
            _options: &GenerationOptions,
            on_token: &mut (dyn FnMut(String) + Send),
        ) -> Result<()> {
            self.seen.lock().unwrap().push(messages.to_vec());
            for fragment in &self.fragments {
                on_token(fragment.clone());
            }
            match &self.fail_with {
                Some(reason) => Err(anyhow!("{}", reason)),
                None => Ok(()),
            }
        }
    }

    pub struct ScriptedLoader {
        pub fragments: Vec<String>,
        pub generation_error: Option<String>,
        /// Number of initial load attempts that fail.
        pub failing_loads: usize,
        pub loads: Arc<AtomicUsize>,
        pub seen: Arc<Mutex<Vec<Vec<ModelMessage>>>>,
    }

    impl ScriptedLoader {
        pub fn new(fragments: &[&str]) -> Self {
            Self {
                fragments: fragments.iter().map(|f| f.to_string()).collect(),
                generation_error: None,
                failing_loads: 0,
                loads: Arc::new(AtomicUsize::new(0)),
                seen: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl PipelineLoader for ScriptedLoader {
        async fn load(
            &self,
            on_progress: &mut (dyn FnMut(DownloadProgress) + Send),
        ) -> Result<Arc<dyn TextGenerationPipeline>> {
            let attempt = self.loads.fetch_add(1, Ordering::SeqCst);
            on_progress(DownloadProgress::new(50.0, "weights.bin"));
            if attempt < self.failing_loads {
                return Err(anyhow!("disk full"));
            }
            on_progress(DownloadProgress::new(100.0, "weights.bin"));
            Ok(Arc::new(ScriptedPipeline {
                fragments: self.fragments.clone(),
                fail_with: self.generation_error.clone(),
                seen: Arc::clone(&self.seen),
            }))
        }
    }
}
