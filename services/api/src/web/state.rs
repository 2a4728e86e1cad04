//! services/api/src/web/state.rs
//!
//! Defines the application state shared by every handler and connection.

use crate::config::Config;
use learning_module_core::pipeline::GenerationPipeline;
use learning_module_core::ports::{AssetGenerator, ModuleStore, TextExtractor};
use learning_module_core::progress::ProgressTracker;
use std::sync::Arc;
use tokio::sync::Mutex;

/// The shared application state, created once at startup and passed to all handlers.
pub struct AppState {
    pub store: Arc<dyn ModuleStore>,
    pub pipeline: GenerationPipeline,
    /// Reads the text layer of PDF uploads.
    pub extractor: Arc<dyn TextExtractor>,
    pub config: Arc<Config>,
    /// Section completion of every connected learner, keyed by learner session id.
    pub progress: Mutex<ProgressTracker>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ModuleStore>,
        generator: Arc<dyn AssetGenerator>,
        extractor: Arc<dyn TextExtractor>,
        config: Arc<Config>,
    ) -> Self {
        let pipeline = GenerationPipeline::new(store.clone(), generator, config.pipeline_config());
        Self {
            store,
            pipeline,
            extractor,
            config,
            progress: Mutex::new(ProgressTracker::new()),
        }
    }
}
