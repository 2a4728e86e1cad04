pub mod domain;
pub mod error;
pub mod ingest;
pub mod learner;
pub mod lifecycle;
pub mod mastery;
pub mod memory;
pub mod pipeline;
pub mod ports;
pub mod progress;
pub mod quiz;
pub mod quiz_timer;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use domain::{
    Flashcard, FlashcardDraft, GeneratedAssets, Module, ModuleStatus, NewModule, QuizQuestion,
    QuizQuestionDraft, Section,
};
pub use error::{LearningError, LearningResult};
pub use lifecycle::{LifecycleError, LifecycleEvent, ModuleLifecycle};
pub use pipeline::{
    GenerationError, GenerationPipeline, GenerationProgress, PipelineConfig, PipelineError,
    PipelineEvent, RunHandle, RunOutcome,
};
pub use ports::{
    Artifact, AssetGenerator, ModuleStore, PortError, PortResult, Stage, TextExtractor,
};
