//! crates/learning_module_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or LLM APIs.

use crate::domain::{
    FlashcardDraft, GeneratedAssets, Module, ModuleStatus, NewModule, QuizQuestionDraft,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    Invalid(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Generation Stages and Artifacts
//=========================================================================================

/// One ordered unit of work in a generation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Parsing,
    Summary,
    Concepts,
    Flashcards,
    Quiz,
}

impl Stage {
    /// Every stage, in execution order.
    pub const ORDER: [Stage; 5] = [
        Stage::Parsing,
        Stage::Summary,
        Stage::Concepts,
        Stage::Flashcards,
        Stage::Quiz,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Parsing => "parsing",
            Stage::Summary => "summary",
            Stage::Concepts => "concepts",
            Stage::Flashcards => "flashcards",
            Stage::Quiz => "quiz",
        }
    }

    /// Human-readable progress label.
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Parsing => "Parsing Content",
            Stage::Summary => "Generating Summary",
            Stage::Concepts => "Extracting Concepts",
            Stage::Flashcards => "Creating Flashcards",
            Stage::Quiz => "Building Quiz",
        }
    }

    pub fn index(&self) -> usize {
        Stage::ORDER
            .iter()
            .position(|s| s == self)
            .unwrap_or_default()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The output of a single generator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    ParsedText(String),
    Summary(String),
    Concepts(Vec<String>),
    Flashcards(Vec<FlashcardDraft>),
    Quiz(Vec<QuizQuestionDraft>),
}

impl Artifact {
    /// The stage that is expected to produce this kind of artifact.
    pub fn stage(&self) -> Stage {
        match self {
            Artifact::ParsedText(_) => Stage::Parsing,
            Artifact::Summary(_) => Stage::Summary,
            Artifact::Concepts(_) => Stage::Concepts,
            Artifact::Flashcards(_) => Stage::Flashcards,
            Artifact::Quiz(_) => Stage::Quiz,
        }
    }
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait ModuleStore: Send + Sync {
    /// All modules, newest first.
    async fn list(&self) -> PortResult<Vec<Module>>;

    async fn get(&self, id: Uuid) -> PortResult<Module>;

    /// Creates a module in `draft`. A blank title is rejected with `PortError::Invalid`.
    async fn create(&self, new_module: NewModule) -> PortResult<Module>;

    async fn delete(&self, id: Uuid) -> PortResult<()>;

    /// Overwrites the status only. Called by the generation pipeline after the
    /// lifecycle has validated the transition.
    async fn set_status(&self, id: Uuid, status: ModuleStatus) -> PortResult<Module>;

    /// Writes every artifact field and sets the status to `completed` in one write.
    async fn commit_assets(&self, id: Uuid, assets: GeneratedAssets) -> PortResult<Module>;
}

#[async_trait]
pub trait AssetGenerator: Send + Sync {
    /// Runs one generation stage over the (parsed) source content.
    async fn generate(&self, stage: Stage, content: &str) -> PortResult<Artifact>;
}

/// Reads the text layer out of an uploaded document.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extracts the text of a PDF document.
    async fn extract_text(&self, bytes: &[u8]) -> PortResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_indices_follow_execution_order() {
        for (i, stage) in Stage::ORDER.iter().enumerate() {
            assert_eq!(stage.index(), i);
        }
        assert_eq!(Stage::Quiz.to_string(), "quiz");
    }
}
