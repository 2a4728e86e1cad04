//! crates/learning_module_core/src/domain.rs
//!
//! Defines the core data structures for learning modules and the artifacts
//! generated from their source content.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The generation status of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleStatus {
    Draft,
    Processing,
    Completed,
}

impl ModuleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleStatus::Draft => "draft",
            ModuleStatus::Processing => "processing",
            ModuleStatus::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(ModuleStatus::Draft),
            "processing" => Some(ModuleStatus::Processing),
            "completed" => Some(ModuleStatus::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single flashcard. The `id` is assigned once, when the card is generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub id: Uuid,
    pub front: String,
    pub back: String,
}

/// A multiple-choice quiz question. `correct` indexes into `options`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: Uuid,
    pub question: String,
    pub options: Vec<String>,
    pub correct: usize,
}

impl QuizQuestion {
    /// At least two options and a `correct` index that points at one of them.
    pub fn is_well_formed(&self) -> bool {
        self.options.len() >= 2 && self.correct < self.options.len()
    }
}

/// A flashcard as returned by the generator, before it is given an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashcardDraft {
    pub front: String,
    pub back: String,
}

/// A quiz question as returned by the generator, before it is given an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestionDraft {
    pub question: String,
    pub options: Vec<String>,
    pub correct: usize,
}

/// The complete artifact set produced by one successful generation run.
/// It is committed to the store in a single write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedAssets {
    pub summary: String,
    pub concepts: Vec<String>,
    pub flashcards: Vec<Flashcard>,
    pub quiz: Vec<QuizQuestion>,
}

impl GeneratedAssets {
    pub fn is_complete(&self) -> bool {
        !self.summary.trim().is_empty()
            && !self.concepts.is_empty()
            && !self.flashcards.is_empty()
            && !self.quiz.is_empty()
    }
}

/// A learning module as persisted by the module store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub original_content: String,
    pub summary: String,
    pub concepts: Vec<String>,
    pub flashcards: Vec<Flashcard>,
    pub quiz: Vec<QuizQuestion>,
    pub status: ModuleStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Module {
    /// Builds a fresh `draft` module with empty derived fields.
    pub fn new_draft(new: NewModule) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: new.title,
            description: new.description,
            original_content: new.original_content,
            summary: String::new(),
            concepts: Vec::new(),
            flashcards: Vec::new(),
            quiz: Vec::new(),
            status: ModuleStatus::Draft,
            created_at: now,
            updated_at: now,
        }
    }

    /// True when every derived artifact field is populated.
    pub fn has_assets(&self) -> bool {
        !self.summary.trim().is_empty()
            && !self.concepts.is_empty()
            && !self.flashcards.is_empty()
            && !self.quiz.is_empty()
    }

    pub fn apply_assets(&mut self, assets: GeneratedAssets) {
        self.summary = assets.summary;
        self.concepts = assets.concepts;
        self.flashcards = assets.flashcards;
        self.quiz = assets.quiz;
        self.status = ModuleStatus::Completed;
        self.updated_at = Utc::now();
    }
}

/// User-supplied fields for creating a module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewModule {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub original_content: String,
}

/// The four learner-facing content views tracked for completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Summary,
    Concepts,
    Flashcards,
    Quiz,
}

impl Section {
    pub const ALL: [Section; 4] = [
        Section::Summary,
        Section::Concepts,
        Section::Flashcards,
        Section::Quiz,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiz_question_requires_two_options_and_valid_index() {
        let mut q = QuizQuestion {
            id: Uuid::new_v4(),
            question: "Which?".into(),
            options: vec!["a".into(), "b".into()],
            correct: 1,
        };
        assert!(q.is_well_formed());
        q.correct = 2;
        assert!(!q.is_well_formed());
        q.options.truncate(1);
        q.correct = 0;
        assert!(!q.is_well_formed());
    }

    #[test]
    fn new_draft_has_empty_assets() {
        let module = Module::new_draft(NewModule {
            title: "Hooks".into(),
            ..Default::default()
        });
        assert_eq!(module.status, ModuleStatus::Draft);
        assert!(!module.has_assets());
        assert_eq!(module.created_at, module.updated_at);
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [ModuleStatus::Draft, ModuleStatus::Processing, ModuleStatus::Completed] {
            assert_eq!(ModuleStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ModuleStatus::parse("failed"), None);
    }
}
