//! crates/learning_module_core/src/error.rs
//!
//! Errors raised by the learner-facing session engines.

use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LearningError {
    #[error("Unknown learning session: {0}")]
    UnknownSession(Uuid),
    #[error("Unknown flashcard: {0}")]
    UnknownCard(Uuid),
    #[error("Unknown concept: {0}")]
    UnknownConcept(String),
    #[error("The module has no quiz questions")]
    EmptyQuiz,
    #[error("Option {index} does not exist (question has {len} options)")]
    OptionOutOfRange { index: usize, len: usize },
    #[error("No option is selected")]
    NoSelection,
    #[error("'{action}' is not allowed while the quiz is {state}")]
    IllegalQuizAction {
        action: &'static str,
        state: &'static str,
    },
    #[error("No quiz is in progress")]
    NoActiveQuiz,
}

pub type LearningResult<T> = Result<T, LearningError>;
