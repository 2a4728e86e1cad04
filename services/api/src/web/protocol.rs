//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the learner's browser and the
//! API server.

use learning_module_core::domain::Flashcard;
use learning_module_core::progress::ProgressSnapshot;
use learning_module_core::quiz::{AnswerRecord, QuizPhase, QuizResult, QuizSession};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Opens a learner session on a completed module. This must be the first message.
    Init { module_id: Uuid },

    /// The learner scrolled to the end of the summary.
    SummaryRead,

    ReviewConcept { concept: String },

    ToggleLearned { card_id: Uuid },

    /// Switches between all cards and unlearned cards only.
    ShowLearned { show: bool },

    StartQuiz,

    SelectOption { index: usize },

    LockAnswer,

    /// Abandons the running quiz without a result.
    ExitQuiz,

    RetryQuiz,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct FlashcardItem {
    pub id: Uuid,
    pub front: String,
    pub back: String,
    pub learned: bool,
}

impl FlashcardItem {
    pub fn new(card: &Flashcard, learned: bool) -> Self {
        Self {
            id: card.id,
            front: card.front.clone(),
            back: card.back.clone(),
            learned,
        }
    }
}

/// The current question without its answer key.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct QuestionView {
    pub id: Uuid,
    pub question: String,
    pub options: Vec<String>,
}

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms successful session initialization.
    SessionInitialized { session_id: Uuid, module_id: Uuid },

    Progress {
        #[serde(flatten)]
        progress: ProgressSnapshot,
    },

    Flashcards {
        learned_count: usize,
        total: usize,
        show_learned: bool,
        cards: Vec<FlashcardItem>,
        /// Every card is learned and only unlearned cards are shown.
        all_caught_up: bool,
    },

    Concepts { reviewed: usize, total: usize },

    QuizState {
        phase: QuizPhase,
        question: Option<QuestionView>,
        question_count: usize,
        remaining_seconds: u32,
        score: usize,
    },

    TimerTick { remaining_seconds: u32 },

    AnswerLocked {
        question_id: Uuid,
        selected_index: usize,
        is_correct: bool,
        score: usize,
    },

    QuizFinished {
        score: usize,
        total: usize,
        percentage: u8,
        passed: bool,
        timed_out: bool,
        incorrect: usize,
        answers: Vec<AnswerRecord>,
    },

    /// Reports an error to the client. The connection stays open unless the
    /// session could not be initialized.
    Error { message: String },
}

impl ServerMessage {
    pub fn quiz_state(quiz: &QuizSession) -> Self {
        ServerMessage::QuizState {
            phase: quiz.phase(),
            question: quiz.current_question().map(|q| QuestionView {
                id: q.id,
                question: q.question.clone(),
                options: q.options.clone(),
            }),
            question_count: quiz.question_count(),
            remaining_seconds: quiz.remaining_seconds(),
            score: quiz.score(),
        }
    }

    pub fn answer_locked(record: AnswerRecord, score: usize) -> Self {
        ServerMessage::AnswerLocked {
            question_id: record.question_id,
            selected_index: record.selected_index,
            is_correct: record.is_correct,
            score,
        }
    }

    pub fn quiz_finished(result: QuizResult) -> Self {
        ServerMessage::QuizFinished {
            incorrect: result.incorrect(),
            score: result.score,
            total: result.total,
            percentage: result.percentage,
            passed: result.passed,
            timed_out: result.timed_out,
            answers: result.answers,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_messages_are_type_tagged() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"select_option","index":2}"#).unwrap();
        assert!(matches!(msg, ClientMessage::SelectOption { index: 2 }));
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"lock_answer"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::LockAnswer));
    }

    #[test]
    fn progress_is_flattened() {
        let msg = ServerMessage::Progress {
            progress: ProgressSnapshot {
                percentage: 50,
                summary: true,
                concepts: true,
                flashcards: false,
                quiz: false,
                complete: false,
            },
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "type": "progress",
                "percentage": 50,
                "summary": true,
                "concepts": true,
                "flashcards": false,
                "quiz": false,
                "complete": false
            })
        );
    }
}
