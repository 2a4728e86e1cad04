//! crates/learning_module_core/src/quiz.rs
//!
//! The timed quiz session as a pure state machine. Wall-clock concerns live in
//! [`crate::quiz_timer`], which calls [`QuizSession::tick`] once per second and
//! [`QuizSession::advance`] after the post-lock delay.

use crate::domain::QuizQuestion;
use crate::error::{LearningError, LearningResult};
use crate::progress::rounded_percentage;
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct QuizConfig {
    pub seconds_per_question: u32,
    pub advance_delay: Duration,
    /// Percentage at or above which the result counts as passed.
    pub pass_threshold: u8,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            seconds_per_question: 60,
            advance_delay: Duration::from_millis(1500),
            pass_threshold: 70,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum QuizPhase {
    Answering {
        question_index: usize,
        selection: Option<usize>,
    },
    Locked {
        question_index: usize,
        selected_index: usize,
    },
    Finished {
        score: usize,
    },
}

impl QuizPhase {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            QuizPhase::Answering { .. } => "answering",
            QuizPhase::Locked { .. } => "locked",
            QuizPhase::Finished { .. } => "finished",
        }
    }
}

/// One submitted answer. Never modified once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerRecord {
    pub question_id: Uuid,
    pub selected_index: usize,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuizResult {
    pub score: usize,
    pub total: usize,
    pub percentage: u8,
    pub passed: bool,
    pub timed_out: bool,
    pub answers: Vec<AnswerRecord>,
}

impl QuizResult {
    pub fn incorrect(&self) -> usize {
        self.total - self.score
    }
}

#[derive(Debug, Clone)]
pub struct QuizSession {
    questions: Vec<QuizQuestion>,
    config: QuizConfig,
    phase: QuizPhase,
    score: usize,
    answers: Vec<AnswerRecord>,
    remaining_seconds: u32,
    timed_out: bool,
}

impl QuizSession {
    pub fn new(questions: Vec<QuizQuestion>, config: QuizConfig) -> LearningResult<Self> {
        if questions.is_empty() {
            return Err(LearningError::EmptyQuiz);
        }
        let remaining_seconds = config
            .seconds_per_question
            .saturating_mul(questions.len() as u32);
        Ok(Self {
            questions,
            config,
            phase: QuizPhase::Answering {
                question_index: 0,
                selection: None,
            },
            score: 0,
            answers: Vec::new(),
            remaining_seconds,
            timed_out: false,
        })
    }

    /// A brand-new session over the same questions with a full time budget.
    pub fn retry(&self) -> Self {
        Self {
            questions: self.questions.clone(),
            config: self.config.clone(),
            phase: QuizPhase::Answering {
                question_index: 0,
                selection: None,
            },
            score: 0,
            answers: Vec::new(),
            remaining_seconds: self.total_seconds(),
            timed_out: false,
        }
    }

    fn illegal(&self, action: &'static str) -> LearningError {
        LearningError::IllegalQuizAction {
            action,
            state: self.phase.name(),
        }
    }

    /// Records a tentative selection for the current question.
    pub fn select_option(&mut self, index: usize) -> LearningResult<()> {
        let QuizPhase::Answering { question_index, .. } = self.phase else {
            return Err(self.illegal("select option"));
        };
        let len = self.questions[question_index].options.len();
        if index >= len {
            return Err(LearningError::OptionOutOfRange { index, len });
        }
        self.phase = QuizPhase::Answering {
            question_index,
            selection: Some(index),
        };
        Ok(())
    }

    /// Submits the current selection for scoring.
    pub fn lock_answer(&mut self) -> LearningResult<AnswerRecord> {
        let QuizPhase::Answering {
            question_index,
            selection,
        } = self.phase
        else {
            return Err(self.illegal("lock answer"));
        };
        let selected_index = selection.ok_or(LearningError::NoSelection)?;

        let question = &self.questions[question_index];
        let record = AnswerRecord {
            question_id: question.id,
            selected_index,
            is_correct: selected_index == question.correct,
        };
        if record.is_correct {
            self.score += 1;
        }
        self.answers.push(record.clone());
        self.phase = QuizPhase::Locked {
            question_index,
            selected_index,
        };
        Ok(record)
    }

    /// Leaves `Locked`: on to the next question, or `Finished` after the last one.
    /// Returns the result when this call finished the quiz.
    pub fn advance(&mut self) -> LearningResult<Option<QuizResult>> {
        let QuizPhase::Locked { question_index, .. } = self.phase else {
            return Err(self.illegal("advance"));
        };
        if question_index + 1 < self.questions.len() {
            self.phase = QuizPhase::Answering {
                question_index: question_index + 1,
                selection: None,
            };
            Ok(None)
        } else {
            Ok(Some(self.finish()))
        }
    }

    /// One second of the time budget elapsed. Returns the result when the
    /// budget ran out on this tick.
    pub fn tick(&mut self) -> Option<QuizResult> {
        if self.is_finished() {
            return None;
        }
        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds == 0 {
            self.timed_out = true;
            return Some(self.finish());
        }
        None
    }

    fn finish(&mut self) -> QuizResult {
        self.phase = QuizPhase::Finished { score: self.score };
        self.build_result()
    }

    fn build_result(&self) -> QuizResult {
        let total = self.questions.len();
        let percentage = rounded_percentage(self.score, total);
        QuizResult {
            score: self.score,
            total,
            percentage,
            passed: percentage >= self.config.pass_threshold,
            timed_out: self.timed_out,
            answers: self.answers.clone(),
        }
    }

    /// The result of a finished session.
    pub fn result(&self) -> Option<QuizResult> {
        self.is_finished().then(|| self.build_result())
    }

    pub fn phase(&self) -> QuizPhase {
        self.phase
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, QuizPhase::Finished { .. })
    }

    pub fn score(&self) -> usize {
        self.score
    }

    pub fn answers(&self) -> &[AnswerRecord] {
        &self.answers
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    pub fn total_seconds(&self) -> u32 {
        self.config
            .seconds_per_question
            .saturating_mul(self.questions.len() as u32)
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    pub fn advance_delay(&self) -> Duration {
        self.config.advance_delay
    }

    pub fn current_question(&self) -> Option<&QuizQuestion> {
        match self.phase {
            QuizPhase::Answering { question_index, .. } | QuizPhase::Locked { question_index, .. } => {
                self.questions.get(question_index)
            }
            QuizPhase::Finished { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn questions(correct: &[usize]) -> Vec<QuizQuestion> {
        correct
            .iter()
            .enumerate()
            .map(|(i, &correct)| QuizQuestion {
                id: Uuid::new_v4(),
                question: format!("Q{}", i + 1),
                options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                correct,
            })
            .collect()
    }

    fn answer(session: &mut QuizSession, index: usize) -> Option<QuizResult> {
        session.select_option(index).unwrap();
        session.lock_answer().unwrap();
        session.advance().unwrap()
    }

    #[test]
    fn three_question_example_scores_two() {
        let mut session = QuizSession::new(questions(&[0, 2, 1]), QuizConfig::default()).unwrap();
        assert_eq!(session.remaining_seconds(), 180);

        assert!(answer(&mut session, 0).is_none());
        assert!(answer(&mut session, 1).is_none());
        let result = answer(&mut session, 1).expect("last advance finishes");

        assert_eq!(result.score, 2);
        assert_eq!(result.percentage, 67);
        assert!(!result.passed);
        assert!(!result.timed_out);
        assert_eq!(result.incorrect(), 1);
        assert_eq!(
            result.answers.iter().map(|a| a.is_correct).collect::<Vec<_>>(),
            vec![true, false, true]
        );
        assert_eq!(session.phase(), QuizPhase::Finished { score: 2 });
    }

    #[test]
    fn selection_can_change_until_locked() {
        let mut session = QuizSession::new(questions(&[3]), QuizConfig::default()).unwrap();
        session.select_option(0).unwrap();
        session.select_option(3).unwrap();
        let record = session.lock_answer().unwrap();
        assert_eq!(record.selected_index, 3);
        assert!(record.is_correct);

        assert!(matches!(
            session.select_option(1),
            Err(LearningError::IllegalQuizAction { state: "locked", .. })
        ));
        assert!(session.lock_answer().is_err());
        assert_eq!(session.answers().len(), 1);
    }

    #[test]
    fn lock_requires_a_selection_and_valid_option() {
        let mut session = QuizSession::new(questions(&[0]), QuizConfig::default()).unwrap();
        assert_eq!(session.lock_answer(), Err(LearningError::NoSelection));
        assert_eq!(
            session.select_option(4),
            Err(LearningError::OptionOutOfRange { index: 4, len: 4 })
        );
        assert!(session.advance().is_err());
    }

    #[test]
    fn budget_expiry_finishes_on_the_last_second() {
        let mut session = QuizSession::new(questions(&[0, 1]), QuizConfig::default()).unwrap();
        for _ in 0..119 {
            assert!(session.tick().is_none());
        }
        let result = session.tick().expect("budget exhausted");
        assert_eq!(result.score, 0);
        assert!(result.timed_out);
        assert_eq!(session.remaining_seconds(), 0);
        assert!(session.tick().is_none());
    }

    #[test]
    fn timeout_while_locked_counts_only_locked_answers() {
        let config = QuizConfig {
            seconds_per_question: 1,
            ..QuizConfig::default()
        };
        let mut session = QuizSession::new(questions(&[0, 0]), config).unwrap();
        session.select_option(0).unwrap();
        session.lock_answer().unwrap();
        assert!(session.tick().is_none());
        let result = session.tick().expect("budget exhausted");
        assert_eq!(result.score, 1);
        assert_eq!(result.percentage, 50);
        assert!(session.advance().is_err());
    }

    #[test]
    fn retry_starts_from_scratch() {
        let mut session = QuizSession::new(questions(&[0, 1]), QuizConfig::default()).unwrap();
        answer(&mut session, 0);
        session.tick();
        let fresh = session.retry();
        assert_eq!(fresh.score(), 0);
        assert!(fresh.answers().is_empty());
        assert_eq!(fresh.remaining_seconds(), 120);
        assert_eq!(
            fresh.phase(),
            QuizPhase::Answering {
                question_index: 0,
                selection: None
            }
        );
        assert_eq!(session.score(), 1);
    }

    #[test]
    fn pass_threshold_is_inclusive() {
        let mut session = QuizSession::new(questions(&[0; 10]), QuizConfig::default()).unwrap();
        for i in 0..10 {
            answer(&mut session, if i < 7 { 0 } else { 1 });
        }
        let result = session.result().unwrap();
        assert_eq!(result.percentage, 70);
        assert!(result.passed);
    }

    #[test]
    fn empty_quiz_is_rejected() {
        assert_eq!(
            QuizSession::new(Vec::new(), QuizConfig::default()).err(),
            Some(LearningError::EmptyQuiz)
        );
    }
}
