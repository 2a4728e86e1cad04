//! crates/learning_module_core/src/learner.rs
//!
//! One learner working through one completed module. Each section's own
//! tracker decides when the section is done; the session only reports which
//! section completed so the caller can hand it to a `ProgressTracker`.

use crate::domain::{Module, ModuleStatus, Section};
use crate::error::LearningResult;
use crate::mastery::{
    ConceptReviewTracker, FlashcardMasteryTracker, FlashcardView, MasteryToggle,
    SummaryReadTracker,
};
use crate::ports::PortError;
use crate::quiz::{QuizConfig, QuizResult, QuizSession};
use uuid::Uuid;

pub struct LearnerSession {
    module: Module,
    summary: SummaryReadTracker,
    concepts: ConceptReviewTracker,
    flashcards: FlashcardMasteryTracker,
    show_learned: bool,
    quiz_config: QuizConfig,
}

impl LearnerSession {
    /// Only modules with a committed artifact set can be studied.
    pub fn open(module: Module, quiz_config: QuizConfig) -> Result<Self, PortError> {
        if module.status != ModuleStatus::Completed || !module.has_assets() {
            return Err(PortError::Invalid(format!(
                "Module {} is not ready for learning (status: {})",
                module.id, module.status
            )));
        }
        Ok(Self {
            concepts: ConceptReviewTracker::new(module.concepts.clone()),
            flashcards: FlashcardMasteryTracker::new(module.flashcards.clone()),
            summary: SummaryReadTracker::default(),
            show_learned: true,
            quiz_config,
            module,
        })
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    /// The learner reached the end of the summary.
    pub fn summary_read(&mut self) -> Option<Section> {
        self.summary.reach_end().then_some(Section::Summary)
    }

    pub fn review_concept(&mut self, concept: &str) -> LearningResult<Option<Section>> {
        Ok(self.concepts.review(concept)?.then_some(Section::Concepts))
    }

    pub fn concepts(&self) -> &ConceptReviewTracker {
        &self.concepts
    }

    pub fn toggle_learned(
        &mut self,
        card_id: Uuid,
    ) -> LearningResult<(MasteryToggle, Option<Section>)> {
        let toggle = self.flashcards.toggle_learned(card_id)?;
        let completed = toggle.section_completed.then_some(Section::Flashcards);
        Ok((toggle, completed))
    }

    pub fn set_show_learned(&mut self, show: bool) {
        self.show_learned = show;
    }

    pub fn show_learned(&self) -> bool {
        self.show_learned
    }

    pub fn flashcards(&self) -> &FlashcardMasteryTracker {
        &self.flashcards
    }

    pub fn flashcard_view(&self) -> FlashcardView<'_> {
        self.flashcards.view(self.show_learned)
    }

    /// A fresh quiz session with a full time budget.
    pub fn new_quiz(&self) -> LearningResult<QuizSession> {
        QuizSession::new(self.module.quiz.clone(), self.quiz_config.clone())
    }

    /// The quiz section completes when a quiz over this module's questions
    /// reaches its terminal state. A result from any other question set is ignored.
    pub fn quiz_finished(&self, result: &QuizResult) -> Option<Section> {
        let questions = &self.module.quiz;
        let answered_here = result
            .answers
            .iter()
            .all(|answer| questions.iter().any(|q| q.id == answer.question_id));
        (result.total == questions.len() && answered_here).then_some(Section::Quiz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Flashcard, GeneratedAssets, NewModule, QuizQuestion};
    use crate::progress::ProgressTracker;

    fn completed_module() -> Module {
        let mut module = Module::new_draft(NewModule {
            title: "Hooks".into(),
            ..Default::default()
        });
        module.apply_assets(GeneratedAssets {
            summary: "Hooks let function components hold state.".into(),
            concepts: vec!["useState".into(), "useEffect".into()],
            flashcards: vec![Flashcard {
                id: Uuid::new_v4(),
                front: "What is useState?".into(),
                back: "A state hook.".into(),
            }],
            quiz: vec![QuizQuestion {
                id: Uuid::new_v4(),
                question: "Side effects?".into(),
                options: vec!["useState".into(), "useEffect".into()],
                correct: 1,
            }],
        });
        module
    }

    #[test]
    fn draft_modules_cannot_be_opened() {
        let module = Module::new_draft(NewModule {
            title: "Empty".into(),
            ..Default::default()
        });
        assert!(LearnerSession::open(module, QuizConfig::default()).is_err());
    }

    #[test]
    fn walking_every_section_reaches_full_progress() {
        let module = completed_module();
        let card = module.flashcards[0].id;
        let mut learner = LearnerSession::open(module, QuizConfig::default()).unwrap();
        let mut tracker = ProgressTracker::new();
        let session = tracker.open();

        let mut report = |section: Option<Section>| {
            if let Some(section) = section {
                tracker.mark_complete(session, section).unwrap();
            }
        };

        report(learner.summary_read());
        report(learner.summary_read());
        report(learner.review_concept("useState").unwrap());
        report(learner.review_concept("useEffect").unwrap());
        let (toggle, completed) = learner.toggle_learned(card).unwrap();
        assert!(toggle.learned);
        report(completed);
        assert_eq!(learner.flashcard_view(), FlashcardView::Cards(learner.flashcards().filtered(true)));

        let mut quiz = learner.new_quiz().unwrap();
        quiz.select_option(1).unwrap();
        quiz.lock_answer().unwrap();
        let result = quiz.advance().unwrap().unwrap();
        report(learner.quiz_finished(&result));

        assert_eq!(tracker.percentage(session).unwrap(), 100);
        assert!(tracker.is_complete(session).unwrap());
    }

    #[test]
    fn leaving_a_quiz_before_it_finishes_keeps_the_section_open() {
        let module = completed_module();
        let learner = LearnerSession::open(module, QuizConfig::default()).unwrap();
        let mut tracker = ProgressTracker::new();
        let session = tracker.open();

        let mut quiz = learner.new_quiz().unwrap();
        quiz.select_option(0).unwrap();
        quiz.lock_answer().unwrap();
        // Exiting drops the session while the answer is still locked.
        assert!(quiz.result().is_none());
        drop(quiz);

        let snapshot = tracker.snapshot(session).unwrap();
        assert!(!snapshot.quiz);
        assert_eq!(tracker.percentage(session).unwrap(), 0);

        let mut retry = learner.new_quiz().unwrap();
        retry.select_option(1).unwrap();
        retry.lock_answer().unwrap();
        let result = retry.advance().unwrap().unwrap();
        let section = learner.quiz_finished(&result).unwrap();
        tracker.mark_complete(session, section).unwrap();
        assert_eq!(tracker.percentage(session).unwrap(), 25);
    }

    #[test]
    fn results_from_another_question_set_do_not_complete_the_quiz() {
        let learner = LearnerSession::open(completed_module(), QuizConfig::default()).unwrap();

        let mut foreign = QuizSession::new(completed_module().quiz, QuizConfig::default()).unwrap();
        foreign.select_option(1).unwrap();
        foreign.lock_answer().unwrap();
        let result = foreign.advance().unwrap().unwrap();
        assert_eq!(learner.quiz_finished(&result), None);

        let mut own = learner.new_quiz().unwrap();
        own.select_option(1).unwrap();
        own.lock_answer().unwrap();
        let result = own.advance().unwrap().unwrap();
        assert_eq!(learner.quiz_finished(&result), Some(Section::Quiz));
    }

    #[test]
    fn unlearned_filter_shows_all_caught_up() {
        let module = completed_module();
        let card = module.flashcards[0].id;
        let mut learner = LearnerSession::open(module, QuizConfig::default()).unwrap();
        learner.set_show_learned(false);
        learner.toggle_learned(card).unwrap();
        assert_eq!(learner.flashcard_view(), FlashcardView::AllCaughtUp);
    }
}
