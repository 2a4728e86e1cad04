//! crates/learning_module_core/src/mastery.rs
//!
//! Learner-assigned markings: flashcards marked "learned", concepts acknowledged,
//! and the summary read to its end. Each tracker reports its section as complete
//! exactly once per session.

use crate::domain::Flashcard;
use crate::error::{LearningError, LearningResult};
use std::collections::HashSet;
use std::hash::Hash;
use uuid::Uuid;

/// A set of stable identifiers with toggle and membership operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdSet<T: Eq + Hash> {
    items: HashSet<T>,
}

impl<T: Eq + Hash> Default for IdSet<T> {
    fn default() -> Self {
        Self {
            items: HashSet::new(),
        }
    }
}

impl<T: Eq + Hash + Clone> IdSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips membership and returns whether `id` is a member afterwards.
    pub fn toggle(&mut self, id: &T) -> bool {
        if self.items.remove(id) {
            false
        } else {
            self.items.insert(id.clone());
            true
        }
    }

    /// Returns `true` if `id` was not already a member.
    pub fn insert(&mut self, id: T) -> bool {
        self.items.insert(id)
    }

    pub fn contains(&self, id: &T) -> bool {
        self.items.contains(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

//=========================================================================================
// Flashcards
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MasteryToggle {
    pub learned: bool,
    pub learned_count: usize,
    /// Set only on the toggle that first made every card learned.
    pub section_completed: bool,
}

/// What the flashcard view should show for a given filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlashcardView<'a> {
    Cards(Vec<&'a Flashcard>),
    /// The unlearned filter is empty because every card is learned.
    AllCaughtUp,
    NoCards,
}

pub struct FlashcardMasteryTracker {
    cards: Vec<Flashcard>,
    learned: IdSet<Uuid>,
    completion_signalled: bool,
}

impl FlashcardMasteryTracker {
    pub fn new(cards: Vec<Flashcard>) -> Self {
        Self {
            cards,
            learned: IdSet::new(),
            completion_signalled: false,
        }
    }

    pub fn toggle_learned(&mut self, card_id: Uuid) -> LearningResult<MasteryToggle> {
        if !self.cards.iter().any(|c| c.id == card_id) {
            return Err(LearningError::UnknownCard(card_id));
        }
        let learned = self.learned.toggle(&card_id);
        let mut section_completed = false;
        if !self.completion_signalled && self.learned_count() == self.total() {
            self.completion_signalled = true;
            section_completed = true;
        }
        Ok(MasteryToggle {
            learned,
            learned_count: self.learned_count(),
            section_completed,
        })
    }

    pub fn is_learned(&self, card_id: Uuid) -> bool {
        self.learned.contains(&card_id)
    }

    pub fn learned_count(&self) -> usize {
        self.learned.len()
    }

    pub fn total(&self) -> usize {
        self.cards.len()
    }

    /// All cards when `show_learned`, otherwise only unlearned ones. Original order is kept.
    pub fn filtered(&self, show_learned: bool) -> Vec<&Flashcard> {
        self.cards
            .iter()
            .filter(|c| show_learned || !self.learned.contains(&c.id))
            .collect()
    }

    pub fn view(&self, show_learned: bool) -> FlashcardView<'_> {
        if self.cards.is_empty() {
            return FlashcardView::NoCards;
        }
        let cards = self.filtered(show_learned);
        if cards.is_empty() {
            FlashcardView::AllCaughtUp
        } else {
            FlashcardView::Cards(cards)
        }
    }
}

//=========================================================================================
// Concepts and Summary
//=========================================================================================

/// Concepts section completes once every distinct concept was acknowledged.
pub struct ConceptReviewTracker {
    concepts: Vec<String>,
    distinct: usize,
    reviewed: IdSet<String>,
    completion_signalled: bool,
}

impl ConceptReviewTracker {
    pub fn new(concepts: Vec<String>) -> Self {
        let distinct = concepts.iter().collect::<HashSet<_>>().len();
        Self {
            concepts,
            distinct,
            reviewed: IdSet::new(),
            completion_signalled: false,
        }
    }

    /// Acknowledges a concept. Returns `true` when this completed the section.
    pub fn review(&mut self, concept: &str) -> LearningResult<bool> {
        if !self.concepts.iter().any(|c| c == concept) {
            return Err(LearningError::UnknownConcept(concept.to_string()));
        }
        self.reviewed.insert(concept.to_string());
        if !self.completion_signalled && self.reviewed.len() == self.distinct {
            self.completion_signalled = true;
            return Ok(true);
        }
        Ok(false)
    }

    pub fn reviewed_count(&self) -> usize {
        self.reviewed.len()
    }

    pub fn total(&self) -> usize {
        self.distinct
    }
}

/// Fires once, the first time the learner reaches the end of the summary.
#[derive(Debug, Default)]
pub struct SummaryReadTracker {
    reached_end: bool,
}

impl SummaryReadTracker {
    pub fn reach_end(&mut self) -> bool {
        !std::mem::replace(&mut self.reached_end, true)
    }
}
