//! crates/learning_module_core/src/progress.rs
//!
//! Per-session section completion and the derived completion percentage.

use crate::domain::Section;
use crate::error::{LearningError, LearningResult};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

/// `round(100 * part / whole)`, rounding halves up. Zero when `whole` is zero.
pub fn rounded_percentage(part: usize, whole: usize) -> u8 {
    if whole == 0 {
        return 0;
    }
    let part = part.min(whole);
    ((part * 200 + whole) / (whole * 2)) as u8
}

/// Which sections of one module a learner has completed in one session.
/// Sections can only be added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressState {
    completed: BTreeSet<Section>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub percentage: u8,
    pub summary: bool,
    pub concepts: bool,
    pub flashcards: bool,
    pub quiz: bool,
    pub complete: bool,
}

impl ProgressState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` only the first time a section is marked.
    pub fn mark_complete(&mut self, section: Section) -> bool {
        self.completed.insert(section)
    }

    pub fn is_section_complete(&self, section: Section) -> bool {
        self.completed.contains(&section)
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    pub fn percentage(&self) -> u8 {
        rounded_percentage(self.completed.len(), Section::ALL.len())
    }

    pub fn is_complete(&self) -> bool {
        Section::ALL.iter().all(|s| self.completed.contains(s))
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            percentage: self.percentage(),
            summary: self.is_section_complete(Section::Summary),
            concepts: self.is_section_complete(Section::Concepts),
            flashcards: self.is_section_complete(Section::Flashcards),
            quiz: self.is_section_complete(Section::Quiz),
            complete: self.is_complete(),
        }
    }
}

/// Progress of every open learning session, keyed by session id.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    sessions: HashMap<Uuid, ProgressState>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a session with no completed sections and returns its id.
    pub fn open(&mut self) -> Uuid {
        let session_id = Uuid::new_v4();
        self.sessions.insert(session_id, ProgressState::new());
        session_id
    }

    pub fn close(&mut self, session_id: Uuid) -> Option<ProgressState> {
        self.sessions.remove(&session_id)
    }

    fn state(&self, session_id: Uuid) -> LearningResult<&ProgressState> {
        self.sessions
            .get(&session_id)
            .ok_or(LearningError::UnknownSession(session_id))
    }

    /// Marks a section and returns the recomputed percentage.
    pub fn mark_complete(&mut self, session_id: Uuid, section: Section) -> LearningResult<u8> {
        let state = self
            .sessions
            .get_mut(&session_id)
            .ok_or(LearningError::UnknownSession(session_id))?;
        state.mark_complete(section);
        Ok(state.percentage())
    }

    pub fn percentage(&self, session_id: Uuid) -> LearningResult<u8> {
        Ok(self.state(session_id)?.percentage())
    }

    pub fn is_complete(&self, session_id: Uuid) -> LearningResult<bool> {
        Ok(self.state(session_id)?.is_complete())
    }

    pub fn snapshot(&self, session_id: Uuid) -> LearningResult<ProgressSnapshot> {
        Ok(self.state(session_id)?.snapshot())
    }
}
