//! crates/learning_module_core/src/testing.rs
//!
//! Scripted port doubles for tests. The `AssetGenerator` can fail at a chosen
//! stage, or hold a stage open until the test releases it.

use crate::domain::{FlashcardDraft, QuizQuestionDraft};
use crate::ports::{Artifact, AssetGenerator, PortError, PortResult, Stage, TextExtractor};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, Notify, Semaphore};

/// Correct option indices of the three scripted quiz questions.
pub const SCRIPTED_QUIZ_ANSWERS: [usize; 3] = [0, 2, 1];

pub struct ScriptedGenerator {
    fail_at: Option<Stage>,
    malformed_quiz: bool,
    hold_at: Mutex<Option<Stage>>,
    gate: Semaphore,
    held: Notify,
    calls: Mutex<Vec<Stage>>,
    runs: AtomicUsize,
}

impl Default for ScriptedGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self {
            fail_at: None,
            malformed_quiz: false,
            hold_at: Mutex::new(None),
            gate: Semaphore::new(0),
            held: Notify::new(),
            calls: Mutex::new(Vec::new()),
            runs: AtomicUsize::new(0),
        }
    }

    pub fn failing_at(mut self, stage: Stage) -> Self {
        self.fail_at = Some(stage);
        self
    }

    pub fn holding_at(mut self, stage: Stage) -> Self {
        self.hold_at = Mutex::new(Some(stage));
        self
    }

    pub fn with_malformed_quiz(mut self) -> Self {
        self.malformed_quiz = true;
        self
    }

    pub async fn hold_at(&self, stage: Stage) {
        *self.hold_at.lock().await = Some(stage);
    }

    pub async fn stop_holding(&self) {
        *self.hold_at.lock().await = None;
    }

    /// Resolves once a call has reached the held stage.
    pub async fn wait_until_held(&self) {
        self.held.notified().await;
    }

    /// Lets one held call continue.
    pub fn release(&self) {
        self.gate.add_permits(1);
    }

    /// Every stage the generator was asked to run, in call order.
    pub async fn calls(&self) -> Vec<Stage> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl AssetGenerator for ScriptedGenerator {
    async fn generate(&self, stage: Stage, content: &str) -> PortResult<Artifact> {
        self.calls.lock().await.push(stage);

        let hold = *self.hold_at.lock().await;
        if hold == Some(stage) {
            self.held.notify_one();
            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| PortError::Unexpected(e.to_string()))?;
            permit.forget();
        }

        if self.fail_at == Some(stage) {
            return Err(PortError::Unexpected(format!("scripted failure at {}", stage)));
        }

        let artifact = match stage {
            Stage::Parsing => {
                Artifact::ParsedText(content.split_whitespace().collect::<Vec<_>>().join(" "))
            }
            Stage::Summary => {
                let run = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
                Artifact::Summary(format!("Summary #{}: {}", run, content))
            }
            Stage::Concepts => Artifact::Concepts(vec![
                "Light".to_string(),
                "Chlorophyll".to_string(),
                "Glucose".to_string(),
            ]),
            Stage::Flashcards => {
                let run = self.runs.load(Ordering::SeqCst);
                Artifact::Flashcards(
                    (1..=3)
                        .map(|i| FlashcardDraft {
                            front: format!("Card {} (run {})", i, run),
                            back: format!("Answer {}", i),
                        })
                        .collect(),
                )
            }
            Stage::Quiz => Artifact::Quiz(
                SCRIPTED_QUIZ_ANSWERS
                    .iter()
                    .enumerate()
                    .map(|(i, &correct)| QuizQuestionDraft {
                        question: format!("Question {}", i + 1),
                        options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
                        correct: if self.malformed_quiz { 9 } else { correct },
                    })
                    .collect(),
            ),
        };
        Ok(artifact)
    }
}

/// A `TextExtractor` that returns a fixed text, or rejects every document.
pub struct ScriptedExtractor {
    text: Option<String>,
    seen: Mutex<Vec<usize>>,
}

impl ScriptedExtractor {
    pub fn returning(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn rejecting() -> Self {
        Self {
            text: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Byte length of every document it was asked to read.
    pub async fn seen(&self) -> Vec<usize> {
        self.seen.lock().await.clone()
    }
}

#[async_trait]
impl TextExtractor for ScriptedExtractor {
    async fn extract_text(&self, bytes: &[u8]) -> PortResult<String> {
        self.seen.lock().await.push(bytes.len());
        self.text
            .clone()
            .ok_or_else(|| PortError::Invalid("scripted extractor rejects every document".to_string()))
    }
}
