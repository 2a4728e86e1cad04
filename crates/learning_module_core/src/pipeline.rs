//! crates/learning_module_core/src/pipeline.rs
//!
//! Orchestrates generation runs: parsing → summary → concepts → flashcards → quiz.
//!
//! Each module has a slot guarded by its own mutex. Every status write, progress
//! update and artifact commit for that module happens while holding the slot,
//! after checking that the writing run is still the module's active run. A run
//! that has been cancelled or superseded therefore can never write anything.

use crate::domain::{Flashcard, GeneratedAssets, Module, ModuleStatus, QuizQuestion};
use crate::lifecycle::{LifecycleError, LifecycleEvent, ModuleLifecycle};
use crate::ports::{Artifact, AssetGenerator, ModuleStore, PortError, Stage};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

//=========================================================================================
// Errors, Events and Outcomes
//=========================================================================================

/// A stage failed. No artifacts from the run were committed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Generation failed at stage '{stage}': {message}")]
pub struct GenerationError {
    pub stage: Stage,
    pub message: String,
}

/// Errors returned when a run cannot be started.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] PortError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// Caller-visible progress of an active run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GenerationProgress {
    pub run_id: Uuid,
    pub stage_index: usize,
    pub stage: Stage,
    pub total_stages: usize,
}

impl GenerationProgress {
    /// `(current stage + 1) / total stages`.
    pub fn fraction(&self) -> f64 {
        (self.stage_index + 1) as f64 / self.total_stages as f64
    }

    pub fn percent(&self) -> u8 {
        (self.fraction() * 100.0).round() as u8
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// A stage has started. Emitted in stage order.
    Stage(GenerationProgress),
    Succeeded(GeneratedAssets),
    Failed(GenerationError),
    Cancelled,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Succeeded(Module),
    Failed(GenerationError),
    Cancelled,
    /// The run task itself died (panicked or was aborted by the runtime).
    Aborted(String),
}

/// Returned by [`GenerationPipeline::start`]. Dropping the handle does not
/// cancel the run.
pub struct RunHandle {
    pub run_id: Uuid,
    pub module_id: Uuid,
    events: mpsc::UnboundedReceiver<PipelineEvent>,
    task: JoinHandle<RunOutcome>,
}

impl RunHandle {
    /// Next progress or terminal event, `None` once the run has ended and
    /// all events were drained.
    pub async fn next_event(&mut self) -> Option<PipelineEvent> {
        self.events.recv().await
    }

    /// Waits for the run to end.
    pub async fn outcome(self) -> RunOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => RunOutcome::Cancelled,
            Err(e) => RunOutcome::Aborted(e.to_string()),
        }
    }

    /// Waits for the run to end, collecting every event it emitted.
    pub async fn collect(mut self) -> (Vec<PipelineEvent>, RunOutcome) {
        let mut events = Vec::new();
        while let Some(event) = self.events.recv().await {
            events.push(event);
        }
        let outcome = self.outcome().await;
        (events, outcome)
    }
}

//=========================================================================================
// Pipeline
//=========================================================================================

#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Extra pacing delay after each stage. Correctness never depends on it.
    pub stage_delay: Duration,
}

struct ActiveRun {
    run_id: Uuid,
    token: CancellationToken,
    stage_index: usize,
    /// Status the module had before the first of a chain of superseding runs.
    prior_status: ModuleStatus,
}

#[derive(Default)]
struct ModuleSlot {
    active: Option<ActiveRun>,
    last_failure: Option<GenerationError>,
}

impl ModuleSlot {
    fn is_current(&self, run_id: Uuid) -> bool {
        matches!(&self.active, Some(run) if run.run_id == run_id && !run.token.is_cancelled())
    }
}

struct PipelineInner {
    store: Arc<dyn ModuleStore>,
    generator: Arc<dyn AssetGenerator>,
    lifecycle: ModuleLifecycle,
    config: PipelineConfig,
    slots: Mutex<HashMap<Uuid, Arc<Mutex<ModuleSlot>>>>,
}

/// Runs generation for any number of modules concurrently, at most one run per module.
#[derive(Clone)]
pub struct GenerationPipeline {
    inner: Arc<PipelineInner>,
}

impl GenerationPipeline {
    pub fn new(
        store: Arc<dyn ModuleStore>,
        generator: Arc<dyn AssetGenerator>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            inner: Arc::new(PipelineInner {
                lifecycle: ModuleLifecycle::new(store.clone()),
                store,
                generator,
                config,
                slots: Mutex::new(HashMap::new()),
            }),
        }
    }

    async fn slot(&self, module_id: Uuid) -> Arc<Mutex<ModuleSlot>> {
        let mut slots = self.inner.slots.lock().await;
        slots.entry(module_id).or_default().clone()
    }

    /// The module's slot without creating one. A run whose slot is gone was forgotten.
    async fn existing_slot(&self, module_id: Uuid) -> Option<Arc<Mutex<ModuleSlot>>> {
        self.inner.slots.lock().await.get(&module_id).cloned()
    }

    /// Drops the module's slot when nothing refers to it and it holds neither a
    /// run nor a failure to report.
    async fn prune(&self, module_id: Uuid) {
        let mut slots = self.inner.slots.lock().await;
        let idle = match slots.get(&module_id) {
            // A clone outside the map means a caller is about to use the slot.
            Some(slot) if Arc::strong_count(slot) == 1 => match slot.try_lock() {
                Ok(guard) => guard.active.is_none() && guard.last_failure.is_none(),
                Err(_) => false,
            },
            _ => false,
        };
        if idle {
            slots.remove(&module_id);
        }
    }

    /// Starts a run over the module's stored `original_content`.
    pub async fn regenerate(&self, module_id: Uuid) -> Result<RunHandle, PipelineError> {
        let module = self.inner.store.get(module_id).await?;
        self.start(module_id, module.original_content).await
    }

    /// Starts a run over `raw_content`. Any run already active for the module is
    /// cancelled first and the new run takes over its `processing` status.
    pub async fn start(
        &self,
        module_id: Uuid,
        raw_content: String,
    ) -> Result<RunHandle, PipelineError> {
        let slot = self.slot(module_id).await;
        let mut guard = slot.lock().await;

        let prior_status = match guard.active.take() {
            Some(previous) => {
                previous.token.cancel();
                info!(%module_id, superseded = %previous.run_id, "Superseding active generation run");
                previous.prior_status
            }
            None => {
                let module = self.inner.store.get(module_id).await?;
                match module.status {
                    ModuleStatus::Draft => {
                        self.inner.lifecycle.transition(&module, LifecycleEvent::Start).await?;
                        ModuleStatus::Draft
                    }
                    ModuleStatus::Completed => {
                        self.inner
                            .lifecycle
                            .transition(&module, LifecycleEvent::Regenerate)
                            .await?;
                        ModuleStatus::Completed
                    }
                    ModuleStatus::Processing => {
                        // Left over from a process that stopped mid-run.
                        warn!(%module_id, "Module is processing without an active run; taking it over");
                        if module.has_assets() {
                            ModuleStatus::Completed
                        } else {
                            ModuleStatus::Draft
                        }
                    }
                }
            }
        };

        let run_id = Uuid::new_v4();
        let token = CancellationToken::new();
        guard.last_failure = None;
        guard.active = Some(ActiveRun {
            run_id,
            token: token.clone(),
            stage_index: 0,
            prior_status,
        });
        drop(guard);

        info!(%module_id, %run_id, "Generation run started");
        let (tx, events) = mpsc::unbounded_channel();
        let pipeline = self.clone();
        let task = tokio::spawn(async move {
            pipeline
                .run(module_id, run_id, token, raw_content, tx)
                .await
        });

        Ok(RunHandle {
            run_id,
            module_id,
            events,
            task,
        })
    }

    /// Cancels the run behind `handle` if it is still the module's active run.
    pub async fn cancel(&self, handle: &RunHandle) -> Result<bool, PipelineError> {
        self.cancel_run(handle.module_id, Some(handle.run_id)).await
    }

    /// Cancels whatever run is active for the module. Returns `false` when none was.
    pub async fn cancel_module(&self, module_id: Uuid) -> Result<bool, PipelineError> {
        self.cancel_run(module_id, None).await
    }

    async fn cancel_run(
        &self,
        module_id: Uuid,
        run_id: Option<Uuid>,
    ) -> Result<bool, PipelineError> {
        let Some(slot) = self.existing_slot(module_id).await else {
            return Ok(false);
        };
        let mut guard = slot.lock().await;

        let matches = match (&guard.active, run_id) {
            (Some(active), Some(run_id)) => active.run_id == run_id,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if !matches {
            return Ok(false);
        }
        let Some(active) = guard.active.take() else {
            return Ok(false);
        };
        active.token.cancel();

        let event = if active.prior_status == ModuleStatus::Completed {
            LifecycleEvent::Abandon
        } else {
            LifecycleEvent::Cancel
        };
        let restored = self.inner.lifecycle.transition_by_id(module_id, event).await;
        drop(guard);
        drop(slot);
        self.prune(module_id).await;
        restored?;
        info!(%module_id, run_id = %active.run_id, "Generation run cancelled");
        Ok(true)
    }

    /// Stops any run for the module without writing to the store. Used right
    /// before the module itself is deleted.
    pub async fn forget(&self, module_id: Uuid) {
        let slot = self.inner.slots.lock().await.remove(&module_id);
        if let Some(slot) = slot {
            if let Some(active) = slot.lock().await.active.take() {
                active.token.cancel();
                debug!(%module_id, run_id = %active.run_id, "Generation run dropped with its module");
            }
        }
    }

    /// Progress of the module's active run, if any.
    pub async fn progress(&self, module_id: Uuid) -> Option<GenerationProgress> {
        let slot = self.inner.slots.lock().await.get(&module_id).cloned()?;
        let guard = slot.lock().await;
        guard.active.as_ref().map(|run| GenerationProgress {
            run_id: run.run_id,
            stage_index: run.stage_index,
            stage: Stage::ORDER[run.stage_index],
            total_stages: Stage::ORDER.len(),
        })
    }

    /// The failure of the module's most recent run, cleared when a new run starts.
    pub async fn last_failure(&self, module_id: Uuid) -> Option<GenerationError> {
        let slot = self.inner.slots.lock().await.get(&module_id).cloned()?;
        let guard = slot.lock().await;
        guard.last_failure.clone()
    }

    //-------------------------------------------------------------------------------------
    // Run task
    //-------------------------------------------------------------------------------------

    async fn run(
        self,
        module_id: Uuid,
        run_id: Uuid,
        token: CancellationToken,
        raw_content: String,
        tx: mpsc::UnboundedSender<PipelineEvent>,
    ) -> RunOutcome {
        let mut drafts = AssetDrafts::default();

        for (stage_index, stage) in Stage::ORDER.into_iter().enumerate() {
            let progress = match self.enter_stage(module_id, run_id, stage_index).await {
                Some(progress) => progress,
                None => return cancelled(&tx, module_id, run_id),
            };
            let _ = tx.send(PipelineEvent::Stage(progress));
            debug!(%module_id, %run_id, %stage, "Stage started");

            let input = drafts.parsed.clone().unwrap_or_else(|| raw_content.clone());
            let result = tokio::select! {
                _ = token.cancelled() => return cancelled(&tx, module_id, run_id),
                result = self.execute_stage(stage, &input) => result,
            };

            let accepted = result.and_then(|artifact| {
                drafts
                    .accept(stage, artifact)
                    .map_err(|message| GenerationError { stage, message })
            });
            if let Err(failure) = accepted {
                return self.fail(module_id, run_id, failure, &tx).await;
            }
            debug!(%module_id, %run_id, %stage, "Stage finished");
        }

        match drafts.into_assets() {
            Some(assets) => self.commit(module_id, run_id, assets, &tx).await,
            None => {
                let failure = GenerationError {
                    stage: Stage::Quiz,
                    message: "run finished with an incomplete artifact set".to_string(),
                };
                self.fail(module_id, run_id, failure, &tx).await
            }
        }
    }

    async fn enter_stage(
        &self,
        module_id: Uuid,
        run_id: Uuid,
        stage_index: usize,
    ) -> Option<GenerationProgress> {
        let slot = self.existing_slot(module_id).await?;
        let mut guard = slot.lock().await;
        if !guard.is_current(run_id) {
            return None;
        }
        let active = guard.active.as_mut()?;
        active.stage_index = stage_index;
        Some(GenerationProgress {
            run_id,
            stage_index,
            stage: Stage::ORDER[stage_index],
            total_stages: Stage::ORDER.len(),
        })
    }

    async fn execute_stage(&self, stage: Stage, input: &str) -> Result<Artifact, GenerationError> {
        if stage == Stage::Parsing && input.trim().is_empty() {
            return Err(GenerationError {
                stage,
                message: "source content is empty".to_string(),
            });
        }
        let artifact = self
            .inner
            .generator
            .generate(stage, input)
            .await
            .map_err(|e| GenerationError {
                stage,
                message: e.to_string(),
            })?;
        if !self.inner.config.stage_delay.is_zero() {
            tokio::time::sleep(self.inner.config.stage_delay).await;
        }
        Ok(artifact)
    }

    async fn fail(
        &self,
        module_id: Uuid,
        run_id: Uuid,
        failure: GenerationError,
        tx: &mpsc::UnboundedSender<PipelineEvent>,
    ) -> RunOutcome {
        let Some(slot) = self.existing_slot(module_id).await else {
            return cancelled(tx, module_id, run_id);
        };
        let mut guard = slot.lock().await;
        if !guard.is_current(run_id) {
            return cancelled(tx, module_id, run_id);
        }
        guard.active = None;
        guard.last_failure = Some(failure.clone());
        if let Err(e) = self
            .inner
            .lifecycle
            .transition_by_id(module_id, LifecycleEvent::Fail)
            .await
        {
            error!(%module_id, %run_id, "Failed to revert module after stage failure: {}", e);
        }
        drop(guard);

        warn!(%module_id, %run_id, stage = %failure.stage, "{}", failure);
        let _ = tx.send(PipelineEvent::Failed(failure.clone()));
        RunOutcome::Failed(failure)
    }

    async fn commit(
        &self,
        module_id: Uuid,
        run_id: Uuid,
        assets: GeneratedAssets,
        tx: &mpsc::UnboundedSender<PipelineEvent>,
    ) -> RunOutcome {
        let Some(slot) = self.existing_slot(module_id).await else {
            return cancelled(tx, module_id, run_id);
        };
        let mut guard = slot.lock().await;
        if !guard.is_current(run_id) {
            return cancelled(tx, module_id, run_id);
        }

        match self.inner.lifecycle.complete(module_id, assets.clone()).await {
            Ok(module) => {
                guard.active = None;
                drop(guard);
                drop(slot);
                self.prune(module_id).await;
                info!(%module_id, %run_id, "Generation run committed");
                let _ = tx.send(PipelineEvent::Succeeded(assets));
                RunOutcome::Succeeded(module)
            }
            Err(e) => {
                drop(guard);
                let failure = GenerationError {
                    stage: Stage::Quiz,
                    message: format!("failed to commit artifacts: {}", e),
                };
                self.fail(module_id, run_id, failure, tx).await
            }
        }
    }
}

fn cancelled(
    tx: &mpsc::UnboundedSender<PipelineEvent>,
    module_id: Uuid,
    run_id: Uuid,
) -> RunOutcome {
    debug!(%module_id, %run_id, "Run stopped after cancellation");
    let _ = tx.send(PipelineEvent::Cancelled);
    RunOutcome::Cancelled
}

//=========================================================================================
// Artifact accumulation
//=========================================================================================

/// Artifacts of the current run. Nothing here is visible outside the run until
/// the whole set is committed.
#[derive(Default)]
struct AssetDrafts {
    parsed: Option<String>,
    summary: Option<String>,
    concepts: Option<Vec<String>>,
    flashcards: Option<Vec<Flashcard>>,
    quiz: Option<Vec<QuizQuestion>>,
}

impl AssetDrafts {
    fn accept(&mut self, stage: Stage, artifact: Artifact) -> Result<(), String> {
        if artifact.stage() != stage {
            return Err(format!(
                "generator returned a '{}' artifact",
                artifact.stage()
            ));
        }
        match artifact {
            Artifact::ParsedText(text) => {
                if text.trim().is_empty() {
                    return Err("parsed content is empty".to_string());
                }
                self.parsed = Some(text);
            }
            Artifact::Summary(summary) => {
                if summary.trim().is_empty() {
                    return Err("summary is empty".to_string());
                }
                self.summary = Some(summary);
            }
            Artifact::Concepts(concepts) => {
                let concepts: Vec<String> = concepts
                    .into_iter()
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty())
                    .collect();
                if concepts.is_empty() {
                    return Err("no concepts were extracted".to_string());
                }
                self.concepts = Some(concepts);
            }
            Artifact::Flashcards(cards) => {
                if cards.is_empty() {
                    return Err("no flashcards were created".to_string());
                }
                self.flashcards = Some(
                    cards
                        .into_iter()
                        .map(|card| Flashcard {
                            id: Uuid::new_v4(),
                            front: card.front,
                            back: card.back,
                        })
                        .collect(),
                );
            }
            Artifact::Quiz(questions) => {
                if questions.is_empty() {
                    return Err("no quiz questions were built".to_string());
                }
                let quiz: Vec<QuizQuestion> = questions
                    .into_iter()
                    .map(|q| QuizQuestion {
                        id: Uuid::new_v4(),
                        question: q.question,
                        options: q.options,
                        correct: q.correct,
                    })
                    .collect();
                if let Some(bad) = quiz.iter().position(|q| !q.is_well_formed()) {
                    return Err(format!("quiz question {} is malformed", bad + 1));
                }
                self.quiz = Some(quiz);
            }
        }
        Ok(())
    }

    fn into_assets(self) -> Option<GeneratedAssets> {
        let assets = GeneratedAssets {
            summary: self.summary?,
            concepts: self.concepts?,
            flashcards: self.flashcards?,
            quiz: self.quiz?,
        };
        assets.is_complete().then_some(assets)
    }
}
