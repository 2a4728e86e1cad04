//! services/api/src/web/session.rs
//!
//! One learner session on one completed module, independent of the socket that
//! carries it. Every client message and quiz timer event goes in, the replies
//! to send come out.

use crate::error::ApiError;
use crate::web::{
    protocol::{ClientMessage, FlashcardItem, ServerMessage},
    state::AppState,
};
use learning_module_core::domain::Section;
use learning_module_core::error::{LearningError, LearningResult};
use learning_module_core::learner::LearnerSession;
use learning_module_core::mastery::FlashcardView;
use learning_module_core::quiz::QuizPhase;
use learning_module_core::quiz_timer::{QuizDriver, QuizEvent};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct LearnerConnection {
    app_state: Arc<AppState>,
    session_id: Uuid,
    learner: LearnerSession,
    /// The running quiz and the receiving end of its timer events. Replacing or
    /// clearing it drops the driver, which cancels its timers.
    quiz: Option<(QuizDriver, mpsc::UnboundedReceiver<QuizEvent>)>,
}

impl LearnerConnection {
    /// Opens a session on the module. Returns the greeting to send, or the
    /// error to send before closing.
    pub async fn open(
        app_state: Arc<AppState>,
        module_id: Uuid,
    ) -> Result<(Self, Vec<ServerMessage>), ServerMessage> {
        let learner = match load_learner(&app_state, module_id).await {
            Ok(learner) => learner,
            Err(e) => {
                warn!(%module_id, "Failed to open learner session: {}", e);
                return Err(ServerMessage::error(e.status_and_message().1));
            }
        };
        let session_id = app_state.progress.lock().await.open();
        info!(%module_id, %session_id, "Learner session initialized");

        let connection = Self {
            app_state,
            session_id,
            learner,
            quiz: None,
        };
        let mut greeting = vec![ServerMessage::SessionInitialized {
            session_id,
            module_id,
        }];
        match connection.progress().await {
            Ok(progress) => greeting.push(progress),
            Err(e) => warn!(%session_id, "Failed to read progress of a new session: {}", e),
        }
        greeting.push(connection.concepts_message());
        greeting.push(connection.flashcards_message());
        Ok((connection, greeting))
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Handles one raw text frame from the client.
    pub async fn handle_text(&mut self, text: &str) -> Vec<ServerMessage> {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(client_msg) => self.handle_client_message(client_msg).await,
            Err(e) => {
                warn!("Failed to deserialize client message: {}", e);
                vec![ServerMessage::error(format!("Invalid message: {}", e))]
            }
        }
    }

    /// Applies a client message. A rejected action becomes an `error` reply and
    /// leaves the session as it was.
    pub async fn handle_client_message(&mut self, client_msg: ClientMessage) -> Vec<ServerMessage> {
        debug!(?client_msg, session_id = %self.session_id, "Client message received");
        match self.apply(client_msg).await {
            Ok(replies) => replies,
            Err(e) => vec![ServerMessage::error(e.to_string())],
        }
    }

    async fn apply(&mut self, client_msg: ClientMessage) -> LearningResult<Vec<ServerMessage>> {
        let mut replies = Vec::new();
        match client_msg {
            ClientMessage::Init { .. } => {
                replies.push(ServerMessage::error("Session is already initialized"));
            }
            ClientMessage::SummaryRead => {
                if let Some(section) = self.learner.summary_read() {
                    replies.push(self.complete_section(section).await?);
                }
            }
            ClientMessage::ReviewConcept { concept } => {
                let completed = self.learner.review_concept(&concept)?;
                replies.push(self.concepts_message());
                if let Some(section) = completed {
                    replies.push(self.complete_section(section).await?);
                }
            }
            ClientMessage::ToggleLearned { card_id } => {
                let (_, completed) = self.learner.toggle_learned(card_id)?;
                replies.push(self.flashcards_message());
                if let Some(section) = completed {
                    replies.push(self.complete_section(section).await?);
                }
            }
            ClientMessage::ShowLearned { show } => {
                self.learner.set_show_learned(show);
                replies.push(self.flashcards_message());
            }
            ClientMessage::StartQuiz => {
                if let Some((driver, _)) = &self.quiz {
                    if !matches!(driver.phase().await, QuizPhase::Finished { .. }) {
                        replies.push(ServerMessage::error("A quiz is already in progress"));
                        return Ok(replies);
                    }
                }
                let (driver, events) = QuizDriver::start(self.learner.new_quiz()?);
                replies.push(ServerMessage::quiz_state(&driver.snapshot().await));
                self.quiz = Some((driver, events));
                info!(session_id = %self.session_id, "Quiz started");
            }
            ClientMessage::SelectOption { index } => {
                let driver = self.active_quiz()?;
                driver.select_option(index).await?;
                replies.push(ServerMessage::quiz_state(&driver.snapshot().await));
            }
            ClientMessage::LockAnswer => {
                // The locked answer is reported through the driver's event stream.
                self.active_quiz()?.lock_answer().await?;
            }
            ClientMessage::ExitQuiz => {
                let (driver, _) = self.quiz.take().ok_or(LearningError::NoActiveQuiz)?;
                driver.exit();
                info!(session_id = %self.session_id, "Quiz exited");
            }
            ClientMessage::RetryQuiz => {
                let (driver, _) = self.quiz.take().ok_or(LearningError::NoActiveQuiz)?;
                let (driver, events) = driver.retry().await;
                replies.push(ServerMessage::quiz_state(&driver.snapshot().await));
                self.quiz = Some((driver, events));
                info!(session_id = %self.session_id, "Quiz restarted");
            }
        }
        Ok(replies)
    }

    fn active_quiz(&self) -> LearningResult<&QuizDriver> {
        self.quiz
            .as_ref()
            .map(|(driver, _)| driver)
            .ok_or(LearningError::NoActiveQuiz)
    }

    /// Waits for the running quiz's next timer event. Never resolves while no quiz runs.
    pub async fn next_quiz_event(&mut self) -> Option<QuizEvent> {
        match &mut self.quiz {
            Some((_, events)) => events.recv().await,
            None => std::future::pending().await,
        }
    }

    pub async fn handle_quiz_event(&self, event: QuizEvent) -> Vec<ServerMessage> {
        match event {
            QuizEvent::Tick { remaining_seconds } => vec![ServerMessage::TimerTick { remaining_seconds }],
            QuizEvent::AnswerLocked { record, score } => vec![ServerMessage::answer_locked(record, score)],
            QuizEvent::NextQuestion { .. } => match &self.quiz {
                Some((driver, _)) => vec![ServerMessage::quiz_state(&driver.snapshot().await)],
                None => Vec::new(),
            },
            QuizEvent::Finished { result } => {
                let section = self.learner.quiz_finished(&result);
                let mut replies = vec![ServerMessage::quiz_finished(result)];
                match section {
                    Some(section) => match self.complete_section(section).await {
                        Ok(progress) => replies.push(progress),
                        Err(e) => replies.push(ServerMessage::error(e.to_string())),
                    },
                    None => warn!(session_id = %self.session_id, "Quiz result does not match the module's quiz"),
                }
                replies
            }
        }
    }

    /// The current `progress` message of this session.
    pub async fn progress(&self) -> LearningResult<ServerMessage> {
        let tracker = self.app_state.progress.lock().await;
        Ok(ServerMessage::Progress {
            progress: tracker.snapshot(self.session_id)?,
        })
    }

    /// Ends the session: stops any quiz timers and discards the progress.
    pub async fn close(mut self) {
        self.quiz = None;
        self.app_state.progress.lock().await.close(self.session_id);
        info!(session_id = %self.session_id, "Learner session closed");
    }

    async fn complete_section(&self, section: Section) -> LearningResult<ServerMessage> {
        let mut tracker = self.app_state.progress.lock().await;
        let percentage = tracker.mark_complete(self.session_id, section)?;
        info!(session_id = %self.session_id, ?section, percentage, "Section completed");
        Ok(ServerMessage::Progress {
            progress: tracker.snapshot(self.session_id)?,
        })
    }

    fn concepts_message(&self) -> ServerMessage {
        ServerMessage::Concepts {
            reviewed: self.learner.concepts().reviewed_count(),
            total: self.learner.concepts().total(),
        }
    }

    fn flashcards_message(&self) -> ServerMessage {
        let tracker = self.learner.flashcards();
        let (cards, all_caught_up) = match self.learner.flashcard_view() {
            FlashcardView::Cards(cards) => (
                cards
                    .into_iter()
                    .map(|card| FlashcardItem::new(card, tracker.is_learned(card.id)))
                    .collect(),
                false,
            ),
            FlashcardView::AllCaughtUp => (Vec::new(), true),
            FlashcardView::NoCards => (Vec::new(), false),
        };
        ServerMessage::Flashcards {
            learned_count: tracker.learned_count(),
            total: tracker.total(),
            show_learned: self.learner.show_learned(),
            cards,
            all_caught_up,
        }
    }
}

async fn load_learner(app_state: &AppState, module_id: Uuid) -> Result<LearnerSession, ApiError> {
    let module = app_state.store.get(module_id).await?;
    Ok(LearnerSession::open(module, app_state.config.quiz_config())?)
}
