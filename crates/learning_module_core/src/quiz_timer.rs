//! crates/learning_module_core/src/quiz_timer.rs
//!
//! Drives a [`QuizSession`] in real time: a one-second countdown and the
//! post-lock auto-advance, both as tokio tasks under a `CancellationToken`.
//!
//! Every timer belongs to one driver. Dropping the driver (exit, retry or a
//! closed connection) cancels all of them, and an advance timer re-checks that
//! its question is still the locked one before it fires.

use crate::error::{LearningError, LearningResult};
use crate::quiz::{AnswerRecord, QuizPhase, QuizResult, QuizSession};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{interval_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuizEvent {
    Tick { remaining_seconds: u32 },
    AnswerLocked { record: AnswerRecord, score: usize },
    NextQuestion { question_index: usize },
    Finished { result: QuizResult },
}

pub struct QuizDriver {
    session: Arc<Mutex<QuizSession>>,
    events: mpsc::UnboundedSender<QuizEvent>,
    token: CancellationToken,
}

impl QuizDriver {
    /// Takes ownership of a fresh session and starts its countdown.
    pub fn start(session: QuizSession) -> (Self, mpsc::UnboundedReceiver<QuizEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let driver = Self {
            session: Arc::new(Mutex::new(session)),
            events,
            token: CancellationToken::new(),
        };
        driver.spawn_countdown();
        (driver, rx)
    }

    fn spawn_countdown(&self) {
        let session = self.session.clone();
        let events = self.events.clone();
        let token = self.token.clone();
        tokio::spawn(async move {
            let period = Duration::from_secs(1);
            let mut ticks = interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticks.tick() => {
                        let mut quiz = session.lock().await;
                        let finished = quiz.tick();
                        let _ = events.send(QuizEvent::Tick {
                            remaining_seconds: quiz.remaining_seconds(),
                        });
                        if let Some(result) = finished {
                            info!(score = result.score, total = result.total, "Quiz time budget exhausted");
                            let _ = events.send(QuizEvent::Finished { result });
                            token.cancel();
                            break;
                        }
                    }
                }
            }
        });
    }

    pub async fn select_option(&self, index: usize) -> LearningResult<()> {
        self.session.lock().await.select_option(index)
    }

    /// Locks the current selection and schedules the auto-advance.
    pub async fn lock_answer(&self) -> LearningResult<AnswerRecord> {
        let (record, question_index, delay) = {
            let mut quiz = self.session.lock().await;
            let record = quiz.lock_answer()?;
            let QuizPhase::Locked { question_index, .. } = quiz.phase() else {
                return Err(LearningError::IllegalQuizAction {
                    action: "lock answer",
                    state: quiz.phase().name(),
                });
            };
            let _ = self.events.send(QuizEvent::AnswerLocked {
                record: record.clone(),
                score: quiz.score(),
            });
            (record, question_index, quiz.advance_delay())
        };
        self.spawn_advance(question_index, delay);
        Ok(record)
    }

    fn spawn_advance(&self, question_index: usize, delay: Duration) {
        let session = self.session.clone();
        let events = self.events.clone();
        let token = self.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let mut quiz = session.lock().await;
                    if !matches!(quiz.phase(), QuizPhase::Locked { question_index: q, .. } if q == question_index) {
                        debug!(question_index, "Stale advance timer ignored");
                        return;
                    }
                    match quiz.advance() {
                        Ok(None) => {
                            let _ = events.send(QuizEvent::NextQuestion {
                                question_index: question_index + 1,
                            });
                        }
                        Ok(Some(result)) => {
                            info!(score = result.score, total = result.total, "Quiz finished");
                            let _ = events.send(QuizEvent::Finished { result });
                            token.cancel();
                        }
                        Err(e) => debug!("Advance skipped: {}", e),
                    }
                }
            }
        });
    }

    pub async fn phase(&self) -> QuizPhase {
        self.session.lock().await.phase()
    }

    pub async fn snapshot(&self) -> QuizSession {
        self.session.lock().await.clone()
    }

    /// Discards this session and starts a new one over the same questions.
    pub async fn retry(self) -> (Self, mpsc::UnboundedReceiver<QuizEvent>) {
        let fresh = self.session.lock().await.retry();
        drop(self);
        Self::start(fresh)
    }

    /// Stops every timer. Also happens on drop.
    pub fn exit(self) {}
}

impl Drop for QuizDriver {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::QuizQuestion;
    use crate::quiz::QuizConfig;
    use uuid::Uuid;

    fn session(correct: &[usize]) -> QuizSession {
        let questions = correct
            .iter()
            .map(|&correct| QuizQuestion {
                id: Uuid::new_v4(),
                question: "?".into(),
                options: vec!["a".into(), "b".into(), "c".into()],
                correct,
            })
            .collect();
        QuizSession::new(questions, QuizConfig::default()).unwrap()
    }

    async fn next_non_tick(rx: &mut mpsc::UnboundedReceiver<QuizEvent>) -> QuizEvent {
        loop {
            match rx.recv().await.expect("driver closed") {
                QuizEvent::Tick { .. } => continue,
                other => return other,
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_quiz_times_out_exactly_at_budget() {
        let started = Instant::now();
        let (driver, mut rx) = QuizDriver::start(session(&[0, 1]));

        let mut ticks = 0;
        let result = loop {
            match rx.recv().await.unwrap() {
                QuizEvent::Tick { .. } => ticks += 1,
                QuizEvent::Finished { result } => break result,
                other => panic!("unexpected event {:?}", other),
            }
        };

        assert_eq!(ticks, 120);
        assert_eq!(started.elapsed(), Duration::from_secs(120));
        assert_eq!(result.score, 0);
        assert!(result.timed_out);
        assert!(driver.phase().await == QuizPhase::Finished { score: 0 });
    }

    #[tokio::test(start_paused = true)]
    async fn answers_auto_advance_and_finish_once() {
        let (driver, mut rx) = QuizDriver::start(session(&[0, 2, 1]));

        for (i, choice) in [0usize, 1, 1].into_iter().enumerate() {
            driver.select_option(choice).await.unwrap();
            driver.lock_answer().await.unwrap();
            assert!(matches!(next_non_tick(&mut rx).await, QuizEvent::AnswerLocked { .. }));
            match next_non_tick(&mut rx).await {
                QuizEvent::NextQuestion { question_index } => assert_eq!(question_index, i + 1),
                QuizEvent::Finished { result } => {
                    assert_eq!(i, 2);
                    assert_eq!(result.score, 2);
                    assert_eq!(result.percentage, 67);
                }
                other => panic!("unexpected event {:?}", other),
            }
        }

        drop(driver);
        while let Some(event) = rx.recv().await {
            assert!(!matches!(event, QuizEvent::Finished { .. }));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn advance_timer_follows_the_locked_question() {
        let (driver, mut rx) = QuizDriver::start(session(&[0, 1, 2]));

        driver.select_option(0).await.unwrap();
        driver.lock_answer().await.unwrap();
        assert!(matches!(next_non_tick(&mut rx).await, QuizEvent::AnswerLocked { .. }));
        assert!(matches!(next_non_tick(&mut rx).await, QuizEvent::NextQuestion { question_index: 1 }));

        driver.select_option(1).await.unwrap();
        driver.lock_answer().await.unwrap();
        assert!(matches!(
            driver.phase().await,
            QuizPhase::Locked { question_index: 1, .. }
        ));
        assert!(matches!(next_non_tick(&mut rx).await, QuizEvent::AnswerLocked { .. }));
        assert!(matches!(next_non_tick(&mut rx).await, QuizEvent::NextQuestion { question_index: 2 }));
    }

    #[tokio::test(start_paused = true)]
    async fn locking_twice_is_rejected_without_a_second_timer() {
        let (driver, mut rx) = QuizDriver::start(session(&[0, 1]));

        driver.select_option(0).await.unwrap();
        driver.lock_answer().await.unwrap();
        assert!(matches!(
            driver.lock_answer().await,
            Err(LearningError::IllegalQuizAction { .. })
        ));

        assert!(matches!(next_non_tick(&mut rx).await, QuizEvent::AnswerLocked { .. }));
        assert!(matches!(next_non_tick(&mut rx).await, QuizEvent::NextQuestion { question_index: 1 }));
        assert!(matches!(
            driver.phase().await,
            QuizPhase::Answering { question_index: 1, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn exit_cancels_pending_advance() {
        let (driver, mut rx) = QuizDriver::start(session(&[0, 0]));
        driver.select_option(0).await.unwrap();
        driver.lock_answer().await.unwrap();
        driver.exit();

        tokio::time::sleep(Duration::from_secs(10)).await;
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], QuizEvent::AnswerLocked { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_gets_a_full_budget() {
        let (driver, _rx) = QuizDriver::start(session(&[0]));
        driver.select_option(0).await.unwrap();
        driver.lock_answer().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(driver.phase().await == QuizPhase::Finished { score: 1 });

        let (fresh, _rx) = driver.retry().await;
        let snapshot = fresh.snapshot().await;
        assert_eq!(snapshot.score(), 0);
        assert_eq!(snapshot.remaining_seconds(), 60);
        assert!(snapshot.answers().is_empty());
    }
}
