use api_lib::web::protocol::{ClientMessage, ServerMessage};
use api_lib::web::session::LearnerConnection;
use learning_module_core::domain::Module;
use learning_module_core::pipeline::RunOutcome;
use learning_module_core::testing::SCRIPTED_QUIZ_ANSWERS;
use std::time::Duration;
use uuid::Uuid;

mod common;

use common::TestApp;

async fn draft_module(app: &TestApp) -> Uuid {
    let created = app
        .create_module("Photosynthesis", "Plants turn light, water and air into sugar.")
        .await;
    created["id"].as_str().unwrap().parse().unwrap()
}

async fn completed_module(app: &TestApp) -> Module {
    let id = draft_module(app).await;
    match app.state.pipeline.regenerate(id).await.unwrap().outcome().await {
        RunOutcome::Succeeded(module) => module,
        other => panic!("generation did not succeed: {:?}", other),
    }
}

async fn connect(app: &TestApp, module_id: Uuid) -> (LearnerConnection, Vec<ServerMessage>) {
    match LearnerConnection::open(app.state.clone(), module_id).await {
        Ok(opened) => opened,
        Err(message) => panic!("session did not open: {:?}", message),
    }
}

fn percentage(replies: &[ServerMessage]) -> Option<u8> {
    replies.iter().find_map(|reply| match reply {
        ServerMessage::Progress { progress } => Some(progress.percentage),
        _ => None,
    })
}

fn ends_question(reply: &ServerMessage) -> bool {
    matches!(
        reply,
        ServerMessage::QuizState { .. } | ServerMessage::QuizFinished { .. }
    )
}

/// Feeds timer events back into the connection until the current question is
/// replaced or the quiz finishes. Returns the replies of that last event.
async fn run_timers_until_question_ends(connection: &mut LearnerConnection) -> Vec<ServerMessage> {
    loop {
        let event = connection.next_quiz_event().await.expect("quiz events closed");
        let replies = connection.handle_quiz_event(event).await;
        if replies.iter().any(ends_question) {
            return replies;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_init_on_unfinished_module_is_rejected() {
    let app = common::create_test_app();
    let id = draft_module(&app).await;

    match LearnerConnection::open(app.state.clone(), id).await {
        Err(ServerMessage::Error { message }) => assert!(message.contains("not ready"), "{}", message),
        Err(other) => panic!("unexpected reply {:?}", other),
        Ok(_) => panic!("a draft module must not open a learner session"),
    }
    match LearnerConnection::open(app.state.clone(), Uuid::new_v4()).await {
        Err(ServerMessage::Error { message }) => assert_eq!(message, "Module not found"),
        Err(other) => panic!("unexpected reply {:?}", other),
        Ok(_) => panic!("an unknown module must not open a learner session"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_completing_every_section_reaches_100() {
    let app = common::create_test_app();
    let module = completed_module(&app).await;
    let (mut connection, greeting) = connect(&app, module.id).await;

    assert!(matches!(
        greeting[0],
        ServerMessage::SessionInitialized { module_id, .. } if module_id == module.id
    ));
    assert_eq!(percentage(&greeting), Some(0));
    assert!(greeting
        .iter()
        .any(|reply| matches!(reply, ServerMessage::Concepts { reviewed: 0, total: 3 })));

    let replies = connection.handle_client_message(ClientMessage::SummaryRead).await;
    assert_eq!(percentage(&replies), Some(25));
    // Reaching the end again does not report the section twice.
    assert!(connection.handle_client_message(ClientMessage::SummaryRead).await.is_empty());

    let mut replies = Vec::new();
    for concept in ["Light", "Chlorophyll", "Glucose"] {
        replies = connection
            .handle_client_message(ClientMessage::ReviewConcept {
                concept: concept.to_string(),
            })
            .await;
    }
    assert!(matches!(replies[0], ServerMessage::Concepts { reviewed: 3, total: 3 }));
    assert_eq!(percentage(&replies), Some(50));

    for card in &module.flashcards {
        replies = connection
            .handle_client_message(ClientMessage::ToggleLearned { card_id: card.id })
            .await;
    }
    assert!(matches!(replies[0], ServerMessage::Flashcards { learned_count: 3, total: 3, .. }));
    assert_eq!(percentage(&replies), Some(75));

    let replies = connection.handle_client_message(ClientMessage::StartQuiz).await;
    assert!(matches!(replies[0], ServerMessage::QuizState { question_count: 3, .. }));

    let mut last = Vec::new();
    for answer in SCRIPTED_QUIZ_ANSWERS {
        connection
            .handle_client_message(ClientMessage::SelectOption { index: answer })
            .await;
        assert!(connection.handle_client_message(ClientMessage::LockAnswer).await.is_empty());
        last = run_timers_until_question_ends(&mut connection).await;
    }
    assert!(matches!(
        last[0],
        ServerMessage::QuizFinished { score: 3, total: 3, timed_out: false, .. }
    ));
    assert_eq!(percentage(&last), Some(100));
    match &last[1] {
        ServerMessage::Progress { progress } => assert!(progress.complete && progress.quiz),
        other => panic!("unexpected reply {:?}", other),
    }

    let session_id = connection.session_id();
    connection.close().await;
    assert!(app.state.progress.lock().await.snapshot(session_id).is_err());
}

#[tokio::test(start_paused = true)]
async fn test_exit_quiz_before_finish_leaves_quiz_incomplete() {
    let app = common::create_test_app();
    let module = completed_module(&app).await;
    let (mut connection, _) = connect(&app, module.id).await;

    connection.handle_client_message(ClientMessage::StartQuiz).await;
    connection
        .handle_client_message(ClientMessage::SelectOption { index: SCRIPTED_QUIZ_ANSWERS[0] })
        .await;
    connection.handle_client_message(ClientMessage::LockAnswer).await;
    assert!(connection.handle_client_message(ClientMessage::ExitQuiz).await.is_empty());

    // No timer of the exited quiz may fire, however long the learner waits.
    let pending = tokio::time::timeout(Duration::from_secs(600), connection.next_quiz_event()).await;
    assert!(pending.is_err());

    match connection.progress().await.unwrap() {
        ServerMessage::Progress { progress } => {
            assert!(!progress.quiz);
            assert_eq!(progress.percentage, 0);
        }
        other => panic!("unexpected reply {:?}", other),
    }

    let replies = connection.handle_client_message(ClientMessage::LockAnswer).await;
    assert!(matches!(&replies[0], ServerMessage::Error { message } if message == "No quiz is in progress"));
}

#[tokio::test(start_paused = true)]
async fn test_quiz_timeout_completes_quiz_section() {
    let app = common::create_test_app();
    let module = completed_module(&app).await;
    let (mut connection, _) = connect(&app, module.id).await;

    connection.handle_client_message(ClientMessage::StartQuiz).await;
    let started = tokio::time::Instant::now();
    let replies = run_timers_until_question_ends(&mut connection).await;

    assert_eq!(started.elapsed(), Duration::from_secs(3 * 60));
    match &replies[0] {
        ServerMessage::QuizFinished {
            score,
            total,
            timed_out,
            incorrect,
            ..
        } => {
            assert!(*timed_out);
            assert_eq!((*score, *total, *incorrect), (0, 3, 3));
        }
        other => panic!("unexpected reply {:?}", other),
    }
    match &replies[1] {
        ServerMessage::Progress { progress } => {
            assert!(progress.quiz);
            assert_eq!(progress.percentage, 25);
        }
        other => panic!("unexpected reply {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_rejected_actions_reply_with_errors() {
    let app = common::create_test_app();
    let module = completed_module(&app).await;
    let (mut connection, _) = connect(&app, module.id).await;

    let replies = connection
        .handle_client_message(ClientMessage::Init { module_id: module.id })
        .await;
    assert!(matches!(replies[0], ServerMessage::Error { .. }));

    let replies = connection
        .handle_client_message(ClientMessage::ReviewConcept {
            concept: "Mitochondria".to_string(),
        })
        .await;
    assert!(matches!(replies[0], ServerMessage::Error { .. }));

    let replies = connection.handle_text("{\"type\":\"fly\"}").await;
    assert!(matches!(&replies[0], ServerMessage::Error { message } if message.starts_with("Invalid message")));

    connection.handle_client_message(ClientMessage::StartQuiz).await;
    let replies = connection.handle_client_message(ClientMessage::StartQuiz).await;
    assert!(matches!(&replies[0], ServerMessage::Error { message } if message == "A quiz is already in progress"));
}
