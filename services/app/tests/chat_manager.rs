//! Integration tests for the chat session manager: session lifecycle,
//! streaming accumulation, cancellation, failure handling, and persistence.

mod common;

use common::{draft_project, signed_in_fixture, Fixture, Script, ScriptedCompletion};
use std::sync::Arc;
use std::time::Duration;

use app_lib::adapters::MemoryStore;
use app_lib::store::{AttachedFile, ChatManager, ChatMode, ChatOptions, TurnOutcome, TurnState};
use studio_core::domain::Role;
use studio_core::ports::{CompletionService, KeyValueStore};

fn manager_with(fx: &Fixture, script: Script) -> Arc<ChatManager> {
    manager_on(fx, fx.kv.clone(), script)
}

fn manager_on(fx: &Fixture, kv: Arc<MemoryStore>, script: Script) -> Arc<ChatManager> {
    let completion: Arc<dyn CompletionService> = Arc::new(ScriptedCompletion::new(script));
    Arc::new(ChatManager::new(
        completion,
        kv as Arc<dyn KeyValueStore>,
        fx.projects.clone(),
        "test-model".to_string(),
    ))
}

#[tokio::test]
async fn created_session_is_first_and_becomes_current() {
    let fx = signed_in_fixture().await;
    let chat = manager_with(&fx, Script::Chunks(vec![]));

    let first = chat.create_session(None).await;
    let second = chat.create_session(None).await;

    let sessions = chat.sessions().await;
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0].id, second);
    assert_eq!(sessions[1].id, first);
    assert_eq!(chat.current_session_id().await, Some(second));
    assert!(sessions[0].messages.is_empty());
}

#[tokio::test]
async fn project_linked_session_takes_the_project_name() {
    let fx = signed_in_fixture().await;
    let project_id = fx.projects.add_project(draft_project("Alpha")).await.unwrap();
    let chat = manager_with(&fx, Script::Chunks(vec![]));

    chat.create_session(Some(project_id)).await;

    let sessions = chat.sessions().await;
    assert_eq!(sessions[0].title, "Project chat: Alpha");
    assert_eq!(sessions[0].project_id, Some(project_id));
}

#[tokio::test]
async fn three_chunk_stream_accumulates_into_one_assistant_message() {
    let fx = signed_in_fixture().await;
    let chat = manager_with(&fx, Script::Chunks(vec!["Hel", "lo", "!"]));
    chat.create_session(None).await;
    let before = chat.messages().await.len();

    let outcome = chat
        .send_message("greet me", None, ChatMode::Prompt, ChatOptions::default())
        .await;

    assert_eq!(outcome, TurnOutcome::Completed);
    let messages = chat.messages().await;
    assert_eq!(messages.len(), before + 2);
    assert_eq!(messages[messages.len() - 2].role, Role::User);
    let last = messages.last().unwrap();
    assert_eq!(last.role, Role::Assistant);
    assert_eq!(last.content, "Hello!");
    assert_eq!(chat.turn_state().await, TurnState::Idle);
}

#[tokio::test]
async fn sending_without_a_session_creates_one_first() {
    let fx = signed_in_fixture().await;
    let chat = manager_with(&fx, Script::Chunks(vec!["ok"]));

    chat.send_message("hello", None, ChatMode::Prompt, ChatOptions::default()).await;

    let sessions = chat.sessions().await;
    assert_eq!(sessions.len(), 1);
    assert_eq!(chat.current_session_id().await, Some(sessions[0].id));
    assert_eq!(sessions[0].messages.len(), 2);
}

#[tokio::test]
async fn first_user_message_retitles_a_default_titled_session() {
    let fx = signed_in_fixture().await;
    let chat = manager_with(&fx, Script::Chunks(vec!["ok"]));
    chat.create_session(None).await;

    chat.send_message(
        "Sketch a pricing page for the beta launch",
        None,
        ChatMode::Prompt,
        ChatOptions::default(),
    )
    .await;

    let title = chat.sessions().await[0].title.clone();
    assert_eq!(title, "Sketch a pricing page for the ...");

    // A second message leaves the derived title alone.
    chat.send_message("and a footer", None, ChatMode::Prompt, ChatOptions::default()).await;
    assert_eq!(chat.sessions().await[0].title, title);
}

#[tokio::test]
async fn attached_file_content_is_inlined_as_a_fenced_block() {
    let fx = signed_in_fixture().await;
    let chat = manager_with(&fx, Script::Chunks(vec!["ok"]));
    chat.create_session(None).await;

    let file = AttachedFile { name: "notes.txt".to_string(), content: "line one".to_string() };
    chat.send_message("review this", Some(file), ChatMode::Prompt, ChatOptions::default())
        .await;

    let messages = chat.messages().await;
    let user = &messages[messages.len() - 2];
    assert!(user.content.starts_with("review this"));
    assert!(user.content.contains("[Attached file: notes.txt]"));
    assert!(user.content.contains("```\nline one\n```"));
}

#[tokio::test]
async fn stop_with_nothing_in_flight_has_no_observable_effect() {
    let fx = signed_in_fixture().await;
    let chat = manager_with(&fx, Script::Chunks(vec![]));
    chat.create_session(None).await;
    let sessions_before = chat.sessions().await;

    chat.stop().await;
    chat.stop().await;

    assert_eq!(chat.sessions().await, sessions_before);
    assert_eq!(chat.turn_state().await, TurnState::Idle);
}

#[tokio::test]
async fn stopping_an_in_flight_turn_appends_the_interruption_marker() {
    let fx = signed_in_fixture().await;
    let chat = manager_with(&fx, Script::Hang);
    chat.create_session(None).await;

    let sender = chat.clone();
    let turn = tokio::spawn(async move {
        sender
            .send_message("never finishes", None, ChatMode::Prompt, ChatOptions::default())
            .await
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    chat.stop().await;
    let outcome = turn.await.unwrap();

    assert_eq!(outcome, TurnOutcome::Interrupted);
    let messages = chat.messages().await;
    let last = messages.last().unwrap();
    assert_eq!(last.role, Role::Assistant);
    assert!(last.content.ends_with("*[Generation interrupted]*"));
    assert_eq!(chat.turn_state().await, TurnState::Idle);
}

#[tokio::test]
async fn request_failure_replaces_the_placeholder_with_an_error_notice() {
    let fx = signed_in_fixture().await;
    let chat = manager_with(&fx, Script::Fail("completion endpoint unreachable"));
    chat.create_session(None).await;
    let before = chat.messages().await.len();

    let outcome = chat
        .send_message("hello", None, ChatMode::Prompt, ChatOptions::default())
        .await;

    assert_eq!(outcome, TurnOutcome::Failed);
    let messages = chat.messages().await;
    assert_eq!(messages.len(), before + 2);
    let last = messages.last().unwrap();
    assert_eq!(last.role, Role::Assistant);
    assert!(last.content.starts_with("Error:"));
    assert!(last.content.contains("completion endpoint unreachable"));
    assert_eq!(chat.turn_state().await, TurnState::Idle);
}

#[tokio::test]
async fn switch_session_to_unknown_id_is_a_no_op() {
    let fx = signed_in_fixture().await;
    let chat = manager_with(&fx, Script::Chunks(vec![]));
    let id = chat.create_session(None).await;

    chat.switch_session(uuid::Uuid::new_v4()).await;

    assert_eq!(chat.current_session_id().await, Some(id));
}

#[tokio::test]
async fn deleting_the_current_session_clears_the_active_view() {
    let fx = signed_in_fixture().await;
    let chat = manager_with(&fx, Script::Chunks(vec!["ok"]));
    let keep = chat.create_session(None).await;
    let doomed = chat.create_session(None).await;

    chat.delete_session(doomed).await;

    assert_eq!(chat.current_session_id().await, None);
    assert!(chat.messages().await.is_empty());
    let sessions = chat.sessions().await;
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].id, keep);

    // Switching back to a surviving session restores its history.
    chat.switch_session(keep).await;
    assert_eq!(chat.current_session_id().await, Some(keep));
}

#[tokio::test]
async fn sessions_persist_across_manager_restarts() {
    let fx = signed_in_fixture().await;
    let kv = fx.kv.clone();
    {
        let chat = manager_on(&fx, kv.clone(), Script::Chunks(vec!["Hi!"]));
        chat.create_session(None).await;
        chat.send_message("hello there", None, ChatMode::Prompt, ChatOptions::default())
            .await;
    }

    let reloaded = manager_on(&fx, kv, Script::Chunks(vec![]));
    let sessions = reloaded.sessions().await;
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].messages.len(), 2);
    assert_eq!(sessions[0].messages[1].content, "Hi!");
    // The reloaded manager starts with no active selection.
    assert_eq!(reloaded.current_session_id().await, None);
}
