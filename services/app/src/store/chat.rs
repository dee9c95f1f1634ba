//! services/app/src/store/chat.rs
//!
//! The chat session manager: multiple persisted sessions with message
//! history, token-by-token streaming of assistant replies, and cooperative
//! cancellation. Each conversation turn walks an explicit state machine,
//! idle -> sending -> streaming -> idle, with interruption and failure both
//! returning to idle.

use chrono::Utc;
use futures::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::error;
use uuid::Uuid;

use studio_core::domain::{ChatMessage, ChatSession, Role};
use studio_core::ports::{CompletionRequest, CompletionService, KeyValueStore, PortError};

use crate::store::projects::ProjectStore;
use crate::store::prompts::{system_prompt, ChatMode, ChatOptions};

const SESSIONS_KEY: &str = "chat_sessions";
const DEFAULT_TITLE: &str = "New conversation";
/// Maximum length of a title derived from the first user message.
const TITLE_MAX_CHARS: usize = 30;
const INTERRUPTED_MARKER: &str = "\n\n*[Generation interrupted]*";

/// Where the manager currently is in a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Sending,
    Streaming,
}

/// How a `send_message` turn ended. Interruption is not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed,
    Interrupted,
    Failed,
}

/// A file attached to a user message; its content is inlined as a fenced
/// block.
#[derive(Debug, Clone)]
pub struct AttachedFile {
    pub name: String,
    pub content: String,
}

struct ChatState {
    sessions: Vec<ChatSession>,
    current: Option<Uuid>,
    turn: TurnState,
}

pub struct ChatManager {
    completion: Arc<dyn CompletionService>,
    kv: Arc<dyn KeyValueStore>,
    projects: Arc<ProjectStore>,
    model: String,
    state: Mutex<ChatState>,
    /// At most one in-flight completion per manager; a new send cancels the
    /// previous token.
    inflight: Mutex<Option<(u64, CancellationToken)>>,
    turn_counter: AtomicU64,
}

impl ChatManager {
    /// Builds the manager, reloading the persisted session collection.
    pub fn new(
        completion: Arc<dyn CompletionService>,
        kv: Arc<dyn KeyValueStore>,
        projects: Arc<ProjectStore>,
        model: String,
    ) -> Self {
        let sessions = match kv.get(SESSIONS_KEY) {
            Ok(Some(raw)) => serde_json::from_str::<Vec<ChatSession>>(&raw).unwrap_or_else(|e| {
                error!("Failed to load chat sessions: {}", e);
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                error!("Failed to read chat sessions: {}", e);
                Vec::new()
            }
        };

        Self {
            completion,
            kv,
            projects,
            model,
            state: Mutex::new(ChatState { sessions, current: None, turn: TurnState::Idle }),
            inflight: Mutex::new(None),
            turn_counter: AtomicU64::new(0),
        }
    }

    //=====================================================================================
    // Session management
    //=====================================================================================

    pub async fn sessions(&self) -> Vec<ChatSession> {
        self.state.lock().await.sessions.clone()
    }

    pub async fn current_session_id(&self) -> Option<Uuid> {
        self.state.lock().await.current
    }

    /// The current session's message history, empty when no session is
    /// selected.
    pub async fn messages(&self) -> Vec<ChatMessage> {
        let state = self.state.lock().await;
        state
            .current
            .and_then(|id| state.sessions.iter().find(|s| s.id == id))
            .map(|s| s.messages.clone())
            .unwrap_or_default()
    }

    pub async fn turn_state(&self) -> TurnState {
        self.state.lock().await.turn
    }

    /// Allocates a new session, prepends it to the list, and makes it
    /// current.
    pub async fn create_session(&self, project_id: Option<Uuid>) -> Uuid {
        let title = match project_id {
            Some(pid) => match self.projects.project_name(pid).await {
                Some(name) => format!("Project chat: {}", name),
                None => DEFAULT_TITLE.to_string(),
            },
            None => DEFAULT_TITLE.to_string(),
        };

        let mut state = self.state.lock().await;
        let id = Self::insert_session(&mut state, project_id, title);
        self.persist(&state);
        id
    }

    /// Makes the named session current. No-op when the id is unknown.
    pub async fn switch_session(&self, id: Uuid) {
        let mut state = self.state.lock().await;
        if state.sessions.iter().any(|s| s.id == id) {
            state.current = Some(id);
        }
    }

    /// Removes the session; clears the active selection when it was current.
    pub async fn delete_session(&self, id: Uuid) {
        let mut state = self.state.lock().await;
        state.sessions.retain(|s| s.id != id);
        if state.current == Some(id) {
            state.current = None;
        }
        self.persist(&state);
    }

    /// Cancels the in-flight completion, if any. Idempotent: with nothing in
    /// flight there is no observable effect.
    pub async fn stop(&self) {
        let mut inflight = self.inflight.lock().await;
        if let Some((_, token)) = inflight.take() {
            token.cancel();
        }
    }

    //=====================================================================================
    // Sending
    //=====================================================================================

    /// Sends a user message in the current session (creating one on demand)
    /// and streams the assistant reply into the trailing placeholder
    /// message.
    pub async fn send_message(
        &self,
        content: &str,
        file: Option<AttachedFile>,
        mode: ChatMode,
        options: ChatOptions,
    ) -> TurnOutcome {
        let turn_id = self.turn_counter.fetch_add(1, Ordering::Relaxed) + 1;
        let token = CancellationToken::new();
        {
            let mut inflight = self.inflight.lock().await;
            if let Some((_, previous)) = inflight.take() {
                previous.cancel();
            }
            *inflight = Some((turn_id, token.clone()));
        }

        let mut user_content = content.to_string();
        if let Some(file) = &file {
            user_content.push_str(&format!(
                "\n\n[Attached file: {}]\n```\n{}\n```",
                file.name, file.content
            ));
        }

        // Append the user message and the empty assistant placeholder; the
        // placeholder stays the last element for the whole stream.
        let (session_id, history) = {
            let mut state = self.state.lock().await;
            let session_id = match state.current {
                Some(id) if state.sessions.iter().any(|s| s.id == id) => id,
                _ => Self::insert_session(&mut state, None, DEFAULT_TITLE.to_string()),
            };
            let mut history = Vec::new();
            if let Some(session) = state.sessions.iter_mut().find(|s| s.id == session_id) {
                let first_message = session.messages.is_empty();
                session.messages.push(ChatMessage::user(user_content.clone()));
                if first_message && session.title == DEFAULT_TITLE {
                    session.title = truncate_title(content);
                }
                history = session.messages.clone();
                session.messages.push(ChatMessage::assistant(""));
                session.updated_at = Utc::now();
            }
            state.turn = TurnState::Sending;
            self.persist(&state);
            (session_id, history)
        };

        let projects = self.projects.snapshot().await;
        let request = CompletionRequest {
            model: self.model.clone(),
            temperature: mode.temperature(),
            system: system_prompt(&projects, mode, &options),
            messages: history,
        };

        let mut stream = match self.completion.stream_chat(request, token.clone()).await {
            Ok(stream) => stream,
            Err(PortError::Aborted) => {
                self.finish_interrupted(session_id).await;
                self.release(turn_id).await;
                return TurnOutcome::Interrupted;
            }
            Err(e) => {
                self.finish_failed(session_id, &e).await;
                self.release(turn_id).await;
                return TurnOutcome::Failed;
            }
        };

        let outcome = loop {
            tokio::select! {
                _ = token.cancelled() => {
                    self.finish_interrupted(session_id).await;
                    break TurnOutcome::Interrupted;
                }
                next = stream.next() => match next {
                    Some(Ok(chunk)) => self.append_chunk(session_id, &chunk).await,
                    Some(Err(PortError::Aborted)) => {
                        self.finish_interrupted(session_id).await;
                        break TurnOutcome::Interrupted;
                    }
                    Some(Err(e)) => {
                        self.finish_failed(session_id, &e).await;
                        break TurnOutcome::Failed;
                    }
                    None => {
                        let mut state = self.state.lock().await;
                        state.turn = TurnState::Idle;
                        self.persist(&state);
                        break TurnOutcome::Completed;
                    }
                }
            }
        };

        self.release(turn_id).await;
        outcome
    }

    //=====================================================================================
    // Internals
    //=====================================================================================

    fn insert_session(state: &mut ChatState, project_id: Option<Uuid>, title: String) -> Uuid {
        let now = Utc::now();
        let session = ChatSession {
            id: Uuid::new_v4(),
            title,
            messages: vec![],
            project_id,
            created_at: now,
            updated_at: now,
        };
        let id = session.id;
        state.sessions.insert(0, session);
        state.current = Some(id);
        id
    }

    async fn append_chunk(&self, session_id: Uuid, chunk: &str) {
        let mut state = self.state.lock().await;
        state.turn = TurnState::Streaming;
        if let Some(session) = state.sessions.iter_mut().find(|s| s.id == session_id) {
            if let Some(last) = session.messages.last_mut() {
                if last.role == Role::Assistant {
                    last.content.push_str(chunk);
                }
            }
            session.updated_at = Utc::now();
        }
        self.persist(&state);
    }

    /// Appends the interruption marker to the pending assistant message and
    /// returns to idle. Cancellation is a soft outcome, not an error.
    async fn finish_interrupted(&self, session_id: Uuid) {
        let mut state = self.state.lock().await;
        if let Some(session) = state.sessions.iter_mut().find(|s| s.id == session_id) {
            if let Some(last) = session.messages.last_mut() {
                if last.role == Role::Assistant {
                    last.content.push_str(INTERRUPTED_MARKER);
                }
            }
            session.updated_at = Utc::now();
        }
        state.turn = TurnState::Idle;
        self.persist(&state);
    }

    /// Replaces the empty pending assistant message with an inline error
    /// notice (or appends one if content already streamed) and returns to
    /// idle.
    async fn finish_failed(&self, session_id: Uuid, failure: &PortError) {
        error!("Chat completion failed: {}", failure);
        let notice = format!("Error: {}", failure);
        let mut state = self.state.lock().await;
        if let Some(session) = state.sessions.iter_mut().find(|s| s.id == session_id) {
            let replace_placeholder = matches!(
                session.messages.last(),
                Some(last) if last.role == Role::Assistant && last.content.is_empty()
            );
            if replace_placeholder {
                if let Some(last) = session.messages.last_mut() {
                    last.content = notice;
                }
            } else {
                session.messages.push(ChatMessage::assistant(notice));
            }
            session.updated_at = Utc::now();
        }
        state.turn = TurnState::Idle;
        self.persist(&state);
    }

    /// Clears the in-flight slot if this turn still owns it.
    async fn release(&self, turn_id: u64) {
        let mut inflight = self.inflight.lock().await;
        if inflight.as_ref().map(|(id, _)| *id) == Some(turn_id) {
            *inflight = None;
        }
    }

    fn persist(&self, state: &ChatState) {
        match serde_json::to_string(&state.sessions) {
            Ok(raw) => {
                if let Err(e) = self.kv.set(SESSIONS_KEY, &raw) {
                    error!("Failed to persist chat sessions: {}", e);
                }
            }
            Err(e) => error!("Failed to serialize chat sessions: {}", e),
        }
    }
}

fn truncate_title(content: &str) -> String {
    if content.chars().count() > TITLE_MAX_CHARS {
        let truncated: String = content.chars().take(TITLE_MAX_CHARS).collect();
        format!("{}...", truncated)
    } else {
        content.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_titles_are_kept_verbatim() {
        assert_eq!(truncate_title("Plan the MVP"), "Plan the MVP");
    }

    #[test]
    fn long_titles_are_cut_with_ellipsis() {
        let title = truncate_title("This message is definitely longer than thirty characters");
        assert_eq!(title, "This message is definitely lon...");
        assert_eq!(title.chars().count(), TITLE_MAX_CHARS + 3);
    }
}
