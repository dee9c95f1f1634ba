//! crates/studio_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! stores to be independent of specific external implementations such as the
//! hosted datastore, the auth service, or the completion endpoint.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::domain::{
    AuthSession, Block, BlockDraft, BlockPatch, ChatMessage, Project, ProjectDraft, ProjectPatch,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g.,
/// database, network, completion endpoint).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Unauthorized")]
    Unauthorized,
    /// The operation was cancelled cooperatively. Callers must treat this as
    /// an interruption, not as a hard failure.
    #[error("Operation aborted")]
    Aborted,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Remote Datastore Port
//=========================================================================================

/// A block row as the datastore reports it, with its owning project's id.
#[derive(Debug, Clone)]
pub struct BlockRow {
    pub project_id: Uuid,
    pub block: Block,
}

/// Request/response façade over the hosted datastore's two collections.
///
/// Inserts return the server-confirmed row (server-assigned id and
/// timestamps); updates are partial, by id.
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn list_projects(&self, owner: Uuid) -> PortResult<Vec<Project>>;

    async fn list_blocks(&self, owner: Uuid) -> PortResult<Vec<BlockRow>>;

    async fn insert_project(&self, owner: Uuid, draft: &ProjectDraft) -> PortResult<Project>;

    async fn update_project(&self, id: Uuid, patch: &ProjectPatch) -> PortResult<()>;

    async fn delete_project(&self, id: Uuid) -> PortResult<()>;

    async fn insert_block(
        &self,
        owner: Uuid,
        project_id: Uuid,
        draft: &BlockDraft,
    ) -> PortResult<Block>;

    async fn update_block(&self, id: Uuid, patch: &BlockPatch) -> PortResult<()>;

    async fn delete_block(&self, id: Uuid) -> PortResult<()>;
}

//=========================================================================================
// Auth Service Port
//=========================================================================================

#[async_trait]
pub trait AuthService: Send + Sync {
    /// Checks credentials and establishes a session. Credential rejection is
    /// reported as `PortError::Unauthorized` without distinguishing unknown
    /// email from wrong password.
    async fn sign_in_with_password(&self, email: &str, password: &str) -> PortResult<AuthSession>;

    async fn sign_up_with_password(&self, email: &str, password: &str) -> PortResult<AuthSession>;

    async fn sign_out(&self) -> PortResult<()>;

    /// The session restored from persisted state, if still valid.
    async fn current_session(&self) -> PortResult<Option<AuthSession>>;

    /// A change subscription delivering session transitions.
    fn subscribe(&self) -> watch::Receiver<Option<AuthSession>>;
}

//=========================================================================================
// Streaming Completion Port
//=========================================================================================

/// Incremental text chunks from one logical completion request.
pub type CompletionStream = Pin<Box<dyn Stream<Item = PortResult<String>> + Send>>;

/// One streaming completion request: the full ordered history plus the
/// generated system instruction.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub temperature: f32,
    pub system: String,
    pub messages: Vec<ChatMessage>,
}

#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Starts a streaming completion. The cancellation token is threaded into
    /// the call; a cancelled stream yields `PortError::Aborted` between
    /// chunks.
    async fn stream_chat(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
    ) -> PortResult<CompletionStream>;
}

//=========================================================================================
// Local Keyed Storage Port
//=========================================================================================

/// Keyed, JSON-serialized local state (chat sessions, security counters,
/// audit log). Read-modify-write with no cross-process locking.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> PortResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> PortResult<()>;

    fn remove(&self, key: &str) -> PortResult<()>;
}
