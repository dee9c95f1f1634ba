//! Shared doubles and fixtures for the store integration tests.

#![allow(dead_code)]

use async_stream::stream;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use app_lib::adapters::{LocalAuthAdapter, LocalDataAdapter, MemoryStore};
use app_lib::store::{AuthStore, Notifier, ProjectStore};
use studio_core::domain::{
    Block, BlockDraft, BlockMeta, BlockPatch, Project, ProjectCategory, ProjectDraft,
    ProjectPatch,
};
use studio_core::ports::{
    BlockRow, CompletionRequest, CompletionService, CompletionStream, DataStore, KeyValueStore,
    PortError, PortResult,
};

//=========================================================================================
// Failure-injecting datastore
//=========================================================================================

/// Wraps the local datastore double and fails selected operations on demand,
/// for exercising rollback paths.
#[derive(Default)]
pub struct FlakyDataStore {
    inner: LocalDataAdapter,
    pub fail_insert_project: AtomicBool,
    pub fail_update_project: AtomicBool,
    pub fail_delete_project: AtomicBool,
    pub fail_insert_block: AtomicBool,
    pub fail_update_block: AtomicBool,
    pub fail_delete_block: AtomicBool,
}

impl FlakyDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check(flag: &AtomicBool) -> PortResult<()> {
        if flag.load(Ordering::Relaxed) {
            Err(PortError::Unexpected("injected backend failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DataStore for FlakyDataStore {
    async fn list_projects(&self, owner: Uuid) -> PortResult<Vec<Project>> {
        self.inner.list_projects(owner).await
    }

    async fn list_blocks(&self, owner: Uuid) -> PortResult<Vec<BlockRow>> {
        self.inner.list_blocks(owner).await
    }

    async fn insert_project(&self, owner: Uuid, draft: &ProjectDraft) -> PortResult<Project> {
        Self::check(&self.fail_insert_project)?;
        self.inner.insert_project(owner, draft).await
    }

    async fn update_project(&self, id: Uuid, patch: &ProjectPatch) -> PortResult<()> {
        Self::check(&self.fail_update_project)?;
        self.inner.update_project(id, patch).await
    }

    async fn delete_project(&self, id: Uuid) -> PortResult<()> {
        Self::check(&self.fail_delete_project)?;
        self.inner.delete_project(id).await
    }

    async fn insert_block(
        &self,
        owner: Uuid,
        project_id: Uuid,
        draft: &BlockDraft,
    ) -> PortResult<Block> {
        Self::check(&self.fail_insert_block)?;
        self.inner.insert_block(owner, project_id, draft).await
    }

    async fn update_block(&self, id: Uuid, patch: &BlockPatch) -> PortResult<()> {
        Self::check(&self.fail_update_block)?;
        self.inner.update_block(id, patch).await
    }

    async fn delete_block(&self, id: Uuid) -> PortResult<()> {
        Self::check(&self.fail_delete_block)?;
        self.inner.delete_block(id).await
    }
}

//=========================================================================================
// Scripted completion backend
//=========================================================================================

pub enum Script {
    /// Yield these chunks, then end the stream.
    Chunks(Vec<&'static str>),
    /// Fail the request before any chunk arrives.
    Fail(&'static str),
    /// Never produce a chunk; resolve only through cancellation.
    Hang,
}

pub struct ScriptedCompletion {
    script: Script,
}

impl ScriptedCompletion {
    pub fn new(script: Script) -> Self {
        Self { script }
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn stream_chat(
        &self,
        _request: CompletionRequest,
        cancel: CancellationToken,
    ) -> PortResult<CompletionStream> {
        match &self.script {
            Script::Fail(message) => Err(PortError::Unexpected((*message).to_string())),
            Script::Chunks(chunks) => {
                let chunks: Vec<String> = chunks.iter().map(|c| c.to_string()).collect();
                Ok(Box::pin(stream! {
                    for chunk in chunks {
                        if cancel.is_cancelled() {
                            yield Err(PortError::Aborted);
                            return;
                        }
                        yield Ok(chunk);
                    }
                }))
            }
            Script::Hang => Ok(Box::pin(stream! {
                cancel.cancelled().await;
                yield Err(PortError::Aborted);
            })),
        }
    }
}

//=========================================================================================
// Fixtures
//=========================================================================================

pub struct Fixture {
    pub kv: Arc<MemoryStore>,
    pub auth: Arc<AuthStore>,
    pub data: Arc<FlakyDataStore>,
    pub projects: Arc<ProjectStore>,
    pub notices: Notifier,
}

/// An auth store with a freshly signed-up user and a project store over the
/// failure-injecting datastore.
pub async fn signed_in_fixture() -> Fixture {
    let kv = Arc::new(MemoryStore::new());
    let auth_service = Arc::new(LocalAuthAdapter::new(kv.clone() as Arc<dyn KeyValueStore>));
    let auth = Arc::new(AuthStore::new(auth_service, kv.clone() as Arc<dyn KeyValueStore>));
    auth.init().await.expect("auth init");
    auth.sign_up("dev@example.com", "Abcdefg1!").await.expect("sign up");

    let data = Arc::new(FlakyDataStore::new());
    let notices = Notifier::new();
    let projects = Arc::new(ProjectStore::new(
        data.clone() as Arc<dyn DataStore>,
        auth.clone(),
        notices.clone(),
    ));

    Fixture { kv, auth, data, projects, notices }
}

pub fn draft_project(name: &str) -> ProjectDraft {
    ProjectDraft {
        name: name.to_string(),
        category: ProjectCategory::Saas,
        description: format!("{} description", name),
        strategic_fields: Default::default(),
        tags: vec!["test".to_string()],
    }
}

pub fn draft_text_block(content: &str) -> BlockDraft {
    BlockDraft { content: content.to_string(), meta: BlockMeta::Text, tags: vec![] }
}

pub fn draft_reminder(
    content: &str,
    due_date: Option<chrono::DateTime<chrono::Utc>>,
    completed: bool,
) -> BlockDraft {
    BlockDraft {
        content: content.to_string(),
        meta: BlockMeta::Reminder { completed, due_date },
        tags: vec![],
    }
}
