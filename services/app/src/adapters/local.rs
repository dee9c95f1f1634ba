//! services/app/src/adapters/local.rs
//!
//! Locally-simulated backends used when the hosted services are not
//! configured. They implement the same ports as the hosted adapters so the
//! stores never know which strategy is active.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use uuid::Uuid;

use studio_core::domain::{
    AuthSession, AuthUser, Block, BlockDraft, BlockPatch, Project, ProjectDraft, ProjectPatch,
    ProjectStatus,
};
use studio_core::ports::{
    AuthService, BlockRow, DataStore, KeyValueStore, PortError, PortResult,
};

use crate::security::digest_password;

//=========================================================================================
// LocalDataAdapter
//=========================================================================================

#[derive(Clone)]
struct ProjectRow {
    owner: Uuid,
    project: Project,
}

#[derive(Clone)]
struct StoredBlock {
    owner: Uuid,
    project_id: Uuid,
    block: Block,
}

/// In-memory stand-in for the hosted datastore. Inserts assign fresh server
/// ids and timestamps, the same contract the hosted backend reports.
#[derive(Default)]
pub struct LocalDataAdapter {
    projects: Mutex<Vec<ProjectRow>>,
    blocks: Mutex<Vec<StoredBlock>>,
}

impl LocalDataAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DataStore for LocalDataAdapter {
    async fn list_projects(&self, owner: Uuid) -> PortResult<Vec<Project>> {
        let projects = lock(&self.projects)?;
        let mut rows: Vec<Project> = projects
            .iter()
            .filter(|r| r.owner == owner)
            .map(|r| r.project.clone())
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn list_blocks(&self, owner: Uuid) -> PortResult<Vec<BlockRow>> {
        let blocks = lock(&self.blocks)?;
        Ok(blocks
            .iter()
            .filter(|b| b.owner == owner)
            .map(|b| BlockRow { project_id: b.project_id, block: b.block.clone() })
            .collect())
    }

    async fn insert_project(&self, owner: Uuid, draft: &ProjectDraft) -> PortResult<Project> {
        let now = Utc::now();
        let project = Project {
            id: Uuid::new_v4(),
            name: draft.name.clone(),
            category: draft.category,
            description: draft.description.clone(),
            strategic_fields: draft.strategic_fields.clone(),
            tags: draft.tags.clone(),
            status: ProjectStatus::NotStarted,
            progress: 0,
            created_at: now,
            updated_at: now,
            blocks: vec![],
        };
        lock(&self.projects)?.push(ProjectRow { owner, project: project.clone() });
        Ok(project)
    }

    async fn update_project(&self, id: Uuid, patch: &ProjectPatch) -> PortResult<()> {
        let mut projects = lock(&self.projects)?;
        let row = projects
            .iter_mut()
            .find(|r| r.project.id == id)
            .ok_or_else(|| PortError::NotFound(format!("Project {} not found", id)))?;
        patch.apply_to(&mut row.project);
        row.project.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_project(&self, id: Uuid) -> PortResult<()> {
        lock(&self.projects)?.retain(|r| r.project.id != id);
        lock(&self.blocks)?.retain(|b| b.project_id != id);
        Ok(())
    }

    async fn insert_block(
        &self,
        owner: Uuid,
        project_id: Uuid,
        draft: &BlockDraft,
    ) -> PortResult<Block> {
        {
            let projects = lock(&self.projects)?;
            if !projects.iter().any(|r| r.project.id == project_id) {
                return Err(PortError::NotFound(format!("Project {} not found", project_id)));
            }
        }
        let now = Utc::now();
        let block = Block {
            id: Uuid::new_v4(),
            content: draft.content.clone(),
            meta: draft.meta.clone(),
            tags: draft.tags.clone(),
            created_at: now,
            updated_at: now,
        };
        lock(&self.blocks)?.push(StoredBlock { owner, project_id, block: block.clone() });
        Ok(block)
    }

    async fn update_block(&self, id: Uuid, patch: &BlockPatch) -> PortResult<()> {
        let mut blocks = lock(&self.blocks)?;
        let stored = blocks
            .iter_mut()
            .find(|b| b.block.id == id)
            .ok_or_else(|| PortError::NotFound(format!("Block {} not found", id)))?;
        patch.apply_to(&mut stored.block);
        stored.block.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_block(&self, id: Uuid) -> PortResult<()> {
        lock(&self.blocks)?.retain(|b| b.block.id != id);
        Ok(())
    }
}

fn lock<T>(m: &Mutex<T>) -> PortResult<std::sync::MutexGuard<'_, T>> {
    m.lock().map_err(|_| PortError::Unexpected("local datastore lock poisoned".to_string()))
}

//=========================================================================================
// LocalAuthAdapter
//=========================================================================================

const USERS_KEY: &str = "local_users";
const SESSION_KEY: &str = "local_session";
const SESSION_DAYS: i64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LocalUser {
    id: Uuid,
    password_digest: String,
}

/// Key-value-backed auth double. Credentials are compared against a one-way
/// digest; the active session persists across restarts like the hosted
/// service's token does.
pub struct LocalAuthAdapter {
    kv: Arc<dyn KeyValueStore>,
    sessions: watch::Sender<Option<AuthSession>>,
}

impl LocalAuthAdapter {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        let (sessions, _) = watch::channel(None);
        Self { kv, sessions }
    }

    fn load_users(&self) -> PortResult<HashMap<String, LocalUser>> {
        Ok(self
            .kv
            .get(USERS_KEY)?
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default())
    }

    fn save_users(&self, users: &HashMap<String, LocalUser>) -> PortResult<()> {
        let raw = serde_json::to_string(users)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        self.kv.set(USERS_KEY, &raw)
    }

    fn establish(&self, user: AuthUser) -> PortResult<AuthSession> {
        let session = AuthSession {
            id: Uuid::new_v4().to_string(),
            user,
            expires_at: Utc::now() + Duration::days(SESSION_DAYS),
        };
        let raw = serde_json::to_string(&session)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        self.kv.set(SESSION_KEY, &raw)?;
        let _ = self.sessions.send(Some(session.clone()));
        Ok(session)
    }
}

#[async_trait]
impl AuthService for LocalAuthAdapter {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> PortResult<AuthSession> {
        let users = self.load_users()?;
        let user = users.get(email).ok_or(PortError::Unauthorized)?;
        if user.password_digest != digest_password(password) {
            return Err(PortError::Unauthorized);
        }
        self.establish(AuthUser { id: user.id, email: email.to_string() })
    }

    async fn sign_up_with_password(&self, email: &str, password: &str) -> PortResult<AuthSession> {
        let mut users = self.load_users()?;
        if users.contains_key(email) {
            return Err(PortError::Unexpected("Email is already registered".to_string()));
        }
        let user = LocalUser { id: Uuid::new_v4(), password_digest: digest_password(password) };
        users.insert(email.to_string(), user.clone());
        self.save_users(&users)?;
        self.establish(AuthUser { id: user.id, email: email.to_string() })
    }

    async fn sign_out(&self) -> PortResult<()> {
        self.kv.remove(SESSION_KEY)?;
        let _ = self.sessions.send(None);
        Ok(())
    }

    async fn current_session(&self) -> PortResult<Option<AuthSession>> {
        let Some(raw) = self.kv.get(SESSION_KEY)? else {
            return Ok(None);
        };
        let session: AuthSession = match serde_json::from_str(&raw) {
            Ok(s) => s,
            Err(_) => {
                self.kv.remove(SESSION_KEY)?;
                return Ok(None);
            }
        };
        if session.expires_at <= Utc::now() {
            self.kv.remove(SESSION_KEY)?;
            return Ok(None);
        }
        let _ = self.sessions.send(Some(session.clone()));
        Ok(Some(session))
    }

    fn subscribe(&self) -> watch::Receiver<Option<AuthSession>> {
        self.sessions.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::kv::MemoryStore;
    use studio_core::domain::BlockMeta;

    #[tokio::test]
    async fn sign_up_then_sign_in_round_trips() {
        let adapter = LocalAuthAdapter::new(Arc::new(MemoryStore::new()));
        let created = adapter
            .sign_up_with_password("dev@example.com", "Abcdefg1!")
            .await
            .unwrap();
        let session = adapter
            .sign_in_with_password("dev@example.com", "Abcdefg1!")
            .await
            .unwrap();
        assert_eq!(session.user.id, created.user.id);
        assert_eq!(session.user.email, "dev@example.com");
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_are_both_unauthorized() {
        let adapter = LocalAuthAdapter::new(Arc::new(MemoryStore::new()));
        adapter.sign_up_with_password("dev@example.com", "Abcdefg1!").await.unwrap();

        let wrong = adapter.sign_in_with_password("dev@example.com", "nope").await;
        assert!(matches!(wrong, Err(PortError::Unauthorized)));
        let unknown = adapter.sign_in_with_password("ghost@example.com", "Abcdefg1!").await;
        assert!(matches!(unknown, Err(PortError::Unauthorized)));
    }

    #[tokio::test]
    async fn sign_out_clears_the_persisted_session_but_keeps_users() {
        let kv = Arc::new(MemoryStore::new());
        let adapter = LocalAuthAdapter::new(kv.clone());
        adapter.sign_up_with_password("dev@example.com", "Abcdefg1!").await.unwrap();
        assert!(adapter.current_session().await.unwrap().is_some());

        adapter.sign_out().await.unwrap();
        assert!(adapter.current_session().await.unwrap().is_none());
        // Account survives; only the session is gone.
        assert!(adapter.sign_in_with_password("dev@example.com", "Abcdefg1!").await.is_ok());
    }

    #[tokio::test]
    async fn data_adapter_assigns_server_identity_on_insert() {
        let data = LocalDataAdapter::new();
        let owner = Uuid::new_v4();
        let project = data
            .insert_project(
                owner,
                &ProjectDraft {
                    name: "Alpha".into(),
                    category: studio_core::domain::ProjectCategory::Saas,
                    description: String::new(),
                    strategic_fields: Default::default(),
                    tags: vec![],
                },
            )
            .await
            .unwrap();
        assert_eq!(project.status, ProjectStatus::NotStarted);

        let block = data
            .insert_block(
                owner,
                project.id,
                &BlockDraft { content: "note".into(), meta: BlockMeta::Text, tags: vec![] },
            )
            .await
            .unwrap();

        let rows = data.list_blocks(owner).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].project_id, project.id);
        assert_eq!(rows[0].block.id, block.id);
    }

    #[tokio::test]
    async fn deleting_a_project_cascades_to_its_blocks() {
        let data = LocalDataAdapter::new();
        let owner = Uuid::new_v4();
        let project = data
            .insert_project(
                owner,
                &ProjectDraft {
                    name: "Alpha".into(),
                    category: studio_core::domain::ProjectCategory::Other,
                    description: String::new(),
                    strategic_fields: Default::default(),
                    tags: vec![],
                },
            )
            .await
            .unwrap();
        data.insert_block(
            owner,
            project.id,
            &BlockDraft { content: "note".into(), meta: BlockMeta::Text, tags: vec![] },
        )
        .await
        .unwrap();

        data.delete_project(project.id).await.unwrap();
        assert!(data.list_projects(owner).await.unwrap().is_empty());
        assert!(data.list_blocks(owner).await.unwrap().is_empty());
    }
}
