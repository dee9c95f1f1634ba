//! services/app/src/store/projects.rs
//!
//! The single authoritative in-memory cache of the current user's projects
//! and their nested blocks, kept eventually consistent with the remote
//! datastore through optimistic mutation.
//!
//! Every mutating operation applies locally first, then issues the remote
//! call, then reconciles: creations swap the client-generated placeholder id
//! for the server row, updates keep the merge, failures roll the optimistic
//! change back. The in-memory lock is never held across a remote call, so
//! overlapping operations on the same entity race and the last response to
//! land wins.

use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::error;
use uuid::Uuid;

use studio_core::domain::{
    Block, BlockDraft, BlockMeta, BlockPatch, Project, ProjectDraft, ProjectPatch, ProjectStatus,
    Reminder,
};
use studio_core::ports::DataStore;

use crate::store::auth::AuthStore;
use crate::store::notify::Notifier;

pub struct ProjectStore {
    data: Arc<dyn DataStore>,
    auth: Arc<AuthStore>,
    projects: RwLock<Vec<Project>>,
    loading: AtomicBool,
    notices: Notifier,
}

impl ProjectStore {
    pub fn new(data: Arc<dyn DataStore>, auth: Arc<AuthStore>, notices: Notifier) -> Self {
        Self {
            data,
            auth,
            projects: RwLock::new(Vec::new()),
            loading: AtomicBool::new(false),
            notices,
        }
    }

    /// A point-in-time copy of the cache.
    pub async fn snapshot(&self) -> Vec<Project> {
        self.projects.read().await.clone()
    }

    pub async fn project(&self, id: Uuid) -> Option<Project> {
        self.projects.read().await.iter().find(|p| p.id == id).cloned()
    }

    pub async fn project_name(&self, id: Uuid) -> Option<String> {
        self.projects.read().await.iter().find(|p| p.id == id).map(|p| p.name.clone())
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Relaxed)
    }

    /// Empties the cache. Called on sign-out.
    pub async fn clear(&self) {
        self.projects.write().await.clear();
    }

    /// Loads all projects and all blocks for the current user in two bulk
    /// requests and joins blocks to their owning project. Blocks are ordered
    /// most-recently-created first within each project.
    pub async fn fetch_all(&self) {
        let Some(owner) = self.auth.user_id().await else {
            return;
        };
        self.loading.store(true, Ordering::Relaxed);

        let result = async {
            let projects = self.data.list_projects(owner).await?;
            let blocks = self.data.list_blocks(owner).await?;
            Ok::<_, studio_core::ports::PortError>((projects, blocks))
        }
        .await;

        match result {
            Ok((mut projects, mut block_rows)) => {
                block_rows.sort_by(|a, b| b.block.created_at.cmp(&a.block.created_at));
                for project in &mut projects {
                    project.blocks = block_rows
                        .iter()
                        .filter(|row| row.project_id == project.id)
                        .map(|row| row.block.clone())
                        .collect();
                }
                *self.projects.write().await = projects;
            }
            Err(e) => {
                error!("Error fetching workspace data: {}", e);
                self.notices.error("Failed to load workspace data");
            }
        }

        self.loading.store(false, Ordering::Relaxed);
    }

    //=====================================================================================
    // Project mutations
    //=====================================================================================

    /// Creates a project with default status and progress, visible
    /// immediately. Returns the server-confirmed id, or `None` when the
    /// remote insert fails (the optimistic entry is removed again).
    pub async fn add_project(&self, draft: ProjectDraft) -> Option<Uuid> {
        let owner = self.auth.user_id().await?;

        let now = Utc::now();
        let temp_id = Uuid::new_v4();
        let placeholder = Project {
            id: temp_id,
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
        self.projects.write().await.insert(0, placeholder);

        match self.data.insert_project(owner, &draft).await {
            Ok(confirmed) => {
                let id = confirmed.id;
                let mut projects = self.projects.write().await;
                if let Some(entry) = projects.iter_mut().find(|p| p.id == temp_id) {
                    // Server-assigned id and timestamps replace the
                    // placeholder's; the entry keeps its position.
                    *entry = confirmed;
                }
                Some(id)
            }
            Err(e) => {
                error!("Error adding project: {}", e);
                self.notices.error("Failed to create project");
                self.projects.write().await.retain(|p| p.id != temp_id);
                None
            }
        }
    }

    /// Merges the patch into the cached project immediately and issues a
    /// partial remote update of only the set fields. A remote failure
    /// restores the pre-mutation snapshot.
    pub async fn update_project(&self, id: Uuid, patch: ProjectPatch) {
        let previous = {
            let mut projects = self.projects.write().await;
            let Some(entry) = projects.iter_mut().find(|p| p.id == id) else {
                return;
            };
            let previous = entry.clone();
            patch.apply_to(entry);
            entry.updated_at = Utc::now();
            previous
        };

        if let Err(e) = self.data.update_project(id, &patch).await {
            error!("Error updating project: {}", e);
            self.notices.error("Failed to update project");
            let mut projects = self.projects.write().await;
            if let Some(entry) = projects.iter_mut().find(|p| p.id == id) {
                *entry = previous;
            }
        }
    }

    /// Removes the project immediately; a remote failure reinserts it at its
    /// previous position.
    pub async fn delete_project(&self, id: Uuid) {
        let removed = {
            let mut projects = self.projects.write().await;
            let Some(index) = projects.iter().position(|p| p.id == id) else {
                return;
            };
            (index, projects.remove(index))
        };

        if let Err(e) = self.data.delete_project(id).await {
            error!("Error deleting project: {}", e);
            self.notices.error("Failed to delete project");
            let (index, project) = removed;
            let mut projects = self.projects.write().await;
            let index = index.min(projects.len());
            projects.insert(index, project);
        }
    }

    //=====================================================================================
    // Block mutations
    //=====================================================================================

    /// Prepends a block under a temporary client-side id, then swaps in the
    /// server-confirmed block by matching that id (positional replace). A
    /// remote failure removes the temporary block.
    pub async fn add_block(&self, project_id: Uuid, draft: BlockDraft) {
        let Some(owner) = self.auth.user_id().await else {
            return;
        };

        let now = Utc::now();
        let temp_id = Uuid::new_v4();
        let temp_block = Block {
            id: temp_id,
            content: draft.content.clone(),
            meta: draft.meta.clone(),
            tags: draft.tags.clone(),
            created_at: now,
            updated_at: now,
        };
        {
            let mut projects = self.projects.write().await;
            let Some(project) = projects.iter_mut().find(|p| p.id == project_id) else {
                return;
            };
            project.blocks.insert(0, temp_block);
        }

        match self.data.insert_block(owner, project_id, &draft).await {
            Ok(confirmed) => {
                let mut projects = self.projects.write().await;
                if let Some(project) = projects.iter_mut().find(|p| p.id == project_id) {
                    if let Some(slot) = project.blocks.iter_mut().find(|b| b.id == temp_id) {
                        *slot = confirmed;
                    }
                }
            }
            Err(e) => {
                error!("Error adding block: {}", e);
                self.notices.error("Failed to add block");
                let mut projects = self.projects.write().await;
                if let Some(project) = projects.iter_mut().find(|p| p.id == project_id) {
                    project.blocks.retain(|b| b.id != temp_id);
                }
            }
        }
    }

    pub async fn update_block(&self, project_id: Uuid, block_id: Uuid, patch: BlockPatch) {
        let previous = {
            let mut projects = self.projects.write().await;
            let Some(project) = projects.iter_mut().find(|p| p.id == project_id) else {
                return;
            };
            let Some(block) = project.blocks.iter_mut().find(|b| b.id == block_id) else {
                return;
            };
            let previous = block.clone();
            patch.apply_to(block);
            block.updated_at = Utc::now();
            previous
        };

        if let Err(e) = self.data.update_block(block_id, &patch).await {
            error!("Error updating block: {}", e);
            self.notices.error("Failed to update block");
            let mut projects = self.projects.write().await;
            if let Some(project) = projects.iter_mut().find(|p| p.id == project_id) {
                if let Some(block) = project.blocks.iter_mut().find(|b| b.id == block_id) {
                    *block = previous;
                }
            }
        }
    }

    pub async fn delete_block(&self, project_id: Uuid, block_id: Uuid) {
        let removed = {
            let mut projects = self.projects.write().await;
            let Some(project) = projects.iter_mut().find(|p| p.id == project_id) else {
                return;
            };
            let Some(index) = project.blocks.iter().position(|b| b.id == block_id) else {
                return;
            };
            (index, project.blocks.remove(index))
        };

        if let Err(e) = self.data.delete_block(block_id).await {
            error!("Error deleting block: {}", e);
            self.notices.error("Failed to delete block");
            let (index, block) = removed;
            let mut projects = self.projects.write().await;
            if let Some(project) = projects.iter_mut().find(|p| p.id == project_id) {
                let index = index.min(project.blocks.len());
                project.blocks.insert(index, block);
            }
        }
    }

    //=====================================================================================
    // Projections
    //=====================================================================================

    /// All incomplete reminder blocks across projects, sorted by due date
    /// ascending (creation date when no due date is set). Recomputed on
    /// demand.
    pub async fn get_reminders(&self) -> Vec<Reminder> {
        let projects = self.projects.read().await;
        let mut reminders: Vec<Reminder> = Vec::new();
        for project in projects.iter() {
            for block in &project.blocks {
                if let BlockMeta::Reminder { completed, due_date } = &block.meta {
                    if *completed {
                        continue;
                    }
                    reminders.push(Reminder {
                        id: block.id,
                        project_id: project.id,
                        project_name: project.name.clone(),
                        text: block.content.clone(),
                        date: due_date.unwrap_or(block.created_at),
                        completed: false,
                    });
                }
            }
        }
        reminders.sort_by(|a, b| a.date.cmp(&b.date));
        reminders
    }
}
