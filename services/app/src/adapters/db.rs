//! services/app/src/adapters/db.rs
//!
//! This module contains the hosted-datastore adapter, the concrete
//! implementation of the `DataStore` port. It handles all interactions with
//! the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use studio_core::domain::{
    Block, BlockDraft, BlockMeta, BlockPatch, Project, ProjectCategory, ProjectDraft,
    ProjectPatch, ProjectStatus, StrategicFields,
};
use studio_core::ports::{BlockRow, DataStore, PortError, PortResult};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DataStore` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ProjectRecord {
    id: Uuid,
    name: String,
    category: String,
    description: String,
    strategic_fields: serde_json::Value,
    tags: Vec<String>,
    status: String,
    progress: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProjectRecord {
    fn to_domain(self) -> Project {
        Project {
            id: self.id,
            name: self.name,
            category: ProjectCategory::parse(&self.category).unwrap_or(ProjectCategory::Other),
            description: self.description,
            strategic_fields: serde_json::from_value::<StrategicFields>(self.strategic_fields)
                .unwrap_or_default(),
            tags: self.tags,
            status: ProjectStatus::parse(&self.status).unwrap_or(ProjectStatus::NotStarted),
            progress: self.progress.clamp(0, 100) as u8,
            created_at: self.created_at,
            updated_at: self.updated_at,
            blocks: vec![],
        }
    }
}

#[derive(FromRow)]
struct BlockRecord {
    id: Uuid,
    project_id: Uuid,
    content: String,
    metadata: serde_json::Value,
    tags: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BlockRecord {
    fn to_domain(self) -> BlockRow {
        // The metadata blob carries the type tag; rows written by older
        // clients with unknown keys still deserialize, extra keys ignored.
        let meta =
            serde_json::from_value::<BlockMeta>(self.metadata).unwrap_or(BlockMeta::Text);
        BlockRow {
            project_id: self.project_id,
            block: Block {
                id: self.id,
                content: self.content,
                meta,
                tags: self.tags,
                created_at: self.created_at,
                updated_at: self.updated_at,
            },
        }
    }
}

fn meta_to_value(meta: &BlockMeta) -> PortResult<serde_json::Value> {
    serde_json::to_value(meta).map_err(|e| PortError::Unexpected(e.to_string()))
}

fn fields_to_value(fields: &StrategicFields) -> PortResult<serde_json::Value> {
    serde_json::to_value(fields).map_err(|e| PortError::Unexpected(e.to_string()))
}

//=========================================================================================
// `DataStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl DataStore for DbAdapter {
    async fn list_projects(&self, owner: Uuid) -> PortResult<Vec<Project>> {
        let records = sqlx::query_as::<_, ProjectRecord>(
            "SELECT id, name, category, description, strategic_fields, tags, status, progress, \
             created_at, updated_at FROM projects WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn list_blocks(&self, owner: Uuid) -> PortResult<Vec<BlockRow>> {
        let records = sqlx::query_as::<_, BlockRecord>(
            "SELECT id, project_id, content, metadata, tags, created_at, updated_at \
             FROM blocks WHERE user_id = $1",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn insert_project(&self, owner: Uuid, draft: &ProjectDraft) -> PortResult<Project> {
        let record = sqlx::query_as::<_, ProjectRecord>(
            "INSERT INTO projects (id, user_id, name, category, description, strategic_fields, \
             tags, status, progress) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING id, name, category, description, strategic_fields, tags, status, \
             progress, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(owner)
        .bind(&draft.name)
        .bind(draft.category.as_str())
        .bind(&draft.description)
        .bind(fields_to_value(&draft.strategic_fields)?)
        .bind(&draft.tags)
        .bind(ProjectStatus::NotStarted.as_str())
        .bind(0i32)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(record.to_domain())
    }

    async fn update_project(&self, id: Uuid, patch: &ProjectPatch) -> PortResult<()> {
        let strategic_fields = match &patch.strategic_fields {
            Some(fields) => Some(fields_to_value(fields)?),
            None => None,
        };
        let result = sqlx::query(
            "UPDATE projects SET \
             name = COALESCE($2, name), \
             category = COALESCE($3, category), \
             description = COALESCE($4, description), \
             strategic_fields = COALESCE($5, strategic_fields), \
             tags = COALESCE($6, tags), \
             status = COALESCE($7, status), \
             progress = COALESCE($8, progress), \
             updated_at = now() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(patch.name.as_deref())
        .bind(patch.category.map(|c| c.as_str()))
        .bind(patch.description.as_deref())
        .bind(strategic_fields)
        .bind(patch.tags.clone())
        .bind(patch.status.map(|s| s.as_str()))
        .bind(patch.progress.map(|p| p.min(100) as i32))
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Project {} not found", id)));
        }
        Ok(())
    }

    async fn delete_project(&self, id: Uuid) -> PortResult<()> {
        sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn insert_block(
        &self,
        owner: Uuid,
        project_id: Uuid,
        draft: &BlockDraft,
    ) -> PortResult<Block> {
        let record = sqlx::query_as::<_, BlockRecord>(
            "INSERT INTO blocks (id, user_id, project_id, type, content, metadata, tags) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING id, project_id, content, metadata, tags, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(owner)
        .bind(project_id)
        .bind(draft.meta.kind().as_str())
        .bind(&draft.content)
        .bind(meta_to_value(&draft.meta)?)
        .bind(&draft.tags)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(record.to_domain().block)
    }

    async fn update_block(&self, id: Uuid, patch: &BlockPatch) -> PortResult<()> {
        let metadata = match &patch.meta {
            Some(meta) => Some(meta_to_value(meta)?),
            None => None,
        };
        let result = sqlx::query(
            "UPDATE blocks SET \
             content = COALESCE($2, content), \
             metadata = COALESCE($3, metadata), \
             type = COALESCE($4, type), \
             tags = COALESCE($5, tags), \
             updated_at = now() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(patch.content.as_deref())
        .bind(metadata)
        .bind(patch.meta.as_ref().map(|m| m.kind().as_str()))
        .bind(patch.tags.clone())
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Block {} not found", id)));
        }
        Ok(())
    }

    async fn delete_block(&self, id: Uuid) -> PortResult<()> {
        sqlx::query("DELETE FROM blocks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }
}
