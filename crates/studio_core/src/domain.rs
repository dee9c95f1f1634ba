//! crates/studio_core/src/domain.rs
//!
//! Defines the pure, core data structures for the workspace application.
//! These structs are independent of any backend or storage format; adapters
//! convert their own record types into these.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

//=========================================================================================
// Projects
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectCategory {
    Saas,
    Physical,
    Service,
    Other,
}

impl ProjectCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectCategory::Saas => "saas",
            ProjectCategory::Physical => "physical",
            ProjectCategory::Service => "service",
            ProjectCategory::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "saas" => Some(ProjectCategory::Saas),
            "physical" => Some(ProjectCategory::Physical),
            "service" => Some(ProjectCategory::Service),
            "other" => Some(ProjectCategory::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    NotStarted,
    InProgress,
    Completed,
    OnHold,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::NotStarted => "not_started",
            ProjectStatus::InProgress => "in_progress",
            ProjectStatus::Completed => "completed",
            ProjectStatus::OnHold => "on_hold",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "not_started" => Some(ProjectStatus::NotStarted),
            "in_progress" => Some(ProjectStatus::InProgress),
            "completed" => Some(ProjectStatus::Completed),
            "on_hold" => Some(ProjectStatus::OnHold),
            _ => None,
        }
    }
}

/// Urgency / complexity grading used by the strategic fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Low,
    #[default]
    Medium,
    High,
}

/// The fixed-shape strategic record every project carries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategicFields {
    pub main_pain: String,
    pub target_audience: String,
    pub urgency: Level,
    pub complexity: Level,
    pub scale_potential: String,
    pub risks: String,
}

/// A top-level unit of work with strategic metadata, status, progress, and an
/// exclusively-owned collection of blocks ordered most-recently-created first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub category: ProjectCategory,
    pub description: String,
    pub strategic_fields: StrategicFields,
    pub tags: Vec<String>,
    pub status: ProjectStatus,
    /// Percentage in [0, 100].
    pub progress: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub blocks: Vec<Block>,
}

/// Fields the caller supplies when creating a project. Status, progress, ids
/// and timestamps are assigned by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectDraft {
    pub name: String,
    pub category: ProjectCategory,
    pub description: String,
    pub strategic_fields: StrategicFields,
    pub tags: Vec<String>,
}

/// A partial project update. Only set fields are merged and sent remotely.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub category: Option<ProjectCategory>,
    pub description: Option<String>,
    pub strategic_fields: Option<StrategicFields>,
    pub tags: Option<Vec<String>>,
    pub status: Option<ProjectStatus>,
    pub progress: Option<u8>,
}

impl ProjectPatch {
    /// Merges the set fields into `project`. The caller stamps `updated_at`.
    pub fn apply_to(&self, project: &mut Project) {
        if let Some(name) = &self.name {
            project.name = name.clone();
        }
        if let Some(category) = self.category {
            project.category = category;
        }
        if let Some(description) = &self.description {
            project.description = description.clone();
        }
        if let Some(fields) = &self.strategic_fields {
            project.strategic_fields = fields.clone();
        }
        if let Some(tags) = &self.tags {
            project.tags = tags.clone();
        }
        if let Some(status) = self.status {
            project.status = status;
        }
        if let Some(progress) = self.progress {
            project.progress = progress.min(100);
        }
    }
}

//=========================================================================================
// Blocks
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Text,
    Image,
    Video,
    Link,
    File,
    Todo,
    Reminder,
}

impl BlockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Text => "text",
            BlockKind::Image => "image",
            BlockKind::Video => "video",
            BlockKind::Link => "link",
            BlockKind::File => "file",
            BlockKind::Todo => "todo",
            BlockKind::Reminder => "reminder",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(BlockKind::Text),
            "image" => Some(BlockKind::Image),
            "video" => Some(BlockKind::Video),
            "link" => Some(BlockKind::Link),
            "file" => Some(BlockKind::File),
            "todo" => Some(BlockKind::Todo),
            "reminder" => Some(BlockKind::Reminder),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Review,
    Done,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

/// Type-dependent block attributes as a tagged union. Each variant carries
/// only the fields meaningful to its block type; unrecognized keys in stored
/// metadata are ignored when deserializing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockMeta {
    Text,
    Image {
        url: String,
    },
    Video {
        url: String,
    },
    Link {
        url: String,
    },
    File {
        file_name: String,
        file_type: String,
        file_size: u64,
    },
    Todo {
        #[serde(default)]
        completed: bool,
        #[serde(default)]
        due_date: Option<DateTime<Utc>>,
        #[serde(default)]
        status: TaskStatus,
        #[serde(default)]
        priority: TaskPriority,
        #[serde(default)]
        assignee: Option<String>,
    },
    Reminder {
        #[serde(default)]
        completed: bool,
        #[serde(default)]
        due_date: Option<DateTime<Utc>>,
    },
}

impl BlockMeta {
    pub fn kind(&self) -> BlockKind {
        match self {
            BlockMeta::Text => BlockKind::Text,
            BlockMeta::Image { .. } => BlockKind::Image,
            BlockMeta::Video { .. } => BlockKind::Video,
            BlockMeta::Link { .. } => BlockKind::Link,
            BlockMeta::File { .. } => BlockKind::File,
            BlockMeta::Todo { .. } => BlockKind::Todo,
            BlockMeta::Reminder { .. } => BlockKind::Reminder,
        }
    }
}

/// A single typed unit of captured knowledge owned by exactly one project.
///
/// Identity is permanent once server-confirmed; during creation the block
/// temporarily holds a client-generated placeholder id until the server row
/// replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: Uuid,
    pub content: String,
    pub meta: BlockMeta,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Block {
    pub fn kind(&self) -> BlockKind {
        self.meta.kind()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockDraft {
    pub content: String,
    pub meta: BlockMeta,
    pub tags: Vec<String>,
}

/// A partial block update. A set `meta` replaces the attribute record whole.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockPatch {
    pub content: Option<String>,
    pub meta: Option<BlockMeta>,
    pub tags: Option<Vec<String>>,
}

impl BlockPatch {
    pub fn apply_to(&self, block: &mut Block) {
        if let Some(content) = &self.content {
            block.content = content.clone();
        }
        if let Some(meta) = &self.meta {
            block.meta = meta.clone();
        }
        if let Some(tags) = &self.tags {
            block.tags = tags.clone();
        }
    }
}

/// Projected view over incomplete reminder blocks, carrying a back-reference
/// to the owning project. Derived on demand, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: Uuid,
    pub project_id: Uuid,
    pub project_name: String,
    pub text: String,
    /// Due date when set, otherwise the block's creation date.
    pub date: DateTime<Utc>,
    pub completed: bool,
}

//=========================================================================================
// Chat
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

const THINKING_OPEN: &str = "<thinking>";
const THINKING_CLOSE: &str = "</thinking>";

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        ChatMessage { role: Role::Assistant, content: content.into() }
    }

    /// Content with the delimited thinking segment stripped, for display.
    /// Assistant replies may embed `<thinking>...</thinking>` ahead of the
    /// visible answer.
    pub fn display_content(&self) -> String {
        match (self.content.find(THINKING_OPEN), self.content.find(THINKING_CLOSE)) {
            (Some(start), Some(end)) if end >= start => {
                let mut out = String::with_capacity(self.content.len());
                out.push_str(&self.content[..start]);
                out.push_str(&self.content[end + THINKING_CLOSE.len()..]);
                out.trim().to_string()
            }
            _ => self.content.clone(),
        }
    }
}

/// One persisted conversation thread, optionally linked to a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: Uuid,
    pub title: String,
    pub messages: Vec<ChatMessage>,
    pub project_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//=========================================================================================
// Auth
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
}

/// A live authenticated session as reported by the auth service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub id: String,
    pub user: AuthUser,
    pub expires_at: DateTime<Utc>,
}
