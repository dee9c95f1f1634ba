pub mod domain;
pub mod ports;

pub use domain::{
    AuthSession, AuthUser, Block, BlockDraft, BlockKind, BlockMeta, BlockPatch, ChatMessage,
    ChatSession, Level, Project, ProjectCategory, ProjectDraft, ProjectPatch, ProjectStatus,
    Reminder, Role, StrategicFields, TaskPriority, TaskStatus,
};
pub use ports::{
    AuthService, BlockRow, CompletionRequest, CompletionService, CompletionStream, DataStore,
    KeyValueStore, PortError, PortResult,
};
