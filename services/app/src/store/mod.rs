pub mod auth;
pub mod chat;
pub mod context;
pub mod notify;
pub mod projects;
pub mod prompts;

pub use auth::{AuthError, AuthStore};
pub use chat::{AttachedFile, ChatManager, TurnOutcome, TurnState};
pub use context::AppContext;
pub use notify::{Notice, NoticeLevel, Notifier};
pub use projects::ProjectStore;
pub use prompts::{ChatMode, ChatOptions};
