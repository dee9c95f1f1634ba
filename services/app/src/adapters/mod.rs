pub mod auth_db;
pub mod chat_llm;
pub mod db;
pub mod kv;
pub mod local;

pub use auth_db::DbAuthAdapter;
pub use chat_llm::{OpenAiChatAdapter, UnconfiguredCompletion};
pub use db::DbAdapter;
pub use kv::{JsonFileStore, MemoryStore};
pub use local::{LocalAuthAdapter, LocalDataAdapter};
