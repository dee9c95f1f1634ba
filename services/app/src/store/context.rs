//! services/app/src/store/context.rs
//!
//! The application context: every store and backend, owned by the process
//! root and passed by handle. Backend strategies (hosted vs. locally
//! simulated) are selected here and nowhere else.

use async_openai::{config::OpenAIConfig, Client};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use studio_core::ports::{AuthService, CompletionService, DataStore, KeyValueStore};

use crate::adapters::{
    DbAdapter, DbAuthAdapter, JsonFileStore, LocalAuthAdapter, LocalDataAdapter,
    OpenAiChatAdapter, UnconfiguredCompletion,
};
use crate::config::Config;
use crate::error::AppError;
use crate::store::auth::AuthStore;
use crate::store::chat::ChatManager;
use crate::store::notify::Notifier;
use crate::store::projects::ProjectStore;

pub struct AppContext {
    pub config: Arc<Config>,
    pub auth: Arc<AuthStore>,
    pub projects: Arc<ProjectStore>,
    pub chat: Arc<ChatManager>,
    pub notices: Notifier,
    watcher: Option<JoinHandle<()>>,
}

impl AppContext {
    /// Wires backends and stores, restores the auth session, loads the
    /// workspace for the signed-in user, and starts the watcher that
    /// refetches on sign-in and clears on sign-out.
    pub async fn initialize(config: Arc<Config>) -> Result<Self, AppError> {
        let kv: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::new(&config.data_dir)?);
        let notices = Notifier::new();

        let (data, auth_service): (Arc<dyn DataStore>, Arc<dyn AuthService>) =
            match &config.database_url {
                Some(url) => {
                    info!("Connecting to hosted datastore...");
                    let pool = PgPoolOptions::new().max_connections(5).connect(url).await?;
                    let db = DbAdapter::new(pool.clone());
                    info!("Running database migrations...");
                    db.run_migrations().await.map_err(sqlx::Error::from)?;
                    (Arc::new(db), Arc::new(DbAuthAdapter::new(pool, kv.clone())))
                }
                None => {
                    warn!("DATABASE_URL not set; using locally-simulated backends");
                    (
                        Arc::new(LocalDataAdapter::new()),
                        Arc::new(LocalAuthAdapter::new(kv.clone())),
                    )
                }
            };

        let completion: Arc<dyn CompletionService> = match &config.openai_api_key {
            Some(key) => {
                let client =
                    Client::with_config(OpenAIConfig::new().with_api_key(key.clone()));
                Arc::new(OpenAiChatAdapter::new(client))
            }
            None => {
                warn!("OPENAI_API_KEY not set; chat requests will fail until configured");
                Arc::new(UnconfiguredCompletion)
            }
        };

        let auth = Arc::new(AuthStore::new(auth_service, kv.clone()));
        auth.init().await?;

        let projects = Arc::new(ProjectStore::new(data, auth.clone(), notices.clone()));
        if auth.user_id().await.is_some() {
            projects.fetch_all().await;
        }

        let chat = Arc::new(ChatManager::new(
            completion,
            kv,
            projects.clone(),
            config.chat_model.clone(),
        ));

        // Mirror the session lifecycle into the workspace cache: refetch on
        // sign-in / user change, clear on sign-out.
        let watcher = {
            let mut rx = auth.subscribe();
            let projects = projects.clone();
            tokio::spawn(async move {
                while rx.changed().await.is_ok() {
                    let signed_in = rx.borrow_and_update().is_some();
                    if signed_in {
                        projects.fetch_all().await;
                    } else {
                        projects.clear().await;
                    }
                }
            })
        };

        Ok(Self {
            config,
            auth,
            projects,
            chat,
            notices,
            watcher: Some(watcher),
        })
    }

    /// Cancels in-flight work and tears down the watcher tasks.
    pub async fn shutdown(mut self) {
        self.chat.stop().await;
        if let Some(handle) = self.watcher.take() {
            handle.abort();
        }
        self.auth.shutdown().await;
    }
}
