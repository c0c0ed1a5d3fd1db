//! Application state.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::info;
use vdet_inference::{DispatcherConfig, InferenceDispatcher};
use vdet_media::{AnnotatedVideoRenderer, RenderConfig};
use vdet_models::Role;

use crate::alerts::AlertStore;
use crate::auth::hash_password;
use crate::config::{ApiConfig, AuthConfig};
use crate::users::{InMemoryUserStore, StoreError, UserStore};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub auth: Arc<AuthConfig>,
    pub users: Arc<dyn UserStore>,
    pub alerts: Arc<AlertStore>,
    pub dispatcher: Arc<InferenceDispatcher>,
    /// Bounds concurrent inference jobs on the blocking pool.
    pub inference_permits: Arc<Semaphore>,
}

impl AppState {
    /// Create application state, loading every model from disk.
    ///
    /// Fails if a model cannot be loaded or a working directory cannot be
    /// created.
    pub fn new(config: ApiConfig, auth: AuthConfig) -> Result<Self, Box<dyn std::error::Error>> {
        std::fs::create_dir_all(&config.temp_dir)?;
        std::fs::create_dir_all(&config.annotated_dir)?;

        let renderer = AnnotatedVideoRenderer::new(
            RenderConfig::default().with_output_dir(config.annotated_dir.clone()),
        );
        let dispatcher_config = DispatcherConfig {
            policy: config.segment_policy(),
            ..Default::default()
        };
        let dispatcher =
            InferenceDispatcher::load(&config.models, dispatcher_config, Arc::new(renderer))?;
        info!(models = ?dispatcher.loaded_models(), "Models loaded");

        let state = Self::with_dispatcher(config, auth, dispatcher);
        state.bootstrap_admin()?;
        Ok(state)
    }

    /// Create state around an already-built dispatcher, with empty stores.
    pub fn with_dispatcher(
        config: ApiConfig,
        auth: AuthConfig,
        dispatcher: InferenceDispatcher,
    ) -> Self {
        let permits = config.max_concurrent_inference.max(1);
        let alerts = AlertStore::new(config.alert_capacity);
        Self {
            config,
            auth: Arc::new(auth),
            users: Arc::new(InMemoryUserStore::new()),
            alerts: Arc::new(alerts),
            dispatcher: Arc::new(dispatcher),
            inference_permits: Arc::new(Semaphore::new(permits)),
        }
    }

    /// Create the configured admin account if it does not exist yet.
    pub fn bootstrap_admin(&self) -> Result<(), Box<dyn std::error::Error>> {
        let Some((email, password)) = self.auth.bootstrap_admin.clone() else {
            return Ok(());
        };
        let hash = hash_password(&password)
            .map_err(|e| format!("Failed to hash bootstrap admin password: {e}"))?;
        match self.users.create(&email, &hash, Role::Admin) {
            Ok(user) => {
                info!(user_id = user.id, email = %user.email, "Bootstrap admin created");
                Ok(())
            }
            Err(StoreError::Duplicate(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
