use std::sync::Arc;

use pushbridge_config::AppConfig;
use pushbridge_queue::SharedQueue;
use pushbridge_registry::SharedRegistry;

use crate::auth::CredentialStore;

/// State shared by every route: the loaded configuration, the registry
/// and queue handles, and the admin credential store.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub registry: SharedRegistry,
    pub queue: SharedQueue,
    pub credentials: Arc<dyn CredentialStore>,
}
