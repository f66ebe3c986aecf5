//! Typed configuration for the pushbridge service.
//!
//! Layered loading: `config/default.toml`, then `config/{RUN_MODE}.toml`,
//! then `APP_*` environment overrides (double underscore as the section
//! separator, e.g. `APP_SERVER__PORT=9090`). Dependent crates only see
//! the typed `AppConfig`.

use config::{Config, ConfigError, Environment, File};
use tracing::debug;

pub mod models;

pub use models::{
    AdminCredential, ApnsConfig, AppConfig, AuthConfig, C2dmConfig, MpnsConfig, QueueConfig,
    ServerConfig, WorkerConfig, Wp7BatchingPolicy,
};

/// Loads the application configuration.
///
/// Missing files are fine; every section has serde defaults, so an empty
/// environment yields a runnable config with all providers disabled.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    dotenv::dotenv().ok();
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
    debug!("Loading configuration for run mode: {}", run_mode);

    let config = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_is_runnable() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.worker.poll_interval_ms, 10_000);
        assert!(!config.use_apns && !config.use_mpns && !config.use_c2dm);
        assert!(config.queue.path.is_none());
    }

    #[test]
    fn batching_policy_parses_lowercase_names() {
        let policy: Wp7BatchingPolicy = serde_json::from_str("\"wait450\"").unwrap();
        assert_eq!(policy, Wp7BatchingPolicy::Wait450);
    }
}
