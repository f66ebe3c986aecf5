use serde::{Deserialize, Serialize};

// --- General Server Config ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

// --- Admin Auth Config ---
/// One admin credential. The original sample hard-coded these; here they
/// are injected through config so deployments can rotate them.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AdminCredential {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AuthConfig {
    #[serde(default)]
    pub users: Vec<AdminCredential>,
    #[serde(default = "default_realm")]
    pub realm: String,
}

fn default_realm() -> String {
    "pushbridge".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            users: Vec::new(),
            realm: default_realm(),
        }
    }
}

// --- Worker / Dispatcher Config ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WorkerConfig {
    /// Poll period of the dispatch loop, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    10_000
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

// --- Delivery Queue Config ---
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct QueueConfig {
    /// Path of the durable queue file. When absent the in-memory queue is
    /// used, which is fine for single-process deployments and tests.
    pub path: Option<String>,
}

// --- APNS Config ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApnsConfig {
    /// Use the sandbox gateway instead of production.
    #[serde(default = "default_true")]
    pub sandbox: bool,
    /// PEM-encoded client certificate for APNS mutual auth.
    pub certificate_path: String,
    /// PEM-encoded private key matching the certificate.
    pub key_path: String,
    #[serde(default = "default_retries")]
    pub send_retries: u32,
}

// --- MPNS Config ---
/// How aggressively MPNS may coalesce rapid successive notifications to
/// one device. The numeric notification-class codes derived from this are
/// protocol constants, not config.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Wp7BatchingPolicy {
    #[default]
    Immediate,
    Wait450,
    Wait900,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct MpnsConfig {
    #[serde(default)]
    pub batching_policy: Wp7BatchingPolicy,
    #[serde(default = "default_retries")]
    pub send_retries: u32,
}

// --- C2DM Config ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct C2dmConfig {
    /// Override of the C2DM send endpoint; defaults to Google's.
    pub endpoint: Option<String>,
    /// Pre-issued auth token. When absent the ClientLogin flow is used
    /// with the account credentials below.
    pub auth_token: Option<String>,
    pub account_email: Option<String>,
    pub account_password: Option<String>,
    #[serde(default = "default_retries")]
    pub send_retries: u32,
}

fn default_true() -> bool {
    true
}

fn default_retries() -> u32 {
    3
}

// --- Unified App Configuration ---
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub queue: QueueConfig,

    // --- Runtime Flags (optional in config file, default to false) ---
    #[serde(default)]
    pub use_apns: bool,
    #[serde(default)]
    pub use_mpns: bool,
    #[serde(default)]
    pub use_c2dm: bool,

    // --- Optional Provider Configurations ---
    #[serde(default)]
    pub apns: Option<ApnsConfig>,
    #[serde(default)]
    pub mpns: Option<MpnsConfig>,
    #[serde(default)]
    pub c2dm: Option<C2dmConfig>,
}
