use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u16(profile: &str, key: &str, default: u16) -> u16 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_usize(profile: &str, key: &str, default: usize) -> usize {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key).as_deref() {
        Some("true") | Some("1") | Some("yes") => true,
        Some("false") | Some("0") | Some("no") => false,
        _ => default,
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub scheduler: SchedulerConfig,
    pub notify: NotifyConfig,
    pub auth: AuthConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `ONCALL_PROFILE`. When set (e.g. `PROD`), every
    /// key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("ONCALL_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            server: ServerConfig::from_env_profiled(p),
            storage: StorageConfig::from_env_profiled(p),
            scheduler: SchedulerConfig::from_env_profiled(p),
            notify: NotifyConfig::from_env_profiled(p),
            auth: AuthConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  server:      {}:{}", self.server.host, self.server.port);
        tracing::info!(
            "  storage:     data_dir={}, directory={}",
            self.storage.data_dir.display(),
            self.storage.directory_file.display()
        );
        tracing::info!(
            "  scheduler:   max_instances={}, retry={}..{}ms, resume={}",
            self.scheduler.max_instances,
            self.scheduler.retry_base_ms,
            self.scheduler.retry_max_ms,
            self.scheduler.resume_on_start
        );
        tracing::info!("  notify:      slack_api={}", self.notify.slack_api_base);
        tracing::info!("  auth:        {} api key(s)", self.auth.api_keys.len());
    }

    /// Return a redacted view safe for API responses (no secrets).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "server": { "host": self.server.host, "port": self.server.port },
            "storage": {
                "data_dir": self.storage.data_dir,
                "directory_file": self.storage.directory_file,
            },
            "scheduler": {
                "max_instances": self.scheduler.max_instances,
                "retry_base_ms": self.scheduler.retry_base_ms,
                "retry_max_ms": self.scheduler.retry_max_ms,
                "resume_on_start": self.scheduler.resume_on_start,
            },
            "notify": {
                "slack_api_base": self.notify.slack_api_base,
                "custom_template": self.notify.message_template.is_some(),
                "timeout_secs": self.notify.timeout_secs,
            },
            "auth": { "tenants": self.auth.tenants() },
        })
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
}

impl ServerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "HOST", "0.0.0.0"),
            port: profiled_env_u16(p, "PORT", 3001),
            cors_origin: profiled_env_or(p, "CORS_ORIGIN", "*"),
        }
    }
}

// ── Storage ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root for workflow checkpoints.
    pub data_dir: PathBuf,
    /// YAML file holding rotations, integrations and users.
    pub directory_file: PathBuf,
}

impl StorageConfig {
    fn from_env_profiled(p: &str) -> Self {
        let data_dir = PathBuf::from(profiled_env_or(p, "DATA_DIR", "data"));
        let directory_file = PathBuf::from(profiled_env_or(
            p,
            "DIRECTORY_FILE",
            data_dir.join("directory.yaml").to_str().unwrap_or("data/directory.yaml"),
        ));
        Self { data_dir, directory_file }
    }

    pub fn workflows_dir(&self) -> PathBuf {
        self.data_dir.join("workflows")
    }
}

// ── Scheduler ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Upper bound on live workflow instances.
    pub max_instances: usize,
    pub retry_base_ms: u64,
    pub retry_max_ms: u64,
    /// Restart workflows from persisted checkpoints at boot.
    pub resume_on_start: bool,
    /// Concurrent starts per trigger request.
    pub trigger_concurrency: usize,
}

impl SchedulerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            max_instances: profiled_env_usize(p, "SCHEDULER_MAX_INSTANCES", 10_000),
            retry_base_ms: profiled_env_u64(p, "SCHEDULER_RETRY_BASE_MS", 500),
            retry_max_ms: profiled_env_u64(p, "SCHEDULER_RETRY_MAX_MS", 30_000),
            resume_on_start: profiled_env_bool(p, "SCHEDULER_RESUME_ON_START", true),
            trigger_concurrency: profiled_env_usize(p, "SCHEDULER_TRIGGER_CONCURRENCY", 8).max(1),
        }
    }
}

// ── Notify ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Minijinja template overriding the default handoff message.
    pub message_template: Option<String>,
    pub slack_api_base: String,
    pub timeout_secs: u64,
}

impl NotifyConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            message_template: profiled_env_opt(p, "NOTIFY_MESSAGE_TEMPLATE"),
            slack_api_base: profiled_env_or(p, "SLACK_API_BASE", "https://slack.com/api"),
            timeout_secs: profiled_env_u64(p, "NOTIFY_TIMEOUT_SECS", 10),
        }
    }
}

// ── Auth ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// API key → tenant id.
    pub api_keys: BTreeMap<String, String>,
}

impl AuthConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            api_keys: parse_api_keys(&profiled_env_or(p, "TRIGGER_API_KEYS", "")),
        }
    }

    /// Tenant owning `key`, if the key is known.
    pub fn tenant_for(&self, key: &str) -> Option<&str> {
        self.api_keys.get(key).map(|t| t.as_str())
    }

    pub fn tenants(&self) -> Vec<&str> {
        let mut tenants: Vec<&str> = self.api_keys.values().map(|t| t.as_str()).collect();
        tenants.sort_unstable();
        tenants.dedup();
        tenants
    }
}

/// Parse `key:tenant,key2:tenant2`. Malformed entries are skipped.
pub fn parse_api_keys(raw: &str) -> BTreeMap<String, String> {
    raw.split(',')
        .filter_map(|entry| {
            let (key, tenant) = entry.trim().split_once(':')?;
            let (key, tenant) = (key.trim(), tenant.trim());
            if key.is_empty() || tenant.is_empty() {
                tracing::warn!("ignoring malformed TRIGGER_API_KEYS entry");
                return None;
            }
            Some((key.to_string(), tenant.to_string()))
        })
        .collect()
}
