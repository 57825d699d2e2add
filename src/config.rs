// src/config.rs

//! Manages operator configuration: loading, resolving dynamic values, and
//! validation (§2 ambient stack, §6.1).

use crate::core::node::Temperature;
use crate::core::pcm::Profile;
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use sysinfo::System;
use tracing::{info, warn};

/// A simple wrapper to allow cloning the config while it's behind a mutex.
pub trait IntoMutex: Sized {
    fn into_mutex(self) -> Arc<Mutex<Self>>;
}

impl IntoMutex for OperatorConfig {
    fn into_mutex(self) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(self))
    }
}

/// `PeerClusterConfig`-shaped user input before role/temperature
/// normalization (§3, §4.1.1).
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct PeerClusterSettings {
    #[serde(default)]
    pub cluster_name: String,
    #[serde(default)]
    pub init_hold: bool,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub profile: ProfileSetting,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProfileSetting {
    #[default]
    Production,
    Staging,
    Testing,
}

impl From<ProfileSetting> for Profile {
    fn from(p: ProfileSetting) -> Self {
        match p {
            ProfileSetting::Production => Profile::Production,
            ProfileSetting::Staging => Profile::Staging,
            ProfileSetting::Testing => Profile::Testing,
        }
    }
}

/// Identity of this app as configured by the deployment substrate (§3 `App`).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AppIdentity {
    pub model_uuid: String,
    pub name: String,
    pub unit_number: i64,
}

/// Connection details for the colocated OpenSearch node's admin API (C2).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OpenSearchConfig {
    #[serde(default = "default_opensearch_host")]
    pub host: String,
    #[serde(default = "default_admin_username")]
    pub admin_username: String,
    #[serde(default)]
    pub admin_password: Option<String>,
    #[serde(default = "default_config_dir")]
    pub config_dir: String,
}

fn default_opensearch_host() -> String {
    "localhost:9200".to_string()
}
fn default_admin_username() -> String {
    "admin".to_string()
}
fn default_config_dir() -> String {
    "/etc/opensearch".to_string()
}

impl Default for OpenSearchConfig {
    fn default() -> Self {
        Self {
            host: default_opensearch_host(),
            admin_username: default_admin_username(),
            admin_password: None,
            config_dir: default_config_dir(),
        }
    }
}

/// Prometheus `/metrics` endpoint configuration (§2 ambient stack).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

fn default_metrics_port() -> u16 {
    8878
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

/// Object-storage / backup related settings (§4.3).
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct BackupConfig {
    #[serde(default)]
    pub s3_bucket: Option<String>,
    #[serde(default)]
    pub s3_region: Option<String>,
    #[serde(default)]
    pub azure_container: Option<String>,
}

/// The per-unit event scheduler's tick interval and OpenSearch admin-call
/// timeouts (§5).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SchedulerConfig {
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
}

fn default_tick_interval_secs() -> u64 {
    10
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval_secs(),
        }
    }
}

/// A raw representation of the config file before validation and resolution.
#[derive(Deserialize)]
struct RawConfig {
    app: AppIdentity,
    #[serde(default)]
    peer_cluster: PeerClusterSettings,
    #[serde(default)]
    opensearch: OpenSearchConfig,
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default)]
    metrics: MetricsConfig,
    #[serde(default)]
    backup: BackupConfig,
    #[serde(default)]
    scheduler: SchedulerConfig,
    #[serde(default)]
    data_temperature: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Represents the final, validated operator configuration for this unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorConfig {
    pub app: AppIdentity,
    pub peer_cluster: PeerClusterSettings,
    pub opensearch: OpenSearchConfig,
    pub log_level: String,
    pub metrics: MetricsConfig,
    pub backup: BackupConfig,
    pub scheduler: SchedulerConfig,
    pub data_temperature: Option<Temperature>,
}

impl OperatorConfig {
    /// Loads configuration from a TOML file via the `config` crate, then
    /// validates cross-field invariants that `serde` defaults can't express.
    pub fn from_file(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()
            .with_context(|| format!("failed to load configuration from '{path}'"))?;

        let raw: RawConfig = settings
            .try_deserialize()
            .with_context(|| format!("failed to parse configuration file '{path}'"))?;

        let data_temperature = raw
            .data_temperature
            .as_deref()
            .map(|s| Temperature::parse(s).ok_or_else(|| anyhow!("unknown data_temperature '{s}'")))
            .transpose()?;

        let config = Self {
            app: raw.app,
            peer_cluster: raw.peer_cluster,
            opensearch: raw.opensearch,
            log_level: raw.log_level,
            metrics: raw.metrics,
            backup: raw.backup,
            scheduler: raw.scheduler,
            data_temperature,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates cross-field invariants not already expressed by `serde`
    /// defaults.
    pub fn validate(&self) -> Result<()> {
        if self.app.model_uuid.trim().is_empty() {
            return Err(anyhow!("app.model_uuid cannot be empty"));
        }
        if self.app.name.trim().is_empty() {
            return Err(anyhow!("app.name cannot be empty"));
        }
        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(anyhow!("metrics.port cannot be 0 when metrics are enabled"));
        }
        if self.scheduler.tick_interval_secs == 0 {
            return Err(anyhow!("scheduler.tick_interval_secs cannot be 0"));
        }
        Ok(())
    }
}

/// Returns the total system memory, preferring a cgroup limit on Linux over
/// raw system memory.
pub fn available_memory_bytes() -> u64 {
    #[cfg(target_os = "linux")]
    {
        if let Some(limit) = linux_memory::get_cgroup_memory_limit() {
            return limit;
        }
    }

    let mut sys = System::new();
    sys.refresh_memory();
    let total = sys.total_memory();
    warn!(
        "could not detect a cgroup memory limit, using total system memory: {} bytes",
        total
    );
    total
}

#[cfg(target_os = "linux")]
mod linux_memory {
    pub fn get_cgroup_memory_limit() -> Option<u64> {
        if let Ok(limit_str) = std::fs::read_to_string("/sys/fs/cgroup/memory.max") {
            if let Ok(limit) = limit_str.trim().parse::<u64>() {
                if limit < u64::MAX / 2 {
                    super::info!("detected cgroup v2 memory limit: {} bytes", limit);
                    return Some(limit);
                }
            }
        }
        if let Ok(limit_str) = std::fs::read_to_string("/sys/fs/cgroup/memory/memory.limit_in_bytes") {
            if let Ok(limit) = limit_str.trim().parse::<u64>() {
                if limit < u64::MAX / 2 {
                    super::info!("detected cgroup v1 memory limit: {} bytes", limit);
                    return Some(limit);
                }
            }
        }
        None
    }
}
