//! YAML configuration loading.
//!
//! CrystalCache is configured the way Redis-alikes usually are: a YAML file
//! with the sections below, and a thin layer of CLI flags (`--config`,
//! `--host`, `--port`) that override it. Every field uses
//! `#[serde(default)]` so a partial file — or no file at all — still parses
//! into sane defaults.
//!
//! Two shapes of the `server.timeouts` section exist in the wild: a flat one
//! (`read_timeout`, `write_timeout` directly under `server`) and a nested
//! one (`server.timeouts.read`). This crate treats the nested shape as
//! canonical; the flat shape is an open question left unimplemented rather
//! than guessed at (see `DESIGN.md`).

use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub storage: StorageConfig,
    pub cluster: ClusterConfig,
    pub security: SecurityConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
    pub limits: LimitsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig::default(),
            cache: CacheConfig::default(),
            storage: StorageConfig::default(),
            cluster: ClusterConfig::default(),
            security: SecurityConfig::default(),
            metrics: MetricsConfig::default(),
            logging: LoggingConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_connections: usize,
    pub timeouts: TimeoutsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: crate::DEFAULT_HOST.to_string(),
            port: crate::DEFAULT_PORT,
            max_connections: 1000,
            timeouts: TimeoutsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeoutsConfig {
    pub read_secs: u64,
    pub write_secs: u64,
    pub idle_secs: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        TimeoutsConfig {
            read_secs: 0,
            write_secs: 0,
            idle_secs: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub cache_type: String,
    pub max_size: usize,
    pub eviction_policy: String,
    pub shards: usize,
    pub defrag: DefragConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            cache_type: "memory".to_string(),
            max_size: 0,
            eviction_policy: "lru".to_string(),
            shards: 16,
            defrag: DefragConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DefragConfig {
    pub interval_secs: u64,
    pub fill_ratio_threshold: f64,
}

impl Default for DefragConfig {
    fn default() -> Self {
        DefragConfig {
            interval_secs: 100,
            fill_ratio_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub storage_type: String,
    pub path: String,
    pub file_name: String,
    pub sync_strategy: SyncStrategy,
    pub compression: bool,
    pub max_file_size: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            storage_type: "aof".to_string(),
            path: "./data".to_string(),
            file_name: "crystalcache.aof".to_string(),
            sync_strategy: SyncStrategy::Everysec,
            compression: false,
            max_file_size: 64 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStrategy {
    Always,
    Everysec,
    No,
}

impl Default for SyncStrategy {
    fn default() -> Self {
        SyncStrategy::Everysec
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub enabled: bool,
    pub role: String,
    pub master_host: Option<String>,
    pub master_port: Option<u16>,
    pub sync_interval_secs: u64,
    pub nodes: Vec<String>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        ClusterConfig {
            enabled: false,
            role: "master".to_string(),
            master_host: None,
            master_port: None,
            sync_interval_secs: 1,
            nodes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub auth_enabled: bool,
    pub password: Option<String>,
    pub tls_cert: Option<String>,
    pub tls_key: Option<String>,
    pub tls_ca: Option<String>,
    pub acl_rules_file: Option<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        SecurityConfig {
            auth_enabled: false,
            password: None,
            tls_cert: None,
            tls_key: None,
            tls_ca: None,
            acl_rules_file: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
    pub path: String,
    pub collectors: Vec<String>,
    pub prometheus_push_gateway: Option<String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        MetricsConfig {
            enabled: false,
            port: 9121,
            path: "/metrics".to_string(),
            collectors: Vec::new(),
            prometheus_push_gateway: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub output: String,
    pub file_path: Option<String>,
    pub max_size_mb: u64,
    pub max_backups: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            format: "text".to_string(),
            output: "stdout".to_string(),
            file_path: None,
            max_size_mb: 100,
            max_backups: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_item_size: usize,
    pub max_request_size: usize,
    pub rate_limit_rps: u32,
    pub rate_limit_burst: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        LimitsConfig {
            max_item_size: 512 * 1024 * 1024,
            max_request_size: 512 * 1024 * 1024,
            rate_limit_rps: 0,
            rate_limit_burst: 0,
        }
    }
}

impl Config {
    /// Loads configuration from a YAML file, falling back to defaults for
    /// anything the file omits.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let cfg: Config = serde_yaml::from_str(&text)?;
        Ok(cfg)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_redis_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.server.port, 6379);
        assert_eq!(cfg.cache.shards, 16);
        assert_eq!(cfg.storage.sync_strategy, SyncStrategy::Everysec);
    }

    #[test]
    fn partial_yaml_falls_back_to_defaults() {
        let yaml = "server:\n  port: 7000\n";
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.server.port, 7000);
        assert_eq!(cfg.server.host, crate::DEFAULT_HOST);
        assert_eq!(cfg.cache.shards, 16);
    }

    #[test]
    fn nested_timeouts_parse() {
        let yaml = "server:\n  timeouts:\n    read_secs: 30\n";
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.server.timeouts.read_secs, 30);
        assert_eq!(cfg.server.timeouts.write_secs, 0);
    }
}
