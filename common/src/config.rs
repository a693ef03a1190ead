//! Hue console configuration loading and parsing

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

const DEFAULT_CONFIG_PATH: &str = "/etc/hue/hue.toml";

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConsoleConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub filebrowser: FileBrowserConfig,
    #[serde(default)]
    pub oozie: OozieConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// How the requesting user is identified.
///
/// The console sits behind an authenticating proxy which forwards the user
/// name and the application-level superuser flag as request headers. The
/// headers are taken as given, so the proxy must strip any client-supplied
/// copies and the console must not be reachable except through it.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_user_header")]
    pub user_header: String,
    #[serde(default = "default_superuser_header")]
    pub superuser_header: String,
    /// When false the superuser header is ignored and nobody is an admin.
    #[serde(default = "default_trust_superuser_header")]
    pub trust_superuser_header: bool,
    /// Identity used when the user header is absent.
    #[serde(default = "default_user")]
    pub default_user: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            user_header: default_user_header(),
            superuser_header: default_superuser_header(),
            trust_superuser_header: default_trust_superuser_header(),
            default_user: default_user(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileBrowserConfig {
    #[serde(default = "default_fs_name")]
    pub fs_name: String,
    /// Local directory that backs the browsed filesystem namespace.
    #[serde(default = "default_local_root")]
    pub local_root: String,
    /// The filesystem's privileged identity.
    #[serde(default = "default_fs_superuser")]
    pub superuser: String,
    #[serde(default = "default_site_encoding")]
    pub site_encoding: String,
    #[serde(default = "default_upload_tmp_dir")]
    pub upload_tmp_dir: String,
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
}

impl Default for FileBrowserConfig {
    fn default() -> Self {
        Self {
            fs_name: default_fs_name(),
            local_root: default_local_root(),
            superuser: default_fs_superuser(),
            site_encoding: default_site_encoding(),
            upload_tmp_dir: default_upload_tmp_dir(),
            default_page_size: default_page_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OozieConfig {
    #[serde(default = "default_oozie_url")]
    pub url: String,
    /// User name the console presents to Oozie.
    #[serde(default = "default_user")]
    pub service_user: String,
    #[serde(default = "default_oozie_timeout")]
    pub timeout_seconds: u64,
    /// Number of jobs fetched by the dashboard listings.
    #[serde(default = "default_jobs_count")]
    pub jobs_count: u32,
}

impl Default for OozieConfig {
    fn default() -> Self {
        Self {
            url: default_oozie_url(),
            service_user: default_user(),
            timeout_seconds: default_oozie_timeout(),
            jobs_count: default_jobs_count(),
        }
    }
}
fn default_trust_superuser_header() -> bool { true }

// Default value functions
fn default_bind_address() -> String { "0.0.0.0:8888".into() }
fn default_log_level() -> String { "info".into() }
fn default_user_header() -> String { "x-remote-user".into() }
fn default_superuser_header() -> String { "x-remote-superuser".into() }
fn default_user() -> String { "hue".into() }
fn default_fs_name() -> String { "default".into() }
fn default_local_root() -> String { "/var/lib/hue/fs".into() }
fn default_fs_superuser() -> String { "hdfs".into() }
fn default_site_encoding() -> String { "utf-8".into() }
fn default_upload_tmp_dir() -> String { "/tmp".into() }
fn default_page_size() -> usize { 30 }
fn default_oozie_url() -> String { "http://localhost:11000/oozie".into() }
fn default_oozie_timeout() -> u64 { 30 }
fn default_jobs_count() -> u32 { 50 }

/// Load configuration from the file named by `HUE_CONFIG`, or
/// /etc/hue/hue.toml when unset.
pub fn load_config() -> Result<ConsoleConfig> {
    let config_path =
        std::env::var("HUE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    load_config_from(&config_path)
}

pub fn load_config_from(config_path: &str) -> Result<ConsoleConfig> {
    if Path::new(config_path).exists() {
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config from {config_path}"))?;
        let config: ConsoleConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {config_path}"))?;
        Ok(config)
    } else {
        tracing::warn!("Config file not found at {config_path}, using defaults");
        Ok(ConsoleConfig::default())
    }
}
