//! Configuration loading.
//!
//! Settings come from an optional TOML file, then environment overrides.
//! Every field has a default, so an absent file yields a working
//! configuration with both external services disabled.
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 5000
//!
//! [analysis]
//! url = "http://127.0.0.1:8000/analyze"
//! timeout_ms = 10000
//! retries = 2
//!
//! [validator]
//! url = "http://127.0.0.1:8001/validate"
//!
//! [storage]
//! log_path = "./data/analysis_logs.json"
//! ```
//!
//! | Variable | Field |
//! |----------|-------|
//! | `PORT` | `server.port` |
//! | `ANALYSIS_SERVICE_URL` | `analysis.url` |
//! | `ANALYSIS_TIMEOUT_MS` | `analysis.timeout_ms` |
//! | `ANALYSIS_RETRIES` | `analysis.retries` |
//! | `VCF_VALIDATOR_URL` | `validator.url` |
//! | `VALIDATOR_TIMEOUT_MS` | `validator.timeout_ms` |
//! | `LOG_STORE_PATH` | `storage.log_path` |
//! | `STATIC_PAYLOAD_PATH` | `storage.static_payload_path` |
//! | `UPLOAD_DIR` | `upload.dir` |

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use pharmaguard_core::retry::RetryPolicy;
use pharmaguard_core::store::MAX_LOG_ENTRIES;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub validator: ValidatorConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    5000
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Where request-scoped temporary files are written. System temp dir when unset.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
            extension: default_extension(),
            dir: None,
        }
    }
}

fn default_max_bytes() -> u64 {
    5 * 1024 * 1024
}
fn default_extension() -> String {
    ".vcf".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_ms: default_timeout_ms(),
            retries: default_retries(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl AnalysisConfig {
    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retries, Duration::from_millis(self.backoff_ms))
    }
}

fn default_timeout_ms() -> u64 {
    10_000
}
fn default_retries() -> u32 {
    2
}
fn default_backoff_ms() -> u64 {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct ValidatorConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl ValidatorConfig {
    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    #[serde(default = "default_static_payload_path")]
    pub static_payload_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            log_path: default_log_path(),
            max_entries: default_max_entries(),
            static_payload_path: default_static_payload_path(),
        }
    }
}

fn default_log_path() -> PathBuf {
    PathBuf::from("./data/analysis_logs.json")
}
fn default_max_entries() -> usize {
    MAX_LOG_ENTRIES
}
fn default_static_payload_path() -> PathBuf {
    PathBuf::from("./data/sample_response.json")
}

/// Loads the TOML file at `path` (if present) and applies environment overrides.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        Config::default()
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    normalize_urls(&mut config);
    validate(&config)?;

    Ok(config)
}

fn parse_var<T: FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse::<T>()
        .with_context(|| format!("Invalid value for {}: '{}'", key, raw))
}

/// Applies environment-style overrides using `lookup` as the variable source.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("PORT") {
        config.server.port = parse_var("PORT", &v)?;
    }
    if let Some(v) = lookup("ANALYSIS_SERVICE_URL") {
        config.analysis.url = Some(v);
    }
    if let Some(v) = lookup("ANALYSIS_TIMEOUT_MS") {
        config.analysis.timeout_ms = parse_var("ANALYSIS_TIMEOUT_MS", &v)?;
    }
    if let Some(v) = lookup("ANALYSIS_RETRIES") {
        config.analysis.retries = parse_var("ANALYSIS_RETRIES", &v)?;
    }
    if let Some(v) = lookup("VCF_VALIDATOR_URL") {
        config.validator.url = Some(v);
    }
    if let Some(v) = lookup("VALIDATOR_TIMEOUT_MS") {
        config.validator.timeout_ms = parse_var("VALIDATOR_TIMEOUT_MS", &v)?;
    }
    if let Some(v) = lookup("LOG_STORE_PATH") {
        config.storage.log_path = PathBuf::from(v);
    }
    if let Some(v) = lookup("STATIC_PAYLOAD_PATH") {
        config.storage.static_payload_path = PathBuf::from(v);
    }
    if let Some(v) = lookup("UPLOAD_DIR") {
        config.upload.dir = Some(PathBuf::from(v));
    }
    Ok(())
}

/// Blank service addresses disable the stage.
fn normalize_urls(config: &mut Config) {
    for url in [&mut config.analysis.url, &mut config.validator.url] {
        if url.as_deref().map(str::trim).is_some_and(str::is_empty) {
            *url = None;
        }
    }
}

fn validate(config: &Config) -> Result<()> {
    if config.upload.max_bytes == 0 {
        anyhow::bail!("upload.max_bytes must be > 0");
    }
    if !config.upload.extension.starts_with('.') {
        anyhow::bail!("upload.extension must start with '.'");
    }
    if config.analysis.timeout_ms == 0 {
        anyhow::bail!("analysis.timeout_ms must be > 0");
    }
    if config.validator.timeout_ms == 0 {
        anyhow::bail!("validator.timeout_ms must be > 0");
    }
    if config.storage.max_entries == 0 {
        anyhow::bail!("storage.max_entries must be >= 1");
    }
    Ok(())
}
