//! TOML configuration.
//!
//! Every component receives the section it needs from [`Config`] as an
//! explicit argument; there is no process-wide settings singleton.
//!
//! ```toml
//! [vault]
//! root = "/home/user/Obsidian"
//!
//! [index]
//! path = "./data/brain.sqlite"
//!
//! [provider]
//! token = "..."
//! ```

use anyhow::{bail, Context, Result};
use globset::Glob;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable consulted when `provider.token` is not set.
pub const TOKEN_ENV: &str = "ALEPH_ALPHA_TOKEN";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub vault: VaultConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub budget: BudgetConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VaultConfig {
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    /// Directory names that are never descended into.
    #[serde(default = "default_exclude_dirs")]
    pub exclude_dirs: Vec<String>,
    /// Index notes and directories reached through symbolic links.
    #[serde(default = "default_follow_symlinks")]
    pub follow_symlinks: bool,
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.md".to_string()]
}

fn default_follow_symlinks() -> bool {
    true
}

fn default_exclude_dirs() -> Vec<String> {
    vec![
        ".obsidian".to_string(),
        ".git".to_string(),
        ".trash".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_path")]
    pub path: PathBuf,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_index_path(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_index_path() -> PathBuf {
    PathBuf::from("./data/brain.sqlite")
}
fn default_batch_size() -> usize {
    32
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub max_retries: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            token: None,
            timeout_secs: default_timeout_secs(),
            max_retries: 0,
        }
    }
}

fn default_base_url() -> String {
    "https://api.aleph-alpha.com".to_string()
}
fn default_model() -> String {
    "luminous-base".to_string()
}
fn default_timeout_secs() -> u64 {
    10
}

impl ProviderConfig {
    /// The configured token, or the value of [`TOKEN_ENV`].
    pub fn resolve_token(&self) -> Result<String> {
        if let Some(token) = self.token.as_deref().filter(|t| !t.is_empty()) {
            return Ok(token.to_string());
        }
        std::env::var(TOKEN_ENV).map_err(|_| {
            anyhow::anyhow!(
                "provider.token is not set and {} is not in the environment",
                TOKEN_ENV
            )
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BudgetConfig {
    /// Credits available since the ledger's fix point.
    #[serde(default)]
    pub credits: f64,
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            credits: 0.0,
            ledger_path: default_ledger_path(),
        }
    }
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("./data/log_data.json")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct WatchConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    750
}

impl WatchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.vault.include_globs.is_empty() {
        bail!("vault.include_globs must not be empty");
    }
    for pattern in &config.vault.include_globs {
        Glob::new(pattern).with_context(|| format!("Invalid vault.include_globs entry: {}", pattern))?;
    }

    if config.index.batch_size == 0 {
        bail!("index.batch_size must be > 0");
    }

    if config.provider.timeout_secs == 0 {
        bail!("provider.timeout_secs must be > 0");
    }

    if !config.budget.credits.is_finite() || config.budget.credits < 0.0 {
        bail!("budget.credits must be a non-negative number");
    }

    Ok(())
}
