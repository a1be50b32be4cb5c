//! # Sync Configuration
//!
//! Configuration management for the sync engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     CAJA_REMOTE_URL=https://erp.example.com                            │
//! │     CAJA_COMPANY="Caja Demo"                                           │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/pos/sync.toml (Linux)                                    │
//! │     ~/Library/Application Support/com.caja.pos/sync.toml (macOS)      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # sync.toml
//! [remote]
//! base_url = "https://erp.example.com"
//! api_key = "..."
//! api_secret = "..."
//!
//! [scope]
//! tenant_id = "00000000-0000-0000-0000-000000000001"
//! company = "Caja Demo"
//! company_currency = "NIO"
//! price_list = "Retail"
//! warehouse = "Stores - CD"
//! receivable_account = "Debtors - CD"
//!
//! [sync]
//! page_size = 200
//! interval_secs = 60
//! push_max_attempts = 3
//!
//! [database]
//! path = "caja.db"
//!
//! [precision.specs.NIO]
//! scale = 2
//! cash_scale = 0
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use caja_core::{CurrencyPrecision, SalesScope, DEFAULT_TENANT_ID};

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Remote Settings
// =============================================================================

/// Where the ERP lives and how to authenticate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key half of the `token key:secret` header.
    #[serde(default)]
    pub api_key: String,

    #[serde(default)]
    pub api_secret: String,

    /// Per-request timeout (seconds).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for RemoteSettings {
    fn default() -> Self {
        RemoteSettings {
            base_url: default_base_url(),
            api_key: String::new(),
            api_secret: String::new(),
            timeout_secs: default_timeout(),
        }
    }
}

// =============================================================================
// Scope Settings
// =============================================================================

/// The tenant, company and selling context this till works in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeSettings {
    #[serde(default = "default_tenant")]
    pub tenant_id: String,

    #[serde(default)]
    pub company: String,

    #[serde(default = "default_company_currency")]
    pub company_currency: String,

    #[serde(default = "default_price_list")]
    pub price_list: String,

    #[serde(default)]
    pub warehouse: String,

    /// Used when a customer has no receivable account of its own.
    #[serde(default)]
    pub receivable_account: String,
}

fn default_tenant() -> String {
    DEFAULT_TENANT_ID.to_string()
}

fn default_company_currency() -> String {
    "NIO".to_string()
}

fn default_price_list() -> String {
    "Standard Selling".to_string()
}

impl Default for ScopeSettings {
    fn default() -> Self {
        ScopeSettings {
            tenant_id: default_tenant(),
            company: String::new(),
            company_currency: default_company_currency(),
            price_list: default_price_list(),
            warehouse: String::new(),
            receivable_account: String::new(),
        }
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Sync behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Records requested per list call.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Interval between background passes (seconds).
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Attempts per document within one pass, the first included.
    #[serde(default = "default_push_max_attempts")]
    pub push_max_attempts: u32,

    /// First backoff delay between push attempts (milliseconds).
    #[serde(default = "default_initial_backoff")]
    pub push_initial_backoff_ms: u64,

    /// Upper bound for a single backoff delay (milliseconds).
    #[serde(default = "default_max_backoff")]
    pub push_max_backoff_ms: u64,
}

fn default_page_size() -> usize {
    200
}
fn default_interval() -> u64 {
    60
}
fn default_push_max_attempts() -> u32 {
    3
}
fn default_initial_backoff() -> u64 {
    500
}
fn default_max_backoff() -> u64 {
    10_000
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            page_size: default_page_size(),
            interval_secs: default_interval(),
            push_max_attempts: default_push_max_attempts(),
            push_initial_backoff_ms: default_initial_backoff(),
            push_max_backoff_ms: default_max_backoff(),
        }
    }
}

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_db_path() -> PathBuf {
    directories::ProjectDirs::from("com", "caja", "pos")
        .map(|dirs| dirs.data_dir().join("caja.db"))
        .unwrap_or_else(|| PathBuf::from("caja.db"))
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
        }
    }
}

// =============================================================================
// Main Sync Configuration
// =============================================================================

/// Complete sync configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub remote: RemoteSettings,

    #[serde(default)]
    pub scope: ScopeSettings,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub database: DatabaseSettings,

    /// Per-currency rounding rules; unknown currencies use scale 2.
    #[serde(default)]
    pub precision: CurrencyPrecision,
}

impl SyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (sync.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading sync config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Sync config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.scope.tenant_id.trim().is_empty() {
            return Err(SyncError::InvalidConfig("scope.tenant_id is required".into()));
        }
        if self.scope.company.trim().is_empty() {
            return Err(SyncError::InvalidConfig("scope.company is required".into()));
        }

        let url = &self.remote.base_url;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(SyncError::InvalidUrl(format!(
                "Remote URL must start with http:// or https://, got: {}",
                url
            )));
        }
        url::Url::parse(url)?;

        if self.sync.page_size == 0 {
            return Err(SyncError::InvalidConfig(
                "page_size must be greater than 0".into(),
            ));
        }
        if self.sync.push_max_attempts == 0 {
            return Err(SyncError::InvalidConfig(
                "push_max_attempts must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("CAJA_REMOTE_URL") {
            debug!(url = %url, "Overriding remote URL from environment");
            self.remote.base_url = url;
        }
        if let Ok(key) = std::env::var("CAJA_API_KEY") {
            self.remote.api_key = key;
        }
        if let Ok(secret) = std::env::var("CAJA_API_SECRET") {
            self.remote.api_secret = secret;
        }
        if let Ok(tenant) = std::env::var("CAJA_TENANT_ID") {
            self.scope.tenant_id = tenant;
        }
        if let Ok(company) = std::env::var("CAJA_COMPANY") {
            debug!(company = %company, "Overriding company from environment");
            self.scope.company = company;
        }
        if let Ok(price_list) = std::env::var("CAJA_PRICE_LIST") {
            self.scope.price_list = price_list;
        }
        if let Ok(warehouse) = std::env::var("CAJA_WAREHOUSE") {
            self.scope.warehouse = warehouse;
        }
        if let Ok(size) = std::env::var("CAJA_PAGE_SIZE") {
            match size.parse::<usize>() {
                Ok(n) => self.sync.page_size = n,
                Err(_) => warn!(value = %size, "Ignoring invalid CAJA_PAGE_SIZE"),
            }
        }
        if let Ok(secs) = std::env::var("CAJA_SYNC_INTERVAL_SECS") {
            match secs.parse::<u64>() {
                Ok(n) => self.sync.interval_secs = n,
                Err(_) => warn!(value = %secs, "Ignoring invalid CAJA_SYNC_INTERVAL_SECS"),
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "caja", "pos")
            .map(|dirs| dirs.config_dir().join("sync.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn tenant_id(&self) -> &str {
        &self.scope.tenant_id
    }

    pub fn company(&self) -> &str {
        &self.scope.company
    }

    pub fn sales_scope(&self) -> SalesScope {
        SalesScope {
            tenant_id: self.scope.tenant_id.clone(),
            company_id: self.scope.company.clone(),
            company_currency: self.scope.company_currency.clone(),
            price_list: self.scope.price_list.clone(),
            warehouse: self.scope.warehouse.clone(),
            receivable_account: self.scope.receivable_account.clone(),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.sync.interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.remote.timeout_secs.max(1))
    }
}
