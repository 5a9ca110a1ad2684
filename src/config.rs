//! Configuration file handling.
//!
//! The configuration file is stored at:
//! - Linux: `~/.config/depsentry/config.toml`
//! - macOS: `~/Library/Application Support/depsentry/config.toml`
//! - Windows: `%APPDATA%\depsentry\config.toml`
//!
//! # Example Configuration
//!
//! ```toml
//! providers = ["ossindex", "npm"]
//! provider_timeout_secs = 60
//! request_timeout_secs = 30
//! default_format = "table"
//!
//! [retry]
//! max_attempts = 3
//! initial_delay_ms = 500
//!
//! [ossindex]
//! username = "me@example.com"
//! token = "..."
//!
//! [ignore]
//! packages = ["@types/*"]
//! vulnerabilities = ["GHSA-jp4x-w63m-7wgm"]
//! ```

use crate::error::{Error, Result};
use crate::model::AnalysisReport;
use crate::provider::{
    HttpSettings, NpmAdvisorySettings, OssIndexSettings, OsvSettings, ProviderKind, RetryPolicy,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration.
///
/// Every field has a default, so a partial file (or none at all) is valid.
///
/// ```
/// use depsentry::Config;
///
/// let config: Config = toml::from_str("providers = [\"osv\"]").unwrap();
/// assert_eq!(config.provider_timeout_secs, 60);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Providers consulted by `analyze`, in order.
    ///
    /// Default: `["ossindex", "npm"]`
    pub providers: Vec<ProviderKind>,

    /// Upper bound on one provider's whole query, retries included.
    pub provider_timeout_secs: u64,

    /// Timeout of a single HTTP request.
    pub request_timeout_secs: u64,

    /// Output format used when `--format` is not given: "table" or "json".
    pub default_format: String,

    pub retry: RetryPolicy,

    pub ossindex: OssIndexSettings,
    pub npm: NpmAdvisorySettings,
    pub osv: OsvSettings,

    /// Suppressions applied when rendering a report.
    pub ignore: IgnoreConfig,
}

/// Packages or advisories to leave out of rendered reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnoreConfig {
    /// Package names; `*` matches any run of characters (e.g. `@types/*`).
    pub packages: Vec<String>,

    /// Advisory ids or CVE ids.
    pub vulnerabilities: Vec<String>,
}

impl IgnoreConfig {
    pub fn should_ignore_package(&self, name: &str) -> bool {
        self.packages.iter().any(|pattern| {
            if pattern.contains('*') {
                glob_match(pattern, name)
            } else {
                pattern == name
            }
        })
    }

    /// Matches against the advisory id and any CVE the advisory carries.
    pub fn should_ignore_vulnerability(&self, advisory_id: &str, cves: &[String]) -> bool {
        self.vulnerabilities
            .iter()
            .any(|id| id == advisory_id || cves.contains(id))
    }

    /// Drops ignored findings from `report` in place, returning how many
    /// were removed.
    pub fn filter_report(&self, report: &mut AnalysisReport) -> usize {
        let mut removed = 0;
        for vulns in report.results.values_mut() {
            let before = vulns.len();
            vulns.retain(|v| {
                !self.should_ignore_package(&v.package)
                    && !self.should_ignore_vulnerability(&v.advisory_id, &v.cves)
            });
            removed += before - vulns.len();
        }
        removed
    }
}

/// Simple glob matching (supports * as wildcard).
fn glob_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();

    if parts.len() == 1 {
        return pattern == text;
    }

    let mut remaining = text;

    if !parts[0].is_empty() {
        if !remaining.starts_with(parts[0]) {
            return false;
        }
        remaining = &remaining[parts[0].len()..];
    }

    let last_part = parts[parts.len() - 1];
    if !last_part.is_empty() {
        if !remaining.ends_with(last_part) {
            return false;
        }
        remaining = &remaining[..remaining.len() - last_part.len()];
    }

    for part in &parts[1..parts.len() - 1] {
        if part.is_empty() {
            continue;
        }
        if let Some(pos) = remaining.find(part) {
            remaining = &remaining[pos + part.len()..];
        } else {
            return false;
        }
    }

    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            providers: vec![ProviderKind::OssIndex, ProviderKind::Npm],
            provider_timeout_secs: 60,
            request_timeout_secs: 30,
            default_format: "table".to_string(),
            retry: RetryPolicy::default(),
            ossindex: OssIndexSettings::default(),
            npm: NpmAdvisorySettings::default(),
            osv: OsvSettings::default(),
            ignore: IgnoreConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the default config file, or returns the
    /// defaults if there is none.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Loads configuration from an explicit path, which must exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("cannot parse {}: {}", path.display(), e)))
    }

    /// Saves the configuration to the default config file, creating the
    /// parent directory if needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)
                    .map_err(|e| Error::Config(format!("cannot create {}: {}", parent.display(), e)))?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("cannot serialize config: {}", e)))?;
        fs::write(&path, content)
            .map_err(|e| Error::Config(format!("cannot write {}: {}", path.display(), e)))
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("depsentry")
            .join("config.toml")
    }

    /// Renders the default configuration as TOML.
    pub fn generate_default_config() -> String {
        toml::to_string_pretty(&Config::default()).unwrap_or_default()
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            retry: self.retry.clone(),
        }
    }
}
