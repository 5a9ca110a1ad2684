//! Vulnerability providers and the concurrent lookup across them.
//!
//! | Provider | Backing source | Default |
//! |----------|----------------|---------|
//! | [`OssIndexProvider`] | Sonatype OSS Index component reports | yes |
//! | [`NpmAdvisoryProvider`] | npm registry bulk advisories | yes |
//! | [`OsvProvider`] | OSV.dev batch queries | no |

mod http;
mod lookup;
mod npm;
mod npm_range;
mod ossindex;
mod osv;
mod retry;

pub use http::HttpSettings;
pub use lookup::{lookup_all, LookupOutcome};
pub use npm::{NpmAdvisoryProvider, NpmAdvisorySettings};
pub use npm_range::NpmRange;
pub use ossindex::{OssIndexProvider, OssIndexSettings};
pub use osv::{parse_cvss_score, OsvProvider, OsvSettings};
pub use retry::{retry_with_backoff, RetryPolicy};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{DependencySet, Vulnerability};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A client for one vulnerability data source.
#[async_trait]
pub trait VulnerabilityProvider: Send + Sync {
    /// Returns the provider name, used as the key in analysis results.
    fn name(&self) -> &str;

    /// Looks up every dependency in `dependencies`.
    ///
    /// Each returned record names a package and version taken from
    /// `dependencies`. Dependencies without known advisories contribute
    /// nothing.
    ///
    /// # Errors
    ///
    /// [`Error::ProviderUnavailable`] on transport failure and
    /// [`Error::ProviderQueryFailed`] when the source answered with
    /// something unusable, in both cases after the provider's own retries.
    async fn query(&self, dependencies: &DependencySet) -> Result<Vec<Vulnerability>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OssIndex,
    Npm,
    Osv,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [ProviderKind::OssIndex, ProviderKind::Npm, ProviderKind::Osv];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OssIndex => "ossindex",
            ProviderKind::Npm => "npm",
            ProviderKind::Osv => "osv",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::OssIndex => "OSS Index",
            ProviderKind::Npm => "npm Advisories",
            ProviderKind::Osv => "OSV.dev",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ossindex" | "oss-index" => Ok(ProviderKind::OssIndex),
            "npm" => Ok(ProviderKind::Npm),
            "osv" => Ok(ProviderKind::Osv),
            _ => Err(Error::InvalidInput(format!(
                "unknown provider: {}. Use: ossindex, npm, osv",
                s
            ))),
        }
    }
}

/// Builds the provider for `kind` from `config`.
pub fn get_provider(kind: ProviderKind, config: &Config) -> Result<Arc<dyn VulnerabilityProvider>> {
    let http = config.http_settings();
    Ok(match kind {
        ProviderKind::OssIndex => Arc::new(OssIndexProvider::new(&config.ossindex, &http)?),
        ProviderKind::Npm => Arc::new(NpmAdvisoryProvider::new(&config.npm, &http)?),
        ProviderKind::Osv => Arc::new(OsvProvider::new(&config.osv, &http)?),
    })
}

/// Builds every provider enabled in `config`, in configuration order.
/// Repeated entries are built once.
pub fn configured_providers(config: &Config) -> Result<Vec<Arc<dyn VulnerabilityProvider>>> {
    let mut seen = Vec::new();
    let mut providers = Vec::new();
    for kind in &config.providers {
        if seen.contains(kind) {
            continue;
        }
        seen.push(*kind);
        providers.push(get_provider(*kind, config)?);
    }
    Ok(providers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_from_str() {
        assert_eq!("OSSIndex".parse::<ProviderKind>().unwrap(), ProviderKind::OssIndex);
        assert_eq!("npm".parse::<ProviderKind>().unwrap(), ProviderKind::Npm);
        assert_eq!("osv".parse::<ProviderKind>().unwrap(), ProviderKind::Osv);
        assert!("snyk".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_provider_names_match_kinds() {
        let config = Config::default();
        for kind in ProviderKind::ALL {
            let provider = get_provider(kind, &config).unwrap();
            assert_eq!(provider.name(), kind.display_name());
        }
    }

    #[test]
    fn test_configured_providers_defaults_and_dedup() {
        let mut config = Config::default();
        let names: Vec<String> = configured_providers(&config)
            .unwrap()
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(names, vec!["OSS Index", "npm Advisories"]);

        config.providers = vec![ProviderKind::Osv, ProviderKind::Osv];
        assert_eq!(configured_providers(&config).unwrap().len(), 1);
    }
}
