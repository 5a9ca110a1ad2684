use super::http::{build_client, post_json, HttpSettings};
use super::npm_range::NpmRange;
use super::retry::{retry_with_backoff, RetryPolicy};
use crate::error::Result;
use crate::model::{DependencySet, Severity, Vulnerability};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

const NAME: &str = "npm Advisories";

/// Package names per bulk request.
const BATCH_SIZE: usize = 200;

pub const DEFAULT_URL: &str = "https://registry.npmjs.org";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NpmAdvisorySettings {
    pub url: String,
}

impl Default for NpmAdvisorySettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
        }
    }
}

/// The npm registry's security advisory database.
///
/// The bulk endpoint returns every advisory touching any of the submitted
/// versions of a package, so each advisory's `vulnerable_versions` range is
/// checked against each installed version before a record is emitted.
pub struct NpmAdvisoryProvider {
    client: reqwest::Client,
    endpoint: String,
    retry: RetryPolicy,
}

impl NpmAdvisoryProvider {
    pub fn new(settings: &NpmAdvisorySettings, http: &HttpSettings) -> Result<Self> {
        Ok(Self {
            client: build_client(NAME, http)?,
            endpoint: format!(
                "{}/-/npm/v1/security/advisories/bulk",
                settings.url.trim_end_matches('/')
            ),
            retry: http.retry.clone(),
        })
    }

    async fn bulk(&self, request: &BTreeMap<&str, Vec<&str>>) -> Result<BulkResponse> {
        retry_with_backoff(&self.retry, || {
            post_json(&self.client, NAME, &self.endpoint, request, None)
        })
        .await
    }
}

type BulkResponse = HashMap<String, Vec<Advisory>>;

#[derive(Deserialize)]
struct Advisory {
    id: u64,
    url: Option<String>,
    title: Option<String>,
    severity: Option<String>,
    vulnerable_versions: Option<String>,
    #[serde(default)]
    cves: Vec<String>,
}

impl Advisory {
    /// Prefer the GHSA id embedded in the advisory URL over the numeric id.
    fn advisory_id(&self) -> String {
        self.url
            .as_deref()
            .and_then(|url| url.rsplit('/').next())
            .filter(|tail| tail.starts_with("GHSA-"))
            .map(str::to_string)
            .unwrap_or_else(|| self.id.to_string())
    }
}

#[async_trait]
impl super::VulnerabilityProvider for NpmAdvisoryProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn query(&self, dependencies: &DependencySet) -> Result<Vec<Vulnerability>> {
        let installed = dependencies.versions_by_name();
        let names: Vec<&str> = installed.keys().copied().collect();

        let mut vulnerabilities = Vec::new();

        for chunk in names.chunks(BATCH_SIZE) {
            let request: BTreeMap<&str, Vec<&str>> = chunk
                .iter()
                .map(|name| (*name, installed[name].clone()))
                .collect();

            let response = self.bulk(&request).await?;

            for (name, advisories) in response {
                let versions = match installed.get(name.as_str()) {
                    Some(v) => v,
                    None => continue,
                };

                for advisory in advisories {
                    let range_text = advisory.vulnerable_versions.as_deref().unwrap_or("*");
                    let range = match NpmRange::parse(range_text) {
                        Some(r) => r,
                        None => {
                            warn!(
                                "Skipping advisory {} for {}: cannot parse range {:?}",
                                advisory.id, name, range_text
                            );
                            continue;
                        }
                    };

                    for version in versions.iter().filter(|v| range.matches(v)) {
                        vulnerabilities.push(
                            Vulnerability::new(NAME, advisory.advisory_id(), &name, *version)
                                .with_severity(
                                    advisory
                                        .severity
                                        .as_deref()
                                        .map(Severity::from_label)
                                        .unwrap_or(Severity::Unknown),
                                )
                                .with_title(
                                    advisory
                                        .title
                                        .clone()
                                        .unwrap_or_else(|| "Unknown vulnerability".to_string()),
                                )
                                .with_vulnerable_versions(advisory.vulnerable_versions.clone())
                                .with_cves(advisory.cves.clone())
                                .with_reference_url(advisory.url.clone()),
                        );
                    }
                }
            }
        }

        Ok(vulnerabilities)
    }
}
