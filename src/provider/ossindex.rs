use super::http::{build_client, post_json, Credentials, HttpSettings};
use super::retry::{retry_with_backoff, RetryPolicy};
use crate::error::Result;
use crate::model::{Dependency, DependencySet, Severity, Vulnerability};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

const NAME: &str = "OSS Index";

/// The component-report endpoint accepts at most 128 coordinates per call.
const BATCH_SIZE: usize = 128;

pub const DEFAULT_URL: &str = "https://ossindex.sonatype.org";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OssIndexSettings {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Default for OssIndexSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            username: None,
            token: None,
        }
    }
}

/// Sonatype OSS Index, a general open-source component advisory index.
pub struct OssIndexProvider {
    client: reqwest::Client,
    endpoint: String,
    credentials: Option<Credentials>,
    retry: RetryPolicy,
}

impl OssIndexProvider {
    pub fn new(settings: &OssIndexSettings, http: &HttpSettings) -> Result<Self> {
        let credentials = match (&settings.username, &settings.token) {
            (Some(username), Some(token)) => Some(Credentials {
                username: username.clone(),
                token: token.clone(),
            }),
            _ => None,
        };

        Ok(Self {
            client: build_client(NAME, http)?,
            endpoint: format!(
                "{}/api/v3/component-report",
                settings.url.trim_end_matches('/')
            ),
            credentials,
            retry: http.retry.clone(),
        })
    }

    async fn component_report(&self, coordinates: &[String]) -> Result<Vec<ComponentReport>> {
        let request = ComponentReportRequest { coordinates };
        retry_with_backoff(&self.retry, || {
            post_json(
                &self.client,
                NAME,
                &self.endpoint,
                &request,
                self.credentials.as_ref(),
            )
        })
        .await
    }
}

#[derive(Serialize)]
struct ComponentReportRequest<'a> {
    coordinates: &'a [String],
}

#[derive(Deserialize)]
struct ComponentReport {
    coordinates: String,
    #[serde(default)]
    vulnerabilities: Vec<OssVulnerability>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OssVulnerability {
    id: String,
    display_name: Option<String>,
    title: Option<String>,
    description: Option<String>,
    cvss_score: Option<f32>,
    cve: Option<String>,
    reference: Option<String>,
}

/// Package URL for an npm dependency, e.g. `pkg:npm/%40hapi/boom@9.1.4`.
fn package_url(dep: &Dependency) -> String {
    let name = match dep.name.strip_prefix('@') {
        Some(scoped) => format!("%40{}", scoped),
        None => dep.name.clone(),
    };
    format!("pkg:npm/{}@{}", name, dep.version)
}

/// OSS Index may echo coordinates back lowercased or with `@` decoded.
fn normalize_coordinate(coordinate: &str) -> String {
    coordinate.to_lowercase().replace("%40", "@")
}

#[async_trait]
impl super::VulnerabilityProvider for OssIndexProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn query(&self, dependencies: &DependencySet) -> Result<Vec<Vulnerability>> {
        let mut by_coordinate: HashMap<String, &Dependency> = HashMap::new();
        let mut coordinates = Vec::with_capacity(dependencies.len());
        for dep in dependencies {
            let purl = package_url(dep);
            by_coordinate.insert(normalize_coordinate(&purl), dep);
            coordinates.push(purl);
        }

        let mut vulnerabilities = Vec::new();

        for chunk in coordinates.chunks(BATCH_SIZE) {
            let reports = self.component_report(chunk).await?;

            for report in reports {
                if report.vulnerabilities.is_empty() {
                    continue;
                }

                let dep = match by_coordinate.get(&normalize_coordinate(&report.coordinates)) {
                    Some(dep) => *dep,
                    None => {
                        debug!("Ignoring report for unrequested {}", report.coordinates);
                        continue;
                    }
                };

                for vuln in report.vulnerabilities {
                    let severity = vuln
                        .cvss_score
                        .map(Severity::from_cvss_score)
                        .unwrap_or(Severity::Unknown);
                    let title = vuln
                        .title
                        .or(vuln.display_name)
                        .unwrap_or_else(|| vuln.id.clone());

                    vulnerabilities.push(
                        Vulnerability::new(NAME, vuln.id, &dep.name, &dep.version)
                            .with_severity(severity)
                            .with_title(title)
                            .with_description(vuln.description)
                            .with_cves(vuln.cve.into_iter().collect())
                            .with_reference_url(vuln.reference),
                    );
                }
            }
        }

        Ok(vulnerabilities)
    }
}
