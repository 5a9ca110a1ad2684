use super::http::{build_client, post_json, HttpSettings};
use super::retry::{retry_with_backoff, RetryPolicy};
use crate::error::Result;
use crate::model::{Dependency, DependencySet, Severity, Vulnerability};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const NAME: &str = "OSV.dev";

/// Maximum number of packages to query in a single batch request.
const BATCH_SIZE: usize = 100;

pub const DEFAULT_URL: &str = "https://api.osv.dev";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OsvSettings {
    pub url: String,
}

impl Default for OsvSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
        }
    }
}

pub struct OsvProvider {
    client: reqwest::Client,
    endpoint: String,
    retry: RetryPolicy,
}

impl OsvProvider {
    pub fn new(settings: &OsvSettings, http: &HttpSettings) -> Result<Self> {
        Ok(Self {
            client: build_client(NAME, http)?,
            endpoint: format!("{}/v1/querybatch", settings.url.trim_end_matches('/')),
            retry: http.retry.clone(),
        })
    }

    /// Performs a batch query to OSV.dev for multiple packages at once.
    /// Results come back in request order.
    async fn batch_query(&self, packages: &[&Dependency]) -> Result<Vec<OsvBatchResult>> {
        let queries: Vec<OsvBatchQueryItem> = packages
            .iter()
            .map(|dep| OsvBatchQueryItem {
                package: OsvPackage {
                    name: &dep.name,
                    ecosystem: "npm",
                },
                version: &dep.version,
            })
            .collect();
        let batch_query = OsvBatchQuery { queries };

        let response: OsvBatchResponse = retry_with_backoff(&self.retry, || {
            post_json(&self.client, NAME, &self.endpoint, &batch_query, None)
        })
        .await?;

        Ok(response.results)
    }
}

#[derive(Serialize)]
struct OsvPackage<'a> {
    name: &'a str,
    ecosystem: &'static str,
}

#[derive(Serialize)]
struct OsvBatchQuery<'a> {
    queries: Vec<OsvBatchQueryItem<'a>>,
}

#[derive(Serialize)]
struct OsvBatchQueryItem<'a> {
    package: OsvPackage<'a>,
    version: &'a str,
}

#[derive(Deserialize)]
struct OsvBatchResponse {
    results: Vec<OsvBatchResult>,
}

#[derive(Deserialize)]
struct OsvBatchResult {
    vulns: Option<Vec<OsvVuln>>,
}

#[derive(Deserialize)]
struct OsvVuln {
    id: String,
    summary: Option<String>,
    details: Option<String>,
    #[serde(default)]
    aliases: Vec<String>,
    severity: Option<Vec<OsvSeverity>>,
    affected: Option<Vec<OsvAffected>>,
    references: Option<Vec<OsvReference>>,
    database_specific: Option<OsvDatabaseSpecific>,
}

#[derive(Deserialize)]
struct OsvSeverity {
    score: Option<String>,
}

#[derive(Deserialize)]
struct OsvAffected {
    ranges: Option<Vec<OsvRange>>,
}

#[derive(Deserialize)]
struct OsvRange {
    events: Option<Vec<OsvEvent>>,
}

#[derive(Deserialize)]
struct OsvEvent {
    fixed: Option<String>,
}

#[derive(Deserialize)]
struct OsvReference {
    url: Option<String>,
}

#[derive(Deserialize)]
struct OsvDatabaseSpecific {
    severity: Option<String>,
}

#[async_trait]
impl super::VulnerabilityProvider for OsvProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn query(&self, dependencies: &DependencySet) -> Result<Vec<Vulnerability>> {
        let mut vulnerabilities = Vec::new();
        let packages: Vec<&Dependency> = dependencies.iter().collect();

        for chunk in packages.chunks(BATCH_SIZE) {
            let results = self.batch_query(chunk).await?;

            for (dep, result) in chunk.iter().zip(results) {
                for vuln in result.vulns.unwrap_or_default() {
                    let severity = parse_severity(&vuln);
                    let fixed_version = extract_fixed_version(&vuln);
                    let cves = vuln
                        .aliases
                        .iter()
                        .filter(|a| a.starts_with("CVE-"))
                        .cloned()
                        .collect();
                    let reference_url = vuln
                        .references
                        .and_then(|refs| refs.into_iter().find_map(|r| r.url));
                    let title = vuln.summary.unwrap_or_else(|| vuln.id.clone());

                    vulnerabilities.push(
                        Vulnerability::new(NAME, vuln.id, &dep.name, &dep.version)
                            .with_severity(severity)
                            .with_title(title)
                            .with_description(vuln.details)
                            .with_cves(cves)
                            .with_fixed_version(fixed_version)
                            .with_reference_url(reference_url),
                    );
                }
            }
        }

        Ok(vulnerabilities)
    }
}

/// Parses CVSS score into a severity level.
///
/// Supports both numeric scores and CVSS vector strings.
pub fn parse_cvss_score(score: &str) -> Severity {
    if let Ok(cvss) = score.parse::<f32>() {
        return Severity::from_cvss_score(cvss);
    }

    // Rough banding from the impact metrics of a vector like
    // "CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H".
    if score.contains("CVSS:") {
        if score.contains("/C:H") || score.contains("/I:H") || score.contains("/A:H") {
            return Severity::High;
        }
        if score.contains("/C:L") || score.contains("/I:L") || score.contains("/A:L") {
            return Severity::Medium;
        }
        return Severity::Low;
    }

    Severity::Unknown
}

fn parse_severity(vuln: &OsvVuln) -> Severity {
    if let Some(severities) = &vuln.severity {
        for sev in severities {
            if let Some(score) = &sev.score {
                let severity = parse_cvss_score(score);
                if severity != Severity::Unknown {
                    return severity;
                }
            }
        }
    }

    vuln.database_specific
        .as_ref()
        .and_then(|db| db.severity.as_deref())
        .map(Severity::from_label)
        .unwrap_or(Severity::Unknown)
}

fn extract_fixed_version(vuln: &OsvVuln) -> Option<String> {
    vuln.affected.as_ref()?.iter().find_map(|affected| {
        affected.ranges.as_ref()?.iter().find_map(|range| {
            range
                .events
                .as_ref()?
                .iter()
                .find_map(|event| event.fixed.clone())
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::provider::VulnerabilityProvider;
    use mockito::Server;
    use serde_json::json;

    fn provider(url: String) -> OsvProvider {
        let http = HttpSettings {
            retry: RetryPolicy::none(),
            ..HttpSettings::default()
        };
        OsvProvider::new(&OsvSettings { url }, &http).unwrap()
    }

    #[test]
    fn test_parse_cvss_score_numeric() {
        assert_eq!(parse_cvss_score("9.8"), Severity::Critical);
        assert_eq!(parse_cvss_score("7.0"), Severity::High);
        assert_eq!(parse_cvss_score("5.5"), Severity::Medium);
        assert_eq!(parse_cvss_score("0.1"), Severity::Low);
        assert_eq!(parse_cvss_score("0.0"), Severity::Unknown);
        assert_eq!(parse_cvss_score("not a number"), Severity::Unknown);
    }

    #[test]
    fn test_parse_cvss_vector() {
        assert_eq!(
            parse_cvss_score("CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:N/A:N"),
            Severity::High
        );
        assert_eq!(
            parse_cvss_score("CVSS:3.1/AV:L/AC:H/PR:L/UI:R/S:U/C:L/I:N/A:N"),
            Severity::Medium
        );
        assert_eq!(
            parse_cvss_score("CVSS:3.1/AV:L/AC:H/PR:H/UI:R/S:U/C:N/I:N/A:N"),
            Severity::Low
        );
    }

    #[tokio::test]
    async fn test_results_follow_request_order() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("POST", "/v1/querybatch")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "results": [
                        {
                            "vulns": [{
                                "id": "GHSA-wq4h-7r42-5hrr",
                                "summary": "Arbitrary code execution in bassmaster",
                                "aliases": ["CVE-2014-7205"],
                                "database_specific": { "severity": "CRITICAL" },
                                "affected": [{
                                    "ranges": [{ "events": [{ "introduced": "0" }, { "fixed": "1.5.2" }] }]
                                }]
                            }]
                        },
                        {}
                    ]
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let deps: DependencySet = vec![
            Dependency::new("bassmaster", "1.0.0"),
            Dependency::new("left-pad", "1.3.0"),
        ]
        .into_iter()
        .collect();

        let vulns = provider(server.url()).query(&deps).await.unwrap();

        mock.assert_async().await;
        assert_eq!(vulns.len(), 1);
        assert_eq!(vulns[0].package, "bassmaster");
        assert_eq!(vulns[0].severity, Severity::Critical);
        assert_eq!(vulns[0].cves, vec!["CVE-2014-7205".to_string()]);
        assert_eq!(vulns[0].fixed_version.as_deref(), Some("1.5.2"));
    }

    #[tokio::test]
    async fn test_bad_request_is_query_failure() {
        let mut server = Server::new_async().await;

        let _mock = server
            .mock("POST", "/v1/querybatch")
            .with_status(400)
            .with_body("invalid query")
            .create_async()
            .await;

        let deps: DependencySet = vec![Dependency::new("hoek", "1.5.2")]
            .into_iter()
            .collect();
        let err = provider(server.url()).query(&deps).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProviderQueryFailed);
    }
}
