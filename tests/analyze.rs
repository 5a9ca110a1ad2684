//! End-to-end analysis over the on-disk fixture projects, with in-process
//! providers standing in for the remote databases.

use async_trait::async_trait;
use depsentry::discovery::{all_strategies, get_strategy, StrategyKind};
use depsentry::observer::{DiagnosticEvent, RecordingObserver};
use depsentry::{
    Analyzer, DependencySet, DiscoveryStrategy, Error, ErrorKind, Result, Severity,
    Vulnerability, VulnerabilityProvider,
};
use std::path::PathBuf;
use std::sync::Arc;

const KNOWN_VULNERABLE: &[(&str, &str, &str)] = &[
    ("bassmaster", "1.0.0", "CVE-2014-7205"),
    ("hoek", "1.5.2", "CVE-2018-3728"),
];

/// Reports one advisory for every dependency in `KNOWN_VULNERABLE`.
struct KnownAdvisories {
    name: &'static str,
}

#[async_trait]
impl VulnerabilityProvider for KnownAdvisories {
    fn name(&self) -> &str {
        self.name
    }

    async fn query(&self, dependencies: &DependencySet) -> Result<Vec<Vulnerability>> {
        Ok(KNOWN_VULNERABLE
            .iter()
            .filter(|(name, version, _)| dependencies.contains(name, version))
            .map(|(name, version, cve)| {
                Vulnerability::new(self.name, *cve, *name, *version)
                    .with_severity(Severity::High)
                    .with_cves(vec![cve.to_string()])
            })
            .collect())
    }
}

struct Offline;

#[async_trait]
impl VulnerabilityProvider for Offline {
    fn name(&self) -> &str {
        "offline"
    }

    async fn query(&self, _dependencies: &DependencySet) -> Result<Vec<Vulnerability>> {
        Err(Error::unavailable("offline", "connection refused"))
    }
}

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn analyzer() -> Analyzer {
    Analyzer::new(vec![
        Arc::new(KnownAdvisories { name: "alpha" }),
        Arc::new(KnownAdvisories { name: "beta" }),
    ])
    .unwrap()
}

#[tokio::test]
async fn hello_world_has_no_vulnerabilities() {
    let results = analyzer()
        .analyze(fixture("hello-world"), "", &all_strategies())
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    for (provider, vulns) in &results {
        assert!(vulns.is_empty(), "{} reported {:?}", provider, vulns);
    }
}

#[tokio::test]
async fn insecure_project_reports_two_per_provider() {
    let results = analyzer()
        .analyze(fixture("insecure-project"), "", &all_strategies())
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    for vulns in results.values() {
        assert_eq!(vulns.len(), 2);
        let mut packages: Vec<&str> = vulns.iter().map(|v| v.package.as_str()).collect();
        packages.sort_unstable();
        assert_eq!(packages, vec!["bassmaster", "hoek"]);
    }
}

#[tokio::test]
async fn missing_project_fails_after_trying_every_strategy() {
    let observer = Arc::new(RecordingObserver::new());
    let analyzer = analyzer().with_observer(observer.clone());

    let err = analyzer
        .analyze("./does-not-exist", "", &all_strategies())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NoDependenciesFound);
    assert_eq!(
        err.to_string(),
        "could not find any dependencies and all strategies to find them failed"
    );

    let events = observer.events();
    let failed = events
        .iter()
        .filter(|e| matches!(e, DiagnosticEvent::StrategyFailed { .. }))
        .count();
    assert_eq!(failed, 2);
    assert!(!events
        .iter()
        .any(|e| matches!(e, DiagnosticEvent::ProviderStarted { .. })));
}

#[tokio::test]
async fn falls_back_to_lockfile_without_node_modules() {
    let observer = Arc::new(RecordingObserver::new());
    let report = analyzer()
        .with_observer(observer.clone())
        .analyze_with_report(fixture("lockfile-only"), "", &all_strategies())
        .await
        .unwrap();

    assert_eq!(report.dependency_count, 2);
    assert_eq!(report.results["alpha"].len(), 2);

    let selected: Vec<String> = observer
        .events()
        .into_iter()
        .filter_map(|e| match e {
            DiagnosticEvent::StrategySelected { strategy, .. } => Some(strategy),
            _ => None,
        })
        .collect();
    assert_eq!(selected, vec!["package-lock".to_string()]);
}

#[tokio::test]
async fn hint_names_the_lockfile() {
    let strategies: Vec<Box<dyn DiscoveryStrategy>> =
        vec![get_strategy(StrategyKind::PackageLock)];

    let results = analyzer()
        .analyze(fixture("lockfile-only"), "package-lock.json", &strategies)
        .await
        .unwrap();
    assert_eq!(results["beta"].len(), 2);

    let err = analyzer()
        .analyze(fixture("lockfile-only"), "missing-lock.json", &strategies)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoDependenciesFound);
}

#[tokio::test]
async fn failing_provider_is_left_out() {
    let analyzer = Analyzer::new(vec![
        Arc::new(KnownAdvisories { name: "alpha" }),
        Arc::new(Offline),
    ])
    .unwrap();

    let report = analyzer
        .analyze_with_report(fixture("insecure-project"), "", &all_strategies())
        .await
        .unwrap();

    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results["alpha"].len(), 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].provider, "offline");
    assert_eq!(report.failures[0].kind, ErrorKind::ProviderUnavailable);
}

#[tokio::test]
async fn repeated_analysis_gives_same_result() {
    let analyzer = analyzer();
    let first = analyzer
        .analyze(fixture("insecure-project"), "", &all_strategies())
        .await
        .unwrap();
    let second = analyzer
        .analyze(fixture("insecure-project"), "", &all_strategies())
        .await
        .unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn no_providers_yields_empty_result() {
    let results = Analyzer::new(Vec::new())
        .unwrap()
        .analyze(fixture("insecure-project"), "", &all_strategies())
        .await
        .unwrap();
    assert!(results.is_empty());
}
