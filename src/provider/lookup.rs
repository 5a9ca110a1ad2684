use super::VulnerabilityProvider;
use crate::error::Error;
use crate::model::{AnalysisResult, DependencySet, ProviderFailure};
use crate::observer::{DiagnosticEvent, Observer};
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What a lookup produced: findings from providers that succeeded, and the
/// reasons the others did not.
#[derive(Debug, Default)]
pub struct LookupOutcome {
    pub results: AnalysisResult,
    pub failures: Vec<ProviderFailure>,
}

/// Queries every provider concurrently with the same dependency set.
///
/// Each provider runs in its own task, bounded by `timeout`, and all tasks
/// are awaited before this returns. A provider that errors, times out, or
/// panics is left out of `results` and listed in `failures`; it never
/// affects the other providers. An empty provider list yields an empty
/// outcome.
pub async fn lookup_all(
    dependencies: Arc<DependencySet>,
    providers: &[Arc<dyn VulnerabilityProvider>],
    timeout: Duration,
    observer: &dyn Observer,
) -> LookupOutcome {
    let mut names = Vec::with_capacity(providers.len());
    let mut tasks = Vec::with_capacity(providers.len());

    for provider in providers {
        let name = provider.name().to_string();
        observer.on_event(&DiagnosticEvent::ProviderStarted {
            provider: name.clone(),
        });

        let provider = Arc::clone(provider);
        let deps = Arc::clone(&dependencies);
        tasks.push(tokio::spawn(async move {
            let started = Instant::now();
            let result = match tokio::time::timeout(timeout, provider.query(&deps)).await {
                Ok(result) => result,
                Err(_) => Err(Error::unavailable(
                    provider.name(),
                    format!("no response within {:?}", timeout),
                )),
            };
            (result, started.elapsed())
        }));
        names.push(name);
    }

    let finished = join_all(tasks).await;

    let mut outcome = LookupOutcome::default();
    for (name, joined) in names.into_iter().zip(finished) {
        let error = match joined {
            Ok((Ok(vulnerabilities), elapsed)) => {
                observer.on_event(&DiagnosticEvent::ProviderCompleted {
                    provider: name.clone(),
                    vulnerabilities: vulnerabilities.len(),
                    elapsed,
                });
                outcome.results.insert(name, vulnerabilities);
                continue;
            }
            Ok((Err(e), _)) => e,
            Err(join_error) => {
                Error::query_failed(name.as_str(), format!("provider task aborted: {}", join_error))
            }
        };

        observer.on_event(&DiagnosticEvent::ProviderFailed {
            provider: name.clone(),
            kind: error.kind(),
            message: error.to_string(),
        });
        outcome.failures.push(ProviderFailure::new(name, &error));
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, Result};
    use crate::model::{Dependency, Vulnerability};
    use crate::observer::{NullObserver, RecordingObserver};
    use async_trait::async_trait;

    struct FakeProvider {
        name: &'static str,
        delay: Duration,
        outcome: fn(&str, &DependencySet) -> Result<Vec<Vulnerability>>,
    }

    #[async_trait]
    impl VulnerabilityProvider for FakeProvider {
        fn name(&self) -> &str {
            self.name
        }

        async fn query(&self, dependencies: &DependencySet) -> Result<Vec<Vulnerability>> {
            tokio::time::sleep(self.delay).await;
            (self.outcome)(self.name, dependencies)
        }
    }

    fn one_per_dependency(name: &str, deps: &DependencySet) -> Result<Vec<Vulnerability>> {
        Ok(deps
            .iter()
            .map(|d| Vulnerability::new(name, format!("{}-1", d.name), &d.name, &d.version))
            .collect())
    }

    fn unavailable(name: &str, _deps: &DependencySet) -> Result<Vec<Vulnerability>> {
        Err(Error::unavailable(name, "connection refused"))
    }

    fn panics(_name: &str, _deps: &DependencySet) -> Result<Vec<Vulnerability>> {
        panic!("provider bug")
    }

    fn fake(
        name: &'static str,
        delay_ms: u64,
        outcome: fn(&str, &DependencySet) -> Result<Vec<Vulnerability>>,
    ) -> Arc<dyn VulnerabilityProvider> {
        Arc::new(FakeProvider {
            name,
            delay: Duration::from_millis(delay_ms),
            outcome,
        })
    }

    fn deps() -> Arc<DependencySet> {
        Arc::new(
            vec![
                Dependency::new("bassmaster", "1.0.0"),
                Dependency::new("hoek", "1.5.2"),
            ]
            .into_iter()
            .collect(),
        )
    }

    #[tokio::test]
    async fn test_failed_provider_does_not_affect_others() {
        let providers = vec![
            fake("alpha", 0, one_per_dependency),
            fake("broken", 0, unavailable),
            fake("beta", 20, one_per_dependency),
        ];

        let observer = RecordingObserver::new();
        let outcome = lookup_all(deps(), &providers, Duration::from_secs(5), &observer).await;

        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.results["alpha"].len(), 2);
        assert_eq!(outcome.results["beta"].len(), 2);
        assert!(!outcome.results.contains_key("broken"));

        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].provider, "broken");
        assert_eq!(outcome.failures[0].kind, ErrorKind::ProviderUnavailable);

        let failed_events = observer
            .events()
            .into_iter()
            .filter(|e| matches!(e, DiagnosticEvent::ProviderFailed { .. }))
            .count();
        assert_eq!(failed_events, 1);
    }

    #[tokio::test]
    async fn test_slow_provider_times_out_alone() {
        let providers = vec![
            fake("fast", 0, one_per_dependency),
            fake("slow", 5_000, one_per_dependency),
        ];

        let outcome = lookup_all(deps(), &providers, Duration::from_millis(100), &NullObserver).await;

        assert!(outcome.results.contains_key("fast"));
        assert!(!outcome.results.contains_key("slow"));
        assert_eq!(outcome.failures[0].provider, "slow");
        assert_eq!(outcome.failures[0].kind, ErrorKind::ProviderUnavailable);
    }

    #[tokio::test]
    async fn test_panicking_provider_is_contained() {
        let providers = vec![fake("ok", 0, one_per_dependency), fake("bug", 0, panics)];

        let outcome = lookup_all(deps(), &providers, Duration::from_secs(5), &NullObserver).await;

        assert!(outcome.results.contains_key("ok"));
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].provider, "bug");
    }

    #[tokio::test]
    async fn test_providers_run_concurrently() {
        let providers = vec![
            fake("a", 200, one_per_dependency),
            fake("b", 200, one_per_dependency),
            fake("c", 200, one_per_dependency),
        ];

        let started = Instant::now();
        let outcome = lookup_all(deps(), &providers, Duration::from_secs(5), &NullObserver).await;

        assert_eq!(outcome.results.len(), 3);
        assert!(started.elapsed() < Duration::from_millis(550));
    }

    #[tokio::test]
    async fn test_no_providers_is_empty() {
        let outcome = lookup_all(deps(), &[], Duration::from_secs(5), &NullObserver).await;
        assert!(outcome.results.is_empty());
        assert!(outcome.failures.is_empty());
    }
}
