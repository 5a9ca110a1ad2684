//! The analysis entry point: discovery followed by a concurrent lookup.
//!
//! # Example
//!
//! ```no_run
//! use depsentry::discovery::all_strategies;
//!
//! #[tokio::main]
//! async fn main() -> depsentry::Result<()> {
//!     let results = depsentry::analyze("path/to/project", "", &all_strategies()).await?;
//!     for (provider, vulns) in &results {
//!         println!("{}: {} vulnerabilities", provider, vulns.len());
//!     }
//!     Ok(())
//! }
//! ```

use crate::config::Config;
use crate::discovery::{find_dependencies, DiscoveryStrategy};
use crate::error::{Error, Result};
use crate::model::{AnalysisReport, AnalysisResult};
use crate::observer::{Observer, TracingObserver};
use crate::provider::{configured_providers, lookup_all, VulnerabilityProvider};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(60);

pub struct Analyzer {
    providers: Vec<Arc<dyn VulnerabilityProvider>>,
    provider_timeout: Duration,
    observer: Arc<dyn Observer>,
}

impl Analyzer {
    /// Creates an analyzer over an explicit provider list.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] if two providers share a name, since results
    /// are keyed by provider name.
    pub fn new(providers: Vec<Arc<dyn VulnerabilityProvider>>) -> Result<Self> {
        let mut names = HashSet::new();
        for provider in &providers {
            if !names.insert(provider.name().to_string()) {
                return Err(Error::InvalidInput(format!(
                    "provider {} configured more than once",
                    provider.name()
                )));
            }
        }

        Ok(Self {
            providers,
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
            observer: Arc::new(TracingObserver),
        })
    }

    /// Creates an analyzer with the providers and timeouts from `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(configured_providers(config)?)?.with_timeout(config.provider_timeout()))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Finds the dependencies under `project_root` and looks them up with
    /// every provider.
    ///
    /// `hint` is passed to the strategies unchanged; an empty string means
    /// no hint. Providers that fail are missing from the returned mapping.
    ///
    /// # Errors
    ///
    /// Fails only when discovery fails: [`Error::NoDependenciesFound`] when
    /// no strategy found anything, [`Error::InvalidInput`] when
    /// `strategies` is empty.
    pub async fn analyze(
        &self,
        project_root: impl AsRef<Path>,
        hint: &str,
        strategies: &[Box<dyn DiscoveryStrategy>],
    ) -> Result<AnalysisResult> {
        Ok(self
            .analyze_with_report(project_root, hint, strategies)
            .await?
            .results)
    }

    /// Like [`analyze`](Self::analyze), also returning which providers
    /// failed and why.
    pub async fn analyze_with_report(
        &self,
        project_root: impl AsRef<Path>,
        hint: &str,
        strategies: &[Box<dyn DiscoveryStrategy>],
    ) -> Result<AnalysisReport> {
        let project_root = project_root.as_ref();
        let hint = if hint.is_empty() {
            None
        } else {
            Some(Path::new(hint))
        };

        let dependencies =
            find_dependencies(project_root, hint, strategies, self.observer.as_ref()).await?;

        let mut report = AnalysisReport::new(project_root.to_path_buf(), dependencies.len());
        let outcome = lookup_all(
            Arc::new(dependencies),
            &self.providers,
            self.provider_timeout,
            self.observer.as_ref(),
        )
        .await;

        report.results = outcome.results;
        report.failures = outcome.failures;
        Ok(report)
    }
}

/// Analyzes `project_root` with the default configuration's providers.
pub async fn analyze(
    project_root: impl AsRef<Path>,
    hint: &str,
    strategies: &[Box<dyn DiscoveryStrategy>],
) -> Result<AnalysisResult> {
    Analyzer::from_config(&Config::default())?
        .analyze(project_root, hint, strategies)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::NodeModulesWalker;
    use crate::error::ErrorKind;
    use crate::model::{DependencySet, Vulnerability};
    use async_trait::async_trait;

    struct Named(&'static str);

    #[async_trait]
    impl VulnerabilityProvider for Named {
        fn name(&self) -> &str {
            self.0
        }

        async fn query(&self, _deps: &DependencySet) -> Result<Vec<Vulnerability>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_duplicate_provider_names_rejected() {
        let providers: Vec<Arc<dyn VulnerabilityProvider>> =
            vec![Arc::new(Named("same")), Arc::new(Named("same"))];
        let err = Analyzer::new(providers).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_from_config_uses_configured_providers() {
        let analyzer = Analyzer::from_config(&Config::default()).unwrap();
        assert_eq!(analyzer.provider_names(), vec!["OSS Index", "npm Advisories"]);
    }

    #[tokio::test]
    async fn test_missing_project_fails_with_fixed_message() {
        let analyzer = Analyzer::new(vec![Arc::new(Named("noop"))]).unwrap();
        let strategies: Vec<Box<dyn DiscoveryStrategy>> = vec![Box::new(NodeModulesWalker)];

        let err = analyzer
            .analyze("./does-not-exist", "", &strategies)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NoDependenciesFound);
        assert_eq!(
            err.to_string(),
            "could not find any dependencies and all strategies to find them failed"
        );
    }

    #[tokio::test]
    async fn test_empty_strategy_list_is_invalid_input() {
        let analyzer = Analyzer::new(Vec::new()).unwrap();
        let err = analyzer.analyze(".", "", &[]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
