use super::{Severity, Vulnerability};
use crate::error::{Error, ErrorKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Provider name to the vulnerabilities that provider reported.
///
/// Only providers that completed successfully have a key. Iteration order
/// is unspecified.
pub type AnalysisResult = HashMap<String, Vec<Vulnerability>>;

/// A provider that did not produce a result, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderFailure {
    pub provider: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl ProviderFailure {
    pub fn new(provider: impl Into<String>, error: &Error) -> Self {
        Self {
            provider: provider.into(),
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Everything one analysis run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub scan_time: DateTime<Utc>,
    pub project: PathBuf,
    pub dependency_count: usize,
    pub results: AnalysisResult,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<ProviderFailure>,
}

impl AnalysisReport {
    pub fn new(project: PathBuf, dependency_count: usize) -> Self {
        Self {
            scan_time: Utc::now(),
            project,
            dependency_count,
            results: AnalysisResult::new(),
            failures: Vec::new(),
        }
    }

    pub fn total_vulnerabilities(&self) -> usize {
        self.results.values().map(Vec::len).sum()
    }

    /// The most severe finding across all providers, if any.
    pub fn highest_severity(&self) -> Option<Severity> {
        self.results
            .values()
            .flatten()
            .map(|v| v.severity)
            .max()
    }

    /// Provider names in a stable order, for rendering.
    pub fn provider_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.results.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
