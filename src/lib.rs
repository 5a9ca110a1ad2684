//! Finds the dependencies of a JavaScript project and checks them against
//! several vulnerability databases at once.
//!
//! Discovery tries a list of [`DiscoveryStrategy`] implementations in order
//! and keeps the first non-empty result. The dependency set is then handed
//! to every [`VulnerabilityProvider`] concurrently; a provider that fails is
//! left out of the result instead of failing the analysis.

pub mod analyzer;
pub mod config;
pub mod discovery;
pub mod error;
pub mod model;
pub mod observer;
pub mod output;
pub mod provider;

pub use analyzer::{analyze, Analyzer};
pub use config::Config;
pub use discovery::DiscoveryStrategy;
pub use error::{Error, ErrorKind, Result};
pub use model::{
    AnalysisReport, AnalysisResult, Dependency, DependencySet, Severity, Vulnerability,
};
pub use provider::VulnerabilityProvider;
