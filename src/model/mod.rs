//! Core data types for dependencies, vulnerabilities, and analysis results.
//!
//! - [`Dependency`] - One installed package instance (name + exact version)
//! - [`DependencySet`] - The de-duplicated output of one discovery pass
//! - [`Vulnerability`] - One advisory record reported by one provider
//! - [`AnalysisResult`] - Provider name to that provider's findings
//! - [`AnalysisReport`] - An [`AnalysisResult`] plus run metadata
//!
//! # Example
//!
//! ```
//! use depsentry::{Dependency, DependencySet};
//!
//! let mut deps = DependencySet::new();
//! deps.insert(Dependency::new("hoek", "1.5.2"));
//! deps.insert(Dependency::new("hoek", "1.5.2"));
//! deps.insert(Dependency::new("hoek", "2.16.3"));
//!
//! assert_eq!(deps.len(), 2);
//! ```

mod dependency;
mod report;
mod vulnerability;

pub use dependency::*;
pub use report::*;
pub use vulnerability::*;
