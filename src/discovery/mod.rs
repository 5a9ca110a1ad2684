//! Dependency discovery.
//!
//! A [`DiscoveryStrategy`] turns a project root into a [`DependencySet`].
//! [`find_dependencies`] runs an ordered list of strategies and keeps the
//! first non-empty result.
//!
//! # Available Strategies
//!
//! | Strategy | Reads | Uses hint |
//! |----------|-------|-----------|
//! | [`NodeModulesWalker`] | `node_modules/**/package.json` | no |
//! | [`PackageLockReader`] | `package-lock.json` / `npm-shrinkwrap.json` | lockfile path |
//!
//! # Example
//!
//! ```no_run
//! use depsentry::discovery::{all_strategies, find_dependencies};
//! use depsentry::observer::TracingObserver;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> depsentry::Result<()> {
//!     let strategies = all_strategies();
//!     let deps = find_dependencies(Path::new("."), None, &strategies, &TracingObserver).await?;
//!     println!("Found {} dependencies", deps.len());
//!     Ok(())
//! }
//! ```

mod node_modules;
mod package_lock;

pub use node_modules::NodeModulesWalker;
pub use package_lock::PackageLockReader;

use crate::error::{Error, Result};
use crate::model::DependencySet;
use crate::observer::{DiagnosticEvent, Observer};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One way of finding the dependencies installed in a project.
#[async_trait]
pub trait DiscoveryStrategy: Send + Sync {
    /// Returns the name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Discovers the dependencies installed under `project_root`.
    ///
    /// `hint` is an optional auxiliary path passed through unchanged from
    /// the caller; strategies that have no use for it ignore it.
    ///
    /// An empty set means the strategy found nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DiscoveryFailed`] when the project does not have the
    /// layout this strategy expects, or it cannot be read.
    async fn discover(&self, project_root: &Path, hint: Option<&Path>) -> Result<DependencySet>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    NodeModules,
    PackageLock,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::NodeModules => "node-modules",
            StrategyKind::PackageLock => "package-lock",
        }
    }
}

impl std::str::FromStr for StrategyKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "node-modules" | "node_modules" => Ok(StrategyKind::NodeModules),
            "package-lock" | "lockfile" => Ok(StrategyKind::PackageLock),
            _ => Err(Error::InvalidInput(format!(
                "unknown discovery strategy: {}. Use: node-modules, package-lock",
                s
            ))),
        }
    }
}

/// Returns every built-in strategy in the default fallback order.
pub fn all_strategies() -> Vec<Box<dyn DiscoveryStrategy>> {
    vec![Box::new(NodeModulesWalker), Box::new(PackageLockReader)]
}

pub fn get_strategy(kind: StrategyKind) -> Box<dyn DiscoveryStrategy> {
    match kind {
        StrategyKind::NodeModules => Box::new(NodeModulesWalker),
        StrategyKind::PackageLock => Box::new(PackageLockReader),
    }
}

/// Runs `strategies` in order and returns the first non-empty result.
///
/// Strategies run one at a time; once one yields dependencies the rest are
/// not attempted. Failures and empty results are reported to `observer` and
/// otherwise swallowed.
///
/// # Errors
///
/// - [`Error::InvalidInput`] if `strategies` is empty.
/// - [`Error::NoDependenciesFound`] if every strategy failed or found nothing.
pub async fn find_dependencies(
    project_root: &Path,
    hint: Option<&Path>,
    strategies: &[Box<dyn DiscoveryStrategy>],
    observer: &dyn Observer,
) -> Result<DependencySet> {
    if strategies.is_empty() {
        return Err(Error::InvalidInput(
            "at least one discovery strategy is required".to_string(),
        ));
    }

    for strategy in strategies {
        let name = strategy.name().to_string();
        observer.on_event(&DiagnosticEvent::StrategyStarted {
            strategy: name.clone(),
        });

        match strategy.discover(project_root, hint).await {
            Ok(deps) if !deps.is_empty() => {
                observer.on_event(&DiagnosticEvent::StrategySelected {
                    strategy: name,
                    dependencies: deps.len(),
                });
                return Ok(deps);
            }
            Ok(_) => {
                observer.on_event(&DiagnosticEvent::StrategyEmpty { strategy: name });
            }
            Err(e) => {
                observer.on_event(&DiagnosticEvent::StrategyFailed {
                    strategy: name,
                    message: e.to_string(),
                });
            }
        }
    }

    Err(Error::NoDependenciesFound)
}
