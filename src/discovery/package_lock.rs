use crate::error::{Error, Result};
use crate::model::{Dependency, DependencySet};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const NAME: &str = "package-lock";

const LOCKFILE_NAMES: [&str; 2] = ["package-lock.json", "npm-shrinkwrap.json"];

/// Reads resolved dependencies from an npm lockfile.
///
/// The hint, when given, names the lockfile to read (relative paths are
/// resolved against the project root). Without a hint the project root is
/// searched for `package-lock.json`, then `npm-shrinkwrap.json`.
pub struct PackageLockReader;

#[derive(Deserialize)]
struct PackageLock {
    #[serde(default)]
    packages: BTreeMap<String, LockPackage>,
    #[serde(default)]
    dependencies: BTreeMap<String, LockDependency>,
}

/// Entry of the lockfile v2/v3 `packages` map.
#[derive(Deserialize)]
struct LockPackage {
    name: Option<String>,
    version: Option<String>,
    #[serde(default)]
    link: bool,
}

/// Entry of the lockfile v1 `dependencies` tree.
#[derive(Deserialize)]
struct LockDependency {
    version: Option<String>,
    #[serde(default)]
    dependencies: BTreeMap<String, LockDependency>,
}

#[async_trait]
impl super::DiscoveryStrategy for PackageLockReader {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn discover(&self, project_root: &Path, hint: Option<&Path>) -> Result<DependencySet> {
        let lockfile = locate_lockfile(project_root, hint)?;
        debug!("Reading lockfile {}", lockfile.display());

        let content = fs::read_to_string(&lockfile).map_err(|e| {
            Error::discovery(NAME, format!("cannot read {}: {}", lockfile.display(), e))
        })?;
        let lock: PackageLock = serde_json::from_str(&content).map_err(|e| {
            Error::discovery(NAME, format!("cannot parse {}: {}", lockfile.display(), e))
        })?;

        let mut deps = DependencySet::new();
        if lock.packages.is_empty() {
            collect_v1(&lock.dependencies, Path::new(""), &mut deps);
        } else {
            collect_packages(&lock.packages, &mut deps);
        }

        Ok(deps)
    }
}

fn locate_lockfile(project_root: &Path, hint: Option<&Path>) -> Result<PathBuf> {
    if let Some(hint) = hint {
        let path = if hint.is_absolute() {
            hint.to_path_buf()
        } else {
            project_root.join(hint)
        };
        return if path.is_file() {
            Ok(path)
        } else {
            Err(Error::discovery(
                NAME,
                format!("lockfile {} does not exist", path.display()),
            ))
        };
    }

    LOCKFILE_NAMES
        .iter()
        .map(|name| project_root.join(name))
        .find(|path| path.is_file())
        .ok_or_else(|| {
            Error::discovery(
                NAME,
                format!("no npm lockfile in {}", project_root.display()),
            )
        })
}

fn collect_packages(packages: &BTreeMap<String, LockPackage>, deps: &mut DependencySet) {
    for (key, pkg) in packages {
        // "" is the project itself; workspace members live outside node_modules.
        let installed_name = match key.rsplit_once("node_modules/") {
            Some((_, name)) if !name.is_empty() => name,
            _ => continue,
        };
        if pkg.link {
            continue;
        }

        let version = match &pkg.version {
            Some(v) if !v.is_empty() => v.clone(),
            _ => {
                debug!("Skipping lockfile entry without version: {}", key);
                continue;
            }
        };
        let name = pkg
            .name
            .clone()
            .unwrap_or_else(|| installed_name.to_string());

        deps.insert(Dependency::new(name, version).with_path(PathBuf::from(key)));
    }
}

fn collect_v1(tree: &BTreeMap<String, LockDependency>, parent: &Path, deps: &mut DependencySet) {
    for (name, dep) in tree {
        let path = parent.join("node_modules").join(name);

        match &dep.version {
            Some(v) if !v.is_empty() && !v.starts_with("file:") => {
                deps.insert(Dependency::new(name, v).with_path(path.clone()));
            }
            _ => debug!("Skipping lockfile entry without registry version: {}", name),
        }

        collect_v1(&dep.dependencies, &path, deps);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::DiscoveryStrategy;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    const LOCK_V3: &str = r#"{
        "name": "insecure-project",
        "lockfileVersion": 3,
        "packages": {
            "": { "name": "insecure-project", "version": "1.0.0" },
            "node_modules/bassmaster": { "version": "1.0.0" },
            "node_modules/bassmaster/node_modules/hoek": { "version": "1.5.2" },
            "node_modules/hoek": { "version": "2.16.3" },
            "node_modules/@hapi/boom": { "version": "9.1.4" },
            "node_modules/linked": { "resolved": "../linked", "link": true },
            "packages/workspace-a": { "name": "workspace-a", "version": "0.1.0" }
        }
    }"#;

    const LOCK_V1: &str = r#"{
        "name": "insecure-project",
        "lockfileVersion": 1,
        "dependencies": {
            "bassmaster": {
                "version": "1.0.0",
                "dependencies": {
                    "hoek": { "version": "1.5.2" }
                }
            },
            "hoek": { "version": "1.5.2" },
            "local": { "version": "file:../local" }
        }
    }"#;

    #[tokio::test]
    async fn test_reads_lockfile_v3() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("package-lock.json"), LOCK_V3).unwrap();

        let deps = PackageLockReader.discover(tmp.path(), None).await.unwrap();

        assert_eq!(deps.len(), 4);
        assert!(deps.contains("bassmaster", "1.0.0"));
        assert!(deps.contains("hoek", "1.5.2"));
        assert!(deps.contains("hoek", "2.16.3"));
        assert!(deps.contains("@hapi/boom", "9.1.4"));
        assert!(!deps.contains("insecure-project", "1.0.0"));
        assert!(!deps.contains("workspace-a", "0.1.0"));
    }

    #[tokio::test]
    async fn test_reads_lockfile_v1() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("package-lock.json"), LOCK_V1).unwrap();

        let deps = PackageLockReader.discover(tmp.path(), None).await.unwrap();

        // hoek@1.5.2 appears twice in the tree and collapses.
        assert_eq!(deps.len(), 2);
        assert!(deps.contains("bassmaster", "1.0.0"));
        assert!(deps.contains("hoek", "1.5.2"));
    }

    #[tokio::test]
    async fn test_falls_back_to_shrinkwrap() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("npm-shrinkwrap.json"), LOCK_V1).unwrap();

        let deps = PackageLockReader.discover(tmp.path(), None).await.unwrap();
        assert!(deps.contains("bassmaster", "1.0.0"));
    }

    #[tokio::test]
    async fn test_hint_selects_lockfile() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("locks")).unwrap();
        fs::write(tmp.path().join("locks/custom.json"), LOCK_V3).unwrap();

        let deps = PackageLockReader
            .discover(tmp.path(), Some(Path::new("locks/custom.json")))
            .await
            .unwrap();
        assert_eq!(deps.len(), 4);

        let err = PackageLockReader
            .discover(tmp.path(), Some(Path::new("locks/missing.json")))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DiscoveryFailed);
    }

    #[tokio::test]
    async fn test_missing_lockfile_fails() {
        let tmp = TempDir::new().unwrap();
        let err = PackageLockReader.discover(tmp.path(), None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DiscoveryFailed);
    }

    #[tokio::test]
    async fn test_malformed_lockfile_fails() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("package-lock.json"), "{ nope").unwrap();

        let err = PackageLockReader.discover(tmp.path(), None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DiscoveryFailed);
    }
}
