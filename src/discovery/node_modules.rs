use crate::error::{Error, Result};
use crate::model::{Dependency, DependencySet};
use async_trait::async_trait;
use serde::Deserialize;
use std::ffi::OsStr;
use std::fs;
use std::path::Path;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

const NAME: &str = "node_modules";

/// Walks the installed `node_modules` tree of a project.
///
/// Every package directory (`node_modules/<name>`, `node_modules/@scope/<name>`,
/// and the same under any nested `node_modules`) contributes the `name` and
/// `version` from its own `package.json`. Packages whose metadata is missing
/// or unreadable are skipped.
pub struct NodeModulesWalker;

#[derive(Deserialize)]
struct PackageJson {
    name: Option<String>,
    version: Option<String>,
}

#[async_trait]
impl super::DiscoveryStrategy for NodeModulesWalker {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn discover(&self, project_root: &Path, _hint: Option<&Path>) -> Result<DependencySet> {
        let modules_dir = project_root.join("node_modules");
        if !modules_dir.is_dir() {
            return Err(Error::discovery(
                NAME,
                format!("no node_modules directory in {}", project_root.display()),
            ));
        }

        let mut deps = DependencySet::new();

        let walker = WalkDir::new(&modules_dir)
            .follow_links(false)
            .into_iter()
            .filter_entry(should_visit);

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    debug!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() || entry.file_name() != "package.json" {
                continue;
            }

            let package_dir = match entry.path().parent() {
                Some(dir) if is_package_dir(dir) => dir,
                _ => continue,
            };

            match read_package(entry.path()) {
                Some((name, version)) => {
                    let rel = package_dir
                        .strip_prefix(project_root)
                        .unwrap_or(package_dir)
                        .to_path_buf();
                    deps.insert(Dependency::new(name, version).with_path(rel));
                }
                None => {
                    debug!(
                        "Skipping package without usable metadata: {}",
                        package_dir.display()
                    );
                }
            }
        }

        Ok(deps)
    }
}

fn read_package(manifest: &Path) -> Option<(String, String)> {
    let content = fs::read_to_string(manifest).ok()?;
    let pkg: PackageJson = serde_json::from_str(&content).ok()?;
    let name = pkg.name.filter(|n| !n.is_empty())?;
    let version = pkg.version.filter(|v| !v.is_empty())?;
    Some((name, version))
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(OsStr::to_str)
}

/// `node_modules/<name>` or `node_modules/@scope/<name>`.
fn is_package_dir(dir: &Path) -> bool {
    let name = match file_name(dir) {
        Some(n) => n,
        None => return false,
    };
    if name.starts_with('.') {
        return false;
    }

    let parent = dir.parent();
    let parent_name = parent.and_then(file_name);

    if parent_name == Some("node_modules") {
        return !name.starts_with('@');
    }

    let grandparent_name = parent.and_then(Path::parent).and_then(file_name);
    parent_name.is_some_and(|p| p.starts_with('@')) && grandparent_name == Some("node_modules")
}

/// Prunes the walk to the directories that can hold packages.
fn should_visit(entry: &DirEntry) -> bool {
    if entry.depth() == 0 {
        return true;
    }

    if !entry.file_type().is_dir() {
        return entry.file_name() == "package.json";
    }

    let path = entry.path();
    let name = match file_name(path) {
        Some(n) => n,
        None => return false,
    };

    if name == "node_modules" {
        return path.parent().is_some_and(is_package_dir);
    }

    let parent_is_modules = path.parent().and_then(file_name) == Some("node_modules");
    (parent_is_modules && name.starts_with('@')) || is_package_dir(path)
}
