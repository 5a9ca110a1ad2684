use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{btree_set, BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};
use std::path::PathBuf;

/// One installed package instance.
///
/// Two dependencies are the same instance when their name and version are
/// equal. The install path is informational and does not take part in
/// equality, hashing, or ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl Dependency {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            path: None,
        }
    }

    pub fn with_path(mut self, path: PathBuf) -> Self {
        self.path = Some(path);
        self
    }
}

impl PartialEq for Dependency {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.version == other.version
    }
}

impl Eq for Dependency {}

impl Hash for Dependency {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.version.hash(state);
    }
}

impl PartialOrd for Dependency {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Dependency {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| self.version.cmp(&other.version))
    }
}

impl std::fmt::Display for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// The de-duplicated set of dependencies found by a single discovery pass.
///
/// Exact duplicates collapse (the first path seen is kept); different
/// versions of the same name are all retained. Iteration is ordered by
/// name, then version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DependencySet {
    deps: BTreeSet<Dependency>,
}

impl DependencySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a dependency. Returns `false` if the same name and version was
    /// already present, in which case the existing entry is left untouched.
    pub fn insert(&mut self, dep: Dependency) -> bool {
        self.deps.insert(dep)
    }

    pub fn len(&self) -> usize {
        self.deps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deps.is_empty()
    }

    pub fn iter(&self) -> btree_set::Iter<'_, Dependency> {
        self.deps.iter()
    }

    pub fn contains(&self, name: &str, version: &str) -> bool {
        self.deps.contains(&Dependency::new(name, version))
    }

    /// Groups installed versions by package name.
    pub fn versions_by_name(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut grouped: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for dep in &self.deps {
            grouped
                .entry(dep.name.as_str())
                .or_default()
                .push(dep.version.as_str());
        }
        grouped
    }
}

impl FromIterator<Dependency> for DependencySet {
    fn from_iter<I: IntoIterator<Item = Dependency>>(iter: I) -> Self {
        Self {
            deps: iter.into_iter().collect(),
        }
    }
}

impl Extend<Dependency> for DependencySet {
    fn extend<I: IntoIterator<Item = Dependency>>(&mut self, iter: I) {
        for dep in iter {
            self.deps.insert(dep);
        }
    }
}

impl<'a> IntoIterator for &'a DependencySet {
    type Item = &'a Dependency;
    type IntoIter = btree_set::Iter<'a, Dependency>;

    fn into_iter(self) -> Self::IntoIter {
        self.deps.iter()
    }
}

impl IntoIterator for DependencySet {
    type Item = Dependency;
    type IntoIter = btree_set::IntoIter<Dependency>;

    fn into_iter(self) -> Self::IntoIter {
        self.deps.into_iter()
    }
}
