//! npm version range matching on top of `semver`.
//!
//! npm ranges differ from Cargo requirements in a few ways: comparators are
//! separated by whitespace instead of commas, alternatives are joined with
//! `||`, hyphen ranges (`1.2.3 - 2.0.0`) exist, and a bare version means an
//! exact match rather than a caret requirement.

use semver::{Version, VersionReq};

const OPERATORS: [&str; 7] = [">=", "<=", ">", "<", "=", "^", "~"];

#[derive(Debug, Clone)]
pub struct NpmRange {
    alternatives: Vec<VersionReq>,
}

impl NpmRange {
    /// Parses an npm range. Returns `None` if any alternative cannot be
    /// expressed as a semver requirement.
    pub fn parse(range: &str) -> Option<Self> {
        let alternatives = range
            .split("||")
            .map(|alt| VersionReq::parse(&to_cargo_syntax(alt)).ok())
            .collect::<Option<Vec<_>>>()?;
        Some(Self { alternatives })
    }

    /// Whether `version` falls inside the range. Versions that are not valid
    /// semver never match.
    pub fn matches(&self, version: &str) -> bool {
        let version = match Version::parse(version.trim().trim_start_matches('v')) {
            Ok(v) => v,
            Err(_) => return false,
        };
        self.alternatives.iter().any(|req| req.matches(&version))
    }
}

fn to_cargo_syntax(alternative: &str) -> String {
    let tokens = merge_operators(alternative.split_whitespace());

    if tokens.is_empty() {
        return "*".to_string();
    }

    if tokens.len() == 3 && tokens[1] == "-" {
        return format!(
            ">={}, <={}",
            strip_v(&tokens[0]),
            strip_v(&tokens[2])
        );
    }

    tokens
        .iter()
        .map(|t| normalize_comparator(t))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Glues a lone operator to the version that follows it (`>= 1.2.0`).
fn merge_operators<'a>(tokens: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut merged: Vec<String> = Vec::new();
    let mut pending: Option<&str> = None;

    for token in tokens {
        if let Some(op) = pending.take() {
            merged.push(format!("{}{}", op, token));
        } else if OPERATORS.contains(&token) {
            pending = Some(token);
        } else {
            merged.push(token.to_string());
        }
    }
    if let Some(op) = pending {
        merged.push(op.to_string());
    }

    merged
}

fn normalize_comparator(comparator: &str) -> String {
    let op_len = comparator
        .find(|c: char| c.is_ascii_alphanumeric() || c == '*')
        .unwrap_or(comparator.len());
    let (op, version) = comparator.split_at(op_len);
    let version = strip_v(version);

    if op.is_empty() {
        let is_wildcard = version == "*"
            || version
                .split('.')
                .any(|part| part == "x" || part == "X" || part == "*");
        if is_wildcard {
            return version.to_string();
        }
        return format!("={}", version);
    }

    format!("{}{}", op, version)
}

fn strip_v(version: &str) -> &str {
    version.strip_prefix('v').unwrap_or(version)
}
