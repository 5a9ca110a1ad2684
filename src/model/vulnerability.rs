use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Unknown,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Unknown => "unknown",
        }
    }

    /// Maps a numeric CVSS base score onto a severity band.
    pub fn from_cvss_score(score: f32) -> Self {
        match score {
            s if s >= 9.0 => Severity::Critical,
            s if s >= 7.0 => Severity::High,
            s if s >= 4.0 => Severity::Medium,
            s if s > 0.0 => Severity::Low,
            _ => Severity::Unknown,
        }
    }

    /// Parses a textual severity label. npm uses "moderate" for medium.
    pub fn from_label(label: &str) -> Self {
        match label.to_ascii_lowercase().as_str() {
            "critical" => Severity::Critical,
            "high" => Severity::High,
            "moderate" | "medium" => Severity::Medium,
            "low" | "info" => Severity::Low,
            _ => Severity::Unknown,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One advisory record as reported by one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vulnerability {
    /// Provider specific identifier (OSS Index id, npm advisory number, GHSA, ...).
    pub advisory_id: String,
    /// Name of the provider that produced this record.
    pub source: String,
    pub package: String,
    /// The installed version that matched the advisory.
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vulnerable_versions: Option<String>,
    pub severity: Severity,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cves: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_url: Option<String>,
}

impl Vulnerability {
    pub fn new(
        source: impl Into<String>,
        advisory_id: impl Into<String>,
        package: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            advisory_id: advisory_id.into(),
            source: source.into(),
            package: package.into(),
            version: version.into(),
            vulnerable_versions: None,
            severity: Severity::Unknown,
            title: "Unknown vulnerability".to_string(),
            description: None,
            cves: Vec::new(),
            fixed_version: None,
            reference_url: None,
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn with_vulnerable_versions(mut self, range: Option<String>) -> Self {
        self.vulnerable_versions = range;
        self
    }

    pub fn with_cves(mut self, cves: Vec<String>) -> Self {
        self.cves = cves;
        self
    }

    pub fn with_fixed_version(mut self, fixed: Option<String>) -> Self {
        self.fixed_version = fixed;
        self
    }

    pub fn with_reference_url(mut self, url: Option<String>) -> Self {
        self.reference_url = url;
        self
    }
}
