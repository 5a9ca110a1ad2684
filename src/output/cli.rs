use crate::model::{AnalysisReport, Severity, Vulnerability};
use anyhow::Result;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct VulnRow {
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Package")]
    package: String,
    #[tabled(rename = "Advisory")]
    advisory: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Fixed In")]
    fixed_in: String,
}

#[derive(Tabled)]
struct FailureRow {
    #[tabled(rename = "Provider")]
    provider: String,
    #[tabled(rename = "Reason")]
    reason: String,
}

pub fn print_cli_table(report: &AnalysisReport) -> Result<()> {
    println!();
    println!(
        "Analysis of {} completed at: {}",
        report.project.display(),
        report.scan_time.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("Dependencies analyzed: {}", report.dependency_count);

    for provider in report.provider_names() {
        let vulns = &report.results[provider];
        println!();

        if vulns.is_empty() {
            println!("{}: no vulnerabilities found.", provider);
            continue;
        }

        println!("{}: {} vulnerabilities", provider, vulns.len());
        println!();

        let mut sorted: Vec<&Vulnerability> = vulns.iter().collect();
        sorted.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| a.package.cmp(&b.package))
        });

        let rows: Vec<VulnRow> = sorted
            .iter()
            .map(|v| VulnRow {
                severity: format_severity(&v.severity),
                package: format!("{}@{}", v.package, v.version),
                advisory: advisory_label(v),
                title: truncate(&v.title, 50),
                fixed_in: v.fixed_version.clone().unwrap_or_else(|| "-".to_string()),
            })
            .collect();

        let table = Table::new(rows).with(Style::rounded()).to_string();
        println!("{}", table);
    }

    if !report.failures.is_empty() {
        println!();
        println!("{} provider(s) could not be queried:", report.failures.len());
        println!();

        let rows: Vec<FailureRow> = report
            .failures
            .iter()
            .map(|f| FailureRow {
                provider: f.provider.clone(),
                reason: truncate(&f.message, 70),
            })
            .collect();

        let table = Table::new(rows).with(Style::rounded()).to_string();
        println!("{}", table);
    }

    println!();
    print_summary(report);

    Ok(())
}

fn advisory_label(v: &Vulnerability) -> String {
    match v.cves.first() {
        Some(cve) if *cve != v.advisory_id => format!("{} ({})", v.advisory_id, cve),
        _ => v.advisory_id.clone(),
    }
}

fn format_severity(severity: &Severity) -> String {
    match severity {
        Severity::Critical => "\x1b[31mCRITICAL\x1b[0m".to_string(),
        Severity::High => "\x1b[91mHIGH\x1b[0m".to_string(),
        Severity::Medium => "\x1b[33mMEDIUM\x1b[0m".to_string(),
        Severity::Low => "\x1b[32mLOW\x1b[0m".to_string(),
        Severity::Unknown => "UNKNOWN".to_string(),
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}

fn print_summary(report: &AnalysisReport) {
    let count = |severity: Severity| {
        report
            .results
            .values()
            .flatten()
            .filter(|v| v.severity == severity)
            .count()
    };

    println!("Summary:");
    println!(
        "  Providers: {} succeeded, {} failed",
        report.results.len(),
        report.failures.len()
    );
    println!(
        "  Vulnerabilities: {} total ({} critical, {} high, {} medium, {} low)",
        report.total_vulnerabilities(),
        count(Severity::Critical),
        count(Severity::High),
        count(Severity::Medium),
        count(Severity::Low)
    );
}
