use std::fmt::Write;
use std::time::Duration;

use colored::Colorize;
use premortem_core::baseline::DeltaStatus;
use premortem_core::report::{Finding, Report, Severity};

/// Format styles supported by the CLI.
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Display-only filters. They shape what is printed from the finished
/// report and never trigger recomputation.
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub no_color: bool,
    pub show_evidence: bool,
    pub show_suppressed: bool,
    pub severity_threshold: Severity,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            no_color: false,
            show_evidence: false,
            show_suppressed: false,
            severity_threshold: Severity::Low,
        }
    }
}

pub fn render(report: &Report, format: OutputFormat, options: &RenderOptions) -> anyhow::Result<String> {
    match format {
        OutputFormat::Text => render_text(report, options),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
    }
}

fn severity_tag(severity: Severity, no_color: bool) -> String {
    let tag = match severity {
        Severity::High => "HIGH",
        Severity::Medium => "MED ",
        Severity::Low => "LOW ",
    };
    if no_color {
        return tag.to_string();
    }
    match severity {
        Severity::High => tag.red().bold().to_string(),
        Severity::Medium => tag.yellow().to_string(),
        Severity::Low => tag.dimmed().to_string(),
    }
}

fn render_text(report: &Report, options: &RenderOptions) -> anyhow::Result<String> {
    let mut out = String::new();

    writeln!(
        out,
        "Premortem review • profile {} • {} file(s)",
        report.metadata.profile,
        report.metadata.input_files.len()
    )?;
    writeln!(
        out,
        "Maturity: {} (score {}, confidence {:?})",
        report.maturity.band.as_str(),
        report.maturity.score,
        report.maturity.confidence
    )?;
    writeln!(out, "Risk Score: {}/100", report.risk_score)?;
    writeln!(out, "{}", report.risk_explanation)?;
    writeln!(out)?;

    let visible: Vec<&Finding> = report
        .findings
        .iter()
        .filter(|f| f.severity >= options.severity_threshold)
        .filter(|f| f.is_active() || options.show_suppressed)
        .collect();

    if visible.is_empty() {
        writeln!(out, "No findings to display.")?;
    } else {
        writeln!(out, "Findings:")?;
        for finding in visible {
            let mut line = format!(
                "  [{}] {} {} ({}) :: {}",
                severity_tag(finding.severity, options.no_color),
                finding.rule_id,
                finding.title,
                finding.category.as_str(),
                finding.file,
            );
            if finding.suppressed {
                line.push_str(" [suppressed]");
            }
            if finding.enriched_by_llm {
                line.push_str(" [llm]");
            }
            writeln!(out, "{line}")?;
            if let Some(record) = finding.suppression.as_ref().filter(|_| finding.suppressed) {
                writeln!(out, "      reason: {}", record.reason)?;
            }
            if options.show_evidence {
                for evidence in &finding.evidence {
                    writeln!(out, "      L{}: {}", evidence.line, evidence.excerpt)?;
                }
                writeln!(out, "      Impact: {}", finding.impact)?;
                writeln!(out, "      Recommendation: {}", finding.recommendation)?;
            }
        }
    }

    if let Some(summary) = &report.suppressed_summary {
        writeln!(
            out,
            "\nSuppressed: {} finding(s) (high {}, medium {}, low {})",
            summary.total, summary.high, summary.medium, summary.low
        )?;
    }

    if let Some(comparison) = &report.comparison {
        writeln!(
            out,
            "\nBaseline {} ({}): {} finding(s), risk {}, maturity {}",
            comparison.summary.git_ref,
            comparison.summary.commit,
            comparison.summary.findings_count,
            comparison.summary.risk_score,
            comparison.summary.maturity_score
        )?;
        let surfaced: Vec<_> = comparison.surfaced().collect();
        if surfaced.is_empty() {
            writeln!(out, "  No new or worsened findings against the baseline.")?;
        }
        for delta in surfaced {
            let status = match delta.status {
                DeltaStatus::New => "new",
                DeltaStatus::Worsened => "worsened",
                DeltaStatus::Unchanged => "unchanged",
                DeltaStatus::Improved => "improved",
                DeltaStatus::Resolved => "resolved",
            };
            writeln!(
                out,
                "  {} {} ({}) :: {}",
                status.to_uppercase(),
                delta.rule_id,
                delta.category.as_str(),
                delta.file
            )?;
        }
    }

    if !report.quick_summary.is_empty() {
        writeln!(out, "\nSummary:")?;
        for line in &report.quick_summary {
            writeln!(out, "  - {line}")?;
        }
    }

    if !report.warnings.is_empty() {
        writeln!(out, "\nWarnings:")?;
        for warning in &report.warnings {
            writeln!(out, "  - {warning}")?;
        }
    }

    writeln!(
        out,
        "\nElapsed: {}",
        humantime::format_duration(Duration::from_millis(report.metadata.elapsed_ms))
    )?;

    Ok(out)
}
