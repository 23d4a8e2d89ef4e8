use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::baseline::BaselineComparison;
use crate::maturity::MaturityResult;
use crate::rules::Profile;

/// Finding severity. The derived order is `Low < Medium < High`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

/// Finding categories, matched one-to-one by rule id prefixes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Requirements,
    Architecture,
    Testing,
    Operations,
    Security,
    Performance,
    Reliability,
    Documentation,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Requirements => "requirements",
            Category::Architecture => "architecture",
            Category::Testing => "testing",
            Category::Operations => "operations",
            Category::Security => "security",
            Category::Performance => "performance",
            Category::Reliability => "reliability",
            Category::Documentation => "documentation",
        }
    }
}

/// One line of evidence: a 1-based line number in the scored document and the
/// excerpt found there. Evidence never carries detection patterns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceLine {
    pub line: usize,
    pub excerpt: String,
}

/// Resolved link from a suppressed finding back to the matching rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuppressionRecord {
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<NaiveDate>,
    pub expired: bool,
}

/// A single detected gap. Created by the evaluator; suppression fields are
/// written only by the suppression resolver and the enrichment fields only by
/// the enrichment orchestrator (write-once).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub rule_id: String,
    pub title: String,
    pub severity: Severity,
    pub category: Category,
    pub file: String,
    pub evidence: Vec<EvidenceLine>,
    pub impact: String,
    pub recommendation: String,
    #[serde(default)]
    pub suppressed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suppression: Option<SuppressionRecord>,
    #[serde(default)]
    pub enriched_by_llm: bool,
}

impl Finding {
    pub fn is_active(&self) -> bool {
        !self.suppressed
    }
}

/// Canonical finding order: severity descending, then rule id ascending, then
/// file ascending. Evaluation completion order never leaks into a report.
pub fn sort_findings(findings: &mut [Finding]) {
    findings.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| a.rule_id.cmp(&b.rule_id))
            .then_with(|| a.file.cmp(&b.file))
    });
}

/// Counters recorded by the enrichment orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentStats {
    pub attempted: u32,
    pub succeeded: u32,
    pub failed: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub tool_version: String,
    pub timestamp: String,
    pub input_files: Vec<String>,
    pub profile: Profile,
    pub provider: String,
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrichment: Option<EnrichmentStats>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuppressedSummary {
    pub total: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

/// The complete review report. Field set is additive-only across versions:
/// fields may be added but never removed or renamed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: Metadata,
    pub maturity: MaturityResult,
    pub findings: Vec<Finding>,
    pub risk_score: u8,
    pub risk_explanation: String,
    pub assumptions: Vec<String>,
    pub open_questions: Vec<String>,
    pub quick_summary: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suppressed_summary: Option<SuppressedSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison: Option<BaselineComparison>,
    pub warnings: Vec<String>,
}

/// Everything the assembler merges. All parts are computed upstream; the
/// assembler itself only orders and summarizes.
#[derive(Debug)]
pub struct ReportParts {
    pub metadata: Metadata,
    pub maturity: MaturityResult,
    pub findings: Vec<Finding>,
    pub risk_score: u8,
    pub risk_explanation: String,
    pub assumptions: Vec<String>,
    pub open_questions: Vec<String>,
    pub quick_summary: Vec<String>,
    pub baseline_ref: Option<String>,
    pub comparison: Option<BaselineComparison>,
    pub warnings: Vec<String>,
}

/// Pure merge of pipeline outputs into the canonical report value.
pub fn assemble(parts: ReportParts) -> Report {
    let mut findings = parts.findings;
    sort_findings(&mut findings);
    let suppressed_summary = summarize_suppressed(&findings);
    Report {
        metadata: parts.metadata,
        maturity: parts.maturity,
        findings,
        risk_score: parts.risk_score,
        risk_explanation: parts.risk_explanation,
        assumptions: parts.assumptions,
        open_questions: parts.open_questions,
        quick_summary: parts.quick_summary,
        suppressed_summary,
        baseline_ref: parts.baseline_ref,
        comparison: parts.comparison,
        warnings: parts.warnings,
    }
}

fn summarize_suppressed(findings: &[Finding]) -> Option<SuppressedSummary> {
    let suppressed: Vec<_> = findings.iter().filter(|f| f.suppressed).collect();
    if suppressed.is_empty() {
        return None;
    }
    Some(SuppressedSummary {
        total: suppressed.len(),
        high: suppressed.iter().filter(|f| f.severity == Severity::High).count(),
        medium: suppressed
            .iter()
            .filter(|f| f.severity == Severity::Medium)
            .count(),
        low: suppressed.iter().filter(|f| f.severity == Severity::Low).count(),
    })
}

#[cfg(test)]
pub(crate) fn finding_fixture(rule_id: &str, severity: Severity, category: Category) -> Finding {
    Finding {
        rule_id: rule_id.to_string(),
        title: format!("{rule_id} title"),
        severity,
        category,
        file: "docs/design.md".to_string(),
        evidence: vec![EvidenceLine {
            line: 1,
            excerpt: "# Overview".to_string(),
        }],
        impact: "impact".to_string(),
        recommendation: "recommendation".to_string(),
        suppressed: false,
        suppression: None,
        enriched_by_llm: false,
    }
}
