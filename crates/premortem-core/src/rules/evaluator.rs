use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{debug, instrument, warn};

use super::{catalog, Profile, Rule};
use crate::document::{Document, Section};
use crate::report::{sort_findings, EvidenceLine, Finding};

/// Output of one evaluation pass over a single document.
#[derive(Debug, Default)]
pub struct Evaluation {
    pub findings: Vec<Finding>,
    pub warnings: Vec<String>,
}

/// Run every rule applicable to `profile` against the document.
///
/// Each detector is isolated: one failing rule is skipped with a run-level
/// warning and never aborts the rest of the pass. The finding order is
/// imposed by the canonical sort, not by evaluation order, so the result is
/// identical for the same `(document, profile)` input on every run.
#[instrument(skip(document), fields(path = %document.path, profile = %profile))]
pub fn evaluate(document: &Document, profile: Profile) -> Evaluation {
    let sections = document.sections();
    let mut evaluation = Evaluation::default();

    for rule in catalog().iter().filter(|rule| rule.applies_to(profile)) {
        match run_rule(rule, document, &sections) {
            Ok(Some(evidence)) => {
                evaluation.findings.push(finding_for(rule, document, evidence));
            }
            Ok(None) => {}
            Err(()) => {
                warn!(rule_id = rule.id, "rule evaluation failed; finding omitted");
                evaluation.warnings.push(format!(
                    "rule {} failed while evaluating {}; finding omitted",
                    rule.id, document.path
                ));
            }
        }
    }

    sort_findings(&mut evaluation.findings);
    debug!(
        findings = evaluation.findings.len(),
        warnings = evaluation.warnings.len(),
        "evaluation completed"
    );
    evaluation
}

/// Detectors are plain pure functions; an unexpected panic in one is the
/// only failure mode, caught here so evaluation stays fail-open.
fn run_rule(
    rule: &Rule,
    document: &Document,
    sections: &[Section],
) -> Result<Option<Vec<EvidenceLine>>, ()> {
    catch_unwind(AssertUnwindSafe(|| (rule.detect)(document, sections))).map_err(|_| ())
}

fn finding_for(rule: &Rule, document: &Document, evidence: Vec<EvidenceLine>) -> Finding {
    Finding {
        rule_id: rule.id.to_string(),
        title: rule.title.to_string(),
        severity: rule.severity,
        category: rule.category,
        file: document.path.clone(),
        evidence,
        impact: rule.impact.to_string(),
        recommendation: rule.recommendation.to_string(),
        suppressed: false,
        suppression: None,
        enriched_by_llm: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Severity;

    const COVERED_DOC: &str = "\
# Goals and Scope
Ship a reviewed design.

# Success Metrics
Adoption KPI tracked in the dashboard.

# Error Handling
Retries with backoff, timeouts, fallback to cache.

# Dependencies
Upstream billing integration.

# Data Retention
PII encrypted, 30-day retention.

# Security
Access control via the identity service.

# Testing
Unit and integration test plan, QA validation.

# Rollout
Staged deploy with rollback procedure.

# Ownership
Owner: platform team, on-call rotation, runbook linked.

# Performance
Latency budget and capacity estimates.

# Failure Modes
Graceful degradation, availability target, SLO defined.
";

    #[test]
    fn sparse_document_yields_sorted_findings() {
        let doc = Document::new("docs/notes.md", "# Overview\nWe will build a widget.\n");
        let evaluation = evaluate(&doc, Profile::General);
        assert!(!evaluation.findings.is_empty());
        assert!(evaluation.warnings.is_empty());

        let mut last = (Severity::High, String::new());
        for finding in &evaluation.findings {
            let key = (finding.severity, finding.rule_id.clone());
            assert!(
                key.0 < last.0 || (key.0 == last.0 && key.1 >= last.1) || last.1.is_empty(),
                "findings must be ordered severity desc, rule id asc"
            );
            last = key;
            assert_eq!(finding.file, "docs/notes.md");
        }
    }

    #[test]
    fn covered_document_yields_no_findings() {
        let doc = Document::new("docs/design.md", COVERED_DOC);
        let evaluation = evaluate(&doc, Profile::General);
        let ids: Vec<_> = evaluation
            .findings
            .iter()
            .map(|f| f.rule_id.as_str())
            .collect();
        assert!(ids.is_empty(), "unexpected findings: {ids:?}");
    }

    #[test]
    fn profile_restricts_fired_rules() {
        let doc = Document::new("docs/notes.md", "# Overview\nA widget.\n");
        let security = evaluate(&doc, Profile::Security);
        for finding in &security.findings {
            assert!(
                finding.rule_id.starts_with("REQ-")
                    || finding.rule_id.starts_with("SEC-")
                    || finding.rule_id == "ARCH-003"
                    || finding.rule_id == "OPS-002",
                "rule {} outside security profile",
                finding.rule_id
            );
        }
    }

    #[test]
    fn repeated_evaluation_is_identical() {
        let doc = Document::new("docs/notes.md", "# Overview\nA widget without plans.\n");
        let first = evaluate(&doc, Profile::General);
        let second = evaluate(&doc, Profile::General);
        assert_eq!(first.findings, second.findings);
    }

    #[test]
    fn evidence_lines_reference_the_document() {
        let doc = Document::new("docs/notes.md", "# Overview\nA widget.\n\n# Context\nMore.\n");
        let evaluation = evaluate(&doc, Profile::General);
        for finding in &evaluation.findings {
            for line in &finding.evidence {
                assert!(line.line >= 1 && line.line <= doc.lines.len());
            }
        }
    }
}
