use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::report::{Category, Finding, Severity};

/// Classification of a finding relative to the baseline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaStatus {
    New,
    Worsened,
    Unchanged,
    Improved,
    Resolved,
}

/// One joined entry of the baseline comparison. Identity across runs is
/// (rule id, category), scoped per file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingDelta {
    pub rule_id: String,
    pub category: Category,
    pub file: String,
    pub status: DeltaStatus,
    /// Current severity; absent for resolved findings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    /// Severity at the baseline; absent for new findings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_severity: Option<Severity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineSummary {
    pub git_ref: String,
    pub commit: String,
    pub findings_count: usize,
    pub risk_score: u8,
    pub maturity_score: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineComparison {
    pub summary: BaselineSummary,
    pub deltas: Vec<FindingDelta>,
    pub maturity_regressed: bool,
}

impl BaselineComparison {
    /// The deltas surfaced by default output and `--fail-on` gating. The
    /// other classes stay in the structured report but never gate.
    pub fn surfaced(&self) -> impl Iterator<Item = &FindingDelta> {
        self.deltas
            .iter()
            .filter(|delta| matches!(delta.status, DeltaStatus::New | DeltaStatus::Worsened))
    }
}

type Key = (String, String, Category);

fn keyed(findings: &[Finding]) -> BTreeMap<Key, Severity> {
    findings
        .iter()
        .filter(|finding| finding.is_active())
        .map(|finding| {
            (
                (finding.file.clone(), finding.rule_id.clone(), finding.category),
                finding.severity,
            )
        })
        .collect()
}

/// Join current active findings against baseline active findings and
/// classify each key. Both sides are post-suppression; a file absent from
/// the baseline simply contributes no baseline keys, so all of its current
/// findings come out `New`.
#[instrument(skip(current, baseline), fields(current = current.len(), baseline = baseline.len()))]
pub fn compare(current: &[Finding], baseline: &[Finding]) -> Vec<FindingDelta> {
    let current_map = keyed(current);
    let baseline_map = keyed(baseline);

    let mut deltas = Vec::new();

    for ((file, rule_id, category), severity) in &current_map {
        let key = (file.clone(), rule_id.clone(), *category);
        let status = match baseline_map.get(&key) {
            None => DeltaStatus::New,
            Some(baseline_severity) => {
                if severity > baseline_severity {
                    DeltaStatus::Worsened
                } else if severity < baseline_severity {
                    DeltaStatus::Improved
                } else {
                    DeltaStatus::Unchanged
                }
            }
        };
        deltas.push(FindingDelta {
            rule_id: rule_id.clone(),
            category: *category,
            file: file.clone(),
            status,
            severity: Some(*severity),
            baseline_severity: baseline_map.get(&key).copied(),
        });
    }

    for ((file, rule_id, category), severity) in &baseline_map {
        if !current_map.contains_key(&(file.clone(), rule_id.clone(), *category)) {
            deltas.push(FindingDelta {
                rule_id: rule_id.clone(),
                category: *category,
                file: file.clone(),
                status: DeltaStatus::Resolved,
                severity: None,
                baseline_severity: Some(*severity),
            });
        }
    }

    // BTreeMap iteration already yields (file, rule id) order per side;
    // merge the resolved tail into one deterministic ordering.
    deltas.sort_by(|a, b| a.file.cmp(&b.file).then_with(|| a.rule_id.cmp(&b.rule_id)));
    debug!(deltas = deltas.len(), "baseline comparison complete");
    deltas
}

/// Maturity regression is a standalone warning signal; it never feeds into
/// delta classification or the risk score.
pub fn maturity_regressed(current_score: u8, baseline_score: u8) -> bool {
    current_score < baseline_score
}
