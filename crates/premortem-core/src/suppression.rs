use chrono::NaiveDate;
use tracing::{debug, instrument};

use crate::config::SuppressionRule;
use crate::report::{Finding, SuppressionRecord};
use crate::rules::Profile;

/// Findings with suppression state resolved, plus run-level warnings for
/// expired entries.
#[derive(Debug)]
pub struct SuppressionOutcome {
    pub findings: Vec<Finding>,
    pub warnings: Vec<String>,
}

impl SuppressionOutcome {
    pub fn active(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.is_active())
    }
}

/// Resolve configured suppressions against the findings of one run.
///
/// Entries are checked in configuration order; the first one whose rule id,
/// scope, profile, and severity predicates all pass wins. An entry expired
/// strictly before `today` is reported once as a run-level warning and takes
/// no part in matching, so findings it would have covered stay active and
/// later entries still get their turn. `today` is an explicit input: the
/// resolver itself never consults the wall clock.
#[instrument(skip(findings, suppressions), fields(findings = findings.len(), rules = suppressions.len()))]
pub fn resolve(
    mut findings: Vec<Finding>,
    suppressions: &[SuppressionRule],
    profile: Profile,
    today: NaiveDate,
) -> SuppressionOutcome {
    let mut warnings = Vec::new();
    let mut usable: Vec<&SuppressionRule> = Vec::with_capacity(suppressions.len());
    for rule in suppressions {
        match rule.expires {
            Some(expires) if expires < today => {
                warnings.push(format!(
                    "suppression for {} expired on {}; finding remains active",
                    rule.id, expires
                ));
            }
            _ => usable.push(rule),
        }
    }

    let mut suppressed_count = 0usize;
    for finding in &mut findings {
        if let Some(rule) = first_match(finding, &usable, profile) {
            finding.suppressed = true;
            finding.suppression = Some(SuppressionRecord {
                reason: rule.reason.clone(),
                expires: rule.expires,
                expired: false,
            });
            suppressed_count += 1;
        }
    }

    debug!(suppressed = suppressed_count, expired = warnings.len(), "suppressions resolved");
    SuppressionOutcome { findings, warnings }
}

fn first_match<'a>(
    finding: &Finding,
    rules: &[&'a SuppressionRule],
    profile: Profile,
) -> Option<&'a SuppressionRule> {
    rules
        .iter()
        .copied()
        .find(|rule| matches(finding, rule, profile))
}

/// All predicates must pass; an unset predicate passes by definition.
fn matches(finding: &Finding, rule: &SuppressionRule, profile: Profile) -> bool {
    if finding.rule_id != rule.id {
        return false;
    }
    if let Some(profiles) = &rule.profiles {
        if !profiles.contains(&profile) {
            return false;
        }
    }
    if let Some(severities) = &rule.severities {
        if !severities.contains(&finding.severity) {
            return false;
        }
    }
    rule.matches_path(&finding.file)
}
