use std::collections::BTreeMap;

use tracing::{debug, instrument};

use crate::report::{Category, Finding, Severity};

/// Base contribution per severity, before category weighting.
pub const HIGH_POINTS: f64 = 15.0;
pub const MEDIUM_POINTS: f64 = 7.0;
pub const LOW_POINTS: f64 = 3.0;

/// Shape parameter of the normalization curve; raw weighted points at which
/// the score reaches ~63 of 100.
const CURVE_SCALE: f64 = 60.0;

fn severity_points(severity: Severity) -> f64 {
    match severity {
        Severity::High => HIGH_POINTS,
        Severity::Medium => MEDIUM_POINTS,
        Severity::Low => LOW_POINTS,
    }
}

/// Compute the overall risk score from the active (non-suppressed) findings.
///
/// This is a pure function of its arguments: maturity, enrichment state, and
/// time never feed into it. Each active finding contributes
/// `severity points x category weight` (weight defaults to 1.0). The raw sum
/// is normalized into [0, 100] by the saturating curve
///
/// ```text
/// score = round(100 * (1 - exp(-raw / 60)))
/// ```
///
/// which is strictly monotonic in every contribution and has diminishing
/// returns: each additional point moves the score less than the previous
/// one, so a pile of Low findings (3 points each) approaches the ceiling far
/// more slowly than a handful of High findings (15 points each).
#[instrument(skip(findings, weights), fields(findings = findings.len()))]
pub fn score(findings: &[Finding], weights: &BTreeMap<Category, f64>) -> (u8, String) {
    let active: Vec<&Finding> = findings.iter().filter(|f| f.is_active()).collect();

    let raw: f64 = active
        .iter()
        .map(|finding| {
            let weight = weights.get(&finding.category).copied().unwrap_or(1.0);
            severity_points(finding.severity) * weight
        })
        .sum();

    let normalized = 100.0 * (1.0 - (-raw / CURVE_SCALE).exp());
    let score = normalized.round().clamp(0.0, 100.0) as u8;

    let explanation = explain(score, &active);
    debug!(raw, score, "risk score computed");
    (score, explanation)
}

fn explain(score: u8, active: &[&Finding]) -> String {
    let band = match score {
        0..=20 => "Low",
        21..=50 => "Medium",
        51..=80 => "High",
        _ => "Critical",
    };

    let mut lines = vec![format!("Risk score: {score}/100 ({band})")];

    let high = active.iter().filter(|f| f.severity == Severity::High).count();
    let medium = active.iter().filter(|f| f.severity == Severity::Medium).count();
    let low = active.iter().filter(|f| f.severity == Severity::Low).count();

    let mut parts = Vec::new();
    if high > 0 {
        parts.push(format!("{high} high-severity"));
    }
    if medium > 0 {
        parts.push(format!("{medium} medium"));
    }
    if low > 0 {
        parts.push(format!("{low} low"));
    }
    if !parts.is_empty() {
        lines.push(format!("Based on {} finding(s).", parts.join(", ")));
    }

    let top: Vec<&str> = active
        .iter()
        .filter(|f| f.severity == Severity::High)
        .take(3)
        .map(|f| f.title.as_str())
        .collect();
    if !top.is_empty() {
        lines.push(format!("Primary risks: {}.", top.join(", ")));
    }

    lines.join(" ")
}
