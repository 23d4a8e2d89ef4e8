use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::document::{Document, Section};

/// Canonical sections a complete design document is expected to cover.
pub const CORE_SECTIONS: [(&str, &[&str]); 9] = [
    ("goals_scope", &["goal", "objective", "scope", "purpose"]),
    ("success_metrics", &["success", "metric", "kpi", "measure"]),
    (
        "nonfunctional_reqs",
        &["performance", "scalability", "reliability", "sla"],
    ),
    (
        "dependencies",
        &["dependency", "dependencies", "integration", "external"],
    ),
    ("error_handling", &["error", "exception", "failure", "fallback"]),
    ("testing", &["test", "testing", "qa", "validation"]),
    ("rollout", &["rollout", "deployment", "migration", "rollback"]),
    ("security", &["security", "auth", "privacy", "data retention"]),
    ("ownership", &["owner", "team", "on-call", "support"]),
];

/// Maturity bands over the 0-100 score: 0-25, 26-50, 51-75, 76-100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaturityBand {
    Notes,
    EarlyDraft,
    DesignSpec,
    ProductionReady,
}

impl MaturityBand {
    pub fn as_str(self) -> &'static str {
        match self {
            MaturityBand::Notes => "notes",
            MaturityBand::EarlyDraft => "early_draft",
            MaturityBand::DesignSpec => "design_spec",
            MaturityBand::ProductionReady => "production_ready",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaturityMetrics {
    pub char_count: usize,
    pub section_count: usize,
    pub core_sections_present: usize,
    pub core_sections_found: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaturityResult {
    pub band: MaturityBand,
    pub score: u8,
    pub confidence: Confidence,
    pub interpretation: String,
    pub signals: Vec<String>,
    pub metrics: MaturityMetrics,
}

/// Assess maturity over the reviewed corpus. Entirely decoupled from the
/// finding pipeline: only structural metrics go in.
#[instrument(skip(documents), fields(documents = documents.len()))]
pub fn assess(documents: &[Document]) -> MaturityResult {
    let char_count: usize = documents.iter().map(|doc| doc.char_count).sum();
    let sections: Vec<Section> = documents.iter().flat_map(|doc| doc.sections()).collect();
    let (core_sections_present, core_sections_found) = detect_core_sections(&sections);

    let metrics = MaturityMetrics {
        char_count,
        section_count: sections.len(),
        core_sections_present,
        core_sections_found,
    };

    let score = score_metrics(&metrics);
    let band = band_for(score);
    let signals = signals_for(&metrics);
    let confidence = confidence_for(score, &metrics, signals.len());

    MaturityResult {
        band,
        score,
        confidence,
        interpretation: interpretation_for(band).to_string(),
        signals,
        metrics,
    }
}

fn detect_core_sections(sections: &[Section]) -> (usize, Vec<String>) {
    let mut found = Vec::new();
    for (name, patterns) in CORE_SECTIONS {
        let present = sections.iter().any(|section| {
            patterns.iter().any(|pattern| {
                section.heading.contains(pattern)
                    || section
                        .context
                        .as_deref()
                        .is_some_and(|context| context.contains(pattern))
            })
        });
        if present {
            found.push(name.to_string());
        }
    }
    (found.len(), found)
}

/// Score = length points (0-25) + section points (0-25) + core coverage
/// points (0-50). Coverage points truncate toward zero, so ambiguous or
/// partial coverage always rounds the score down, never up.
fn score_metrics(metrics: &MaturityMetrics) -> u8 {
    let mut score: u32 = 0;

    score += match metrics.char_count {
        n if n >= 5000 => 25,
        n if n >= 2000 => 20,
        n if n >= 500 => 10,
        n if n >= 200 => 5,
        _ => 0,
    };

    score += match metrics.section_count {
        n if n >= 10 => 25,
        n if n >= 6 => 20,
        n if n >= 3 => 10,
        n if n >= 1 => 5,
        _ => 0,
    };

    score += (metrics.core_sections_present as u32 * 50) / CORE_SECTIONS.len() as u32;

    score.min(100) as u8
}

fn band_for(score: u8) -> MaturityBand {
    match score {
        0..=25 => MaturityBand::Notes,
        26..=50 => MaturityBand::EarlyDraft,
        51..=75 => MaturityBand::DesignSpec,
        _ => MaturityBand::ProductionReady,
    }
}

/// Confidence from distance to the nearest band boundary and the number of
/// corroborating signals, with a conservative cap when section detection
/// produced nothing to corroborate with.
fn confidence_for(score: u8, metrics: &MaturityMetrics, signal_count: usize) -> Confidence {
    if metrics.section_count == 0 && metrics.char_count >= 200 {
        return Confidence::Low;
    }
    let from_boundary = match score {
        0..=10 | 90..=100 => Confidence::High,
        20..=30 | 45..=55 | 70..=80 => Confidence::Low,
        _ => Confidence::Medium,
    };
    // A high-confidence call needs at least two signals backing it up.
    if from_boundary == Confidence::High && signal_count < 2 {
        return Confidence::Medium;
    }
    from_boundary
}

fn signals_for(metrics: &MaturityMetrics) -> Vec<String> {
    let mut signals = Vec::new();

    match metrics.char_count {
        n if n < 200 => signals.push("very_short_length"),
        n if n < 500 => signals.push("short_length"),
        n if n > 5000 => signals.push("comprehensive_length"),
        _ => {}
    }

    match metrics.section_count {
        0 => signals.push("no_sections_detected"),
        1..=2 => signals.push("few_sections"),
        n if n >= 10 => signals.push("many_sections"),
        _ => {}
    }

    let missing = CORE_SECTIONS.len() - metrics.core_sections_present;
    if missing >= 7 {
        signals.push("missing_most_core_sections");
    } else if missing >= 4 {
        signals.push("missing_many_core_sections");
    } else if missing <= 2 {
        signals.push("comprehensive_coverage");
    }

    for (name, signal) in [
        ("goals_scope", "missing_goals"),
        ("success_metrics", "missing_metrics"),
        ("testing", "missing_testing"),
    ] {
        if !metrics.core_sections_found.iter().any(|found| found == name) {
            signals.push(signal);
        }
    }

    signals.into_iter().map(str::to_string).collect()
}

fn interpretation_for(band: MaturityBand) -> &'static str {
    match band {
        MaturityBand::Notes => {
            "This appears to be early-stage notes or brainstorming. \
             Comprehensive findings are expected and helpful for planning."
        }
        MaturityBand::EarlyDraft => {
            "Incomplete sections are expected at this stage. Focus on high-severity gaps."
        }
        MaturityBand::DesignSpec => {
            "Document is substantial with good coverage of core areas. \
             Findings indicate areas needing attention before implementation."
        }
        MaturityBand::ProductionReady => {
            "Comprehensive document with thorough coverage. \
             Findings are refinements rather than gaps."
        }
    }
}
