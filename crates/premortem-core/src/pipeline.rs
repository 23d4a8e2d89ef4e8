use std::path::PathBuf;
use std::time::Instant;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, instrument, warn};

use crate::baseline::{self, BaselineComparison, BaselineSummary};
use crate::config::ReviewConfig;
use crate::document::Document;
use crate::enrich::{enrich_findings, Enricher, EnrichmentPolicy};
use crate::error::ReviewError;
use crate::git::BaselineSource;
use crate::maturity;
use crate::report::{self, Category, Finding, Metadata, Report, ReportParts, Severity};
use crate::rules::{evaluator, Profile};
use crate::scoring;
use crate::source::{load_document, Redactor};
use crate::suppression;

const MAX_ASSUMPTIONS: usize = 10;
const MAX_QUESTIONS: usize = 15;
const MAX_EXTRACT_LINE_CHARS: usize = 200;

/// Per-run options supplied by the caller. `today` and `timestamp` are
/// explicit inputs so the pipeline itself never consults the clock for
/// anything that feeds determinism-sensitive output.
#[derive(Debug, Clone)]
pub struct ReviewOptions {
    /// Profile override; falls back to the configured default.
    pub profile: Option<Profile>,
    pub baseline_ref: Option<String>,
    /// Opt into enrichment for this run. Still requires an enabled `llm`
    /// configuration block.
    pub enrich: bool,
    pub today: NaiveDate,
    pub timestamp: String,
    /// Extra redact patterns merged with the configured ones.
    pub extra_redact: Vec<String>,
}

/// Run the whole review pipeline over the given files and assemble the
/// canonical report.
#[instrument(skip_all, fields(files = paths.len()))]
pub async fn review(
    paths: &[PathBuf],
    config: &ReviewConfig,
    options: &ReviewOptions,
    enricher: &dyn Enricher,
    baseline_source: &dyn BaselineSource,
) -> Result<Report, ReviewError> {
    let started = Instant::now();
    let profile = options.profile.unwrap_or(config.default_profile);
    let mut warnings = Vec::new();

    let mut redact_patterns = config.redact_patterns.clone();
    redact_patterns.extend(options.extra_redact.iter().cloned());
    let redactor = Redactor::new(&redact_patterns)?;

    // Document load failures are fatal for the affected file only.
    let mut documents = Vec::new();
    for path in paths {
        match load_document(path, &redactor) {
            Ok(document) => documents.push(document),
            Err(err) => {
                warn!(path = %path.display(), "document skipped: {err}");
                warnings.push(format!("{err}; file skipped"));
            }
        }
    }
    if documents.is_empty() {
        return Err(ReviewError::NoDocuments);
    }

    // Evaluate rules per document; maturity reads only structure.
    let mut findings = Vec::new();
    for document in &documents {
        let evaluation = evaluator::evaluate(document, profile);
        findings.extend(evaluation.findings);
        warnings.extend(evaluation.warnings);
    }
    let maturity = maturity::assess(&documents);

    let outcome = suppression::resolve(findings, &config.suppressions, profile, options.today);
    warnings.extend(outcome.warnings);
    let mut findings = outcome.findings;

    let (risk_score, risk_explanation) = scoring::score(&findings, &config.category_weights);

    let comparison = match &options.baseline_ref {
        None => None,
        Some(git_ref) => Some(compare_against_baseline(
            git_ref,
            &documents,
            &findings,
            maturity.score,
            config,
            options,
            profile,
            &redactor,
            baseline_source,
            &mut warnings,
        )?),
    };

    // Optional enrichment runs last: it may sharpen evidence and
    // recommendations but can no longer influence score or classification.
    let llm = config.llm.as_ref().filter(|llm| llm.enabled);
    let mut enrichment = None;
    let mut provider = "heuristic".to_string();
    if options.enrich {
        match llm {
            Some(llm) => {
                let policy = EnrichmentPolicy::from(llm);
                let stats = enrich_findings(&mut findings, &documents, enricher, &policy).await;
                if let Some(reason) = &stats.skipped {
                    warnings.push(format!("enrichment skipped: {reason}"));
                }
                provider = enricher.label().to_string();
                enrichment = Some(stats);
            }
            None => {
                warnings.push(
                    "enrichment requested but no enabled llm configuration; skipped".to_string(),
                );
            }
        }
    }

    let assumptions = extract_assumptions(&documents);
    let open_questions = extract_questions(&documents);
    let quick_summary = summarize(&documents, &findings);

    let metadata = Metadata {
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: options.timestamp.clone(),
        input_files: documents.iter().map(|doc| doc.path.clone()).collect(),
        profile,
        provider,
        elapsed_ms: started.elapsed().as_millis() as u64,
        enrichment,
    };

    debug!(risk_score, findings = findings.len(), "review complete");
    Ok(report::assemble(ReportParts {
        metadata,
        maturity,
        findings,
        risk_score,
        risk_explanation,
        assumptions,
        open_questions,
        quick_summary,
        baseline_ref: options.baseline_ref.clone(),
        comparison,
        warnings,
    }))
}

/// Re-run evaluation and suppression against baseline content and classify
/// the differences. A file missing at the baseline contributes no baseline
/// findings, which classifies all of its current findings as new.
#[allow(clippy::too_many_arguments)]
fn compare_against_baseline(
    git_ref: &str,
    documents: &[Document],
    current: &[Finding],
    current_maturity_score: u8,
    config: &ReviewConfig,
    options: &ReviewOptions,
    profile: Profile,
    redactor: &Redactor,
    source: &dyn BaselineSource,
    warnings: &mut Vec<String>,
) -> Result<BaselineComparison, ReviewError> {
    let commit = source.resolve(git_ref)?;

    let mut baseline_docs = Vec::new();
    for document in documents {
        match source.read(git_ref, &document.path) {
            Some(content) => {
                baseline_docs.push(Document::new(document.path.clone(), redactor.apply(&content)));
            }
            None => {
                debug!(path = %document.path, %git_ref, "file absent at baseline; findings will be new");
            }
        }
    }

    let mut baseline_findings = Vec::new();
    for document in &baseline_docs {
        // Baseline evaluation warnings are not this run's warnings.
        baseline_findings.extend(evaluator::evaluate(document, profile).findings);
    }
    let baseline_outcome = suppression::resolve(
        baseline_findings,
        &config.suppressions,
        profile,
        options.today,
    );
    let baseline_active: Vec<Finding> = baseline_outcome
        .findings
        .into_iter()
        .filter(Finding::is_active)
        .collect();

    let (baseline_risk, _) = scoring::score(&baseline_active, &config.category_weights);
    let baseline_maturity = maturity::assess(&baseline_docs);
    let maturity_regressed =
        baseline::maturity_regressed(current_maturity_score, baseline_maturity.score);
    if maturity_regressed {
        warnings.push(format!(
            "maturity score regressed from {} to {} against baseline {git_ref}",
            baseline_maturity.score, current_maturity_score
        ));
    }

    Ok(BaselineComparison {
        summary: BaselineSummary {
            git_ref: git_ref.to_string(),
            commit,
            findings_count: baseline_active.len(),
            risk_score: baseline_risk,
            maturity_score: baseline_maturity.score,
        },
        deltas: baseline::compare(current, &baseline_active),
        maturity_regressed,
    })
}

static ASSUMPTION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)(?:we\s+)?assum(?:e|ing)\s+(?:that\s+)?(.+)",
        r"(?i)given\s+that\s+(.+)",
        r"(?i)presuming\s+(.+)",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("static assumption pattern"))
    .collect()
});

static QUESTION_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(TBD|TODO|FIXME)\b").expect("static question pattern"));

/// Stated assumptions, capped, in document order.
fn extract_assumptions(documents: &[Document]) -> Vec<String> {
    let mut assumptions = Vec::new();
    for document in documents {
        for line in &document.lines {
            let line = line.trim();
            for pattern in ASSUMPTION_PATTERNS.iter() {
                if let Some(capture) = pattern.captures(line).and_then(|c| c.get(1)) {
                    let assumption = capture.as_str().trim();
                    if !assumption.is_empty() && assumption.len() < MAX_EXTRACT_LINE_CHARS {
                        assumptions.push(assumption.to_string());
                    }
                    break;
                }
            }
            if assumptions.len() >= MAX_ASSUMPTIONS {
                return assumptions;
            }
        }
    }
    assumptions
}

/// Open questions: question marks and TBD/TODO/FIXME markers, capped.
fn extract_questions(documents: &[Document]) -> Vec<String> {
    let mut questions = Vec::new();
    for document in documents {
        for line in &document.lines {
            let line = line.trim();
            if line.len() >= MAX_EXTRACT_LINE_CHARS {
                continue;
            }
            if line.contains('?') || QUESTION_MARKER.is_match(line) {
                questions.push(line.to_string());
            }
            if questions.len() >= MAX_QUESTIONS {
                return questions;
            }
        }
    }
    questions
}

fn summarize(documents: &[Document], findings: &[Finding]) -> Vec<String> {
    let mut summary = vec![format!("Analyzed {} file(s)", documents.len())];

    let active: Vec<&Finding> = findings.iter().filter(|f| f.is_active()).collect();
    let high = active.iter().filter(|f| f.severity == Severity::High).count();
    let medium = active.iter().filter(|f| f.severity == Severity::Medium).count();
    let low = active.iter().filter(|f| f.severity == Severity::Low).count();

    if high > 0 {
        summary.push(format!("Found {high} high-severity issue(s)"));
    }
    if medium > 0 {
        summary.push(format!("Found {medium} medium-severity issue(s)"));
    }
    if low > 0 {
        summary.push(format!("Found {low} low-severity issue(s)"));
    }
    if active.is_empty() {
        summary.push("No issues detected".to_string());
    }

    if !active.is_empty() {
        let mut by_category: std::collections::BTreeMap<Category, usize> =
            std::collections::BTreeMap::new();
        for finding in &active {
            *by_category.entry(finding.category).or_default() += 1;
        }
        if let Some((category, _)) = by_category.iter().max_by_key(|(_, count)| **count) {
            summary.push(format!("Most issues in: {}", category.as_str()));
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs(text: &str) -> Vec<Document> {
        vec![Document::new("docs/design.md", text)]
    }

    #[test]
    fn extracts_assumptions_with_patterns() {
        let documents = docs(
            "We assume that the queue is durable.\n\
             Given that traffic doubles yearly, capacity matters.\n\
             Presuming single-region deployment.\n\
             Nothing to see here.",
        );
        let assumptions = extract_assumptions(&documents);
        assert_eq!(assumptions.len(), 3);
        assert_eq!(assumptions[0], "the queue is durable.");
        assert!(assumptions[1].starts_with("traffic doubles"));
    }

    #[test]
    fn extracts_questions_and_markers() {
        let documents = docs(
            "Should we shard by tenant?\n\
             TODO: pick a queue technology\n\
             This line is fine.",
        );
        let questions = extract_questions(&documents);
        assert_eq!(questions.len(), 2);
    }

    #[test]
    fn extraction_respects_caps() {
        let many_questions = (0..40)
            .map(|i| format!("Open question {i}?"))
            .collect::<Vec<_>>()
            .join("\n");
        let questions = extract_questions(&docs(&many_questions));
        assert_eq!(questions.len(), MAX_QUESTIONS);
    }

    #[test]
    fn summary_counts_only_active_findings() {
        use crate::report::finding_fixture;
        let mut suppressed = finding_fixture("SEC-001", Severity::High, Category::Security);
        suppressed.suppressed = true;
        let findings = vec![
            suppressed,
            finding_fixture("TEST-001", Severity::High, Category::Testing),
        ];
        let summary = summarize(&docs("# Doc"), &findings);
        assert!(summary.iter().any(|s| s == "Found 1 high-severity issue(s)"));
        assert!(summary.iter().any(|s| s == "Most issues in: testing"));
    }
}
