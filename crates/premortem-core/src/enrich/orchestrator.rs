use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::{debug, instrument, warn};

use super::{Enricher, EnrichmentOutcome, EnrichmentRequest};
use crate::config::LlmConfig;
use crate::document::Document;
use crate::report::{EnrichmentStats, EvidenceLine, Finding};

/// Above this combined corpus size the whole enrichment pass is skipped
/// without issuing a single request.
pub const MAX_ENRICHABLE_CHARS: usize = 100_000;

const EXCERPT_WINDOW_LINES: usize = 3;
const MAX_EXCERPT_CHARS: usize = 2000;
const BACKOFF_START: Duration = Duration::from_millis(200);
const BACKOFF_CAP: Duration = Duration::from_secs(5);

/// Run limits for one enrichment pass, taken from `LlmConfig`.
#[derive(Debug, Clone)]
pub struct EnrichmentPolicy {
    pub max_per_run: usize,
    pub max_retries: u32,
    pub timeout: Duration,
}

impl From<&LlmConfig> for EnrichmentPolicy {
    fn from(config: &LlmConfig) -> Self {
        Self {
            max_per_run: config.max_enrichments_per_run,
            max_retries: config.max_retries,
            timeout: Duration::from_secs(config.timeout_seconds),
        }
    }
}

/// Enrich up to `policy.max_per_run` active findings, High before Medium
/// before Low and stable within a tier.
///
/// The selection is processed as a bounded, ordered queue: requests go out
/// one at a time, so neither the cap nor the priority order can be raced
/// away. A finding is mutated only after a successful outcome, in a single
/// assignment of all three fields, so cancellation mid-run never leaves a
/// finding half-enriched. Failures degrade to the heuristic evidence and are
/// only visible in the returned stats.
#[instrument(skip_all, fields(findings = findings.len(), cap = policy.max_per_run))]
pub async fn enrich_findings(
    findings: &mut [Finding],
    documents: &[Document],
    enricher: &dyn Enricher,
    policy: &EnrichmentPolicy,
) -> EnrichmentStats {
    let mut stats = EnrichmentStats::default();

    let corpus_chars: usize = documents.iter().map(|doc| doc.char_count).sum();
    if corpus_chars > MAX_ENRICHABLE_CHARS {
        let reason = format!(
            "document size {corpus_chars} exceeds enrichment cap {MAX_ENRICHABLE_CHARS}"
        );
        debug!(%reason, "skipping enrichment pass");
        stats.skipped = Some(reason);
        return stats;
    }

    for idx in select(findings, policy.max_per_run) {
        let request = build_request(&findings[idx], documents);
        stats.attempted += 1;

        let mut attempt = 0u32;
        let mut backoff = BACKOFF_START;
        loop {
            let outcome = match timeout(policy.timeout, enricher.enrich(&request)).await {
                Ok(outcome) => outcome,
                Err(_) => EnrichmentOutcome::Failed {
                    reason: format!("enrichment request timed out after {:?}", policy.timeout),
                },
            };

            match outcome {
                EnrichmentOutcome::Enriched {
                    evidence,
                    recommendation,
                } => {
                    apply(&mut findings[idx], evidence, recommendation);
                    stats.succeeded += 1;
                    break;
                }
                EnrichmentOutcome::Failed { reason } => {
                    if attempt >= policy.max_retries {
                        warn!(
                            rule_id = %findings[idx].rule_id,
                            %reason,
                            "enrichment failed; keeping heuristic evidence"
                        );
                        stats.failed += 1;
                        break;
                    }
                    attempt += 1;
                    sleep(backoff).await;
                    backoff = (backoff * 2).min(BACKOFF_CAP);
                }
            }
        }
    }

    debug!(
        attempted = stats.attempted,
        succeeded = stats.succeeded,
        failed = stats.failed,
        "enrichment pass complete"
    );
    stats
}

/// Pick the indices to enrich: active findings not already enriched
/// (write-once), ordered High > Medium > Low with the incoming order
/// preserved within each tier, truncated to the cap.
fn select(findings: &[Finding], cap: usize) -> Vec<usize> {
    let mut eligible: Vec<usize> = findings
        .iter()
        .enumerate()
        .filter(|(_, finding)| finding.is_active() && !finding.enriched_by_llm)
        .map(|(idx, _)| idx)
        .collect();
    eligible.sort_by_key(|&idx| std::cmp::Reverse(findings[idx].severity));
    eligible.truncate(cap);
    eligible
}

/// Applied atomically: either all enrichment fields land or none do.
fn apply(finding: &mut Finding, evidence: Vec<EvidenceLine>, recommendation: String) {
    finding.evidence = evidence;
    finding.recommendation = recommendation;
    finding.enriched_by_llm = true;
}

fn build_request(finding: &Finding, documents: &[Document]) -> EnrichmentRequest {
    EnrichmentRequest {
        rule_id: finding.rule_id.clone(),
        title: finding.title.clone(),
        severity: finding.severity,
        category: finding.category,
        file: finding.file.clone(),
        impact: finding.impact.clone(),
        recommendation: finding.recommendation.clone(),
        evidence: finding.evidence.clone(),
        excerpt: excerpt_for(finding, documents),
    }
}

/// Document excerpt around the finding's first evidence line, truncated to a
/// fixed size.
fn excerpt_for(finding: &Finding, documents: &[Document]) -> String {
    let Some(doc) = documents.iter().find(|doc| doc.path == finding.file) else {
        return String::new();
    };
    let anchor = finding
        .evidence
        .first()
        .map(|line| line.line.saturating_sub(1))
        .unwrap_or(0);
    let start = anchor.saturating_sub(EXCERPT_WINDOW_LINES);
    let end = (anchor + EXCERPT_WINDOW_LINES + 1).min(doc.lines.len());
    let window = doc.lines[start..end].join("\n");
    window.chars().take(MAX_EXCERPT_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::NoopEnricher;
    use crate::report::{finding_fixture, Category, EvidenceLine, Severity};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    struct StubEnricher {
        calls: AtomicU32,
        seen: Mutex<Vec<String>>,
        fail: bool,
    }

    impl StubEnricher {
        fn succeeding() -> Self {
            Self {
                calls: AtomicU32::new(0),
                seen: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicU32::new(0),
                seen: Mutex::new(Vec::new()),
                fail: true,
            }
        }
    }

    #[async_trait]
    impl Enricher for StubEnricher {
        async fn enrich(&self, request: &EnrichmentRequest) -> EnrichmentOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(request.rule_id.clone());
            if self.fail {
                EnrichmentOutcome::Failed {
                    reason: "rate limited".to_string(),
                }
            } else {
                EnrichmentOutcome::Enriched {
                    evidence: vec![EvidenceLine {
                        line: 1,
                        excerpt: "enriched".to_string(),
                    }],
                    recommendation: "enriched recommendation".to_string(),
                }
            }
        }

        fn label(&self) -> &str {
            "stub"
        }
    }

    fn policy(cap: usize, retries: u32) -> EnrichmentPolicy {
        EnrichmentPolicy {
            max_per_run: cap,
            max_retries: retries,
            timeout: Duration::from_secs(5),
        }
    }

    fn high(id: &str) -> Finding {
        finding_fixture(id, Severity::High, Category::Architecture)
    }

    #[tokio::test]
    async fn cap_limits_attempts_and_leaves_the_rest_heuristic() {
        let mut findings: Vec<Finding> = (1..=5).map(|i| high(&format!("ARCH-00{i}"))).collect();
        let enricher = StubEnricher::succeeding();
        let stats = enrich_findings(&mut findings, &[], &enricher, &policy(2, 0)).await;

        assert_eq!(stats.attempted, 2);
        assert_eq!(stats.succeeded, 2);
        assert_eq!(stats.failed, 0);
        assert_eq!(findings.iter().filter(|f| f.enriched_by_llm).count(), 2);
        for finding in findings.iter().filter(|f| !f.enriched_by_llm) {
            assert_eq!(finding.recommendation, "recommendation");
        }
    }

    #[tokio::test]
    async fn selection_prefers_high_severity_and_keeps_tier_order() {
        let mut findings = vec![
            finding_fixture("DOC-001", Severity::Low, Category::Documentation),
            finding_fixture("OPS-002", Severity::Medium, Category::Operations),
            high("ARCH-001"),
            high("OPS-001"),
        ];
        let enricher = StubEnricher::succeeding();
        enrich_findings(&mut findings, &[], &enricher, &policy(3, 0)).await;

        let seen = enricher.seen.lock().unwrap().clone();
        assert_eq!(seen, vec!["ARCH-001", "OPS-001", "OPS-002"]);
    }

    #[tokio::test]
    async fn already_enriched_findings_are_never_resubmitted() {
        let mut enriched = high("ARCH-001");
        enriched.enriched_by_llm = true;
        enriched.recommendation = "from an earlier pass".to_string();
        let mut findings = vec![enriched, high("OPS-001")];

        let enricher = StubEnricher::succeeding();
        let stats = enrich_findings(&mut findings, &[], &enricher, &policy(5, 0)).await;

        assert_eq!(stats.attempted, 1);
        let seen = enricher.seen.lock().unwrap().clone();
        assert_eq!(seen, vec!["OPS-001"]);
        assert_eq!(findings[0].recommendation, "from an earlier pass");
    }

    #[tokio::test]
    async fn suppressed_findings_are_not_enriched() {
        let mut suppressed = high("ARCH-001");
        suppressed.suppressed = true;
        let mut findings = vec![suppressed];
        let enricher = StubEnricher::succeeding();
        let stats = enrich_findings(&mut findings, &[], &enricher, &policy(5, 0)).await;
        assert_eq!(stats.attempted, 0);
    }

    #[tokio::test]
    async fn failure_retries_then_keeps_heuristic_evidence() {
        let mut findings = vec![high("ARCH-001")];
        let enricher = StubEnricher::failing();
        let stats = enrich_findings(&mut findings, &[], &enricher, &policy(1, 2)).await;

        // 1 initial try + 2 retries.
        assert_eq!(enricher.calls.load(Ordering::SeqCst), 3);
        assert_eq!(stats.attempted, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.succeeded, 0);
        assert!(!findings[0].enriched_by_llm);
        assert_eq!(findings[0].recommendation, "recommendation");
    }

    #[tokio::test]
    async fn oversized_corpus_skips_the_whole_pass() {
        let big = Document::new("big.md", "x".repeat(MAX_ENRICHABLE_CHARS + 1));
        let mut findings = vec![high("ARCH-001")];
        let enricher = StubEnricher::succeeding();
        let stats = enrich_findings(&mut findings, &[big], &enricher, &policy(5, 0)).await;

        assert_eq!(stats.attempted, 0);
        assert!(stats.skipped.is_some());
        assert_eq!(enricher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn noop_enricher_counts_as_failure() {
        let mut findings = vec![high("ARCH-001")];
        let stats = enrich_findings(&mut findings, &[], &NoopEnricher, &policy(1, 0)).await;
        assert_eq!(stats.failed, 1);
        assert!(!findings[0].enriched_by_llm);
    }

    #[test]
    fn excerpt_windows_around_first_evidence_line() {
        let doc = Document::new(
            "docs/design.md",
            "line1\nline2\nline3\nline4\nline5\nline6\nline7\nline8",
        );
        let mut finding = high("ARCH-001");
        finding.file = "docs/design.md".to_string();
        finding.evidence = vec![EvidenceLine {
            line: 5,
            excerpt: "line5".to_string(),
        }];
        let excerpt = excerpt_for(&finding, &[doc]);
        assert!(excerpt.starts_with("line2"));
        assert!(excerpt.ends_with("line8"));
    }
}
