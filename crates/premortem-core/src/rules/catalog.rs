use aho_corasick::AhoCorasick;
use once_cell::sync::Lazy;

use super::Rule;
use crate::document::{Document, Section};
use crate::report::{Category, EvidenceLine, Severity};

const MAX_EVIDENCE_LINES: usize = 5;
const MAX_EXCERPT_CHARS: usize = 160;
const MIN_REVIEWABLE_CHARS: usize = 200;

/// The immutable rule registry, built once. Ids are append-only: a retired
/// check keeps its id reserved and never gets reused.
pub fn catalog() -> &'static [Rule] {
    static CATALOG: Lazy<Vec<Rule>> = Lazy::new(build_catalog);
    &CATALOG
}

fn build_catalog() -> Vec<Rule> {
    vec![
        Rule {
            id: "REQ-001",
            title: "Goals and scope are not stated",
            severity: Severity::High,
            category: Category::Requirements,
            impact: "Reviewers cannot judge whether the design solves the right problem, and scope creep goes unnoticed.",
            recommendation: "Add a goals/scope section stating what this work does and explicitly does not cover.",
            pitfalls: "A one-line title is not a goal statement; name the user-facing outcome and the boundaries.",
            detect: detect_missing_goals,
        },
        Rule {
            id: "REQ-002",
            title: "No success metrics defined",
            severity: Severity::Medium,
            category: Category::Requirements,
            impact: "Without measurable criteria there is no way to tell whether the launch worked.",
            recommendation: "Define 2-3 measurable success criteria (KPIs, SLIs, adoption targets) and where they are tracked.",
            pitfalls: "\"Users are happier\" is not measurable; tie each criterion to an observable number.",
            detect: detect_missing_metrics,
        },
        Rule {
            id: "ARCH-001",
            title: "Error handling is not addressed",
            severity: Severity::High,
            category: Category::Architecture,
            impact: "Failure paths discovered in production are far more expensive than ones designed up front.",
            recommendation: "Describe how each dependency failure, timeout, and partial write is detected and handled.",
            pitfalls: "Listing \"retries\" without bounding them often trades one outage for another.",
            detect: detect_missing_error_handling,
        },
        Rule {
            id: "ARCH-002",
            title: "External dependencies are not identified",
            severity: Severity::Medium,
            category: Category::Architecture,
            impact: "Unlisted integrations surface as surprise coupling, missing quotas, and unowned failure modes.",
            recommendation: "Enumerate upstream/downstream systems, their owners, and what happens when each is unavailable.",
            pitfalls: "Internal shared infrastructure (queues, caches, identity) counts as a dependency too.",
            detect: detect_missing_dependencies,
        },
        Rule {
            id: "ARCH-003",
            title: "Data handling and retention are unspecified",
            severity: Severity::Medium,
            category: Category::Architecture,
            impact: "Storing data without a retention and privacy story creates compliance and deletion debt.",
            recommendation: "State what data is stored, for how long, who can access it, and how deletion requests are honored.",
            pitfalls: "Logs and analytics events carry user data as often as primary stores do.",
            detect: detect_missing_data_handling,
        },
        Rule {
            id: "SEC-001",
            title: "Security considerations are absent",
            severity: Severity::High,
            category: Category::Security,
            impact: "Authentication, authorization, and abuse cases bolted on late tend to ship with gaps.",
            recommendation: "Add a security section covering authn/authz, input validation, and abuse scenarios.",
            pitfalls: "\"Behind the VPN\" is a network posture, not an authorization model.",
            detect: detect_missing_security,
        },
        Rule {
            id: "TEST-001",
            title: "No testing strategy described",
            severity: Severity::High,
            category: Category::Testing,
            impact: "Untested assumptions become regressions; verification cost grows after implementation.",
            recommendation: "Describe the test levels (unit, integration, end-to-end) and how edge cases get covered.",
            pitfalls: "A QA sign-off step is not a strategy; say what is automated and where.",
            detect: detect_missing_testing,
        },
        Rule {
            id: "OPS-001",
            title: "No rollout or rollback plan",
            severity: Severity::High,
            category: Category::Operations,
            impact: "Without a staged rollout and a tested rollback, a bad deploy becomes an incident.",
            recommendation: "Plan the rollout stages, guardrail metrics, and the exact rollback procedure.",
            pitfalls: "Feature flags only help if the flagged-off path still works and is exercised.",
            detect: detect_missing_rollout,
        },
        Rule {
            id: "OPS-002",
            title: "Ownership and on-call are undefined",
            severity: Severity::Medium,
            category: Category::Operations,
            impact: "Systems without a named owner accumulate alerts nobody answers.",
            recommendation: "Name the owning team, the on-call rotation, and where runbooks will live.",
            pitfalls: "Ownership by \"the team\" dissolves at the first reorg; name the rotation.",
            detect: detect_missing_ownership,
        },
        Rule {
            id: "PERF-001",
            title: "Performance and capacity are not analyzed",
            severity: Severity::Medium,
            category: Category::Performance,
            impact: "Load characteristics discovered at launch force emergency rework.",
            recommendation: "Estimate expected load, latency budgets, and the scaling limits of each component.",
            pitfalls: "Average-case numbers hide the tail; budget for p99, not p50.",
            detect: detect_missing_performance,
        },
        Rule {
            id: "REL-001",
            title: "Failure modes and degradation are not considered",
            severity: Severity::Medium,
            category: Category::Reliability,
            impact: "Single points of failure and missing degradation paths turn partial outages into total ones.",
            recommendation: "Walk through what users see when each component fails and which features degrade gracefully.",
            pitfalls: "Redundancy without failover testing is a diagram, not reliability.",
            detect: detect_missing_failure_modes,
        },
        Rule {
            id: "DOC-001",
            title: "Document too thin to review",
            severity: Severity::Low,
            category: Category::Documentation,
            impact: "There is not enough material here for heuristics or reviewers to work with.",
            recommendation: "Expand the document before requesting review; an outline of the core sections is enough to start.",
            pitfalls: "",
            detect: detect_too_thin,
        },
    ]
}

/// Case-insensitive keyword search across the whole document.
fn mentions_any(doc: &Document, terms: &[&str]) -> bool {
    let automaton = AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .build(terms)
        .expect("static keyword patterns");
    automaton.is_match(&doc.text)
}

/// Evidence for an absence finding: the section headers that were actually
/// scanned, so every line number references the scored document. Falls back
/// to the first non-empty line when the document has no headers.
fn coverage_evidence(doc: &Document, sections: &[Section]) -> Vec<EvidenceLine> {
    let mut evidence: Vec<EvidenceLine> = sections
        .iter()
        .take(MAX_EVIDENCE_LINES)
        .map(|section| EvidenceLine {
            line: section.line,
            excerpt: excerpt_at(doc, section.line),
        })
        .collect();
    if evidence.is_empty() {
        if let Some((idx, line)) = doc
            .lines
            .iter()
            .enumerate()
            .find(|(_, line)| !line.trim().is_empty())
        {
            evidence.push(EvidenceLine {
                line: idx + 1,
                excerpt: truncate_excerpt(line.trim()),
            });
        }
    }
    evidence
}

fn excerpt_at(doc: &Document, line: usize) -> String {
    doc.lines
        .get(line.saturating_sub(1))
        .map(|text| truncate_excerpt(text.trim()))
        .unwrap_or_default()
}

fn truncate_excerpt(text: &str) -> String {
    text.chars().take(MAX_EXCERPT_CHARS).collect()
}

fn absence(doc: &Document, sections: &[Section], terms: &[&str]) -> Option<Vec<EvidenceLine>> {
    if mentions_any(doc, terms) {
        None
    } else {
        Some(coverage_evidence(doc, sections))
    }
}

fn detect_missing_goals(doc: &Document, sections: &[Section]) -> Option<Vec<EvidenceLine>> {
    absence(doc, sections, &["goal", "objective", "scope", "purpose"])
}

fn detect_missing_metrics(doc: &Document, sections: &[Section]) -> Option<Vec<EvidenceLine>> {
    absence(
        doc,
        sections,
        &["success metric", "success criteri", "kpi", "metric", "measure of success"],
    )
}

fn detect_missing_error_handling(doc: &Document, sections: &[Section]) -> Option<Vec<EvidenceLine>> {
    absence(
        doc,
        sections,
        &["error", "exception", "failure", "fallback", "retry", "timeout"],
    )
}

fn detect_missing_dependencies(doc: &Document, sections: &[Section]) -> Option<Vec<EvidenceLine>> {
    absence(
        doc,
        sections,
        &["dependenc", "integration", "external service", "third-party", "upstream", "downstream"],
    )
}

fn detect_missing_data_handling(doc: &Document, sections: &[Section]) -> Option<Vec<EvidenceLine>> {
    absence(
        doc,
        sections,
        &["data retention", "retention", "pii", "encryption", "privacy", "data handling"],
    )
}

fn detect_missing_security(doc: &Document, sections: &[Section]) -> Option<Vec<EvidenceLine>> {
    absence(
        doc,
        sections,
        &["security", "auth", "threat", "permission", "access control"],
    )
}

fn detect_missing_testing(doc: &Document, sections: &[Section]) -> Option<Vec<EvidenceLine>> {
    absence(
        doc,
        sections,
        &["test", "qa", "validation", "verification"],
    )
}

fn detect_missing_rollout(doc: &Document, sections: &[Section]) -> Option<Vec<EvidenceLine>> {
    absence(
        doc,
        sections,
        &["rollout", "rollback", "deploy", "migration", "launch plan", "feature flag"],
    )
}

fn detect_missing_ownership(doc: &Document, sections: &[Section]) -> Option<Vec<EvidenceLine>> {
    absence(
        doc,
        sections,
        &["owner", "on-call", "oncall", "runbook", "support", "responsible team"],
    )
}

fn detect_missing_performance(doc: &Document, sections: &[Section]) -> Option<Vec<EvidenceLine>> {
    absence(
        doc,
        sections,
        &["performance", "latency", "throughput", "capacity", "scalab", "load"],
    )
}

fn detect_missing_failure_modes(doc: &Document, sections: &[Section]) -> Option<Vec<EvidenceLine>> {
    absence(
        doc,
        sections,
        &[
            "failure mode",
            "degrad",
            "single point of failure",
            "disaster recovery",
            "sla",
            "slo",
            "availability",
        ],
    )
}

fn detect_too_thin(doc: &Document, _sections: &[Section]) -> Option<Vec<EvidenceLine>> {
    if doc.char_count >= MIN_REVIEWABLE_CHARS {
        return None;
    }
    let evidence = doc
        .lines
        .iter()
        .enumerate()
        .find(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| EvidenceLine {
            line: idx + 1,
            excerpt: truncate_excerpt(line.trim()),
        })
        .into_iter()
        .collect();
    Some(evidence)
}
