use async_trait::async_trait;

use crate::report::{Category, EvidenceLine, Severity};

pub mod anthropic;
mod orchestrator;

pub use anthropic::AnthropicEnricher;
pub use orchestrator::{enrich_findings, EnrichmentPolicy, MAX_ENRICHABLE_CHARS};

/// Context shipped with one enrichment request: the finding plus a document
/// excerpt around its evidence.
#[derive(Debug, Clone)]
pub struct EnrichmentRequest {
    pub rule_id: String,
    pub title: String,
    pub severity: Severity,
    pub category: Category,
    pub file: String,
    pub impact: String,
    pub recommendation: String,
    pub evidence: Vec<EvidenceLine>,
    pub excerpt: String,
}

/// Expected outcomes of an enrichment attempt. Timeouts, rate limits, and
/// transport errors are all `Failed` values, never panics or error types:
/// the orchestrator codes against this enum alone.
#[derive(Debug, Clone)]
pub enum EnrichmentOutcome {
    Enriched {
        evidence: Vec<EvidenceLine>,
        recommendation: String,
    },
    Failed {
        reason: String,
    },
}

/// Pluggable enrichment capability. The deterministic core never depends on
/// a concrete provider.
#[async_trait]
pub trait Enricher: Send + Sync {
    async fn enrich(&self, request: &EnrichmentRequest) -> EnrichmentOutcome;

    /// Provider label recorded in report metadata.
    fn label(&self) -> &str;
}

/// Stand-in used when no provider is wired up.
#[derive(Debug, Default, Clone)]
pub struct NoopEnricher;

#[async_trait]
impl Enricher for NoopEnricher {
    async fn enrich(&self, _request: &EnrichmentRequest) -> EnrichmentOutcome {
        EnrichmentOutcome::Failed {
            reason: "no enrichment provider configured".to_string(),
        }
    }

    fn label(&self) -> &str {
        "noop"
    }
}
