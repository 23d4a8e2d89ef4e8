pub mod baseline;
pub mod config;
pub mod document;
pub mod enrich;
pub mod error;
pub mod git;
pub mod maturity;
pub mod pipeline;
pub mod report;
pub mod rules;
pub mod scoring;
pub mod source;
pub mod suppression;

pub use baseline::{BaselineComparison, DeltaStatus, FindingDelta};
pub use config::{load_config, LlmConfig, ReviewConfig, SuppressionRule};
pub use document::Document;
pub use enrich::{AnthropicEnricher, Enricher, EnrichmentOutcome, NoopEnricher};
pub use error::{BaselineError, ConfigError, DocumentLoadError, ReviewError};
pub use git::{BaselineSource, GitBaselineSource};
pub use maturity::{MaturityBand, MaturityResult};
pub use pipeline::{review, ReviewOptions};
pub use report::{Category, EvidenceLine, Finding, Metadata, Report, Severity};
pub use rules::Profile;
