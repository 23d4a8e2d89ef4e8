use std::path::PathBuf;

use thiserror::Error;

/// Configuration problems are fatal at load time; a run never starts on a
/// partially-valid configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("suppression for `{id}` is missing a reason")]
    MissingReason { id: String },
    #[error("suppression for `{id}` has invalid expiry `{value}` (expected YYYY-MM-DD)")]
    InvalidExpiry { id: String, value: String },
    #[error("suppression for `{id}` has invalid scope glob `{pattern}`: {source}")]
    InvalidScope {
        id: String,
        pattern: String,
        #[source]
        source: globset::Error,
    },
    #[error("suppression for `{id}` names unknown profile `{value}`")]
    UnknownProfile { id: String, value: String },
    #[error("suppression for `{id}` names unknown severity `{value}`")]
    UnknownSeverity { id: String, value: String },
    #[error("invalid redact pattern `{pattern}`: {source}")]
    InvalidRedactPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("invalid ignore glob `{pattern}`: {source}")]
    InvalidIgnoreGlob {
        pattern: String,
        #[source]
        source: globset::Error,
    },
    #[error("failed to read configuration at {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Loading a document failed. Fatal for the affected file only; the run
/// continues over the remaining files with a warning recorded.
#[derive(Debug, Error)]
#[error("failed to load document {path}")]
pub struct DocumentLoadError {
    pub path: String,
    #[source]
    pub source: std::io::Error,
}

/// Baseline retrieval problems. A missing individual file at the baseline is
/// NOT an error (the differ classifies its findings as new); only an
/// unresolvable ref is, and only because baseline mode was requested.
#[derive(Debug, Error)]
pub enum BaselineError {
    #[error("baseline ref `{git_ref}` could not be resolved: {detail}")]
    RefNotResolvable { git_ref: String, detail: String },
    #[error("baseline requested outside a git repository")]
    NotARepository,
}

/// Top-level review failures. Per-rule and per-enrichment failures never
/// surface here; they degrade to run-level warnings.
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("no reviewable documents were loaded")]
    NoDocuments,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Baseline(#[from] BaselineError),
}
