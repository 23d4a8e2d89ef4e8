use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::document::Document;
use crate::error::{ConfigError, DocumentLoadError};

/// Extensions treated as reviewable documents.
pub const SUPPORTED_EXTS: &[&str] = &["md", "txt", "json", "yaml", "yml"];

/// Per-file content cap; larger files are truncated with a marker.
pub const MAX_FILE_CHARS: usize = 200_000;

const REDACTED_MARKER: &str = "***REDACTED***";

static DEFAULT_REDACT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r#"(?i)(api[_-]?key|token|secret|password)\s*[:=]\s*['"]?[\w\-]{8,}['"]?"#,
        r"(?i)(bearer|basic)\s+[\w\-\.=]+",
        r#"['"][A-Za-z0-9+/]{40,}={0,2}['"]"#,
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("static redact pattern"))
    .collect()
});

/// Secret redaction applied before any document content reaches the core.
/// Custom patterns are validated here so a bad one fails the run up front.
#[derive(Debug, Clone)]
pub struct Redactor {
    custom: Vec<Regex>,
}

impl Redactor {
    pub fn new(custom_patterns: &[String]) -> Result<Self, ConfigError> {
        let custom = custom_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| ConfigError::InvalidRedactPattern {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { custom })
    }

    pub fn apply(&self, content: &str) -> String {
        let mut redacted = content.to_string();
        for pattern in DEFAULT_REDACT_PATTERNS.iter().chain(self.custom.iter()) {
            redacted = pattern.replace_all(&redacted, REDACTED_MARKER).into_owned();
        }
        redacted
    }
}

fn supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_EXTS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn ignore_set(ignore_paths: &[String]) -> Result<GlobSet, ConfigError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in ignore_paths {
        let glob = Glob::new(pattern).map_err(|source| ConfigError::InvalidIgnoreGlob {
            pattern: pattern.clone(),
            source,
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| ConfigError::InvalidIgnoreGlob {
        pattern: ignore_paths.join(","),
        source,
    })
}

/// Discover reviewable files for a path, directory, or glob pattern,
/// filtered by the configured ignore globs. The result is sorted and
/// de-duplicated so downstream processing is deterministic.
pub fn discover(path_or_glob: &str, ignore_paths: &[String]) -> Result<Vec<PathBuf>, ConfigError> {
    let ignores = ignore_set(ignore_paths)?;
    let path = Path::new(path_or_glob);

    let mut found: BTreeSet<PathBuf> = BTreeSet::new();
    if path.is_file() {
        if supported(path) {
            found.insert(path.to_path_buf());
        }
    } else if path.is_dir() {
        collect_dir(path, &mut found);
    } else {
        let glob = Glob::new(path_or_glob)
            .map_err(|source| ConfigError::InvalidIgnoreGlob {
                pattern: path_or_glob.to_string(),
                source,
            })?
            .compile_matcher();
        let mut candidates = BTreeSet::new();
        collect_dir(Path::new("."), &mut candidates);
        for candidate in candidates {
            let relative = candidate.strip_prefix(".").unwrap_or(&candidate);
            if glob.is_match(relative) {
                found.insert(relative.to_path_buf());
            }
        }
    }

    let files: Vec<PathBuf> = found
        .into_iter()
        .filter(|file| !ignores.is_match(file))
        .collect();
    debug!(files = files.len(), "document discovery complete");
    Ok(files)
}

fn collect_dir(dir: &Path, found: &mut BTreeSet<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_dir(&path, found);
        } else if supported(&path) {
            found.insert(path);
        }
    }
}

/// Load one document: read, truncate to the size cap, redact. The returned
/// `Document` is the only view of the content the core ever gets.
pub fn load_document(path: &Path, redactor: &Redactor) -> Result<Document, DocumentLoadError> {
    let content = fs::read_to_string(path).map_err(|source| DocumentLoadError {
        path: path.display().to_string(),
        source,
    })?;
    let content = truncate_chars(&content, MAX_FILE_CHARS);
    Ok(Document::new(
        path.display().to_string(),
        redactor.apply(&content),
    ))
}

/// Truncate baseline or on-disk content to the per-file cap, marking the cut.
pub fn truncate_chars(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        return content.to_string();
    }
    let mut truncated: String = content.chars().take(max_chars).collect();
    truncated.push_str("\n\n... (truncated due to size limit)");
    truncated
}
