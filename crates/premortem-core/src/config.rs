use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;
use tracing::debug;

use crate::error::ConfigError;
use crate::report::{Category, Severity};
use crate::rules::Profile;

pub const CONFIG_FILE_NAME: &str = ".premortem.yml";

/// Optional LLM enrichment settings. Enrichment stays off unless `enabled`
/// is set and the run opts in.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LlmConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_max_enrichments")]
    pub max_enrichments_per_run: usize,
}

fn default_provider() -> String {
    "noop".to_string()
}

fn default_max_retries() -> u32 {
    2
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_max_enrichments() -> usize {
    3
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_provider(),
            model: None,
            max_retries: default_max_retries(),
            timeout_seconds: default_timeout_seconds(),
            max_enrichments_per_run: default_max_enrichments(),
        }
    }
}

/// A validated suppression rule. Construction is the only place scope globs,
/// expiry dates, profile and severity names are checked, so an instance in
/// hand is always well-formed. Configuration order is preserved by the
/// containing `Vec` and is significant: first match wins.
#[derive(Debug, Clone)]
pub struct SuppressionRule {
    pub id: String,
    pub reason: String,
    pub expires: Option<NaiveDate>,
    pub scope: Option<Vec<String>>,
    pub profiles: Option<Vec<Profile>>,
    pub severities: Option<Vec<Severity>>,
    scope_set: Option<GlobSet>,
}

impl SuppressionRule {
    pub fn from_raw(raw: RawSuppression) -> Result<Self, ConfigError> {
        let id = raw.id;
        let reason = raw
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|reason| !reason.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ConfigError::MissingReason { id: id.clone() })?;

        let expires = match raw.expires {
            None => None,
            Some(value) => Some(NaiveDate::parse_from_str(&value, "%Y-%m-%d").map_err(|_| {
                ConfigError::InvalidExpiry {
                    id: id.clone(),
                    value,
                }
            })?),
        };

        let scope_set = match &raw.scope {
            None => None,
            Some(patterns) => {
                let mut builder = GlobSetBuilder::new();
                for pattern in patterns {
                    let glob = Glob::new(pattern).map_err(|source| ConfigError::InvalidScope {
                        id: id.clone(),
                        pattern: pattern.clone(),
                        source,
                    })?;
                    builder.add(glob);
                }
                Some(
                    builder
                        .build()
                        .map_err(|source| ConfigError::InvalidScope {
                            id: id.clone(),
                            pattern: patterns.join(","),
                            source,
                        })?,
                )
            }
        };

        let profiles = match raw.profiles {
            None => None,
            Some(values) => Some(
                values
                    .into_iter()
                    .map(|value| {
                        value
                            .parse::<Profile>()
                            .map_err(|_| ConfigError::UnknownProfile {
                                id: id.clone(),
                                value,
                            })
                    })
                    .collect::<Result<Vec<_>, _>>()?,
            ),
        };

        let severities = match raw.severities {
            None => None,
            Some(values) => Some(
                values
                    .into_iter()
                    .map(|value| match value.to_ascii_lowercase().as_str() {
                        "low" => Ok(Severity::Low),
                        "medium" => Ok(Severity::Medium),
                        "high" => Ok(Severity::High),
                        _ => Err(ConfigError::UnknownSeverity {
                            id: id.clone(),
                            value,
                        }),
                    })
                    .collect::<Result<Vec<_>, _>>()?,
            ),
        };

        Ok(Self {
            id,
            reason,
            expires,
            scope: raw.scope,
            profiles,
            severities,
            scope_set,
        })
    }

    /// Scope predicate: unset scope matches every path.
    pub fn matches_path(&self, path: &str) -> bool {
        self.scope_set
            .as_ref()
            .map_or(true, |globs| globs.is_match(path))
    }
}

/// Wire format of one suppression entry, before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSuppression {
    pub id: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub expires: Option<String>,
    #[serde(default)]
    pub scope: Option<Vec<String>>,
    #[serde(default)]
    pub profiles: Option<Vec<String>>,
    #[serde(default)]
    pub severities: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct RawConfig {
    #[serde(default)]
    default_profile: Option<String>,
    #[serde(default)]
    ignore_paths: Vec<String>,
    #[serde(default)]
    redact_patterns: Vec<String>,
    #[serde(default)]
    category_weights: BTreeMap<Category, f64>,
    #[serde(default)]
    suppressions: Vec<RawSuppression>,
    #[serde(default)]
    llm: Option<LlmConfig>,
}

/// The one immutable configuration value passed through every component.
#[derive(Debug, Clone)]
pub struct ReviewConfig {
    pub default_profile: Profile,
    pub ignore_paths: Vec<String>,
    pub redact_patterns: Vec<String>,
    pub category_weights: BTreeMap<Category, f64>,
    pub suppressions: Vec<SuppressionRule>,
    pub llm: Option<LlmConfig>,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            default_profile: Profile::General,
            ignore_paths: Vec::new(),
            redact_patterns: Vec::new(),
            category_weights: default_category_weights(),
            suppressions: Vec::new(),
            llm: None,
        }
    }
}

pub fn default_category_weights() -> BTreeMap<Category, f64> {
    BTreeMap::from([
        (Category::Requirements, 1.0),
        (Category::Architecture, 1.0),
        (Category::Testing, 1.0),
        (Category::Operations, 1.0),
        (Category::Security, 1.5),
        (Category::Performance, 0.8),
        (Category::Reliability, 1.2),
        (Category::Documentation, 0.5),
    ])
}

impl ReviewConfig {
    /// Parse and validate a configuration document. Any invalid suppression
    /// entry, redact pattern, or ignore glob fails the whole load.
    pub fn from_yaml(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let default_profile = match raw.default_profile {
            None => Profile::General,
            Some(value) => value
                .parse::<Profile>()
                .map_err(|_| ConfigError::UnknownProfile {
                    id: "default_profile".to_string(),
                    value,
                })?,
        };

        for pattern in &raw.redact_patterns {
            regex::Regex::new(pattern).map_err(|source| ConfigError::InvalidRedactPattern {
                pattern: pattern.clone(),
                source,
            })?;
        }

        for pattern in &raw.ignore_paths {
            Glob::new(pattern).map_err(|source| ConfigError::InvalidIgnoreGlob {
                pattern: pattern.clone(),
                source,
            })?;
        }

        // Provided weights override defaults per category; unmentioned
        // categories keep their default weight.
        let mut category_weights = default_category_weights();
        for (category, weight) in raw.category_weights {
            category_weights.insert(category, weight);
        }

        let suppressions = raw
            .suppressions
            .into_iter()
            .map(SuppressionRule::from_raw)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            default_profile,
            ignore_paths: raw.ignore_paths,
            redact_patterns: raw.redact_patterns,
            category_weights,
            suppressions,
            llm: raw.llm,
        })
    }
}

/// Find and load `.premortem.yml` by searching upward from `start`. A
/// missing file yields the defaults; a present-but-invalid file is a hard
/// error.
pub fn load_config(start: &Path) -> Result<ReviewConfig, ConfigError> {
    let mut current = Some(start);
    while let Some(dir) = current {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            debug!(path = %candidate.display(), "loading configuration");
            let text = fs::read_to_string(&candidate).map_err(|source| ConfigError::Io {
                path: candidate.clone(),
                source,
            })?;
            return ReviewConfig::from_yaml(&text, &candidate);
        }
        current = dir.parent();
    }
    Ok(ReviewConfig::default())
}
