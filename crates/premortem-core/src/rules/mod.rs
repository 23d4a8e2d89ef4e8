use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::document::{Document, Section};
use crate::report::{Category, EvidenceLine, Severity};

mod catalog;
pub mod evaluator;

pub use catalog::catalog;

/// Named subset of rules applicable to a review run. `General` is the
/// universal superset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    General,
    Security,
    Performance,
    Reliability,
}

impl Profile {
    pub fn as_str(self) -> &'static str {
        match self {
            Profile::General => "general",
            Profile::Security => "security",
            Profile::Performance => "performance",
            Profile::Reliability => "reliability",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "general" => Ok(Profile::General),
            "security" => Ok(Profile::Security),
            "performance" => Ok(Profile::Performance),
            "reliability" => Ok(Profile::Reliability),
            other => Err(format!("unknown profile `{other}`")),
        }
    }
}

/// Detection contract: a pure function of document content and extracted
/// sections. `Some(evidence)` means the rule fired. Detectors must not touch
/// the clock, randomness, or process environment.
pub type DetectFn = fn(&Document, &[Section]) -> Option<Vec<EvidenceLine>>;

/// Immutable rule descriptor. Ids are append-only and globally unique.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub id: &'static str,
    pub title: &'static str,
    pub severity: Severity,
    pub category: Category,
    pub impact: &'static str,
    pub recommendation: &'static str,
    pub pitfalls: &'static str,
    pub detect: DetectFn,
}

impl Rule {
    /// Profile membership. Mirrors the profile rule sets the catalog was
    /// designed around; `General` always includes every rule.
    pub fn applies_to(&self, profile: Profile) -> bool {
        match profile {
            Profile::General => true,
            Profile::Security => {
                self.id.starts_with("REQ-")
                    || self.id.starts_with("SEC-")
                    || self.id == "ARCH-003"
                    || self.id == "OPS-002"
            }
            Profile::Performance => {
                self.id.starts_with("ARCH-")
                    || self.id.starts_with("PERF-")
                    || self.id.starts_with("TEST-")
            }
            Profile::Reliability => matches!(
                self.id,
                "ARCH-001" | "TEST-001" | "OPS-001" | "OPS-002" | "PERF-001"
            ),
        }
    }
}

/// Look up a rule descriptor by id.
pub fn find(rule_id: &str) -> Option<&'static Rule> {
    catalog().iter().find(|rule| rule.id == rule_id)
}
