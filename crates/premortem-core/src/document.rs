use once_cell::sync::Lazy;
use regex::Regex;

/// An engineering document under review. Content is redacted before it
/// reaches this type; nothing in the core mutates it afterwards.
#[derive(Debug, Clone)]
pub struct Document {
    /// Path the document was loaded from, as given by the caller.
    pub path: String,
    pub text: String,
    /// Line index over `text`, used to anchor evidence to line numbers.
    pub lines: Vec<String>,
    pub char_count: usize,
}

/// A markdown section header with its 1-based line number and, when present,
/// the first non-empty line that follows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub line: usize,
    pub heading: String,
    pub context: Option<String>,
}

static HEADER_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#+\s*").expect("static regex"));

impl Document {
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let lines: Vec<String> = text.lines().map(str::to_owned).collect();
        let char_count = text.chars().count();
        Self {
            path: path.into(),
            text,
            lines,
            char_count,
        }
    }

    /// Extract markdown section headers in document order. Headings and
    /// context are normalized to lowercase for matching; line numbers stay
    /// anchored to the original text.
    pub fn sections(&self) -> Vec<Section> {
        let mut sections = Vec::new();
        for (idx, line) in self.lines.iter().enumerate() {
            let stripped = line.trim();
            if !stripped.starts_with('#') {
                continue;
            }
            let heading = HEADER_PREFIX.replace(stripped, "").trim().to_lowercase();
            let context = self
                .lines
                .get(idx + 1)
                .map(|next| next.trim().to_lowercase())
                .filter(|next| !next.is_empty());
            sections.push(Section {
                line: idx + 1,
                heading,
                context,
            });
        }
        sections
    }
}
