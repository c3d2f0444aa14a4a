use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TalklessError;
use crate::types::RuleConfidence;

/// Where a bias rule is applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleScope {
    /// Headline only.
    Title,
    /// Body only.
    Body,
    /// Headline and body.
    #[default]
    Any,
}

impl FromStr for RuleScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "title" => Ok(RuleScope::Title),
            "body" => Ok(RuleScope::Body),
            "any" => Ok(RuleScope::Any),
            other => Err(format!("unknown rule scope: {other}")),
        }
    }
}

/// One configured bias rule.
///
/// `confidence` is optional; when absent, the family default applies
/// (medium for loaded language and attribution, low for framing).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleEntry {
    /// Literal token/phrase (loaded language) or regex (attribution, framing).
    pub pattern: String,
    /// Scope the rule scans.
    #[serde(default)]
    pub scope: RuleScope,
    /// Confidence override for this rule.
    #[serde(default)]
    pub confidence: Option<RuleConfidence>,
    /// Score contribution of each match (default 1.0).
    #[serde(default)]
    pub weight: Option<f64>,
}

/// The bias rules configuration document.
///
/// Rule-file problems are configuration errors: a run cannot start without
/// an intact rule set.
///
/// # Examples
///
/// ```
/// use talkless_core::BiasRulesFile;
///
/// let toml = r#"
/// min_confidence = "medium"
///
/// [[loaded_words]]
/// pattern = "slammed"
/// weight = 1.0
/// "#;
/// let rules = BiasRulesFile::from_toml(toml).unwrap();
/// assert_eq!(rules.loaded_words.len(), 1);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiasRulesFile {
    /// Emotionally loaded tokens and phrases, matched on word boundaries.
    #[serde(default)]
    pub loaded_words: Vec<RuleEntry>,
    /// Weak-sourcing patterns (regex), e.g. `sources say`.
    #[serde(default)]
    pub attribution_patterns: Vec<RuleEntry>,
    /// Headline/body framing patterns (regex applied to the title, checked
    /// against the body).
    #[serde(default)]
    pub framing_patterns: Vec<RuleEntry>,
    /// Indicators below this confidence stay in raw output but are excluded
    /// from reports.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: RuleConfidence,
    /// Articles whose aggregate score exceeds this are listed in the report.
    #[serde(default = "default_flag_threshold")]
    pub flag_threshold: f64,
}

fn default_min_confidence() -> RuleConfidence {
    RuleConfidence::Low
}

fn default_flag_threshold() -> f64 {
    3.0
}

impl Default for BiasRulesFile {
    fn default() -> Self {
        Self {
            loaded_words: Vec::new(),
            attribution_patterns: Vec::new(),
            framing_patterns: Vec::new(),
            min_confidence: default_min_confidence(),
            flag_threshold: default_flag_threshold(),
        }
    }
}

impl BiasRulesFile {
    /// Load the rules file from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`TalklessError::FileNotFound`] or [`TalklessError::Toml`];
    /// both are fatal for the run.
    pub fn from_file(path: &Path) -> Result<Self, TalklessError> {
        if !path.exists() {
            return Err(TalklessError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse a rules document from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, TalklessError> {
        let rules: Self = toml::from_str(content)?;
        Ok(rules)
    }

    /// Total configured rules across all families.
    pub fn len(&self) -> usize {
        self.loaded_words.len() + self.attribution_patterns.len() + self.framing_patterns.len()
    }

    /// `true` when no rules are configured at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
