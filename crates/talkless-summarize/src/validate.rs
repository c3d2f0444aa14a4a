//! Summary validation.
//!
//! A summary is accepted only if its length is within bounds, its citation
//! coverage meets the configured requirement, it contains no long verbatim
//! span from any source body, and the generation temperature respected the
//! configured ceiling.

use std::collections::HashSet;
use std::fmt;

use talkless_core::{Article, Citation, SummarizationConfig};

/// Why a summary was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationViolation {
    /// Shorter than `min_summary_length`.
    TooShort { len: usize, min: usize },
    /// Longer than `max_summary_length`.
    TooLong { len: usize, max: usize },
    /// Required source citations are absent.
    MissingCitations { missing: Vec<String> },
    /// A verbatim span of at least `min_copied_span` words was found.
    CopiedSpan { phrase: String },
    /// The configured temperature exceeds the ceiling.
    TemperatureTooHigh { used: f32, max: f32 },
}

impl ValidationViolation {
    /// Stable machine-readable code recorded in failure reasons.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationViolation::TooShort { .. } | ValidationViolation::TooLong { .. } => "length",
            ValidationViolation::MissingCitations { .. } => "citation_coverage",
            ValidationViolation::CopiedSpan { .. } => "copied_span",
            ValidationViolation::TemperatureTooHigh { .. } => "temperature",
        }
    }
}

impl fmt::Display for ValidationViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationViolation::TooShort { len, min } => {
                write!(f, "length: {len} chars is below the {min} minimum")
            }
            ValidationViolation::TooLong { len, max } => {
                write!(f, "length: {len} chars is above the {max} maximum")
            }
            ValidationViolation::MissingCitations { missing } => {
                write!(f, "citation_coverage: missing {}", missing.join(", "))
            }
            ValidationViolation::CopiedSpan { phrase } => {
                write!(f, "copied_span: \"{phrase}\"")
            }
            ValidationViolation::TemperatureTooHigh { used, max } => {
                write!(f, "temperature: {used} exceeds the {max} ceiling")
            }
        }
    }
}

/// Validate a candidate summary against its group's member articles.
///
/// Checks run in a fixed order (temperature, length, citations, copied
/// span) and the first violation wins.
pub fn validate(
    text: &str,
    members: &[&Article],
    citations: &[Citation],
    config: &SummarizationConfig,
) -> Result<(), ValidationViolation> {
    if config.temperature > config.max_temperature {
        return Err(ValidationViolation::TemperatureTooHigh {
            used: config.temperature,
            max: config.max_temperature,
        });
    }

    let len = text.chars().count();
    if len < config.min_summary_length {
        return Err(ValidationViolation::TooShort {
            len,
            min: config.min_summary_length,
        });
    }
    if len > config.max_summary_length {
        return Err(ValidationViolation::TooLong {
            len,
            max: config.max_summary_length,
        });
    }

    check_citation_coverage(members, citations, config)?;
    check_copied_span(text, members, config.min_copied_span)?;
    Ok(())
}

fn check_citation_coverage(
    members: &[&Article],
    citations: &[Citation],
    config: &SummarizationConfig,
) -> Result<(), ValidationViolation> {
    let mut group_sources: Vec<&str> = members.iter().map(|a| a.source_name.as_str()).collect();
    group_sources.sort_unstable();
    group_sources.dedup();

    let cited: HashSet<&str> = citations.iter().map(|c| c.source_name.as_str()).collect();

    // 0 means "every source in the group"; anything else is clamped to the
    // group's source count.
    let required = if config.required_citation_coverage == 0 {
        group_sources.len()
    } else {
        config.required_citation_coverage.min(group_sources.len())
    };

    if cited.len() >= required {
        return Ok(());
    }

    let missing: Vec<String> = group_sources
        .iter()
        .filter(|s| !cited.contains(**s))
        .map(|s| s.to_string())
        .collect();
    Err(ValidationViolation::MissingCitations { missing })
}

/// Tokenize for the copied-span comparison: lowercase, punctuation
/// stripped, whitespace-normalized.
fn span_tokens(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

fn check_copied_span(
    text: &str,
    members: &[&Article],
    min_span: usize,
) -> Result<(), ValidationViolation> {
    if min_span == 0 {
        return Ok(());
    }
    let summary_tokens = span_tokens(text);
    if summary_tokens.len() < min_span {
        return Ok(());
    }

    let mut source_ngrams: HashSet<Vec<&str>> = HashSet::new();
    let member_tokens: Vec<Vec<String>> = members
        .iter()
        .map(|a| span_tokens(&a.content))
        .collect();
    for tokens in &member_tokens {
        for window in tokens.windows(min_span) {
            source_ngrams.insert(window.iter().map(String::as_str).collect());
        }
    }

    for window in summary_tokens.windows(min_span) {
        let key: Vec<&str> = window.iter().map(String::as_str).collect();
        if source_ngrams.contains(&key) {
            return Err(ValidationViolation::CopiedSpan {
                phrase: window.join(" "),
            });
        }
    }
    Ok(())
}
