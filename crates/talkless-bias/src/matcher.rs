//! Rule compilation and text scanning.
//!
//! Loaded-language rules are literal tokens or phrases matched
//! case-insensitively on word boundaries; attribution and framing rules are
//! regexes. A rule that fails to compile is logged and skipped — the rule
//! file itself was already validated as parseable configuration.

use regex::Regex;

use talkless_core::{BiasKind, RuleConfidence, RuleEntry, RuleScope};

/// Maximum length of an indicator's context span, in characters.
pub const MAX_CONTEXT_CHARS: usize = 120;

/// A rule compiled to its matching form.
pub struct CompiledRule {
    /// Rule family.
    pub kind: BiasKind,
    /// The pattern as configured, echoed into indicators.
    pub pattern: String,
    /// Compiled matcher.
    pub regex: Regex,
    /// Scope the rule scans.
    pub scope: RuleScope,
    /// Confidence (family default applied when the entry had none).
    pub confidence: RuleConfidence,
    /// Score contribution per match.
    pub weight: f64,
}

/// One raw match inside a scanned text.
pub struct RuleMatch {
    /// The exact matched text.
    pub matched: String,
    /// Context window around the match, at most [`MAX_CONTEXT_CHARS`] chars.
    pub context: String,
}

/// Compile a loaded-language entry: literal phrase, case-insensitive, word
/// boundaries on both ends.
pub fn compile_loaded_word(entry: &RuleEntry) -> Option<CompiledRule> {
    let pattern = format!(r"(?i)\b{}\b", regex::escape(entry.pattern.trim()));
    compile(BiasKind::LoadedLanguage, entry, &pattern, RuleConfidence::Medium)
}

/// Compile an attribution entry: the configured regex, case-insensitive.
pub fn compile_attribution(entry: &RuleEntry) -> Option<CompiledRule> {
    let pattern = format!("(?i:{})", entry.pattern);
    compile(BiasKind::Attribution, entry, &pattern, RuleConfidence::Medium)
}

/// Compile a framing entry: the configured regex, case-insensitive. Framing
/// rules are applied to the headline and checked against the body by the
/// detector.
pub fn compile_framing(entry: &RuleEntry) -> Option<CompiledRule> {
    let pattern = format!("(?i:{})", entry.pattern);
    compile(BiasKind::Framing, entry, &pattern, RuleConfidence::Low)
}

fn compile(
    kind: BiasKind,
    entry: &RuleEntry,
    pattern: &str,
    family_default: RuleConfidence,
) -> Option<CompiledRule> {
    match Regex::new(pattern) {
        Ok(regex) => Some(CompiledRule {
            kind,
            pattern: entry.pattern.clone(),
            regex,
            scope: entry.scope,
            confidence: entry.confidence.unwrap_or(family_default),
            weight: entry.weight.unwrap_or(1.0),
        }),
        Err(e) => {
            tracing::warn!(kind = %kind, pattern = %entry.pattern, error = %e, "skipping uncompilable rule");
            None
        }
    }
}

/// Scan `text` with a compiled rule, producing one [`RuleMatch`] per hit.
pub fn scan(rule: &CompiledRule, text: &str) -> Vec<RuleMatch> {
    rule.regex
        .find_iter(text)
        .map(|m| RuleMatch {
            matched: m.as_str().to_string(),
            context: context_span(text, m.start(), m.end()),
        })
        .collect()
}

/// Extract a window of at most [`MAX_CONTEXT_CHARS`] characters around the
/// byte range `[start, end)`, expanded evenly on both sides and clamped to
/// character boundaries.
pub fn context_span(text: &str, start: usize, end: usize) -> String {
    let matched_chars = text[start..end].chars().count();
    let budget = MAX_CONTEXT_CHARS.saturating_sub(matched_chars);
    let each_side = budget / 2;

    let prefix_start = {
        let mut taken = 0;
        let mut boundary = start;
        for (offset, _) in text[..start].char_indices().rev() {
            if taken == each_side {
                break;
            }
            boundary = offset;
            taken += 1;
        }
        boundary
    };

    let suffix_end = {
        let mut boundary = end;
        for (taken, (offset, ch)) in text[end..].char_indices().enumerate() {
            if taken == each_side {
                break;
            }
            boundary = end + offset + ch.len_utf8();
        }
        boundary
    };

    text[prefix_start..suffix_end].trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(pattern: &str) -> RuleEntry {
        RuleEntry {
            pattern: pattern.into(),
            scope: RuleScope::Any,
            confidence: None,
            weight: None,
        }
    }

    #[test]
    fn loaded_word_matches_on_word_boundaries() {
        let rule = compile_loaded_word(&entry("slammed")).unwrap();
        assert_eq!(scan(&rule, "The mayor slammed the proposal.").len(), 1);
        assert!(scan(&rule, "The door was unslammed.").is_empty());
    }

    #[test]
    fn loaded_word_is_case_insensitive() {
        let rule = compile_loaded_word(&entry("outrage")).unwrap();
        assert_eq!(scan(&rule, "OUTRAGE erupted downtown").len(), 1);
    }

    #[test]
    fn loaded_phrase_matches_whole_phrase() {
        let rule = compile_loaded_word(&entry("shock and awe")).unwrap();
        assert_eq!(scan(&rule, "a shock and awe campaign").len(), 1);
        assert!(scan(&rule, "a shock campaign").is_empty());
    }

    #[test]
    fn loaded_word_with_regex_metachars_is_escaped() {
        let rule = compile_loaded_word(&entry("cover-up?")).unwrap();
        assert_eq!(scan(&rule, "called it a cover-up? by officials").len(), 1);
    }

    #[test]
    fn attribution_patterns_are_regexes() {
        let rule = compile_attribution(&entry(r"sources? say")).unwrap();
        assert_eq!(scan(&rule, "Sources say the deal is near.").len(), 1);
        assert_eq!(scan(&rule, "A source says nothing.").len(), 0);
    }

    #[test]
    fn invalid_regex_is_skipped_not_fatal() {
        assert!(compile_attribution(&entry(r"unclosed (group")).is_none());
    }

    #[test]
    fn family_defaults_apply_when_confidence_absent() {
        let loaded = compile_loaded_word(&entry("slammed")).unwrap();
        assert_eq!(loaded.confidence, RuleConfidence::Medium);
        let framing = compile_framing(&entry("worst")).unwrap();
        assert_eq!(framing.confidence, RuleConfidence::Low);
    }

    #[test]
    fn explicit_confidence_and_weight_win() {
        let mut e = entry("slammed");
        e.confidence = Some(RuleConfidence::High);
        e.weight = Some(2.5);
        let rule = compile_loaded_word(&e).unwrap();
        assert_eq!(rule.confidence, RuleConfidence::High);
        assert_eq!(rule.weight, 2.5);
    }

    #[test]
    fn context_span_contains_the_match() {
        let text = "City council members slammed the proposal during a long night session.";
        let rule = compile_loaded_word(&entry("slammed")).unwrap();
        let matches = scan(&rule, text);
        assert_eq!(matches.len(), 1);
        assert!(matches[0].context.contains("slammed the proposal"));
        assert!(matches[0].context.chars().count() <= MAX_CONTEXT_CHARS);
    }

    #[test]
    fn context_span_caps_long_surroundings() {
        let filler = "word ".repeat(100);
        let text = format!("{filler}slammed{filler}");
        let start = text.find("slammed").unwrap();
        let span = context_span(&text, start, start + "slammed".len());
        assert!(span.chars().count() <= MAX_CONTEXT_CHARS);
        assert!(span.contains("slammed"));
    }

    #[test]
    fn context_span_respects_multibyte_boundaries() {
        let text = "célèbre — the mayor slammed the café — fin";
        let start = text.find("slammed").unwrap();
        let span = context_span(text, start, start + "slammed".len());
        assert!(span.contains("slammed"));
    }

    #[test]
    fn multiple_hits_yield_multiple_matches() {
        let rule = compile_loaded_word(&entry("chaos")).unwrap();
        let matches = scan(&rule, "Chaos here, chaos there, chaos everywhere.");
        assert_eq!(matches.len(), 3);
    }
}
