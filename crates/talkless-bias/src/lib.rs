//! Rule-based bias detection for the Talk-Less pipeline.
//!
//! Deliberately auditable: no learned component, only configured rules.
//! The [`BiasDetector`] compiles the three rule families once per run and
//! scans each article's title and body, producing typed indicators and a
//! deterministic transparency report.

pub mod matcher;
pub mod report;

use talkless_core::{
    Article, BiasIndicator, BiasReport, BiasRulesFile, RuleConfidence, RuleScope,
};

use crate::matcher::{
    compile_attribution, compile_framing, compile_loaded_word, scan, CompiledRule,
};

/// Applies configured bias rules to articles.
pub struct BiasDetector {
    loaded: Vec<CompiledRule>,
    attribution: Vec<CompiledRule>,
    framing: Vec<CompiledRule>,
    min_confidence: RuleConfidence,
    flag_threshold: f64,
}

impl BiasDetector {
    /// Compile a detector from a parsed rules file.
    ///
    /// Individual uncompilable patterns are logged and skipped; the file
    /// itself was already validated when parsed.
    pub fn from_rules(rules: &BiasRulesFile) -> Self {
        let loaded: Vec<CompiledRule> = rules
            .loaded_words
            .iter()
            .filter_map(compile_loaded_word)
            .collect();
        let attribution: Vec<CompiledRule> = rules
            .attribution_patterns
            .iter()
            .filter_map(compile_attribution)
            .collect();
        let framing: Vec<CompiledRule> = rules
            .framing_patterns
            .iter()
            .filter_map(compile_framing)
            .collect();

        tracing::info!(
            loaded = loaded.len(),
            attribution = attribution.len(),
            framing = framing.len(),
            "compiled bias rules"
        );

        Self {
            loaded,
            attribution,
            framing,
            min_confidence: rules.min_confidence,
            flag_threshold: rules.flag_threshold,
        }
    }

    /// Detect all indicators in one article.
    ///
    /// The output order is fixed: loaded language, then attribution, then
    /// framing; within a family, configuration order; within a rule, title
    /// matches before body matches in text order. Identical input text
    /// always yields the identical indicator list.
    pub fn detect(&self, article: &Article) -> Vec<BiasIndicator> {
        let mut indicators = Vec::new();

        for rule in self.loaded.iter().chain(self.attribution.iter()) {
            if matches!(rule.scope, RuleScope::Title | RuleScope::Any) {
                self.collect_matches(rule, &article.title, article, &mut indicators);
            }
            if matches!(rule.scope, RuleScope::Body | RuleScope::Any) {
                self.collect_matches(rule, &article.content, article, &mut indicators);
            }
        }

        // Framing rules compare the headline against the body: a pattern
        // present in the title but absent from the body is the indicator.
        for rule in &self.framing {
            if rule.regex.is_match(&article.content) {
                continue;
            }
            self.collect_matches(rule, &article.title, article, &mut indicators);
        }

        indicators
    }

    fn collect_matches(
        &self,
        rule: &CompiledRule,
        text: &str,
        article: &Article,
        out: &mut Vec<BiasIndicator>,
    ) {
        for hit in scan(rule, text) {
            out.push(BiasIndicator {
                kind: rule.kind,
                article_id: article.id.clone(),
                pattern: rule.pattern.clone(),
                matched: hit.matched,
                context: hit.context,
                confidence: rule.confidence,
                weight: rule.weight,
            });
        }
    }

    /// Detect indicators across a batch, in article order.
    pub fn detect_all(&self, articles: &[Article]) -> Vec<BiasIndicator> {
        let mut all = Vec::new();
        for article in articles {
            let found = self.detect(article);
            if !found.is_empty() {
                tracing::debug!(article = %article.id, indicators = found.len(), "bias indicators found");
            }
            all.extend(found);
        }
        all
    }

    /// Build the transparency report for a batch and its indicators.
    pub fn report(&self, articles: &[Article], indicators: &[BiasIndicator]) -> BiasReport {
        report::build_report(articles, indicators, self.min_confidence, self.flag_threshold)
    }

    /// Raw aggregate score (sum of weights) for one article's indicators.
    pub fn article_score(indicators: &[BiasIndicator], article_id: &str) -> f64 {
        indicators
            .iter()
            .filter(|i| i.article_id == article_id)
            .map(|i| i.weight)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use talkless_core::{BiasKind, RuleEntry};

    fn rules_from_toml(toml: &str) -> BiasRulesFile {
        BiasRulesFile::from_toml(toml).unwrap()
    }

    fn article(id: &str, title: &str, content: &str) -> Article {
        Article {
            id: id.into(),
            source_id: "ap".into(),
            source_name: "AP".into(),
            title: title.into(),
            url: format!("https://example.com/{id}"),
            author: None,
            published_at: Utc::now(),
            content: content.into(),
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn loaded_language_produces_one_indicator_with_context() {
        let rules = rules_from_toml(
            r#"
[[loaded_words]]
pattern = "slammed"
weight = 1.0
"#,
        );
        let detector = BiasDetector::from_rules(&rules);
        let article = article(
            "a1",
            "Council votes on zoning",
            "Critics slammed the proposal at the hearing.",
        );
        let indicators = detector.detect(&article);
        assert_eq!(indicators.len(), 1);
        assert_eq!(indicators[0].kind, BiasKind::LoadedLanguage);
        assert!(indicators[0].context.contains("slammed the proposal"));
        assert!(BiasDetector::article_score(&indicators, "a1") >= 1.0);
    }

    #[test]
    fn scope_restricts_where_rules_match() {
        let rules = rules_from_toml(
            r#"
[[loaded_words]]
pattern = "chaos"
scope = "title"
"#,
        );
        let detector = BiasDetector::from_rules(&rules);
        let title_hit = detector.detect(&article("a1", "Chaos at the port", "Calm body."));
        assert_eq!(title_hit.len(), 1);
        let body_only = detector.detect(&article("a2", "Calm title", "Chaos in the body."));
        assert!(body_only.is_empty());
    }

    #[test]
    fn any_scope_matches_title_and_body() {
        let rules = rules_from_toml(
            r#"
[[loaded_words]]
pattern = "chaos"
"#,
        );
        let detector = BiasDetector::from_rules(&rules);
        let both = detector.detect(&article("a1", "Chaos rising", "More chaos below."));
        assert_eq!(both.len(), 2);
    }

    #[test]
    fn attribution_pattern_matches_weak_sourcing() {
        let rules = rules_from_toml(
            r#"
[[attribution_patterns]]
pattern = 'sources? say'
scope = "body"
"#,
        );
        let detector = BiasDetector::from_rules(&rules);
        let indicators = detector.detect(&article(
            "a1",
            "Deal near",
            "Sources say the agreement could land this week.",
        ));
        assert_eq!(indicators.len(), 1);
        assert_eq!(indicators[0].kind, BiasKind::Attribution);
    }

    #[test]
    fn framing_fires_only_when_title_claim_is_absent_from_body() {
        let rules = rules_from_toml(
            r#"
[[framing_patterns]]
pattern = '\bworst\b'
"#,
        );
        let detector = BiasDetector::from_rules(&rules);

        let unsupported = detector.detect(&article(
            "a1",
            "Worst storm in a decade",
            "Rain fell steadily through the night.",
        ));
        assert_eq!(unsupported.len(), 1);
        assert_eq!(unsupported[0].kind, BiasKind::Framing);
        assert_eq!(unsupported[0].confidence, RuleConfidence::Low);

        let supported = detector.detect(&article(
            "a2",
            "Worst storm in a decade",
            "Meteorologists called it the worst storm since 2016.",
        ));
        assert!(supported.is_empty());
    }

    #[test]
    fn detection_order_is_stable() {
        let rules = rules_from_toml(
            r#"
[[loaded_words]]
pattern = "slammed"

[[loaded_words]]
pattern = "chaos"

[[attribution_patterns]]
pattern = 'sources? say'
"#,
        );
        let detector = BiasDetector::from_rules(&rules);
        let a = article(
            "a1",
            "Chaos as council meets",
            "Critics slammed the plan. Sources say more chaos is coming.",
        );
        let first = detector.detect(&a);
        let second = detector.detect(&a);
        let as_tuples = |v: &[BiasIndicator]| -> Vec<(BiasKind, String)> {
            v.iter().map(|i| (i.kind, i.matched.clone())).collect()
        };
        assert_eq!(as_tuples(&first), as_tuples(&second));
        assert_eq!(first.len(), 4);
        assert_eq!(first[0].matched.to_lowercase(), "slammed");
    }

    #[test]
    fn uncompilable_rule_is_dropped_others_survive() {
        let rules = BiasRulesFile {
            attribution_patterns: vec![
                RuleEntry {
                    pattern: "broken (regex".into(),
                    scope: Default::default(),
                    confidence: None,
                    weight: None,
                },
                RuleEntry {
                    pattern: "experts warn".into(),
                    scope: Default::default(),
                    confidence: None,
                    weight: None,
                },
            ],
            ..BiasRulesFile::default()
        };
        let detector = BiasDetector::from_rules(&rules);
        let indicators =
            detector.detect(&article("a1", "Title", "Experts warn of delays ahead."));
        assert_eq!(indicators.len(), 1);
    }

    #[test]
    fn empty_rule_set_detects_nothing() {
        let detector = BiasDetector::from_rules(&BiasRulesFile::default());
        assert!(detector
            .detect(&article("a1", "Anything", "Any body at all."))
            .is_empty());
    }
}
