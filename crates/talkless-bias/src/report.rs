//! Transparency report assembly.
//!
//! Everything here is deterministic from its inputs: maps are ordered,
//! token rankings break ties lexicographically, and flagged articles are
//! sorted by id.

use std::collections::BTreeMap;

use talkless_core::{Article, BiasIndicator, BiasReport, RuleConfidence, SourceBiasStats};

/// Number of top matched tokens listed per source.
const TOP_TOKENS: usize = 5;

/// Sum of indicator weights for one article.
///
/// # Examples
///
/// ```
/// use talkless_bias::report::article_score;
///
/// assert_eq!(article_score(&[]), 0.0);
/// ```
pub fn article_score(indicators: &[&BiasIndicator]) -> f64 {
    indicators.iter().map(|i| i.weight).sum()
}

/// Aggregate score normalized per 1000 characters of body text, the form
/// used for cross-article comparison in reports.
pub fn normalized_score(indicators: &[&BiasIndicator], body_chars: usize) -> f64 {
    let raw = article_score(indicators);
    raw / (body_chars.max(1) as f64 / 1000.0)
}

/// Build the per-run transparency report.
///
/// Indicators below `min_confidence` stay out of every aggregate (but remain
/// in the raw indicator list the caller holds). `flag_threshold` applies to
/// the raw per-article weight sum.
pub fn build_report(
    articles: &[Article],
    indicators: &[BiasIndicator],
    min_confidence: RuleConfidence,
    flag_threshold: f64,
) -> BiasReport {
    let reported: Vec<&BiasIndicator> = indicators
        .iter()
        .filter(|i| i.confidence.meets_threshold(min_confidence))
        .collect();

    let mut by_kind: BTreeMap<String, usize> = BTreeMap::new();
    for indicator in &reported {
        *by_kind.entry(indicator.kind.to_string()).or_default() += 1;
    }

    let mut per_article: BTreeMap<&str, Vec<&BiasIndicator>> = BTreeMap::new();
    for indicator in &reported {
        per_article
            .entry(indicator.article_id.as_str())
            .or_default()
            .push(indicator);
    }

    let mut by_source: BTreeMap<String, SourceBiasStats> = BTreeMap::new();
    for source_id in articles.iter().map(|a| a.source_id.clone()) {
        by_source.entry(source_id).or_insert(SourceBiasStats {
            articles: 0,
            indicators: 0,
            mean_indicators_per_article: 0.0,
            top_tokens: Vec::new(),
        });
    }

    let mut token_counts: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();
    for article in articles {
        let stats = by_source
            .get_mut(&article.source_id)
            .expect("every article's source was seeded above");
        stats.articles += 1;
        if let Some(found) = per_article.get(article.id.as_str()) {
            stats.indicators += found.len();
            let tokens = token_counts.entry(article.source_id.clone()).or_default();
            for indicator in found {
                *tokens
                    .entry(indicator.matched.to_lowercase())
                    .or_default() += 1;
            }
        }
    }

    for (source_id, stats) in by_source.iter_mut() {
        if stats.articles > 0 {
            stats.mean_indicators_per_article = stats.indicators as f64 / stats.articles as f64;
        }
        if let Some(tokens) = token_counts.get(source_id) {
            let mut ranked: Vec<(&String, &usize)> = tokens.iter().collect();
            ranked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
            stats.top_tokens = ranked
                .into_iter()
                .take(TOP_TOKENS)
                .map(|(token, _)| token.clone())
                .collect();
        }
    }

    let mut flagged_articles: Vec<String> = per_article
        .iter()
        .filter(|(_, found)| article_score(found) > flag_threshold)
        .map(|(id, _)| id.to_string())
        .collect();
    flagged_articles.sort();

    BiasReport {
        total_indicators: reported.len(),
        by_kind,
        by_source,
        flagged_articles,
    }
}
