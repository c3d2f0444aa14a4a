//! Perspective and coverage metrics for article groups.

use talkless_core::{Article, Source};

/// Distinct sources divided by member count, in `[0, 1]`.
///
/// # Examples
///
/// ```
/// use talkless_group::perspective::source_diversity;
///
/// assert_eq!(source_diversity(2, 2), 1.0);
/// assert_eq!(source_diversity(1, 4), 0.25);
/// assert_eq!(source_diversity(0, 0), 0.0);
/// ```
pub fn source_diversity(distinct_sources: usize, total_articles: usize) -> f64 {
    if total_articles == 0 {
        0.0
    } else {
        distinct_sources as f64 / total_articles as f64
    }
}

/// Enabled sources absent from a group, sorted by id. Advisory metadata
/// surfacing possible selection bias.
pub fn coverage_gaps(enabled_sources: &[Source], group_source_ids: &[String]) -> Vec<String> {
    let mut gaps: Vec<String> = enabled_sources
        .iter()
        .filter(|s| !group_source_ids.iter().any(|id| id == &s.id))
        .map(|s| s.id.clone())
        .collect();
    gaps.sort();
    gaps
}

/// Distinct source ids among `articles`, sorted ascending.
pub fn distinct_source_ids(articles: &[&Article]) -> Vec<String> {
    let mut ids: Vec<String> = articles.iter().map(|a| a.source_id.clone()).collect();
    ids.sort();
    ids.dedup();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use talkless_core::SourceKind;

    fn source(id: &str) -> Source {
        Source {
            id: id.into(),
            name: id.to_uppercase(),
            kind: SourceKind::Rss,
            url: format!("https://example.com/{id}"),
            credential_env: None,
            declared_lean: None,
            enabled: true,
            requests_per_minute: 60,
            api_fields: None,
        }
    }

    #[test]
    fn diversity_is_one_when_every_article_has_its_own_source() {
        assert_eq!(source_diversity(3, 3), 1.0);
    }

    #[test]
    fn diversity_shrinks_with_repeat_sources() {
        assert_eq!(source_diversity(2, 4), 0.5);
    }

    #[test]
    fn gaps_are_the_enabled_sources_not_in_the_group() {
        let sources = vec![source("ap"), source("reuters"), source("wire")];
        let gaps = coverage_gaps(&sources, &["reuters".to_string()]);
        assert_eq!(gaps, vec!["ap".to_string(), "wire".to_string()]);
    }

    #[test]
    fn no_gaps_when_all_sources_present() {
        let sources = vec![source("ap"), source("wire")];
        let present = vec!["ap".to_string(), "wire".to_string()];
        assert!(coverage_gaps(&sources, &present).is_empty());
    }
}
