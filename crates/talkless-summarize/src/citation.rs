//! Citation extraction from summary text.
//!
//! The artifact contract is exact: citations are written `[Source: <name>]`.
//! The bracket token is case-sensitive; the source name inside matches the
//! configured names case-insensitively.

use once_cell::sync::Lazy;
use regex::Regex;

use talkless_core::{Article, Citation};

static RE_CITATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[Source: ([^\]]+)\]").unwrap());

/// Names cited in `text`, in order of first appearance, as written.
pub fn cited_names(text: &str) -> Vec<String> {
    let mut names = Vec::new();
    for capture in RE_CITATION.captures_iter(text) {
        let name = capture[1].trim().to_string();
        if !names
            .iter()
            .any(|existing: &String| existing.eq_ignore_ascii_case(&name))
        {
            names.push(name);
        }
    }
    names
}

/// Resolve citations in `text` against a group's member articles.
///
/// Each recognized source name becomes one [`Citation`] carrying the ids of
/// that source's articles in the group. Citations of names that match no
/// member source are dropped. Output is ordered by source name for
/// deterministic artifacts.
///
/// # Examples
///
/// ```
/// use talkless_summarize::citation::extract_citations;
///
/// let citations = extract_citations("No citations here.", &[]);
/// assert!(citations.is_empty());
/// ```
pub fn extract_citations(text: &str, members: &[&Article]) -> Vec<Citation> {
    let mut citations: Vec<Citation> = Vec::new();

    for cited in cited_names(text) {
        let mut article_ids: Vec<String> = members
            .iter()
            .filter(|a| a.source_name.eq_ignore_ascii_case(&cited))
            .map(|a| a.id.clone())
            .collect();
        if article_ids.is_empty() {
            tracing::debug!(name = %cited, "citation matches no source in group");
            continue;
        }
        article_ids.sort();
        article_ids.dedup();

        // Canonical spelling comes from the configured source, not the model.
        let canonical = members
            .iter()
            .find(|a| a.source_name.eq_ignore_ascii_case(&cited))
            .map(|a| a.source_name.clone())
            .unwrap_or(cited);

        if !citations.iter().any(|c| c.source_name == canonical) {
            citations.push(Citation {
                source_name: canonical,
                article_ids,
            });
        }
    }

    citations.sort_by(|a, b| a.source_name.cmp(&b.source_name));
    citations
}
