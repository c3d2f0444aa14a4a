//! HTML-to-plain-text normalization for feed and API payloads.
//!
//! Paragraph boundaries (`</p>`, `<br>`) become blank lines; all other
//! markup is stripped, entities are decoded, and whitespace is collapsed
//! within each paragraph.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_PARA_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</p\s*>|<br\s*/?\s*>").unwrap());
static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Convert an HTML fragment to plain text, preserving paragraph boundaries
/// as blank lines.
///
/// # Examples
///
/// ```
/// use talkless_ingest::normalize::html_to_text;
///
/// let html = "<p>First &amp; foremost.</p><p>Second   paragraph.</p>";
/// assert_eq!(html_to_text(html), "First & foremost.\n\nSecond paragraph.");
/// ```
pub fn html_to_text(html: &str) -> String {
    // Mark paragraph boundaries before the tag strip erases them.
    let marked = RE_PARA_BREAK.replace_all(html, "\n\n");
    let stripped = RE_TAGS.replace_all(&marked, " ");
    let decoded = html_escape::decode_html_entities(&stripped);

    let paragraphs: Vec<String> = decoded
        .split("\n\n")
        .map(|p| RE_WS.replace_all(p, " ").trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();

    paragraphs.join("\n\n")
}

/// Collapse all whitespace runs in `s` to single spaces and trim.
///
/// Used for titles, which never carry paragraph structure.
pub fn collapse_whitespace(s: &str) -> String {
    RE_WS.replace_all(s, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags_and_decodes_entities() {
        let html = "<div><b>Bold</b> &amp; <i>italic</i> &quot;quoted&quot;</div>";
        assert_eq!(html_to_text(html), "Bold & italic \"quoted\"");
    }

    #[test]
    fn preserves_paragraph_boundaries() {
        let html = "<p>One.</p>\n<p>Two.</p>";
        assert_eq!(html_to_text(html), "One.\n\nTwo.");
    }

    #[test]
    fn br_tags_break_paragraphs() {
        let html = "line one<br>line two<br />line three";
        assert_eq!(html_to_text(html), "line one\n\nline two\n\nline three");
    }

    #[test]
    fn collapses_whitespace_within_paragraphs() {
        let html = "<p>spaced\t\tout\n text</p>";
        assert_eq!(html_to_text(html), "spaced out text");
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(html_to_text("already plain"), "already plain");
    }

    #[test]
    fn empty_input_gives_empty_output() {
        assert_eq!(html_to_text(""), "");
        assert_eq!(html_to_text("<p></p><p>  </p>"), "");
    }

    #[test]
    fn collapse_whitespace_trims() {
        assert_eq!(collapse_whitespace("  a \t b  "), "a b");
    }
}
