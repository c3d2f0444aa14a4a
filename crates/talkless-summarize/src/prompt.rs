//! Prompt construction for group summarization.
//!
//! The template is version-pinned: [`PROMPT_TEMPLATE_VERSION`] is recorded
//! on every summary (and is the default generation salt), so a template
//! change is visible in the emitted artifacts.

use std::fmt::Write;

use talkless_core::{Article, SummarizationConfig};

use crate::validate::ValidationViolation;

/// Version tag of the summarization template below.
pub const PROMPT_TEMPLATE_VERSION: &str = "talkless-summary-v1";

/// Build the summarization prompt for one group's member articles.
///
/// # Examples
///
/// ```
/// use talkless_core::SummarizationConfig;
/// use talkless_summarize::prompt::build_summary_prompt;
///
/// let prompt = build_summary_prompt(&[], &SummarizationConfig::default());
/// assert!(prompt.contains("[Source: <source_name>]"));
/// ```
pub fn build_summary_prompt(articles: &[&Article], config: &SummarizationConfig) -> String {
    let mut prompt = format!(
        "You are a news summarization system. Synthesize ONE summary of the \
         articles below, which all cover the same story.\n\
         \n\
         RULES — FOLLOW STRICTLY:\n\
         1. Write ORIGINAL text. Never copy sentences or long phrases from the articles.\n\
         2. Cite EVERY substantive factual claim inline as [Source: <source_name>], \
         using the source names exactly as given below.\n\
         3. Include every perspective present across the articles; note conflicting \
         reporting when sources disagree.\n\
         4. Do NOT add speculation, opinion, or analysis of your own.\n\
         5. Use neutral, factual language.\n\
         6. The summary must be between {min} and {max} characters long.\n\
         7. Output only the summary text, no headings or preamble.\n\
         \n\
         ARTICLES:\n",
        min = config.min_summary_length,
        max = config.max_summary_length,
    );

    for article in articles {
        let excerpt = truncate_chars(&article.content, config.article_excerpt_chars);
        let _ = write!(
            prompt,
            "\n--- Source: {name}\nTitle: {title}\n{excerpt}\n",
            name = article.source_name,
            title = article.title,
        );
    }

    prompt
}

/// Refine the prompt after a failed validation, naming the specific
/// violation so the next attempt can correct it. Length bounds are already
/// embedded in the base prompt.
pub fn build_retry_prompt(base_prompt: &str, violation: &ValidationViolation) -> String {
    let correction = match violation {
        ValidationViolation::TooShort { len, min } => format!(
            "The previous attempt was {len} characters, below the {min}-character minimum. \
             Write a fuller summary within the length bounds."
        ),
        ValidationViolation::TooLong { len, max } => format!(
            "The previous attempt was {len} characters, above the {max}-character maximum. \
             Tighten the summary within the length bounds."
        ),
        ValidationViolation::MissingCitations { missing } => format!(
            "The previous attempt did not cite these sources: {}. Every source must be \
             cited at least once as [Source: <source_name>].",
            missing.join(", ")
        ),
        ValidationViolation::CopiedSpan { phrase } => format!(
            "The previous attempt copied the phrase \"{phrase}\" verbatim from a source \
             article; rewrite to be transformative."
        ),
        ValidationViolation::TemperatureTooHigh { .. } => String::new(),
    };

    format!("{base_prompt}\nPREVIOUS ATTEMPT REJECTED: {correction}\n")
}

fn truncate_chars(text: &str, budget: usize) -> String {
    if text.chars().count() <= budget {
        text.to_string()
    } else {
        text.chars().take(budget).collect()
    }
}
