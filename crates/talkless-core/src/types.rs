use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A configured news outlet.
///
/// Loaded from the sources file at run start and immutable for the duration
/// of a run.
///
/// # Examples
///
/// ```
/// use talkless_core::{Source, SourceKind};
///
/// let source = Source {
///     id: "reuters".into(),
///     name: "Reuters".into(),
///     kind: SourceKind::Rss,
///     url: "https://example.com/rss".into(),
///     credential_env: None,
///     declared_lean: Some("center".into()),
///     enabled: true,
///     requests_per_minute: 60,
///     api_fields: None,
/// };
/// assert!(source.enabled);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    /// Stable identifier used in article records and rate-limiter keys.
    pub id: String,
    /// Human-readable outlet name, matched (case-insensitively) by citations.
    pub name: String,
    /// Feed protocol for this source.
    pub kind: SourceKind,
    /// Feed or API endpoint.
    pub url: String,
    /// Environment variable holding the API credential, if any.
    #[serde(default)]
    pub credential_env: Option<String>,
    /// Self-declared editorial lean tag, advisory only.
    #[serde(default)]
    pub declared_lean: Option<String>,
    /// Disabled sources are skipped entirely.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Per-source fetch budget; the limiter enforces 60/rpm seconds between requests.
    #[serde(default = "default_rpm")]
    pub requests_per_minute: u32,
    /// JSON field mapping for API sources; RSS sources ignore it.
    #[serde(default)]
    pub api_fields: Option<ApiFieldMap>,
}

fn default_enabled() -> bool {
    true
}

fn default_rpm() -> u32 {
    60
}

/// Field mapping for an API source's JSON payload.
///
/// `items` names the field holding the article array (empty string = the
/// payload root is the array); the rest name per-item fields.
///
/// # Examples
///
/// ```
/// use talkless_core::ApiFieldMap;
///
/// let map = ApiFieldMap::default();
/// assert_eq!(map.items, "articles");
/// assert_eq!(map.title, "title");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiFieldMap {
    /// Field holding the article array.
    #[serde(default = "default_items_field")]
    pub items: String,
    /// Field holding the headline.
    #[serde(default = "default_title_field")]
    pub title: String,
    /// Field holding the article URL.
    #[serde(default = "default_url_field")]
    pub url: String,
    /// Field holding the body text.
    #[serde(default = "default_content_field")]
    pub content: String,
    /// Field holding the publication timestamp.
    #[serde(default = "default_published_field")]
    pub published_at: String,
    /// Field holding the byline.
    #[serde(default = "default_author_field")]
    pub author: String,
}

fn default_items_field() -> String {
    "articles".into()
}

fn default_title_field() -> String {
    "title".into()
}

fn default_url_field() -> String {
    "url".into()
}

fn default_content_field() -> String {
    "content".into()
}

fn default_published_field() -> String {
    "published_at".into()
}

fn default_author_field() -> String {
    "author".into()
}

impl Default for ApiFieldMap {
    fn default() -> Self {
        Self {
            items: default_items_field(),
            title: default_title_field(),
            url: default_url_field(),
            content: default_content_field(),
            published_at: default_published_field(),
            author: default_author_field(),
        }
    }
}

/// Feed protocol of a [`Source`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// RSS/Atom XML feed.
    Rss,
    /// JSON HTTP API.
    Api,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Rss => write!(f, "rss"),
            SourceKind::Api => write!(f, "api"),
        }
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rss" => Ok(SourceKind::Rss),
            "api" => Ok(SourceKind::Api),
            other => Err(format!("unknown source kind: {other}")),
        }
    }
}

/// A single normalized news item.
///
/// Created by the ingestor, never mutated afterwards. The id is deterministic
/// from the canonical URL (see [`crate::ids::article_id`]).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    /// Deterministic 16-hex-char id.
    pub id: String,
    /// Id of the originating [`Source`].
    pub source_id: String,
    /// Name of the originating source, used for citation matching.
    pub source_name: String,
    /// Headline.
    pub title: String,
    /// Original article URL.
    pub url: String,
    /// Byline, when the feed provides one.
    pub author: Option<String>,
    /// Publication timestamp as reported by the source.
    pub published_at: DateTime<Utc>,
    /// Plain-text body with paragraph boundaries preserved as blank lines.
    pub content: String,
    /// When the ingestor fetched this entry.
    pub fetched_at: DateTime<Utc>,
}

/// Kind of a detected bias indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiasKind {
    /// Emotionally loaded word or phrase.
    LoadedLanguage,
    /// Weak or anonymous sourcing pattern.
    Attribution,
    /// Headline framing not supported by the body.
    Framing,
    /// Missing perspective; reserved for coverage-gap reporting.
    Omission,
}

impl fmt::Display for BiasKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BiasKind::LoadedLanguage => write!(f, "loaded_language"),
            BiasKind::Attribution => write!(f, "attribution"),
            BiasKind::Framing => write!(f, "framing"),
            BiasKind::Omission => write!(f, "omission"),
        }
    }
}

/// Confidence level attached to a bias rule or indicator.
///
/// # Examples
///
/// ```
/// use talkless_core::RuleConfidence;
///
/// assert!(RuleConfidence::High.meets_threshold(RuleConfidence::Medium));
/// assert!(!RuleConfidence::Low.meets_threshold(RuleConfidence::Medium));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleConfidence {
    /// Weak signal, excluded from reports under the default threshold.
    Low,
    /// Default for loaded-language and attribution rules.
    Medium,
    /// Strong signal.
    High,
}

impl RuleConfidence {
    /// Returns `true` if `self` is at least as confident as `threshold`.
    pub fn meets_threshold(self, threshold: RuleConfidence) -> bool {
        self.rank() >= threshold.rank()
    }

    fn rank(self) -> u8 {
        match self {
            RuleConfidence::Low => 0,
            RuleConfidence::Medium => 1,
            RuleConfidence::High => 2,
        }
    }
}

impl fmt::Display for RuleConfidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleConfidence::Low => write!(f, "low"),
            RuleConfidence::Medium => write!(f, "medium"),
            RuleConfidence::High => write!(f, "high"),
        }
    }
}

impl FromStr for RuleConfidence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(RuleConfidence::Low),
            "medium" => Ok(RuleConfidence::Medium),
            "high" => Ok(RuleConfidence::High),
            other => Err(format!("unknown confidence: {other}")),
        }
    }
}

/// A single matched bias rule instance, attached to an article.
///
/// Append-only: detectors produce indicators, nothing rewrites them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiasIndicator {
    /// Rule family that produced the match.
    pub kind: BiasKind,
    /// Id of the article the indicator is attached to.
    pub article_id: String,
    /// The configured pattern that matched.
    pub pattern: String,
    /// The exact matched text.
    pub matched: String,
    /// Surrounding context, at most 120 characters.
    pub context: String,
    /// Confidence inherited from the rule (or the family default).
    pub confidence: RuleConfidence,
    /// Rule weight contributing to the article's aggregate score.
    pub weight: f64,
}

/// Derived metrics for a [`Group`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMetrics {
    /// Distinct sources divided by member count, in `[0, 1]`.
    pub source_diversity: f64,
    /// Enabled source ids with no article in this group.
    pub coverage_gaps: Vec<String>,
}

/// A set of articles judged to cover the same story.
///
/// The id is deterministic from the sorted member ids, so group identity is
/// stable across re-runs on identical inputs regardless of input order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// Deterministic 16-hex-char id over the sorted member ids.
    pub id: String,
    /// Member article ids, sorted ascending.
    pub article_ids: Vec<String>,
    /// Distinct source ids represented in the group, sorted ascending.
    pub source_ids: Vec<String>,
    /// Mean member vector; ephemeral, not part of the emitted record.
    #[serde(skip)]
    pub centroid: Vec<f32>,
    /// Perspective and coverage metrics.
    pub metrics: GroupMetrics,
}

/// One citation extracted from summary text: a source name and the group
/// member articles it resolves to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    /// Source name as configured (not as written by the model).
    pub source_name: String,
    /// Ids of the cited source's articles within the group.
    pub article_ids: Vec<String>,
}

/// Whether a summary passed validation before emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    /// All validation rules held.
    Passed,
    /// Emitted only inside failure records; valid summaries are always `Passed`.
    Failed,
}

/// Confidence tag derived from how many retries a summary needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryConfidence {
    /// Accepted on the first attempt.
    High,
    /// Accepted after one retry.
    Medium,
    /// Accepted after two or more retries.
    Low,
}

impl SummaryConfidence {
    /// Map a retry count to a confidence tag.
    ///
    /// # Examples
    ///
    /// ```
    /// use talkless_core::SummaryConfidence;
    ///
    /// assert_eq!(SummaryConfidence::from_retries(0), SummaryConfidence::High);
    /// assert_eq!(SummaryConfidence::from_retries(1), SummaryConfidence::Medium);
    /// assert_eq!(SummaryConfidence::from_retries(5), SummaryConfidence::Low);
    /// ```
    pub fn from_retries(retries: u32) -> Self {
        match retries {
            0 => SummaryConfidence::High,
            1 => SummaryConfidence::Medium,
            _ => SummaryConfidence::Low,
        }
    }
}

/// An LLM-generated, citation-bearing synthesis of a [`Group`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    /// Deterministic 16-hex-char id over `group_id|generation_salt`.
    pub id: String,
    /// Id of the summarized group.
    pub group_id: String,
    /// The synthesized text, with inline `[Source: <name>]` citations.
    pub text: String,
    /// Citations extracted from the text.
    pub citations: Vec<Citation>,
    /// Model id used for generation.
    pub model: String,
    /// Sampling temperature used for generation.
    pub temperature: f32,
    /// Pinned prompt template version the text was generated with.
    pub prompt_version: String,
    /// Number of regeneration attempts before acceptance.
    pub retries: u32,
    /// Confidence tag derived from the retry count.
    pub confidence: SummaryConfidence,
    /// Validation outcome; always `Passed` for emitted summaries.
    pub validation: ValidationStatus,
    /// Generation timestamp.
    pub created_at: DateTime<Utc>,
}

/// A group whose summary could not be produced, with the final reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupFailure {
    /// Id of the failed group.
    pub group_id: String,
    /// Machine-readable reason, e.g. `summary_failed: quota`.
    pub reason: String,
}

/// Per-stage counters for one pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageCounts {
    /// Enabled sources polled.
    pub sources_polled: usize,
    /// Sources that failed entirely (network/parse/credential).
    pub sources_failed: usize,
    /// Articles surviving normalization, age filtering, and dedup.
    pub articles_fetched: usize,
    /// Bias indicators produced across all articles.
    pub indicators_found: usize,
    /// Groups formed by clustering.
    pub groups_formed: usize,
    /// Articles left ungrouped (noise or size-cap overflow).
    pub ungrouped_articles: usize,
    /// Groups skipped as ineligible (too small or single-source).
    pub groups_ineligible: usize,
    /// Summaries accepted by validation.
    pub summaries_generated: usize,
    /// Groups whose summary failed permanently.
    pub summaries_failed: usize,
}

/// Per-source aggregate in the bias transparency report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceBiasStats {
    /// Articles analyzed for this source.
    pub articles: usize,
    /// Indicators found across those articles.
    pub indicators: usize,
    /// Mean indicators per article.
    pub mean_indicators_per_article: f64,
    /// Most frequently matched tokens, descending by count.
    pub top_tokens: Vec<String>,
}

/// Deterministic aggregate of the bias scan for one run.
///
/// Maps are ordered (`BTreeMap`) so the report serializes identically for
/// identical inputs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiasReport {
    /// Total indicators at or above the reporting threshold.
    pub total_indicators: usize,
    /// Indicator counts keyed by kind name.
    pub by_kind: std::collections::BTreeMap<String, usize>,
    /// Per-source aggregates keyed by source id.
    pub by_source: std::collections::BTreeMap<String, SourceBiasStats>,
    /// Ids of articles whose aggregate score exceeded the flag threshold.
    pub flagged_articles: Vec<String>,
}

/// The record of one pipeline invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// Run identifier derived from the start timestamp.
    pub run_id: String,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished (or was cut off by the deadline).
    pub finished_at: DateTime<Utc>,
    /// `true` when the overall deadline elapsed before all stages completed.
    pub partial: bool,
    /// Per-stage counters.
    pub counts: StageCounts,
    /// Bias transparency aggregate.
    pub bias: BiasReport,
    /// Groups whose summaries failed, with reasons.
    pub failures: Vec<GroupFailure>,
}
