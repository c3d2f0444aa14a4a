use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::TalklessError;
use crate::types::Source;

/// Top-level pipeline configuration loaded from a TOML file.
///
/// The file names the other two configuration documents (sources and bias
/// rules) by path; everything else is typed with explicit defaults so an
/// empty file is a valid configuration.
///
/// # Examples
///
/// ```
/// use talkless_core::PipelineConfig;
///
/// let config = PipelineConfig::default();
/// assert_eq!(config.grouping.similarity_threshold, 0.7);
/// assert_eq!(config.summarization.temperature, 0.3);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Path to the sources file.
    #[serde(default = "default_sources_file")]
    pub sources_file: PathBuf,
    /// Path to the bias rules file.
    #[serde(default = "default_bias_rules_file")]
    pub bias_rules_file: PathBuf,
    /// Directory receiving run artifacts; `None` disables emission.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// When `true`, unknown configuration keys are an error instead of a warning.
    #[serde(default)]
    pub strict_config: bool,
    /// Overall run deadline in seconds; `None` means unbounded.
    #[serde(default)]
    pub run_deadline_secs: Option<u64>,
    /// Interval between runs in `--scheduled` mode.
    #[serde(default = "default_schedule_interval")]
    pub schedule_interval_secs: u64,
    /// Ingestion settings.
    #[serde(default)]
    pub ingest: IngestConfig,
    /// Grouping settings.
    #[serde(default)]
    pub grouping: GroupingConfig,
    /// Summarization settings.
    #[serde(default)]
    pub summarization: SummarizationConfig,
}

fn default_sources_file() -> PathBuf {
    PathBuf::from("config/sources.toml")
}

fn default_bias_rules_file() -> PathBuf {
    PathBuf::from("config/bias_rules.toml")
}

fn default_schedule_interval() -> u64 {
    1800
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sources_file: default_sources_file(),
            bias_rules_file: default_bias_rules_file(),
            output_dir: None,
            strict_config: false,
            run_deadline_secs: None,
            schedule_interval_secs: default_schedule_interval(),
            ingest: IngestConfig::default(),
            grouping: GroupingConfig::default(),
            summarization: SummarizationConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`TalklessError::FileNotFound`] if the file does not exist,
    /// [`TalklessError::Toml`] if it is not valid TOML, or
    /// [`TalklessError::Config`] for unknown keys under `strict_config`.
    pub fn from_file(path: &Path) -> Result<Self, TalklessError> {
        if !path.exists() {
            return Err(TalklessError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// Unknown keys are reported according to the parsed `strict_config`
    /// flag: fatal when strict, a warning otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`TalklessError::Toml`] if parsing fails, or
    /// [`TalklessError::Config`] for unknown keys under `strict_config`.
    ///
    /// # Examples
    ///
    /// ```
    /// use talkless_core::PipelineConfig;
    ///
    /// let toml = r#"
    /// [summarization]
    /// max_retries = 3
    /// "#;
    /// let config = PipelineConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.summarization.max_retries, 3);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, TalklessError> {
        let value: toml::Value = toml::from_str(content)?;
        let config: Self = value.clone().try_into()?;

        let unknown = unknown_keys(&value);
        if !unknown.is_empty() {
            if config.strict_config {
                return Err(TalklessError::Config(format!(
                    "unknown configuration keys: {}",
                    unknown.join(", ")
                )));
            }
            for key in &unknown {
                tracing::warn!(key = %key, "ignoring unknown configuration key");
            }
        }

        Ok(config)
    }
}

/// Ingestion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Entries older than this are dropped before they enter the batch.
    #[serde(default = "default_max_age_hours")]
    pub max_article_age_hours: i64,
    /// Sources fetched concurrently.
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
    /// Per-source fetch timeout.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
    /// Content cache entry lifetime.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
    /// Cache backend: unset = in-memory, a path = file-backed store.
    /// The `CACHE_URL` environment variable overrides this value.
    #[serde(default)]
    pub cache_endpoint: Option<String>,
    /// When `true`, entries without a published timestamp are dropped.
    #[serde(default)]
    pub strict_published: bool,
}

fn default_max_age_hours() -> i64 {
    48
}

fn default_max_concurrent_fetches() -> usize {
    4
}

fn default_fetch_timeout() -> u64 {
    30
}

fn default_cache_ttl() -> u64 {
    900
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_article_age_hours: default_max_age_hours(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            fetch_timeout_secs: default_fetch_timeout(),
            cache_ttl_secs: default_cache_ttl(),
            cache_endpoint: None,
            strict_published: false,
        }
    }
}

/// Grouping settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupingConfig {
    /// Cosine similarity above which two articles are neighbors
    /// (clustering distance ε = 1 − threshold).
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    /// Minimum members for a cluster to form a group.
    #[serde(default = "default_min_articles")]
    pub min_articles_per_group: usize,
    /// Groups larger than this keep only the members closest to the centroid.
    #[serde(default = "default_max_articles")]
    pub max_articles_per_group: usize,
    /// Embedding model settings.
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

fn default_similarity_threshold() -> f64 {
    0.7
}

fn default_min_articles() -> usize {
    2
}

fn default_max_articles() -> usize {
    12
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            min_articles_per_group: default_min_articles(),
            max_articles_per_group: default_max_articles(),
            embedding: EmbeddingConfig::default(),
        }
    }
}

/// Embedding model settings.
///
/// The contract is only that the model returns unit-length vectors compared
/// by cosine distance; which model is a deployment choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Embedding service endpoint; unset means no remote embedder is wired
    /// and the orchestrator must be constructed with one.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Model name (default: a lightweight 384-dimensional sentence model).
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Expected vector dimensionality.
    #[serde(default = "default_embedding_dimensions")]
    pub dimensions: usize,
    /// Environment variable holding the embedding API key, if the service
    /// requires one.
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Leading characters of `title + content` sent to the model.
    #[serde(default = "default_embed_input_chars")]
    pub input_chars: usize,
}

fn default_embedding_model() -> String {
    "all-MiniLM-L6-v2".into()
}

fn default_embedding_dimensions() -> usize {
    384
}

fn default_embed_input_chars() -> usize {
    512
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: default_embedding_model(),
            dimensions: default_embedding_dimensions(),
            api_key_env: None,
            input_chars: default_embed_input_chars(),
        }
    }
}

/// Summarization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizationConfig {
    /// Provider name: `"openai"` or `"anthropic"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Ceiling the configured temperature must not exceed.
    #[serde(default = "default_temperature")]
    pub max_temperature: f32,
    /// Minimum accepted summary length, in characters.
    #[serde(default = "default_min_summary_length")]
    pub min_summary_length: usize,
    /// Maximum accepted summary length, in characters.
    #[serde(default = "default_max_summary_length")]
    pub max_summary_length: usize,
    /// Regeneration attempts after a failed validation or transient error.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Distinct cited sources required; 0 means every source in the group.
    #[serde(default)]
    pub required_citation_coverage: usize,
    /// Groups with fewer distinct sources than this are ineligible.
    #[serde(default = "default_min_distinct_sources")]
    pub min_distinct_sources: usize,
    /// Groups summarized concurrently.
    #[serde(default = "default_max_concurrent_summaries")]
    pub max_concurrent_summaries: usize,
    /// Per-call LLM timeout.
    #[serde(default = "default_llm_timeout")]
    pub llm_timeout_secs: u64,
    /// Shortest verbatim source span (in words) that fails validation.
    #[serde(default = "default_min_copied_span")]
    pub min_copied_span: usize,
    /// Per-article body budget (characters) in the prompt payload.
    #[serde(default = "default_article_excerpt_chars")]
    pub article_excerpt_chars: usize,
    /// Salt folded into summary ids; defaults to the prompt template version.
    #[serde(default)]
    pub generation_salt: Option<String>,
}

fn default_provider() -> String {
    "openai".into()
}

fn default_model() -> String {
    "gpt-4o-mini".into()
}

fn default_temperature() -> f32 {
    0.3
}

fn default_min_summary_length() -> usize {
    200
}

fn default_max_summary_length() -> usize {
    1500
}

fn default_max_retries() -> u32 {
    2
}

fn default_min_distinct_sources() -> usize {
    2
}

fn default_max_concurrent_summaries() -> usize {
    2
}

fn default_llm_timeout() -> u64 {
    60
}

fn default_min_copied_span() -> usize {
    10
}

fn default_article_excerpt_chars() -> usize {
    2000
}

impl Default for SummarizationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            temperature: default_temperature(),
            max_temperature: default_temperature(),
            min_summary_length: default_min_summary_length(),
            max_summary_length: default_max_summary_length(),
            max_retries: default_max_retries(),
            required_citation_coverage: 0,
            min_distinct_sources: default_min_distinct_sources(),
            max_concurrent_summaries: default_max_concurrent_summaries(),
            llm_timeout_secs: default_llm_timeout(),
            min_copied_span: default_min_copied_span(),
            article_excerpt_chars: default_article_excerpt_chars(),
            generation_salt: None,
        }
    }
}

/// The sources configuration document: a list of outlets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourcesFile {
    /// All configured sources, enabled or not.
    #[serde(default)]
    pub sources: Vec<Source>,
}

impl SourcesFile {
    /// Load the sources file from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`TalklessError::FileNotFound`] or [`TalklessError::Toml`].
    pub fn from_file(path: &Path) -> Result<Self, TalklessError> {
        if !path.exists() {
            return Err(TalklessError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse a sources document from a TOML string.
    ///
    /// # Examples
    ///
    /// ```
    /// use talkless_core::SourcesFile;
    ///
    /// let toml = r#"
    /// [[sources]]
    /// id = "ap"
    /// name = "AP"
    /// kind = "rss"
    /// url = "https://example.com/feed"
    /// "#;
    /// let file = SourcesFile::from_toml(toml).unwrap();
    /// assert_eq!(file.sources.len(), 1);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, TalklessError> {
        let file: Self = toml::from_str(content)?;
        Ok(file)
    }

    /// The enabled sources, in file order.
    pub fn enabled(&self) -> Vec<Source> {
        self.sources.iter().filter(|s| s.enabled).cloned().collect()
    }
}

// Known key tables for the unknown-key scan. Each entry is (table path, keys).
const KNOWN_KEYS: &[(&str, &[&str])] = &[
    (
        "",
        &[
            "sources_file",
            "bias_rules_file",
            "output_dir",
            "strict_config",
            "run_deadline_secs",
            "schedule_interval_secs",
            "ingest",
            "grouping",
            "summarization",
        ],
    ),
    (
        "ingest",
        &[
            "max_article_age_hours",
            "max_concurrent_fetches",
            "fetch_timeout_secs",
            "cache_ttl_secs",
            "cache_endpoint",
            "strict_published",
        ],
    ),
    (
        "grouping",
        &[
            "similarity_threshold",
            "min_articles_per_group",
            "max_articles_per_group",
            "embedding",
        ],
    ),
    (
        "grouping.embedding",
        &["endpoint", "model", "dimensions", "api_key_env", "input_chars"],
    ),
    (
        "summarization",
        &[
            "provider",
            "model",
            "temperature",
            "max_temperature",
            "min_summary_length",
            "max_summary_length",
            "max_retries",
            "required_citation_coverage",
            "min_distinct_sources",
            "max_concurrent_summaries",
            "llm_timeout_secs",
            "min_copied_span",
            "article_excerpt_chars",
            "generation_salt",
        ],
    ),
];

/// Collect dotted paths of keys not recognized by the pipeline config schema.
fn unknown_keys(value: &toml::Value) -> Vec<String> {
    let mut unknown = Vec::new();
    for (table_path, keys) in KNOWN_KEYS {
        let table = if table_path.is_empty() {
            Some(value)
        } else {
            table_path
                .split('.')
                .try_fold(value, |v, seg| v.get(seg))
        };
        if let Some(toml::Value::Table(table)) = table {
            for key in table.keys() {
                if !keys.contains(&key.as_str()) {
                    let path = if table_path.is_empty() {
                        key.clone()
                    } else {
                        format!("{table_path}.{key}")
                    };
                    // Nested tables are validated by their own entry above.
                    if !KNOWN_KEYS.iter().any(|(p, _)| *p == path) {
                        unknown.push(path);
                    }
                }
            }
        }
    }
    unknown.sort();
    unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = PipelineConfig::default();
        assert_eq!(config.ingest.max_article_age_hours, 48);
        assert_eq!(config.ingest.max_concurrent_fetches, 4);
        assert_eq!(config.ingest.cache_ttl_secs, 900);
        assert_eq!(config.grouping.similarity_threshold, 0.7);
        assert_eq!(config.grouping.min_articles_per_group, 2);
        assert_eq!(config.grouping.max_articles_per_group, 12);
        assert_eq!(config.grouping.embedding.dimensions, 384);
        assert_eq!(config.summarization.provider, "openai");
        assert_eq!(config.summarization.temperature, 0.3);
        assert_eq!(config.summarization.max_retries, 2);
        assert_eq!(config.summarization.min_copied_span, 10);
        assert_eq!(config.summarization.min_distinct_sources, 2);
        assert!(!config.strict_config);
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let config = PipelineConfig::from_toml("").unwrap();
        assert_eq!(config.summarization.model, "gpt-4o-mini");
        assert_eq!(config.schedule_interval_secs, 1800);
    }

    #[test]
    fn parse_nested_sections() {
        let toml = r#"
strict_config = false
run_deadline_secs = 600

[ingest]
max_article_age_hours = 24
max_concurrent_fetches = 8

[grouping]
similarity_threshold = 0.8

[grouping.embedding]
model = "bge-small-en"
dimensions = 384

[summarization]
provider = "anthropic"
model = "claude-sonnet-4-20250514"
temperature = 0.2
"#;
        let config = PipelineConfig::from_toml(toml).unwrap();
        assert_eq!(config.run_deadline_secs, Some(600));
        assert_eq!(config.ingest.max_article_age_hours, 24);
        assert_eq!(config.grouping.similarity_threshold, 0.8);
        assert_eq!(config.grouping.embedding.model, "bge-small-en");
        assert_eq!(config.summarization.provider, "anthropic");
    }

    #[test]
    fn invalid_toml_returns_error() {
        assert!(PipelineConfig::from_toml("{{invalid}}").is_err());
    }

    #[test]
    fn unknown_key_warns_by_default() {
        let toml = r#"
surprise = true

[summarization]
max_retries = 1
"#;
        let config = PipelineConfig::from_toml(toml).unwrap();
        assert_eq!(config.summarization.max_retries, 1);
    }

    #[test]
    fn unknown_key_fails_when_strict() {
        let toml = r#"
strict_config = true
surprise = true
"#;
        let err = PipelineConfig::from_toml(toml).unwrap_err();
        assert!(err.to_string().contains("surprise"), "got: {err}");
    }

    #[test]
    fn unknown_nested_key_is_detected() {
        let toml = r#"
strict_config = true

[summarization]
top_p = 0.9
"#;
        let err = PipelineConfig::from_toml(toml).unwrap_err();
        assert!(err.to_string().contains("summarization.top_p"));
    }

    #[test]
    fn sources_file_parses_and_filters_enabled() {
        let toml = r#"
[[sources]]
id = "ap"
name = "AP"
kind = "rss"
url = "https://example.com/ap.xml"

[[sources]]
id = "wire"
name = "Wire"
kind = "api"
url = "https://example.com/api/articles"
credential_env = "WIRE_API_KEY"
enabled = false
"#;
        let file = SourcesFile::from_toml(toml).unwrap();
        assert_eq!(file.sources.len(), 2);
        let enabled = file.enabled();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].id, "ap");
    }

    #[test]
    fn missing_file_is_file_not_found() {
        let err = PipelineConfig::from_file(Path::new("/nonexistent/p.toml")).unwrap_err();
        assert!(matches!(err, TalklessError::FileNotFound(_)));
    }
}
