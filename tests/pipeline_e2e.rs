//! End-to-end pipeline scenarios against stub providers.
//!
//! The fetch path runs the real RSS parser over fixture feeds; embedding
//! and completion are deterministic stubs so two runs over the same input
//! must agree byte-for-byte on ids and summary text.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use talkless_bias::BiasDetector;
use talkless_core::{
    Article, BiasRulesFile, PipelineConfig, Result, Source, SourceKind, SummarizationConfig,
};
use talkless_group::embedding::{unit_normalize, Embedder};
use talkless_group::Grouper;
use talkless_ingest::cache::MemoryCache;
use talkless_ingest::fetcher::Fetcher;
use talkless_ingest::rss::parse_feed;
use talkless_ingest::Ingestor;
use talkless_pipeline::Orchestrator;
use talkless_summarize::provider::{Completer, CompletionError, CompletionErrorKind, CompletionRequest};
use talkless_summarize::Summarizer;

/// Serves fixture RSS documents through the real feed parser.
struct FixtureFetcher;

fn feed_for(source_id: &str) -> String {
    let (shared_link, unique_title, unique_link) = match source_id {
        "a" => (
            "https://outlet-a.example/rates",
            "Port expansion approved",
            "https://outlet-a.example/port",
        ),
        _ => (
            "https://outlet-b.example/rates-coverage",
            "Football final tonight",
            "https://outlet-b.example/final",
        ),
    };
    format!(
        r#"<rss version="2.0"><channel>
<item>
  <title>Central bank raises rate by 0.25%</title>
  <link>{shared_link}</link>
  <pubDate>Mon, 02 Mar 2026 09:30:00 GMT</pubDate>
  <description>&lt;p&gt;Officials announced the quarter-point move on Tuesday morning.&lt;/p&gt;</description>
</item>
<item>
  <title>{unique_title}</title>
  <link>{unique_link}</link>
  <pubDate>Mon, 02 Mar 2026 08:00:00 GMT</pubDate>
  <description>A separate local story with its own topic.</description>
</item>
</channel></rss>"#
    )
}

#[async_trait]
impl Fetcher for FixtureFetcher {
    async fn fetch(&self, source: &Source) -> Result<Vec<Article>> {
        parse_feed(&feed_for(&source.id), source, Utc::now(), false)
    }
}

/// Routes "central bank" texts into one direction, everything else apart.
struct TopicEmbedder;

#[async_trait]
impl Embedder for TopicEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let lower = t.to_lowercase();
                if lower.contains("central bank") {
                    unit_normalize(vec![1.0, 0.02, 0.0])
                } else if lower.contains("football") {
                    unit_normalize(vec![0.0, 1.0, 0.0])
                } else {
                    unit_normalize(vec![0.0, 0.0, 1.0])
                }
            })
            .collect())
    }

    fn dimensions(&self) -> usize {
        3
    }
}

struct FixedCompleter {
    text: String,
}

#[async_trait]
impl Completer for FixedCompleter {
    async fn complete(
        &self,
        _request: &CompletionRequest,
    ) -> std::result::Result<String, CompletionError> {
        Ok(self.text.clone())
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

fn source(id: &str, name: &str) -> Source {
    Source {
        id: id.into(),
        name: name.into(),
        kind: SourceKind::Rss,
        url: format!("https://{id}.example/feed"),
        credential_env: None,
        declared_lean: None,
        enabled: true,
        requests_per_minute: 60,
        api_fields: None,
    }
}

fn summary_text() -> String {
    "A quarter-point rate increase was announced, with one outlet leading on the policy \
     shift [Source: A] and the other on the market reaction [Source: B]."
        .to_string()
}

fn build_orchestrator(completer: Arc<dyn Completer>) -> Orchestrator {
    let config = PipelineConfig {
        summarization: SummarizationConfig {
            min_summary_length: 60,
            ..SummarizationConfig::default()
        },
        ..PipelineConfig::default()
    };
    let sources = vec![source("a", "A"), source("b", "B")];
    let stub = Arc::new(FixtureFetcher);
    let ingestor = Ingestor::with_fetchers(
        config.ingest.clone(),
        Arc::new(MemoryCache::new(900)),
        stub.clone(),
        stub,
    );
    let grouper = Grouper::new(Arc::new(TopicEmbedder), config.grouping.clone());
    let rules = BiasRulesFile::from_toml(
        r#"
[[loaded_words]]
pattern = "slammed"
weight = 1.0
"#,
    )
    .unwrap();
    let detector = BiasDetector::from_rules(&rules);
    let summarizer = Summarizer::new(completer, config.summarization.clone());
    Orchestrator::new(config, sources, ingestor, grouper, detector, summarizer)
}

#[tokio::test]
async fn two_sources_sharing_one_story_produce_one_cited_summary() {
    let orch = build_orchestrator(Arc::new(FixedCompleter {
        text: summary_text(),
    }));
    let artifacts = orch.run().await.unwrap();

    assert_eq!(artifacts.report.counts.articles_fetched, 4);
    assert_eq!(artifacts.report.counts.groups_formed, 1);
    assert_eq!(artifacts.report.counts.ungrouped_articles, 2);

    let group = &artifacts.groups[0];
    assert_eq!(group.article_ids.len(), 2);
    assert_eq!(group.metrics.source_diversity, 1.0);

    assert_eq!(artifacts.summaries.len(), 1);
    let summary = &artifacts.summaries[0];
    assert!(summary.text.contains("[Source: A]"));
    assert!(summary.text.contains("[Source: B]"));
    assert_eq!(summary.citations.len(), 2);
    assert_eq!(summary.group_id, group.id);
}

#[tokio::test]
async fn repeated_runs_are_deterministic() {
    let orch = build_orchestrator(Arc::new(FixedCompleter {
        text: summary_text(),
    }));
    let first = orch.run().await.unwrap();
    let second = orch.run().await.unwrap();

    let article_ids =
        |a: &talkless_pipeline::RunArtifacts| a.articles.iter().map(|x| x.id.clone()).collect::<Vec<_>>();
    let group_ids =
        |a: &talkless_pipeline::RunArtifacts| a.groups.iter().map(|x| x.id.clone()).collect::<Vec<_>>();
    let summary_ids =
        |a: &talkless_pipeline::RunArtifacts| a.summaries.iter().map(|x| x.id.clone()).collect::<Vec<_>>();

    assert_eq!(article_ids(&first), article_ids(&second));
    assert_eq!(group_ids(&first), group_ids(&second));
    assert_eq!(summary_ids(&first), summary_ids(&second));
    assert_eq!(first.summaries[0].text, second.summaries[0].text);

    let indicators =
        |a: &talkless_pipeline::RunArtifacts| {
            a.indicators
                .iter()
                .map(|i| (i.article_id.clone(), i.matched.clone()))
                .collect::<Vec<_>>()
        };
    assert_eq!(indicators(&first), indicators(&second));
}

#[tokio::test]
async fn quota_exhaustion_fails_only_the_affected_group() {
    /// Fails the first request with quota, serves the rest.
    struct QuotaOnce {
        used: tokio::sync::Mutex<bool>,
        text: String,
    }

    #[async_trait]
    impl Completer for QuotaOnce {
        async fn complete(
            &self,
            _request: &CompletionRequest,
        ) -> std::result::Result<String, CompletionError> {
            let mut used = self.used.lock().await;
            if !*used {
                *used = true;
                return Err(CompletionError::new(
                    CompletionErrorKind::Quota,
                    "monthly budget exhausted",
                ));
            }
            Ok(self.text.clone())
        }

        fn name(&self) -> &str {
            "quota-once"
        }
    }

    // Two shared stories so two groups form: the rate story and a second
    // football story carried by both outlets.
    struct TwoStoryFetcher;

    #[async_trait]
    impl Fetcher for TwoStoryFetcher {
        async fn fetch(&self, source: &Source) -> Result<Vec<Article>> {
            let xml = format!(
                r#"<rss><channel>
<item>
  <title>Central bank raises rate by 0.25%</title>
  <link>https://{id}.example/rates</link>
  <pubDate>Mon, 02 Mar 2026 09:30:00 GMT</pubDate>
  <description>Quarter-point move confirmed.</description>
</item>
<item>
  <title>Football final tonight</title>
  <link>https://{id}.example/final</link>
  <pubDate>Mon, 02 Mar 2026 08:00:00 GMT</pubDate>
  <description>The cup final kicks off at eight.</description>
</item>
</channel></rss>"#,
                id = source.id
            );
            parse_feed(&xml, source, Utc::now(), false)
        }
    }

    let config = PipelineConfig {
        summarization: SummarizationConfig {
            min_summary_length: 60,
            max_concurrent_summaries: 1,
            max_retries: 0,
            ..SummarizationConfig::default()
        },
        ..PipelineConfig::default()
    };
    let sources = vec![source("a", "A"), source("b", "B")];
    let stub = Arc::new(TwoStoryFetcher);
    let ingestor = Ingestor::with_fetchers(
        config.ingest.clone(),
        Arc::new(MemoryCache::new(900)),
        stub.clone(),
        stub,
    );
    let grouper = Grouper::new(Arc::new(TopicEmbedder), config.grouping.clone());
    let detector = BiasDetector::from_rules(&BiasRulesFile::default());
    let summarizer = Summarizer::new(
        Arc::new(QuotaOnce {
            used: tokio::sync::Mutex::new(false),
            text: summary_text(),
        }),
        config.summarization.clone(),
    );
    let orch = Orchestrator::new(config, sources, ingestor, grouper, detector, summarizer);

    let artifacts = orch.run().await.unwrap();
    assert_eq!(artifacts.report.counts.groups_formed, 2);
    assert_eq!(artifacts.report.counts.summaries_generated, 1);
    assert_eq!(artifacts.report.counts.summaries_failed, 1);
    assert_eq!(artifacts.report.failures.len(), 1);
    assert_eq!(artifacts.report.failures[0].reason, "summary_failed: quota");
    // The failed group is not the one the surviving summary belongs to.
    assert_ne!(
        artifacts.report.failures[0].group_id,
        artifacts.summaries[0].group_id
    );
}

#[tokio::test]
async fn loaded_language_is_detected_end_to_end() {
    struct LoadedFetcher;

    #[async_trait]
    impl Fetcher for LoadedFetcher {
        async fn fetch(&self, source: &Source) -> Result<Vec<Article>> {
            let xml = format!(
                r#"<rss><channel><item>
<title>Council votes on zoning</title>
<link>https://{id}.example/zoning</link>
<pubDate>Mon, 02 Mar 2026 09:30:00 GMT</pubDate>
<description>Residents slammed the proposal during the hearing.</description>
</item></channel></rss>"#,
                id = source.id
            );
            parse_feed(&xml, source, Utc::now(), false)
        }
    }

    let config = PipelineConfig::default();
    let sources = vec![source("a", "A")];
    let stub = Arc::new(LoadedFetcher);
    let ingestor = Ingestor::with_fetchers(
        config.ingest.clone(),
        Arc::new(MemoryCache::new(900)),
        stub.clone(),
        stub,
    );
    let grouper = Grouper::new(Arc::new(TopicEmbedder), config.grouping.clone());
    let rules = BiasRulesFile::from_toml(
        r#"
[[loaded_words]]
pattern = "slammed"
weight = 1.0
confidence = "medium"
"#,
    )
    .unwrap();
    let detector = BiasDetector::from_rules(&rules);
    let summarizer = Summarizer::new(
        Arc::new(FixedCompleter {
            text: summary_text(),
        }),
        config.summarization.clone(),
    );
    let orch = Orchestrator::new(config, sources, ingestor, grouper, detector, summarizer);

    let artifacts = orch.run().await.unwrap();
    assert_eq!(artifacts.indicators.len(), 1);
    let indicator = &artifacts.indicators[0];
    assert!(indicator.context.contains("slammed the proposal"));
    assert_eq!(artifacts.report.bias.total_indicators, 1);
    assert_eq!(artifacts.report.bias.by_kind["loaded_language"], 1);
}
