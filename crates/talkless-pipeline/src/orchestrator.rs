//! The seven-stage pipeline runner.
//!
//! fetch → detect → group → perspective → summarize → report → emit.
//! The orchestrator owns the per-run vectors and passes immutable
//! references downstream; it holds no domain logic of its own. Only
//! configuration errors escape — everything else lands in the run report.

use std::future::Future;
use std::path::Path;

use chrono::Utc;
use tokio::time::{timeout_at, Duration, Instant};

use talkless_bias::BiasDetector;
use talkless_core::{
    BiasReport, BiasRulesFile, PipelineConfig, Result, RunReport, Source, SourcesFile,
    StageCounts, TalklessError,
};
use talkless_group::embedding::HttpEmbedder;
use talkless_group::Grouper;
use talkless_ingest::cache::build_cache;
use talkless_ingest::Ingestor;
use talkless_summarize::provider::build_completer;
use talkless_summarize::Summarizer;

use crate::artifacts::{write_artifacts, RunArtifacts};

/// Drives one pipeline run end to end.
pub struct Orchestrator {
    config: PipelineConfig,
    sources: Vec<Source>,
    ingestor: Ingestor,
    grouper: Grouper,
    detector: BiasDetector,
    summarizer: Summarizer,
}

impl Orchestrator {
    /// Build a fully wired orchestrator from configuration.
    ///
    /// Loads the sources and bias rules files, builds the cache backend,
    /// the HTTP fetchers, the embedding client, and the completion
    /// provider.
    ///
    /// # Errors
    ///
    /// Any [`TalklessError::Config`]-class problem: missing files,
    /// malformed documents, unresolvable credentials, unknown provider,
    /// or an unwritable output directory.
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        let sources = SourcesFile::from_file(&config.sources_file)?.enabled();
        let rules = BiasRulesFile::from_file(&config.bias_rules_file)?;
        let detector = BiasDetector::from_rules(&rules);

        if let Some(dir) = &config.output_dir {
            std::fs::create_dir_all(dir).map_err(|e| {
                TalklessError::Config(format!(
                    "output directory {} is unusable: {e}",
                    dir.display()
                ))
            })?;
        }

        let cache = build_cache(&config.ingest);
        let ingestor = Ingestor::new(config.ingest.clone(), cache)?;

        let embedder = HttpEmbedder::with_config(&config.grouping.embedding)?;
        let grouper = Grouper::new(std::sync::Arc::new(embedder), config.grouping.clone());

        let completer = build_completer(&config.summarization)?;
        let summarizer = Summarizer::new(completer, config.summarization.clone());

        Ok(Self::new(
            config, sources, ingestor, grouper, detector, summarizer,
        ))
    }

    /// Assemble an orchestrator from already-built components (tests
    /// inject stub fetchers, embedders, and completers through here).
    pub fn new(
        config: PipelineConfig,
        sources: Vec<Source>,
        ingestor: Ingestor,
        grouper: Grouper,
        detector: BiasDetector,
        summarizer: Summarizer,
    ) -> Self {
        Self {
            config,
            sources,
            ingestor,
            grouper,
            detector,
            summarizer,
        }
    }

    /// Execute one run.
    ///
    /// Honors `run_deadline_secs`: when the deadline passes, in-flight
    /// stage work is cancelled and whatever completed is emitted in a
    /// partial report. Never fails for non-configuration reasons.
    pub async fn run(&self) -> Result<RunArtifacts> {
        let started_at = Utc::now();
        let run_id = started_at.format("%Y%m%dT%H%M%S%3fZ").to_string();
        let deadline = self
            .config
            .run_deadline_secs
            .map(|secs| Instant::now() + Duration::from_secs(secs));

        tracing::info!(run = %run_id, sources = self.sources.len(), "starting pipeline run");

        let mut counts = StageCounts::default();
        let mut partial = false;
        let mut articles = Vec::new();
        let mut indicators = Vec::new();
        let mut groups = Vec::new();
        let mut summaries = Vec::new();
        let mut failures = Vec::new();
        let mut bias = BiasReport::default();

        // Stage 1: ingestion.
        tracing::info!("stage 1: fetching articles from sources");
        match with_deadline(deadline, self.ingestor.fetch_all(&self.sources)).await {
            Some(batch) => {
                counts.sources_polled = batch.sources_polled;
                counts.sources_failed = batch.sources_failed;
                counts.articles_fetched = batch.articles.len();
                articles = batch.articles;
            }
            None => partial = true,
        }

        // Stage 2: per-article bias detection.
        if !partial {
            tracing::info!("stage 2: detecting bias indicators");
            indicators = self.detector.detect_all(&articles);
            counts.indicators_found = indicators.len();
        }

        // Stage 3: grouping.
        if !partial && !articles.is_empty() {
            tracing::info!("stage 3: grouping articles by topic");
            match with_deadline(deadline, self.grouper.group(&articles, &self.sources)).await {
                Some(batch) => {
                    counts.groups_formed = batch.groups.len();
                    counts.ungrouped_articles = batch.ungrouped.len();
                    groups = batch.groups;
                }
                None => partial = true,
            }
        }

        // Stage 4: perspective analysis (computed with the groups; logged
        // here so the run narrative matches the stage list).
        if !partial {
            tracing::info!("stage 4: analyzing group perspectives");
            for group in &groups {
                tracing::debug!(
                    group = %group.id,
                    diversity = group.metrics.source_diversity,
                    gaps = group.metrics.coverage_gaps.len(),
                    "group perspective"
                );
            }
        }

        // Stage 5: summarization.
        if !partial && !groups.is_empty() {
            tracing::info!("stage 5: generating summaries");
            match with_deadline(deadline, self.summarizer.summarize_groups(&groups, &articles))
                .await
            {
                Some(batch) => {
                    counts.summaries_generated = batch.summaries.len();
                    counts.groups_ineligible = batch.ineligible;
                    counts.summaries_failed = batch
                        .failures
                        .iter()
                        .filter(|f| f.reason.starts_with("summary_failed"))
                        .count();
                    summaries = batch.summaries;
                    failures = batch.failures;
                }
                None => partial = true,
            }
        }

        // Stage 6: transparency report.
        tracing::info!("stage 6: building transparency report");
        if !articles.is_empty() || !indicators.is_empty() {
            bias = self.detector.report(&articles, &indicators);
        }

        let report = RunReport {
            run_id: run_id.clone(),
            started_at,
            finished_at: Utc::now(),
            partial,
            counts,
            bias,
            failures,
        };

        let artifacts = RunArtifacts {
            articles,
            groups,
            summaries,
            indicators,
            report,
        };

        // Stage 7: emission. Best-effort; an IO failure degrades, the
        // caller still receives the artifacts.
        tracing::info!("stage 7: emitting run artifacts");
        if let Some(dir) = &self.config.output_dir {
            self.emit(dir, &artifacts);
        }

        tracing::info!(
            run = %run_id,
            partial = artifacts.report.partial,
            articles = artifacts.report.counts.articles_fetched,
            groups = artifacts.report.counts.groups_formed,
            summaries = artifacts.report.counts.summaries_generated,
            indicators = artifacts.report.counts.indicators_found,
            "pipeline run complete"
        );

        Ok(artifacts)
    }

    fn emit(&self, dir: &Path, artifacts: &RunArtifacts) {
        match write_artifacts(dir, artifacts) {
            Ok(path) => tracing::info!(path = %path.display(), "artifacts written"),
            Err(e) => tracing::error!(error = %e, "failed to write artifacts"),
        }
    }
}

/// Run `future` against an optional deadline; `None` means it was cut off.
async fn with_deadline<F, T>(deadline: Option<Instant>, future: F) -> Option<T>
where
    F: Future<Output = T>,
{
    match deadline {
        None => Some(future.await),
        Some(at) => match timeout_at(at, future).await {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("run deadline reached, cutting the stage short");
                None
            }
        },
    }
}
