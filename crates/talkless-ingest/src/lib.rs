//! Article ingestion for the Talk-Less pipeline.
//!
//! The [`Ingestor`] turns the enabled sources into one deduplicated,
//! age-filtered batch of normalized [`Article`]s. Sources are fetched
//! concurrently up to a configured cap; each source is paced by the
//! per-source [`RateLimiter`] and consults the shared content cache.
//! A failing source contributes zero articles and never aborts the batch.

pub mod api;
pub mod cache;
pub mod fetcher;
pub mod normalize;
pub mod rate_limit;
pub mod rss;

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use futures::stream::{self, StreamExt};

use talkless_core::{Article, IngestConfig, Result, Source, SourceKind, TalklessError};

use crate::api::ApiFetcher;
use crate::cache::{ArticleCache, CacheEntry};
use crate::fetcher::Fetcher;
use crate::rate_limit::RateLimiter;
use crate::rss::RssFetcher;

/// Budget for a single cache operation. The cache is an accelerator; a
/// stalled backend must not stall the fetch path.
const CACHE_OP_TIMEOUT_MS: u64 = 250;

/// The outcome of one ingestion pass.
#[derive(Debug, Clone)]
pub struct FetchBatch {
    /// Deduplicated, age-filtered articles in source order, publication
    /// order within each source.
    pub articles: Vec<Article>,
    /// Enabled sources polled.
    pub sources_polled: usize,
    /// Sources that contributed nothing due to an error.
    pub sources_failed: usize,
}

/// Fetches and normalizes articles from all enabled sources.
pub struct Ingestor {
    rss: Arc<dyn Fetcher>,
    api: Arc<dyn Fetcher>,
    limiter: RateLimiter,
    cache: Arc<dyn ArticleCache>,
    config: IngestConfig,
}

impl Ingestor {
    /// Create an ingestor with the real HTTP fetchers.
    ///
    /// # Errors
    ///
    /// Returns [`TalklessError::Fetch`] if an HTTP client cannot be built.
    pub fn new(config: IngestConfig, cache: Arc<dyn ArticleCache>) -> Result<Self> {
        let timeout = Duration::from_secs(config.fetch_timeout_secs);
        let rss = Arc::new(RssFetcher::new(timeout, config.strict_published)?);
        let api = Arc::new(ApiFetcher::new(timeout, config.strict_published)?);
        Ok(Self::with_fetchers(config, cache, rss, api))
    }

    /// Create an ingestor with injected fetchers (used by tests).
    pub fn with_fetchers(
        config: IngestConfig,
        cache: Arc<dyn ArticleCache>,
        rss: Arc<dyn Fetcher>,
        api: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            rss,
            api,
            limiter: RateLimiter::new(),
            cache,
            config,
        }
    }

    /// Fetch one source: credential check, rate pacing, fetch with timeout.
    ///
    /// # Errors
    ///
    /// Returns the underlying fetch/parse error, or [`TalklessError::Fetch`]
    /// on timeout or missing credential.
    pub async fn fetch(&self, source: &Source) -> Result<Vec<Article>> {
        // Credential check happens before a rate-limit slot is taken.
        if source.kind == SourceKind::Api {
            ApiFetcher::resolve_credential(source)?;
        }

        self.limiter
            .acquire(&source.id, source.requests_per_minute)
            .await;

        let fetcher = match source.kind {
            SourceKind::Rss => &self.rss,
            SourceKind::Api => &self.api,
        };

        let timeout = Duration::from_secs(self.config.fetch_timeout_secs);
        match tokio::time::timeout(timeout, fetcher.fetch(source)).await {
            Ok(result) => result,
            Err(_) => Err(TalklessError::Fetch(format!(
                "{}: fetch timed out after {}s",
                source.id, self.config.fetch_timeout_secs
            ))),
        }
    }

    /// Fetch every enabled source and assemble the deduplicated batch.
    ///
    /// Failures are absorbed: a source that errors is counted and logged,
    /// and the batch continues without it.
    pub async fn fetch_all(&self, sources: &[Source]) -> FetchBatch {
        let enabled: Vec<&Source> = sources.iter().filter(|s| s.enabled).collect();
        let now = Utc::now();

        let mut results: Vec<(usize, Option<Vec<Article>>)> =
            stream::iter(enabled.iter().enumerate().map(|(index, source)| async move {
                match self.fetch(source).await {
                    Ok(articles) => {
                        let kept = self.filter_and_cache(articles, now).await;
                        tracing::info!(source = %source.id, articles = kept.len(), "fetched source");
                        (index, Some(kept))
                    }
                    Err(e) => {
                        tracing::warn!(source = %source.id, error = %e, "source fetch failed");
                        (index, None)
                    }
                }
            }))
            .buffer_unordered(self.config.max_concurrent_fetches.max(1))
            .collect()
            .await;

        // Completion order is nondeterministic; restore source order.
        results.sort_by_key(|(index, _)| *index);

        let sources_polled = enabled.len();
        let sources_failed = results.iter().filter(|(_, r)| r.is_none()).count();

        let mut seen = std::collections::HashSet::new();
        let mut articles = Vec::new();
        for (_, result) in results {
            for article in result.into_iter().flatten() {
                if seen.insert(article.id.clone()) {
                    articles.push(article);
                }
            }
        }

        FetchBatch {
            articles,
            sources_polled,
            sources_failed,
        }
    }

    /// Apply the age filter and run each surviving article through the
    /// cache. Cache errors degrade to uncached operation with a warning.
    async fn filter_and_cache(&self, articles: Vec<Article>, now: chrono::DateTime<Utc>) -> Vec<Article> {
        let cutoff = now - ChronoDuration::hours(self.config.max_article_age_hours);
        let mut kept = Vec::with_capacity(articles.len());

        for article in articles {
            if article.published_at < cutoff {
                tracing::debug!(article = %article.id, "dropping stale article");
                continue;
            }

            match self.cache_get(&article.id).await {
                Ok(Some(CacheEntry::Article { article: cached })) => {
                    kept.push(cached);
                    continue;
                }
                Ok(Some(CacheEntry::FetchedRecently)) => {
                    // Marker is still live; use the fresh copy, skip the write.
                    kept.push(article);
                    continue;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(cache = self.cache.name(), error = %e, "cache read failed, bypassing");
                }
            }

            let entry = if article.content.is_empty() {
                CacheEntry::FetchedRecently
            } else {
                CacheEntry::Article {
                    article: article.clone(),
                }
            };
            if let Err(e) = self.cache_put(&article.id, &entry).await {
                tracing::warn!(cache = self.cache.name(), error = %e, "cache write failed, bypassing");
            }
            kept.push(article);
        }

        kept
    }

    async fn cache_get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let budget = Duration::from_millis(CACHE_OP_TIMEOUT_MS);
        match tokio::time::timeout(budget, self.cache.get(key)).await {
            Ok(result) => result,
            Err(_) => Err(TalklessError::Cache(format!(
                "get {key} timed out after {CACHE_OP_TIMEOUT_MS}ms"
            ))),
        }
    }

    async fn cache_put(&self, key: &str, entry: &CacheEntry) -> Result<()> {
        let budget = Duration::from_millis(CACHE_OP_TIMEOUT_MS);
        match tokio::time::timeout(budget, self.cache.put(key, entry)).await {
            Ok(result) => result,
            Err(_) => Err(TalklessError::Cache(format!(
                "put {key} timed out after {CACHE_OP_TIMEOUT_MS}ms"
            ))),
        }
    }
}
