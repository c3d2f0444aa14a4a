use async_trait::async_trait;

use talkless_core::{Article, Result, Source};

/// A capability that turns one configured [`Source`] into normalized
/// [`Article`]s.
///
/// Implementations exist per source kind (RSS, API); tests inject scripted
/// fetchers. A fetcher parses and normalizes but does not filter by age,
/// dedup, or touch the cache — those belong to the [`crate::Ingestor`].
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch and normalize all entries currently exposed by `source`.
    ///
    /// Entries must come back in feed order (publication order within the
    /// source). Individual unparseable entries are skipped, not errors.
    async fn fetch(&self, source: &Source) -> Result<Vec<Article>>;

    /// Fetcher name for logging.
    fn name(&self) -> &str {
        "unknown"
    }
}
