//! Topic grouping for the Talk-Less pipeline.
//!
//! The [`Grouper`] embeds each article's `title + leading content` into a
//! unit-vector space, density-clusters the batch by cosine distance, caps
//! oversized clusters, and annotates every group with perspective metrics.
//! Grouping never fails globally: embedding errors exclude individual
//! articles, and an unclusterable batch simply yields zero groups.

pub mod cluster;
pub mod embedding;
pub mod perspective;

use std::sync::Arc;

use talkless_core::{ids, Article, Group, GroupMetrics, GroupingConfig, Source};

use crate::cluster::{density_cluster, ClusterParams};
use crate::embedding::Embedder;

/// The outcome of one grouping pass.
#[derive(Debug, Clone)]
pub struct GroupBatch {
    /// Formed groups, ordered by group id.
    pub groups: Vec<Group>,
    /// Ids of articles in no group: noise, overflow, or embedding failures.
    pub ungrouped: Vec<String>,
}

/// Partitions article batches into topical groups.
pub struct Grouper {
    embedder: Arc<dyn Embedder>,
    config: GroupingConfig,
}

impl Grouper {
    /// Create a grouper around an embedding capability.
    pub fn new(embedder: Arc<dyn Embedder>, config: GroupingConfig) -> Self {
        Self { embedder, config }
    }

    /// Text sent to the embedding model for one article.
    fn embed_input(&self, article: &Article) -> String {
        let budget = self.config.embedding.input_chars;
        let mut text = format!("{} {}", article.title, article.content);
        if text.chars().count() > budget {
            text = text.chars().take(budget).collect();
        }
        text
    }

    /// Embed the batch; on a batch-level failure fall back to per-article
    /// calls so one bad article cannot empty the whole batch.
    async fn embed_articles(&self, articles: &[&Article]) -> Vec<(String, Vec<f32>)> {
        let texts: Vec<String> = articles.iter().map(|a| self.embed_input(a)).collect();

        match self.embedder.embed(&texts).await {
            Ok(vectors) if vectors.len() == texts.len() => articles
                .iter()
                .zip(vectors)
                .map(|(a, v)| (a.id.clone(), v))
                .collect(),
            Ok(vectors) => {
                tracing::warn!(
                    expected = texts.len(),
                    got = vectors.len(),
                    "embedder returned wrong vector count, retrying per article"
                );
                self.embed_one_by_one(articles).await
            }
            Err(e) => {
                tracing::warn!(error = %e, "batch embedding failed, retrying per article");
                self.embed_one_by_one(articles).await
            }
        }
    }

    async fn embed_one_by_one(&self, articles: &[&Article]) -> Vec<(String, Vec<f32>)> {
        let mut embedded = Vec::with_capacity(articles.len());
        for article in articles {
            let text = vec![self.embed_input(article)];
            match self.embedder.embed(&text).await {
                Ok(mut vectors) if !vectors.is_empty() => {
                    embedded.push((article.id.clone(), vectors.remove(0)));
                }
                Ok(_) => {
                    tracing::warn!(article = %article.id, "embedder returned nothing, excluding article");
                }
                Err(e) => {
                    tracing::warn!(article = %article.id, error = %e, "embedding failed, excluding article");
                }
            }
        }
        embedded
    }

    /// Group a batch of articles.
    ///
    /// `enabled_sources` is used for coverage-gap analysis only.
    pub async fn group(&self, articles: &[Article], enabled_sources: &[Source]) -> GroupBatch {
        let refs: Vec<&Article> = articles.iter().collect();
        let embedded = self.embed_articles(&refs).await;

        let embedded_ids: std::collections::HashSet<&str> =
            embedded.iter().map(|(id, _)| id.as_str()).collect();
        let mut ungrouped: Vec<String> = articles
            .iter()
            .filter(|a| !embedded_ids.contains(a.id.as_str()))
            .map(|a| a.id.clone())
            .collect();

        let ids_vec: Vec<String> = embedded.iter().map(|(id, _)| id.clone()).collect();
        let vectors: Vec<Vec<f32>> = embedded.into_iter().map(|(_, v)| v).collect();

        let clustering = density_cluster(
            &ids_vec,
            &vectors,
            &ClusterParams {
                epsilon: 1.0 - self.config.similarity_threshold,
                min_points: self.config.min_articles_per_group,
                max_size: self.config.max_articles_per_group,
            },
        );

        ungrouped.extend(clustering.noise.iter().map(|&i| ids_vec[i].clone()));

        let by_id: std::collections::HashMap<&str, &Article> =
            articles.iter().map(|a| (a.id.as_str(), a)).collect();

        let mut groups = Vec::with_capacity(clustering.clusters.len());
        for members in &clustering.clusters {
            let member_ids: Vec<String> = members.iter().map(|&i| ids_vec[i].clone()).collect();
            let member_articles: Vec<&Article> = member_ids
                .iter()
                .filter_map(|id| by_id.get(id.as_str()).copied())
                .collect();

            let source_ids = perspective::distinct_source_ids(&member_articles);
            let member_vectors: Vec<&[f32]> =
                members.iter().map(|&i| vectors[i].as_slice()).collect();

            let metrics = GroupMetrics {
                source_diversity: perspective::source_diversity(
                    source_ids.len(),
                    member_ids.len(),
                ),
                coverage_gaps: perspective::coverage_gaps(enabled_sources, &source_ids),
            };

            groups.push(Group {
                id: ids::group_id(&member_ids),
                article_ids: member_ids,
                source_ids,
                centroid: cluster::centroid(&member_vectors),
                metrics,
            });
        }

        // Deterministic reporting order.
        groups.sort_by(|a, b| a.id.cmp(&b.id));
        ungrouped.sort();
        ungrouped.dedup();

        tracing::info!(
            groups = groups.len(),
            ungrouped = ungrouped.len(),
            "grouping complete"
        );

        GroupBatch { groups, ungrouped }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use talkless_core::{Result, SourceKind, TalklessError};

    /// Deterministic test embedder: maps known phrases to fixed directions.
    struct StubEmbedder {
        fail_on: Option<String>,
        fail_batch: bool,
    }

    impl StubEmbedder {
        fn vector_for(text: &str) -> Vec<f32> {
            let lower = text.to_lowercase();
            if lower.contains("central bank") {
                embedding::unit_normalize(vec![1.0, 0.05, 0.0])
            } else if lower.contains("football") {
                embedding::unit_normalize(vec![0.0, 1.0, 0.05])
            } else {
                embedding::unit_normalize(vec![0.0, 0.0, 1.0])
            }
        }
    }

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            if self.fail_batch {
                return Err(TalklessError::Embedding("batch failed".into()));
            }
            texts
                .iter()
                .map(|t| {
                    if let Some(marker) = &self.fail_on {
                        if t.contains(marker.as_str()) {
                            return Err(TalklessError::Embedding("bad article".into()));
                        }
                    }
                    Ok(Self::vector_for(t))
                })
                .collect()
        }

        fn dimensions(&self) -> usize {
            3
        }
    }

    fn article(source_id: &str, slug: &str, title: &str) -> Article {
        let url = format!("https://example.com/{source_id}/{slug}");
        Article {
            id: talkless_core::ids::article_id(&url),
            source_id: source_id.into(),
            source_name: source_id.to_uppercase(),
            title: title.into(),
            url,
            author: None,
            published_at: Utc::now(),
            content: "Body.".into(),
            fetched_at: Utc::now(),
        }
    }

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

    fn grouper(embedder: StubEmbedder) -> Grouper {
        Grouper::new(Arc::new(embedder), GroupingConfig::default())
    }

    #[tokio::test]
    async fn shared_story_forms_one_group() {
        let articles = vec![
            article("a", "rates", "Central bank raises rate by 0.25%"),
            article("b", "rates-b", "Central bank raises rate by 0.25%"),
            article("a", "match", "Football final tonight"),
            article("b", "weather", "Weather outlook"),
        ];
        let sources = vec![source("a"), source("b")];
        let batch = grouper(StubEmbedder {
            fail_on: None,
            fail_batch: false,
        })
        .group(&articles, &sources)
        .await;

        assert_eq!(batch.groups.len(), 1);
        let group = &batch.groups[0];
        assert_eq!(group.article_ids.len(), 2);
        assert_eq!(group.metrics.source_diversity, 1.0);
        assert!(group.metrics.coverage_gaps.is_empty());
        assert_eq!(batch.ungrouped.len(), 2);
    }

    #[tokio::test]
    async fn group_id_matches_sorted_member_hash() {
        let articles = vec![
            article("a", "rates", "Central bank raises rate by 0.25%"),
            article("b", "rates-b", "Central bank decision lands"),
        ];
        let batch = grouper(StubEmbedder {
            fail_on: None,
            fail_batch: false,
        })
        .group(&articles, &[source("a"), source("b")])
        .await;

        assert_eq!(batch.groups.len(), 1);
        let expected = ids::group_id(&batch.groups[0].article_ids);
        assert_eq!(batch.groups[0].id, expected);
    }

    #[tokio::test]
    async fn group_ids_invariant_under_input_order() {
        let mut articles = vec![
            article("a", "rates", "Central bank raises rate by 0.25%"),
            article("b", "rates-b", "Central bank decision lands"),
            article("a", "match", "Football final tonight"),
            article("b", "match-b", "Football final preview"),
        ];
        let sources = vec![source("a"), source("b")];
        let g = grouper(StubEmbedder {
            fail_on: None,
            fail_batch: false,
        });
        let forward = g.group(&articles, &sources).await;
        articles.reverse();
        let backward = g.group(&articles, &sources).await;

        let forward_ids: Vec<&String> = forward.groups.iter().map(|g| &g.id).collect();
        let backward_ids: Vec<&String> = backward.groups.iter().map(|g| &g.id).collect();
        assert_eq!(forward_ids, backward_ids);
        assert_eq!(forward.groups.len(), 2);
    }

    #[tokio::test]
    async fn coverage_gaps_list_missing_sources() {
        let articles = vec![
            article("a", "rates", "Central bank raises rate by 0.25%"),
            article("b", "rates-b", "Central bank decision lands"),
        ];
        let sources = vec![source("a"), source("b"), source("c")];
        let batch = grouper(StubEmbedder {
            fail_on: None,
            fail_batch: false,
        })
        .group(&articles, &sources)
        .await;
        assert_eq!(batch.groups[0].metrics.coverage_gaps, vec!["c".to_string()]);
    }

    #[tokio::test]
    async fn failing_article_is_excluded_not_fatal() {
        let articles = vec![
            article("a", "rates", "Central bank raises rate by 0.25%"),
            article("b", "rates-b", "Central bank decision lands"),
            article("c", "poison", "POISON PILL article"),
        ];
        let sources = vec![source("a"), source("b"), source("c")];
        let batch = grouper(StubEmbedder {
            fail_on: Some("POISON".into()),
            fail_batch: false,
        })
        .group(&articles, &sources)
        .await;

        assert_eq!(batch.groups.len(), 1);
        assert!(batch.ungrouped.contains(&articles[2].id));
    }

    #[tokio::test]
    async fn batch_failure_falls_back_to_per_article_calls() {
        let articles = vec![
            article("a", "rates", "Central bank raises rate by 0.25%"),
            article("b", "rates-b", "Central bank decision lands"),
        ];
        // First call (the batch) fails; per-article retries succeed.
        struct FlakyEmbedder {
            calls: std::sync::atomic::AtomicUsize,
        }

        #[async_trait]
        impl Embedder for FlakyEmbedder {
            async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
                let call = self
                    .calls
                    .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                if call == 0 {
                    return Err(TalklessError::Embedding("cold start".into()));
                }
                Ok(texts.iter().map(|t| StubEmbedder::vector_for(t)).collect())
            }

            fn dimensions(&self) -> usize {
                3
            }
        }

        let grouper = Grouper::new(
            Arc::new(FlakyEmbedder {
                calls: std::sync::atomic::AtomicUsize::new(0),
            }),
            GroupingConfig::default(),
        );
        let batch = grouper
            .group(&articles, &[source("a"), source("b")])
            .await;
        assert_eq!(batch.groups.len(), 1);
    }

    #[tokio::test]
    async fn empty_batch_yields_zero_groups() {
        let batch = grouper(StubEmbedder {
            fail_on: None,
            fail_batch: false,
        })
        .group(&[], &[source("a")])
        .await;
        assert!(batch.groups.is_empty());
        assert!(batch.ungrouped.is_empty());
    }
}
