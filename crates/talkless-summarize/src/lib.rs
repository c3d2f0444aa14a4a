//! Summary generation for the Talk-Less pipeline.
//!
//! For each eligible group the [`Summarizer`] builds a prompt over the
//! member articles, calls the configured completion provider, extracts and
//! validates citations, and retries a bounded number of times with a
//! violation-refined prompt. Groups are summarized concurrently up to the
//! configured cap and reassembled in deterministic id order.

pub mod citation;
pub mod prompt;
pub mod provider;
pub mod validate;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};

use talkless_core::{
    ids, Article, Group, GroupFailure, Summary, SummaryConfidence, SummarizationConfig,
    ValidationStatus,
};

use crate::citation::extract_citations;
use crate::prompt::{build_retry_prompt, build_summary_prompt, PROMPT_TEMPLATE_VERSION};
use crate::provider::{Completer, CompletionErrorKind, CompletionRequest};
use crate::validate::{validate, ValidationViolation};

const BACKOFF_BASE_MS: u64 = 500;

/// The outcome of one summarization pass.
#[derive(Debug, Clone)]
pub struct SummaryBatch {
    /// Accepted summaries, ordered by summary id.
    pub summaries: Vec<Summary>,
    /// Groups whose summary could not be produced, ordered by group id.
    /// Includes ineligible groups (reason prefix `ineligible:`).
    pub failures: Vec<GroupFailure>,
    /// How many groups were skipped as ineligible.
    pub ineligible: usize,
}

/// Generates validated summaries for article groups.
pub struct Summarizer {
    completer: Arc<dyn Completer>,
    config: SummarizationConfig,
}

impl Summarizer {
    /// Create a summarizer around a completion capability.
    pub fn new(completer: Arc<dyn Completer>, config: SummarizationConfig) -> Self {
        Self { completer, config }
    }

    fn generation_salt(&self) -> &str {
        self.config
            .generation_salt
            .as_deref()
            .unwrap_or(PROMPT_TEMPLATE_VERSION)
    }

    /// Why a group may not be summarized, or `None` when it is eligible.
    pub fn ineligibility(&self, group: &Group) -> Option<String> {
        if group.article_ids.len() < 2 {
            return Some("fewer than 2 articles".into());
        }
        if group.source_ids.len() < self.config.min_distinct_sources {
            return Some(format!(
                "fewer than {} distinct sources",
                self.config.min_distinct_sources
            ));
        }
        None
    }

    /// Summarize every eligible group in the batch.
    pub async fn summarize_groups(&self, groups: &[Group], articles: &[Article]) -> SummaryBatch {
        let by_id: HashMap<&str, &Article> =
            articles.iter().map(|a| (a.id.as_str(), a)).collect();

        let mut eligible: Vec<&Group> = Vec::new();
        let mut failures: Vec<GroupFailure> = Vec::new();
        let mut ineligible = 0usize;

        for group in groups {
            match self.ineligibility(group) {
                Some(reason) => {
                    tracing::info!(group = %group.id, reason = %reason, "group ineligible for summarization");
                    failures.push(GroupFailure {
                        group_id: group.id.clone(),
                        reason: format!("ineligible: {reason}"),
                    });
                    ineligible += 1;
                }
                None => eligible.push(group),
            }
        }

        let results: Vec<(String, Result<Summary, String>)> =
            stream::iter(eligible.into_iter().map(|group| {
                let by_id = &by_id;
                async move {
                    let members: Vec<&Article> = group
                        .article_ids
                        .iter()
                        .filter_map(|id| by_id.get(id.as_str()).copied())
                        .collect();
                    let outcome = self.generate(group, &members).await;
                    (group.id.clone(), outcome)
                }
            }))
            .buffer_unordered(self.config.max_concurrent_summaries.max(1))
            .collect()
            .await;

        let mut summaries = Vec::new();
        for (group_id, outcome) in results {
            match outcome {
                Ok(summary) => summaries.push(summary),
                Err(reason) => {
                    tracing::warn!(group = %group_id, reason = %reason, "summary failed");
                    failures.push(GroupFailure { group_id, reason });
                }
            }
        }

        // Completion order is nondeterministic; the emitted order is not.
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        failures.sort_by(|a, b| a.group_id.cmp(&b.group_id));

        SummaryBatch {
            summaries,
            failures,
            ineligible,
        }
    }

    /// Generate one validated summary, retrying on validation failure.
    async fn generate(&self, group: &Group, members: &[&Article]) -> Result<Summary, String> {
        // Rule 4 depends only on configuration; fail before spending a call.
        if self.config.temperature > self.config.max_temperature {
            return Err("summary_failed: temperature".into());
        }

        let base_prompt = build_summary_prompt(members, &self.config);
        let mut violation: Option<ValidationViolation> = None;

        for attempt in 0..=self.config.max_retries {
            let prompt_text = match &violation {
                None => base_prompt.clone(),
                Some(v) => build_retry_prompt(&base_prompt, v),
            };
            let request = CompletionRequest {
                model: self.config.model.clone(),
                temperature: self.config.temperature,
                prompt: prompt_text,
            };

            let text = match self.call_with_backoff(&request).await {
                Ok(text) => text,
                Err(e) => {
                    return Err(match e.kind {
                        CompletionErrorKind::Quota => "summary_failed: quota".to_string(),
                        CompletionErrorKind::Permanent => {
                            format!("summary_failed: permanent: {}", e.message)
                        }
                        CompletionErrorKind::Transient => "summary_failed: transient".to_string(),
                    });
                }
            };

            let citations = extract_citations(&text, members);
            match validate(&text, members, &citations, &self.config) {
                Ok(()) => {
                    return Ok(Summary {
                        id: ids::summary_id(&group.id, self.generation_salt()),
                        group_id: group.id.clone(),
                        text,
                        citations,
                        model: self.config.model.clone(),
                        temperature: self.config.temperature,
                        prompt_version: PROMPT_TEMPLATE_VERSION.to_string(),
                        retries: attempt,
                        confidence: SummaryConfidence::from_retries(attempt),
                        validation: ValidationStatus::Passed,
                        created_at: Utc::now(),
                    });
                }
                Err(v) => {
                    tracing::warn!(group = %group.id, attempt, violation = %v, "summary rejected by validation");
                    violation = Some(v);
                }
            }
        }

        let code = violation
            .map(|v| v.code())
            .unwrap_or("unknown");
        Err(format!("summary_failed: {code}"))
    }

    /// Call the provider, retrying transient failures with exponential
    /// backoff inside the same attempt budget.
    async fn call_with_backoff(
        &self,
        request: &CompletionRequest,
    ) -> Result<String, provider::CompletionError> {
        let mut delay_ms = BACKOFF_BASE_MS;
        for attempt in 0..=self.config.max_retries {
            match self.completer.complete(request).await {
                Ok(text) => return Ok(text),
                Err(e) if e.kind == CompletionErrorKind::Transient
                    && attempt < self.config.max_retries =>
                {
                    tracing::warn!(
                        provider = self.completer.name(),
                        attempt,
                        error = %e,
                        "transient completion error, backing off"
                    );
                    tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
                    delay_ms = delay_ms.saturating_mul(2);
                }
                Err(e) => return Err(e),
            }
        }
        unreachable!("loop always returns")
    }
}
