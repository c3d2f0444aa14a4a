//! Core types, configuration, and error handling for the Talk-Less pipeline.
//!
//! This crate provides the shared foundation used by all other Talk-Less
//! crates:
//! - [`TalklessError`] — unified error type using `thiserror`
//! - [`PipelineConfig`], [`SourcesFile`], [`BiasRulesFile`] — the three typed
//!   configuration documents
//! - [`ids`] — deterministic article/group/summary identifiers
//! - Shared records: [`Source`], [`Article`], [`Group`], [`Summary`],
//!   [`BiasIndicator`], [`RunReport`]

mod config;
mod error;
pub mod ids;
mod rules;
mod types;

pub use config::{
    EmbeddingConfig, GroupingConfig, IngestConfig, PipelineConfig, SourcesFile,
    SummarizationConfig,
};
pub use error::TalklessError;
pub use rules::{BiasRulesFile, RuleEntry, RuleScope};
pub use types::{
    ApiFieldMap, Article, BiasIndicator, BiasKind, BiasReport, Citation, Group, GroupFailure,
    GroupMetrics, RuleConfidence, RunReport, Source, SourceBiasStats, SourceKind, StageCounts,
    Summary, SummaryConfidence, ValidationStatus,
};

/// A convenience `Result` type for Talk-Less operations.
pub type Result<T> = std::result::Result<T, TalklessError>;
