//! Run artifact emission.
//!
//! After a run, the orchestrator hands the persistence collaborator one
//! JSON document holding the articles, groups, summaries, indicators, and
//! the run report. The document is what the external store ingests; this
//! crate only writes it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use talkless_core::{Article, BiasIndicator, Group, Result, RunReport, Summary};

/// Everything one pipeline run hands downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunArtifacts {
    /// The deduplicated article batch.
    pub articles: Vec<Article>,
    /// Formed groups, ordered by id.
    pub groups: Vec<Group>,
    /// Accepted summaries, ordered by id.
    pub summaries: Vec<Summary>,
    /// All raw bias indicators, in detection order.
    pub indicators: Vec<BiasIndicator>,
    /// The run report.
    pub report: RunReport,
}

/// Write the artifacts document to `dir` as `run-<run_id>.json`.
///
/// # Errors
///
/// Returns [`talkless_core::TalklessError::Io`] when the file cannot be
/// written; callers treat this as a degraded emit, not a run failure.
pub fn write_artifacts(dir: &Path, artifacts: &RunArtifacts) -> Result<PathBuf> {
    let path = dir.join(format!("run-{}.json", artifacts.report.run_id));
    let json = serde_json::to_vec_pretty(artifacts)?;
    std::fs::write(&path, json)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use talkless_core::{BiasReport, StageCounts};

    fn artifacts(run_id: &str) -> RunArtifacts {
        RunArtifacts {
            articles: Vec::new(),
            groups: Vec::new(),
            summaries: Vec::new(),
            indicators: Vec::new(),
            report: RunReport {
                run_id: run_id.into(),
                started_at: Utc::now(),
                finished_at: Utc::now(),
                partial: false,
                counts: StageCounts::default(),
                bias: BiasReport::default(),
                failures: Vec::new(),
            },
        }
    }

    #[test]
    fn writes_named_json_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_artifacts(dir.path(), &artifacts("20260302T090000000Z")).unwrap();
        assert!(path.ends_with("run-20260302T090000000Z.json"));
        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: RunArtifacts = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.report.run_id, "20260302T090000000Z");
    }

    #[test]
    fn unwritable_directory_is_an_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let bogus = file.path().join("not-a-dir");
        assert!(write_artifacts(&bogus, &artifacts("x")).is_err());
    }
}
