use std::path::PathBuf;

/// Errors that can occur across the Talk-Less pipeline.
///
/// Each variant wraps a specific failure domain. Library crates use this type
/// directly; the binary crate converts to `anyhow::Error` at the boundary.
/// Only [`TalklessError::Config`] is allowed to abort a run — every other
/// variant is absorbed into per-stage counters and the run report.
///
/// # Examples
///
/// ```
/// use talkless_core::TalklessError;
///
/// let err = TalklessError::Config("missing sources file".into());
/// assert!(err.to_string().contains("missing sources file"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum TalklessError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration. The only fatal error kind.
    #[error("configuration error: {0}")]
    Config(String),

    /// Network or protocol failure while fetching a source.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Feed or payload parsing failure.
    #[error("parse error: {0}")]
    Parse(String),

    /// Content cache failure. Always degraded to uncached operation.
    #[error("cache error: {0}")]
    Cache(String),

    /// Embedding model or API error.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// LLM completion error that exhausted its retry budget.
    #[error("completion error: {0}")]
    Completion(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),
}

impl TalklessError {
    /// Returns `true` if this error should abort the run.
    ///
    /// # Examples
    ///
    /// ```
    /// use talkless_core::TalklessError;
    ///
    /// assert!(TalklessError::Config("bad".into()).is_fatal());
    /// assert!(!TalklessError::Fetch("timeout".into()).is_fatal());
    /// ```
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TalklessError::Config(_) | TalklessError::FileNotFound(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: TalklessError = io_err.into();
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn config_error_displays_message() {
        let err = TalklessError::Config("bad value".into());
        assert_eq!(err.to_string(), "configuration error: bad value");
    }

    #[test]
    fn file_not_found_shows_path() {
        let err = TalklessError::FileNotFound(PathBuf::from("/tmp/sources.toml"));
        assert!(err.to_string().contains("/tmp/sources.toml"));
    }

    #[test]
    fn only_config_class_errors_are_fatal() {
        assert!(TalklessError::Config("x".into()).is_fatal());
        assert!(TalklessError::FileNotFound(PathBuf::from("x")).is_fatal());
        assert!(!TalklessError::Cache("down".into()).is_fatal());
        assert!(!TalklessError::Embedding("500".into()).is_fatal());
        assert!(!TalklessError::Completion("quota".into()).is_fatal());
    }
}
