//! Error handling for colony
//!
//! This module defines the crate-wide error type and a Result alias. Graph
//! configuration and usage errors live in [`crate::pipeline::PipelineError`]
//! and are wrapped here.

use crate::pipeline::PipelineError;
use thiserror::Error;

/// Main error type for colony operations
#[derive(Error, Debug)]
pub enum ColonyError {
    /// Graph configuration or usage errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// A target computation failed while running on the caller's thread
    #[error("Invocation failed in node {node}: {source}")]
    Invocation {
        node: String,
        #[source]
        source: anyhow::Error,
    },

    /// Errors related to persisted values
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// A lock guarding node state was poisoned by a panicking thread
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ColonyError>,
    },
}

impl ColonyError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ColonyError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Build a lock-poisoning error for the named piece of state
    pub(crate) fn poisoned<T>(what: &str, err: std::sync::PoisonError<T>) -> Self {
        ColonyError::LockPoisoned(format!("{}: {}", what, err))
    }
}

/// Result type alias for colony operations
pub type Result<T> = std::result::Result<T, ColonyError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ColonyError::Persistence("disk full".to_string());
        assert_eq!(err.to_string(), "Persistence error: disk full");
    }

    #[test]
    fn test_error_with_context() {
        let err = ColonyError::Config("bad pool size".to_string());
        let with_ctx = err.with_context("Failed to load engine config");
        assert!(with_ctx.to_string().contains("Failed to load engine config"));
        assert!(with_ctx.to_string().contains("bad pool size"));
    }

    #[test]
    fn test_pipeline_error_converts() {
        let err: ColonyError = PipelineError::MissingTarget.into();
        assert!(matches!(err, ColonyError::Pipeline(PipelineError::MissingTarget)));
    }

    #[test]
    fn test_result_ext_context() {
        let res: Result<()> = Err(ColonyError::Persistence("oops".into()));
        let err = res.context("saving node").unwrap_err();
        assert!(err.to_string().starts_with("saving node"));
    }
}
