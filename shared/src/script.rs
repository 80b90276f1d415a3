//! The script execution seam.
//!
//! Converters never talk to a scripting runtime directly; they hand the
//! encoded tree to a [`ScriptExecutor`] and decode whatever comes back.

use crate::dynamic::DynamicValue;
use std::fmt::Debug;
use thiserror::Error;

/// Errors reported by a script executor.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// The script defines no function with the requested name.
    #[error("entrypoint {0:?} not found in script")]
    EntrypointNotFound(String),

    /// The script raised an error, or its result could not be converted.
    #[error("script execution failed: {0}")]
    Runtime(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The script returned something other than a map.
    #[error("script returned {found}, expected a table")]
    InvalidReturn {
        /// Runtime type of the returned value.
        found: &'static str,
    },
}

/// Runs a named entrypoint of a loaded script.
pub trait ScriptExecutor: Send + Sync {
    /// Calls `entrypoint` with `params` and returns its first result.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptError`] if the entrypoint is missing or the call fails.
    fn execute(&self, entrypoint: &str, params: Vec<DynamicValue>)
        -> Result<DynamicValue, ScriptError>;
}

/// A batch that could not be processed, handed back untouched.
#[derive(Debug, Error)]
#[error("batch processing failed: {source}")]
pub struct ProcessingFailure<B: Debug> {
    /// The original, unmodified batch.
    pub batch: B,
    /// Why processing failed.
    #[source]
    pub source: ScriptError,
}

impl<B: Debug> ProcessingFailure<B> {
    /// Splits the failure into the original batch and the error.
    pub fn into_parts(self) -> (B, ScriptError) {
        (self.batch, self.source)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Executors for converter tests.

    use super::{DynamicValue, ScriptError, ScriptExecutor};

    /// Returns the first parameter unchanged.
    pub struct Identity;

    impl ScriptExecutor for Identity {
        fn execute(
            &self,
            _entrypoint: &str,
            mut params: Vec<DynamicValue>,
        ) -> Result<DynamicValue, ScriptError> {
            Ok(if params.is_empty() {
                DynamicValue::Absent
            } else {
                params.swap_remove(0)
            })
        }
    }

    /// Applies a closure to the first parameter.
    pub struct Edit<F>(F);

    impl<F> Edit<F>
    where
        F: Fn(DynamicValue) -> Result<DynamicValue, ScriptError> + Send + Sync,
    {
        pub fn new(edit: F) -> Self {
            Self(edit)
        }
    }

    impl<F> ScriptExecutor for Edit<F>
    where
        F: Fn(DynamicValue) -> Result<DynamicValue, ScriptError> + Send + Sync,
    {
        fn execute(
            &self,
            _entrypoint: &str,
            params: Vec<DynamicValue>,
        ) -> Result<DynamicValue, ScriptError> {
            (self.0)(params.into_iter().next().unwrap_or_default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ScriptError::EntrypointNotFound("process".to_string()).to_string(),
            "entrypoint \"process\" not found in script"
        );
        assert_eq!(
            ScriptError::InvalidReturn { found: "string" }.to_string(),
            "script returned string, expected a table"
        );
    }

    #[test]
    fn test_failure_keeps_batch() {
        let failure = ProcessingFailure {
            batch: vec![1, 2, 3],
            source: ScriptError::Runtime("boom".into()),
        };
        assert_eq!(
            failure.to_string(),
            "batch processing failed: script execution failed: boom"
        );
        let (batch, _) = failure.into_parts();
        assert_eq!(batch, vec![1, 2, 3]);
    }
}
