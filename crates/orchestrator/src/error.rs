use audita_evidence::RegistryError;
use audita_pool::TaskError;
use audita_types::EvidenceError;
use std::path::PathBuf;

/// Configuration loading and validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}' ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, value: impl ToString, reason: &str) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Error returned by a [`MethodExecutor`](crate::MethodExecutor).
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ExecutorError {
    /// Transient; retried by the pool in pooled phases.
    #[error("retryable: {0}")]
    Retryable(String),
    #[error("method failed: {0}")]
    Failed(String),
    #[error("aborted: {0}")]
    Aborted(String),
}

impl From<ExecutorError> for TaskError {
    fn from(e: ExecutorError) -> Self {
        match e {
            ExecutorError::Retryable(m) => TaskError::Retryable(m),
            ExecutorError::Failed(m) => TaskError::Fatal(m),
            ExecutorError::Aborted(m) => TaskError::Aborted(m),
        }
    }
}

impl From<TaskError> for ExecutorError {
    fn from(e: TaskError) -> Self {
        match e {
            TaskError::Retryable(m) => ExecutorError::Retryable(m),
            TaskError::Fatal(m) => ExecutorError::Failed(m),
            TaskError::Aborted(m) => ExecutorError::Aborted(m),
        }
    }
}

impl From<EvidenceError> for ExecutorError {
    fn from(e: EvidenceError) -> Self {
        ExecutorError::Failed(e.to_string())
    }
}

/// Errors that prevent a run from starting. Failures during a run are
/// reported through [`RunReport`](crate::RunReport) instead.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid phase catalogue: {0}")]
    InvalidCatalogue(String),

    #[error("a run is already in progress")]
    AlreadyRunning,

    #[error(transparent)]
    Evidence(#[from] EvidenceError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn executor_errors_map_onto_task_errors() {
        assert_eq!(
            TaskError::from(ExecutorError::Retryable("busy".into())),
            TaskError::Retryable("busy".into())
        );
        assert_eq!(
            TaskError::from(ExecutorError::Failed("bad".into())),
            TaskError::Fatal("bad".into())
        );
        assert_eq!(
            ExecutorError::from(TaskError::Aborted("stop".into())),
            ExecutorError::Aborted("stop".into())
        );
    }

    #[test]
    fn config_error_names_key() {
        let e = ConfigError::invalid("AUDITA_MAX_WORKERS", "zero", "expected a positive integer");
        assert!(e.to_string().contains("AUDITA_MAX_WORKERS"));
    }
}
