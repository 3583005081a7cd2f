use thiserror::Error;

use crate::domain::ModelKind;

/// Binary-facing error: a message plus the process exit code.
#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

/// Typed failures of the fitting / forecasting / batch layers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeclineError {
    #[error("insufficient data: {found} usable point(s), at least {required} required")]
    InsufficientData { found: usize, required: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{model} fit did not converge: {reason}")]
    ConvergenceFailure { model: ModelKind, reason: String },

    #[error("task '{task_id}' failed: {source}")]
    TaskExecution {
        task_id: String,
        #[source]
        source: Box<DeclineError>,
    },

    #[error("data access failed: {0}")]
    DataAccess(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl DeclineError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        DeclineError::InvalidConfig(message.into())
    }

    pub fn data_access(message: impl Into<String>) -> Self {
        DeclineError::DataAccess(message.into())
    }

    /// Wrap a task's own error with the id of the task that produced it.
    pub fn task_execution(task_id: impl Into<String>, source: DeclineError) -> Self {
        DeclineError::TaskExecution {
            task_id: task_id.into(),
            source: Box::new(source),
        }
    }

    /// Exit code used when this error terminates the binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            DeclineError::InvalidConfig(_) | DeclineError::DataAccess(_) => 2,
            DeclineError::InsufficientData { .. } => 3,
            DeclineError::ConvergenceFailure { .. } | DeclineError::Cancelled => 4,
            DeclineError::TaskExecution { .. } => 5,
        }
    }
}

impl From<DeclineError> for AppError {
    fn from(err: DeclineError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decline_errors_map_to_exit_codes() {
        let err: AppError = DeclineError::InsufficientData { found: 3, required: 5 }.into();
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains("3 usable point"));

        let err: AppError = DeclineError::invalid_config("min_b > max_b").into();
        assert_eq!(err.exit_code(), 2);

        let err: AppError = DeclineError::ConvergenceFailure {
            model: ModelKind::Hyperbolic,
            reason: "non-finite parameters".to_string(),
        }
        .into();
        assert_eq!(err.exit_code(), 4);
        assert!(err.to_string().starts_with("Hyperbolic"));
    }

    #[test]
    fn task_execution_keeps_the_typed_cause() {
        use std::error::Error as _;

        let err = DeclineError::task_execution("W-7", DeclineError::InsufficientData { found: 2, required: 5 });
        assert_eq!(
            err.to_string(),
            "task 'W-7' failed: insufficient data: 2 usable point(s), at least 5 required"
        );
        let DeclineError::TaskExecution { source, .. } = &err else {
            panic!("expected TaskExecution");
        };
        assert_eq!(**source, DeclineError::InsufficientData { found: 2, required: 5 });
        assert_eq!(
            err.source().map(|s| s.to_string()).as_deref(),
            Some("insufficient data: 2 usable point(s), at least 5 required")
        );
        assert_eq!(err.exit_code(), 5);
    }
}
