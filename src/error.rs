use std::time::Duration;

use thiserror::Error;

use crate::dialect::LogicalType;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("No physical type registered for logical type `{logical}` on dialect `{dialect}`")]
    UnsupportedLogicalType { logical: LogicalType, dialect: String },

    #[error("A query named `{0}` is already registered")]
    DuplicateName(String),

    #[error("No named query registered under `{0}`")]
    UnknownNamedQuery(String),

    #[error("Query text mixes positional (?n) and named (:name) parameters")]
    MixedParameterStyle,

    #[error("Invalid parameter placeholder: {0}")]
    InvalidPlaceholder(String),

    #[error("Query references positional parameter ?{referenced} but only {supplied} argument(s) were supplied")]
    ParameterCountMismatch { referenced: usize, supplied: usize },

    #[error("No argument bound for named parameter :{0}")]
    UnboundParameter(String),

    #[error("Invalid dialect descriptor: {0}")]
    InvalidDialect(String),

    #[error("Query execution failed: {0}")]
    Execution(#[from] ExecutionFailure),

    #[error("Type conversion error: expected {expected}, got {actual}")]
    TypeConversion { expected: &'static str, actual: String },

    #[error("Unexpected null value for non-nullable field")]
    UnexpectedNull,

    #[cfg(feature = "serde")]
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why a query invocation failed while in the `Executing` state.
///
/// None of these are retried by the engine: query execution may have side
/// effects, so retry policy belongs to the caller.
#[derive(Error, Debug)]
pub enum ExecutionFailure {
    #[error("statement timed out after {0:?}")]
    Timeout(Duration),

    #[error("execution cancelled by the owning session")]
    Cancelled,

    #[error("database error: {0}")]
    Substrate(#[from] turso::Error),
}

impl From<turso::Error> for Error {
    fn from(err: turso::Error) -> Self {
        Error::Execution(ExecutionFailure::Substrate(err))
    }
}

impl Error {
    /// True for failures raised while a statement was executing, as opposed
    /// to registration-time or bind-time failures.
    pub fn is_execution(&self) -> bool {
        matches!(self, Error::Execution(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_unsupported_logical_type() {
        let err = Error::UnsupportedLogicalType {
            logical: LogicalType::UUID,
            dialect: "Oracle".to_string(),
        };
        let display = format!("{}", err);
        assert!(display.contains("universally-unique-id"));
        assert!(display.contains("Oracle"));
    }

    #[test]
    fn test_error_display_duplicate_name() {
        let err = Error::DuplicateName("simple".to_string());
        let display = format!("{}", err);
        assert!(display.contains("already registered"));
        assert!(display.contains("simple"));
    }

    #[test]
    fn test_error_display_mixed_style() {
        let err = Error::MixedParameterStyle;
        assert!(format!("{}", err).contains("mixes positional"));
    }

    #[test]
    fn test_error_display_count_mismatch() {
        let err = Error::ParameterCountMismatch { referenced: 3, supplied: 2 };
        let display = format!("{}", err);
        assert!(display.contains("?3"));
        assert!(display.contains("2 argument"));
    }

    #[test]
    fn test_error_display_unbound_parameter() {
        let err = Error::UnboundParameter("name".to_string());
        assert!(format!("{}", err).contains(":name"));
    }

    #[test]
    fn test_execution_failure_timeout_display() {
        let err = Error::Execution(ExecutionFailure::Timeout(Duration::from_millis(250)));
        let display = format!("{}", err);
        assert!(display.contains("timed out"));
        assert!(err.is_execution());
    }

    #[test]
    fn test_execution_failure_cancelled_display() {
        let err = Error::Execution(ExecutionFailure::Cancelled);
        assert!(format!("{}", err).contains("cancelled"));
    }

    #[test]
    fn test_bind_errors_are_not_execution_errors() {
        assert!(!Error::MixedParameterStyle.is_execution());
        assert!(!Error::UnboundParameter("id".to_string()).is_execution());
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_ok() -> Result<i32> {
            Ok(42)
        }

        assert_eq!(returns_ok().unwrap(), 42);
    }
}
