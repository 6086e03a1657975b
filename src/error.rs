//! Error types for the budget engine
//!
//! Internally the engine works with a single `EngineError` hierarchy built
//! on thiserror. At the facade boundary every error is mapped onto one of
//! four stable wire codes that the consuming UI keys off; messages are
//! informational only.

use thiserror::Error;

use crate::models::MoneyError;

/// The main error type for engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    /// Input argument missing, malformed, or out of range
    #[error("{message}")]
    Validation {
        message: String,
        /// Parameter name the error refers to, when known
        target: Option<String>,
    },

    /// Request is well-formed but violates a business rule or state invariant
    #[error("{0}")]
    InvalidOperation(String),

    /// Entity referenced by the request does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Operation is wired but intentionally inert
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    /// The operation was cancelled before it committed
    #[error("operation cancelled")]
    Cancelled,

    /// Store adapter failure
    #[error("storage error: {0}")]
    Storage(String),

    /// Money arithmetic violation (currency mismatch, division by zero)
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// Stable error codes exposed on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Validation,
    InvalidOperation,
    NotImplemented,
    Unexpected,
}

impl ErrorCode {
    /// The string form consumed by the UI
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION",
            Self::InvalidOperation => "INVALID_OPERATION",
            Self::NotImplemented => "NOT_IMPLEMENTED",
            Self::Unexpected => "UNEXPECTED",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl EngineError {
    /// Create a validation error without a parameter target
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            target: None,
        }
    }

    /// Create a validation error naming the offending parameter
    pub fn validation_for(target: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            target: Some(target.to_string()),
        }
    }

    /// Create a "not found" error for accounts
    pub fn account_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            entity: "Account",
            id: id.to_string(),
        }
    }

    /// Create a "not found" error for envelopes
    pub fn envelope_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            entity: "Envelope",
            id: id.to_string(),
        }
    }

    /// Create a "not found" error for transactions
    pub fn transaction_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            entity: "Transaction",
            id: id.to_string(),
        }
    }

    /// Create a "not found" error for payees
    pub fn payee_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            entity: "Payee",
            id: id.to_string(),
        }
    }

    /// The stable wire code this error maps to
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { .. } | Self::NotFound { .. } => ErrorCode::Validation,
            Self::InvalidOperation(_) | Self::Money(_) => ErrorCode::InvalidOperation,
            Self::NotImplemented(_) => ErrorCode::NotImplemented,
            Self::Cancelled | Self::Storage(_) => ErrorCode::Unexpected,
        }
    }

    /// The parameter name carried by validation errors, when available
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::Validation { target, .. } => target.as_deref(),
            Self::NotFound { entity, .. } => Some(entity),
            _ => None,
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

// State-machine and invariant violations from the models are business-rule
// failures; entity field validation and malformed ranges are input problems.

impl From<crate::models::TransactionStateError> for EngineError {
    fn from(err: crate::models::TransactionStateError) -> Self {
        Self::InvalidOperation(err.to_string())
    }
}

impl From<crate::models::TransactionValidationError> for EngineError {
    fn from(err: crate::models::TransactionValidationError) -> Self {
        Self::InvalidOperation(err.to_string())
    }
}

impl From<crate::models::PeriodStateError> for EngineError {
    fn from(err: crate::models::PeriodStateError) -> Self {
        Self::InvalidOperation(err.to_string())
    }
}

impl From<crate::models::AllocationValidationError> for EngineError {
    fn from(err: crate::models::AllocationValidationError) -> Self {
        Self::InvalidOperation(err.to_string())
    }
}

impl From<crate::models::AccountValidationError> for EngineError {
    fn from(err: crate::models::AccountValidationError) -> Self {
        match err {
            // Closing a funded account breaks a business rule, not the input
            crate::models::AccountValidationError::NonZeroBalanceOnClose(_) => {
                Self::InvalidOperation(err.to_string())
            }
            _ => Self::validation(err.to_string()),
        }
    }
}

impl From<crate::models::EnvelopeValidationError> for EngineError {
    fn from(err: crate::models::EnvelopeValidationError) -> Self {
        Self::validation(err.to_string())
    }
}

impl From<crate::models::PayeeValidationError> for EngineError {
    fn from(err: crate::models::PayeeValidationError) -> Self {
        Self::validation(err.to_string())
    }
}

impl From<crate::models::DateRangeError> for EngineError {
    fn from(err: crate::models::DateRangeError) -> Self {
        Self::validation(err.to_string())
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::validation("amount must be positive");
        assert_eq!(err.to_string(), "amount must be positive");

        let err = EngineError::InvalidOperation("period is closed".into());
        assert_eq!(err.to_string(), "period is closed");
    }

    #[test]
    fn test_not_found() {
        let err = EngineError::account_not_found("acc-1234");
        assert_eq!(err.to_string(), "Account not found: acc-1234");
        assert!(err.is_not_found());
        assert_eq!(err.code(), ErrorCode::Validation);
    }

    #[test]
    fn test_code_mapping() {
        assert_eq!(EngineError::validation("x").code().as_str(), "VALIDATION");
        assert_eq!(
            EngineError::InvalidOperation("x".into()).code().as_str(),
            "INVALID_OPERATION"
        );
        assert_eq!(
            EngineError::NotImplemented("probe").code().as_str(),
            "NOT_IMPLEMENTED"
        );
        assert_eq!(
            EngineError::Storage("io".into()).code().as_str(),
            "UNEXPECTED"
        );
        assert_eq!(EngineError::Cancelled.code(), ErrorCode::Unexpected);
    }

    #[test]
    fn test_validation_target() {
        let err = EngineError::validation_for("amount", "must be positive");
        assert_eq!(err.target(), Some("amount"));
    }
}
