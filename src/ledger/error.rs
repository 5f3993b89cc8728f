//! Ledger Error Types

use thiserror::Error;

/// SQLSTATE serialization_failure
const PG_SERIALIZATION_FAILURE: &str = "40001";
/// SQLSTATE deadlock_detected
const PG_DEADLOCK_DETECTED: &str = "40P01";

/// Input rejected before any atomic unit is started
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Amount must be greater than zero, got {0}")]
    NonPositiveAmount(i64),

    #[error("Source and destination account are the same: {0}")]
    SameAccount(i64),

    #[error("Entry amount must not be zero")]
    ZeroEntryAmount,

    #[error("Invalid currency code: {0}")]
    InvalidCurrency(String),

    #[error("Account owner must not be empty")]
    EmptyOwner,

    #[error("Invalid paging: limit={limit}, offset={offset}")]
    InvalidPaging { limit: i64, offset: i64 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    /// Serialization or lock conflict reported by the store. Callers may retry.
    #[error("Store conflict: {0}")]
    Conflict(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Store fault: {0}")]
    StoreFault(String),
}

impl LedgerError {
    pub fn account_not_found(id: i64) -> Self {
        LedgerError::NotFound {
            entity: "account",
            id,
        }
    }

    pub fn entry_not_found(id: i64) -> Self {
        LedgerError::NotFound { entity: "entry", id }
    }

    pub fn transfer_not_found(id: i64) -> Self {
        LedgerError::NotFound {
            entity: "transfer",
            id,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::NotFound { .. } => "NOT_FOUND",
            LedgerError::Conflict(_) => "CONFLICT",
            LedgerError::Validation(_) => "VALIDATION_ERROR",
            LedgerError::StoreFault(_) => "STORE_FAULT",
        }
    }

    /// Only store conflicts are worth re-running; every other failure repeats identically.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Conflict(_))
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e {
            if let Some(code) = db_err.code() {
                if code == PG_SERIALIZATION_FAILURE || code == PG_DEADLOCK_DETECTED {
                    return LedgerError::Conflict(db_err.message().to_string());
                }
            }
        }
        LedgerError::StoreFault(e.to_string())
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(LedgerError::account_not_found(1).code(), "NOT_FOUND");
        assert_eq!(LedgerError::Conflict("x".into()).code(), "CONFLICT");
        assert_eq!(
            LedgerError::from(ValidationError::SameAccount(3)).code(),
            "VALIDATION_ERROR"
        );
        assert_eq!(LedgerError::StoreFault("io".into()).code(), "STORE_FAULT");
    }

    #[test]
    fn test_only_conflict_is_retryable() {
        assert!(LedgerError::Conflict("deadlock".into()).is_retryable());
        assert!(!LedgerError::account_not_found(1).is_retryable());
        assert!(!LedgerError::StoreFault("io".into()).is_retryable());
        assert!(!LedgerError::from(ValidationError::NonPositiveAmount(0)).is_retryable());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            LedgerError::account_not_found(42).to_string(),
            "account not found: 42"
        );
        assert_eq!(
            LedgerError::from(ValidationError::NonPositiveAmount(-5)).to_string(),
            "Validation failed: Amount must be greater than zero, got -5"
        );
    }

    #[test]
    fn test_non_database_sqlx_error_is_fault() {
        let err = LedgerError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, LedgerError::StoreFault(_)));
    }
}
