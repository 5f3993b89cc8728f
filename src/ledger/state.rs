//! Terminal outcomes of one transfer unit
//!
//! ```text
//! BEGIN ── create transfer ── entries ── balances ──▶ COMMITTED
//!   └──────────── any failure / cancellation ───────▶ ABORTED
//! ```
//!
//! There is no partially committed state: the store either applies every write
//! of the unit or none of them.

use std::fmt;

use super::error::LedgerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferOutcome {
    Committed,
    Aborted,
}

impl TransferOutcome {
    pub fn of<T>(result: &Result<T, LedgerError>) -> Self {
        match result {
            Ok(_) => TransferOutcome::Committed,
            Err(_) => TransferOutcome::Aborted,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferOutcome::Committed => "COMMITTED",
            TransferOutcome::Aborted => "ABORTED",
        }
    }
}

impl fmt::Display for TransferOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_of_result() {
        let ok: Result<(), LedgerError> = Ok(());
        let err: Result<(), LedgerError> = Err(LedgerError::Conflict("x".into()));
        assert_eq!(TransferOutcome::of(&ok), TransferOutcome::Committed);
        assert_eq!(TransferOutcome::of(&err), TransferOutcome::Aborted);
    }

    #[test]
    fn test_display() {
        assert_eq!(TransferOutcome::Committed.to_string(), "COMMITTED");
        assert_eq!(TransferOutcome::Aborted.to_string(), "ABORTED");
    }
}
