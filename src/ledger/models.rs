//! Ledger entities
//!
//! Amounts are signed `i64` minor currency units (cents, paise, ...). Entries
//! carry the sign; transfers always carry the positive amount moved.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::ValidationError;

pub type AccountId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    pub id: AccountId,
    pub owner: String,
    pub balance: i64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

/// One signed balance change attributed to one account. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Entry {
    pub id: i64,
    pub account_id: AccountId,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

impl Entry {
    pub fn is_debit(&self) -> bool {
        self.amount < 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Transfer {
    pub id: i64,
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

/// Input of a single point-to-point transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTxParams {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: i64,
}

impl TransferTxParams {
    pub fn new(from_account_id: AccountId, to_account_id: AccountId, amount: i64) -> Self {
        Self {
            from_account_id,
            to_account_id,
            amount,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_transfer_amount(self.amount)?;
        if self.from_account_id == self.to_account_id {
            return Err(ValidationError::SameAccount(self.from_account_id));
        }
        Ok(())
    }
}

/// Everything a committed transfer wrote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferResult {
    pub transfer: Transfer,
    pub from_entry: Entry,
    pub to_entry: Entry,
    pub from_account: Account,
    pub to_account: Account,
}

/// Onboarding input for a new account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAccount {
    pub owner: String,
    pub balance: i64,
    pub currency: String,
}

impl NewAccount {
    pub fn new(owner: impl Into<String>, balance: i64, currency: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            balance,
            currency: currency.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.owner.trim().is_empty() {
            return Err(ValidationError::EmptyOwner);
        }
        validate_currency(&self.currency)
    }
}

/// Paging for list queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListParams {
    pub limit: i64,
    pub offset: i64,
}

impl ListParams {
    pub const MAX_LIMIT: i64 = 1000;

    pub fn new(limit: i64, offset: i64) -> Self {
        Self { limit, offset }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.limit < 1 || self.limit > Self::MAX_LIMIT || self.offset < 0 {
            return Err(ValidationError::InvalidPaging {
                limit: self.limit,
                offset: self.offset,
            });
        }
        Ok(())
    }
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            limit: 100,
            offset: 0,
        }
    }
}

pub fn validate_transfer_amount(amount: i64) -> Result<(), ValidationError> {
    if amount <= 0 {
        return Err(ValidationError::NonPositiveAmount(amount));
    }
    Ok(())
}

pub fn validate_entry_amount(amount: i64) -> Result<(), ValidationError> {
    if amount == 0 {
        return Err(ValidationError::ZeroEntryAmount);
    }
    Ok(())
}

/// ISO-4217 shape only: three ASCII uppercase letters
pub fn validate_currency(currency: &str) -> Result<(), ValidationError> {
    if currency.len() == 3 && currency.bytes().all(|b| b.is_ascii_uppercase()) {
        Ok(())
    } else {
        Err(ValidationError::InvalidCurrency(currency.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_params_validation() {
        assert!(TransferTxParams::new(1, 2, 10).validate().is_ok());
        assert_eq!(
            TransferTxParams::new(1, 2, 0).validate(),
            Err(ValidationError::NonPositiveAmount(0))
        );
        assert_eq!(
            TransferTxParams::new(1, 2, -10).validate(),
            Err(ValidationError::NonPositiveAmount(-10))
        );
        assert_eq!(
            TransferTxParams::new(7, 7, 10).validate(),
            Err(ValidationError::SameAccount(7))
        );
    }

    #[test]
    fn test_amount_checked_before_same_account() {
        assert_eq!(
            TransferTxParams::new(7, 7, 0).validate(),
            Err(ValidationError::NonPositiveAmount(0))
        );
    }

    #[test]
    fn test_entry_amount() {
        assert!(validate_entry_amount(-1).is_ok());
        assert!(validate_entry_amount(1).is_ok());
        assert_eq!(validate_entry_amount(0), Err(ValidationError::ZeroEntryAmount));
    }

    #[test]
    fn test_currency() {
        for ok in ["USD", "EUR", "INR"] {
            assert!(validate_currency(ok).is_ok(), "{ok}");
        }
        for bad in ["usd", "US", "USDT", "", "U$D"] {
            assert!(validate_currency(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_new_account_validation() {
        assert!(NewAccount::new("alice", 5000, "USD").validate().is_ok());
        assert_eq!(
            NewAccount::new("  ", 5000, "USD").validate(),
            Err(ValidationError::EmptyOwner)
        );
        assert!(NewAccount::new("alice", -1, "USD").validate().is_ok());
    }

    #[test]
    fn test_list_params() {
        assert!(ListParams::default().validate().is_ok());
        assert!(ListParams::new(5, 5).validate().is_ok());
        assert!(ListParams::new(0, 0).validate().is_err());
        assert!(ListParams::new(1001, 0).validate().is_err());
        assert!(ListParams::new(5, -1).validate().is_err());
    }

    #[test]
    fn test_entry_is_debit() {
        let entry = Entry {
            id: 1,
            account_id: 1,
            amount: -10,
            created_at: Utc::now(),
        };
        assert!(entry.is_debit());
    }
}
