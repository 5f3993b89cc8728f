//! Store seam
//!
//! [`LedgerStore`] is the repository the engine runs against and [`LedgerTx`] is
//! a handle bound to one open atomic unit on that store. Every write made through
//! a `LedgerTx` becomes visible together on [`LedgerTx::commit`] or not at all.
//! Dropping a handle without committing rolls the unit back.

use async_trait::async_trait;

use super::error::LedgerResult;
use super::models::{Account, AccountId, Entry, ListParams, NewAccount, Transfer};

/// Operations available inside one atomic unit
#[async_trait]
pub trait LedgerTx: Send {
    /// Insert a transfer row. `amount` must be positive.
    async fn create_transfer(
        &mut self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        amount: i64,
    ) -> LedgerResult<Transfer>;

    /// Insert an entry row. `amount` is signed and must not be zero.
    async fn create_entry(&mut self, account_id: AccountId, amount: i64) -> LedgerResult<Entry>;

    /// Add `delta` to the stored balance in one statement and return the updated row.
    ///
    /// Takes the account's row lock, held until the unit ends.
    async fn add_account_balance(
        &mut self,
        account_id: AccountId,
        delta: i64,
    ) -> LedgerResult<Account>;

    /// Read an account as seen by this unit, without locking it
    async fn get_account(&mut self, account_id: AccountId) -> LedgerResult<Account>;

    /// Read an account and take its row lock
    async fn get_account_for_update(&mut self, account_id: AccountId) -> LedgerResult<Account>;

    async fn commit(self) -> LedgerResult<()>;

    async fn rollback(self) -> LedgerResult<()>;
}

/// Repository over accounts, entries and transfers
#[async_trait]
pub trait LedgerStore: Send + Sync {
    type Tx: LedgerTx;

    /// Open a new atomic unit
    async fn begin(&self) -> LedgerResult<Self::Tx>;

    async fn create_account(&self, new_account: &NewAccount) -> LedgerResult<Account>;

    async fn get_account(&self, account_id: AccountId) -> LedgerResult<Account>;

    async fn list_accounts(&self, params: ListParams) -> LedgerResult<Vec<Account>>;

    /// Overwrite a balance. Onboarding/admin path only: transfers never use it.
    async fn update_account_balance(
        &self,
        account_id: AccountId,
        balance: i64,
    ) -> LedgerResult<Account>;

    /// Fails while entries or transfers still reference the account
    async fn delete_account(&self, account_id: AccountId) -> LedgerResult<()>;

    async fn get_entry(&self, entry_id: i64) -> LedgerResult<Entry>;

    async fn list_entries(
        &self,
        account_id: AccountId,
        params: ListParams,
    ) -> LedgerResult<Vec<Entry>>;

    async fn get_transfer(&self, transfer_id: i64) -> LedgerResult<Transfer>;

    /// Transfers leaving `from_account_id` or arriving at `to_account_id`, by id
    async fn list_transfers(
        &self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        params: ListParams,
    ) -> LedgerResult<Vec<Transfer>>;
}
