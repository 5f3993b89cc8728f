//! In-memory store
//!
//! Mirrors the locking behaviour the engine relies on in PostgreSQL:
//!
//! - `add_account_balance` / `get_account_for_update` take a per-account row
//!   lock that is held until the unit commits or is dropped
//! - writes are buffered in the handle and applied together at commit; other
//!   readers only ever see committed rows
//! - commit fails if an account referenced by a buffered entry or transfer
//!   has been deleted in the meantime, as the foreign keys would in PostgreSQL
//! - ids are drawn from sequences that are not rolled back
//! - waiting on a row lock longer than `lock_timeout` fails with
//!   [`LedgerError::Conflict`], standing in for the deadlock detector, so a
//!   lock-ordering bug shows up as errors instead of a hang
//!
//! Faults can be injected at each operation to exercise rollback paths.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};
use tracing::debug;

use super::error::{LedgerError, LedgerResult};
use super::models::{
    Account, AccountId, Entry, ListParams, NewAccount, Transfer, validate_entry_amount,
    validate_transfer_amount,
};
use super::store::{LedgerStore, LedgerTx};

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(2);

/// Operation at which an injected fault fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    Begin,
    CreateTransfer,
    CreateEntry,
    AddAccountBalance,
    Commit,
}

#[derive(Debug)]
struct Fault {
    point: FaultPoint,
    skip: usize,
    error: LedgerError,
}

#[derive(Debug, Default)]
struct Tables {
    accounts: BTreeMap<AccountId, Account>,
    entries: BTreeMap<i64, Entry>,
    transfers: BTreeMap<i64, Transfer>,
}

struct Shared {
    tables: Mutex<Tables>,
    row_locks: DashMap<AccountId, Arc<RowLock<()>>>,
    account_seq: AtomicI64,
    entry_seq: AtomicI64,
    transfer_seq: AtomicI64,
    faults: Mutex<Vec<Fault>>,
    lock_timeout: Duration,
}

impl Shared {
    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Faults for the same point fire in injection order
    fn check_fault(&self, point: FaultPoint) -> LedgerResult<()> {
        let mut faults = self.faults.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pos) = faults.iter().position(|f| f.point == point) {
            if faults[pos].skip == 0 {
                let fault = faults.remove(pos);
                debug!(?point, error = %fault.error, "Injected fault fired");
                return Err(fault.error);
            }
            faults[pos].skip -= 1;
        }
        Ok(())
    }

    fn committed_account(&self, account_id: AccountId) -> LedgerResult<Account> {
        self.tables()
            .accounts
            .get(&account_id)
            .cloned()
            .ok_or_else(|| LedgerError::account_not_found(account_id))
    }

    async fn lock_row(&self, account_id: AccountId) -> LedgerResult<OwnedMutexGuard<()>> {
        let lock = self.row_locks.entry(account_id).or_default().clone();
        tokio::time::timeout(self.lock_timeout, lock.lock_owned())
            .await
            .map_err(|_| {
                LedgerError::Conflict(format!(
                    "lock wait timeout on account {} after {:?}",
                    account_id, self.lock_timeout
                ))
            })
    }
}

/// Process-local ledger store with row-level locking
#[derive(Clone)]
pub struct MemoryLedgerStore {
    shared: Arc<Shared>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                tables: Mutex::new(Tables::default()),
                row_locks: DashMap::new(),
                account_seq: AtomicI64::new(0),
                entry_seq: AtomicI64::new(0),
                transfer_seq: AtomicI64::new(0),
                faults: Mutex::new(Vec::new()),
                lock_timeout,
            }),
        }
    }

    /// Fail the `skip + 1`-th upcoming call at `point` with `error`, once
    pub fn inject_fault(&self, point: FaultPoint, skip: usize, error: LedgerError) {
        self.shared
            .faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Fault { point, skip, error });
    }

    pub fn account_count(&self) -> usize {
        self.shared.tables().accounts.len()
    }

    pub fn entry_count(&self) -> usize {
        self.shared.tables().entries.len()
    }

    pub fn transfer_count(&self) -> usize {
        self.shared.tables().transfers.len()
    }
}

impl Default for MemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Open unit on a [`MemoryLedgerStore`]. Dropping it discards every buffered
/// write and releases its row locks.
pub struct MemoryTx {
    shared: Arc<Shared>,
    locks: HashMap<AccountId, OwnedMutexGuard<()>>,
    balances: BTreeMap<AccountId, i64>,
    entries: Vec<Entry>,
    transfers: Vec<Transfer>,
}

impl MemoryTx {
    fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            locks: HashMap::new(),
            balances: BTreeMap::new(),
            entries: Vec::new(),
            transfers: Vec::new(),
        }
    }

    async fn lock(&mut self, account_id: AccountId) -> LedgerResult<()> {
        if !self.locks.contains_key(&account_id) {
            let guard = self.shared.lock_row(account_id).await?;
            self.locks.insert(account_id, guard);
        }
        Ok(())
    }

    /// Committed row overlaid with this unit's own balance writes
    fn view(&self, account_id: AccountId) -> LedgerResult<Account> {
        let mut account = self.shared.committed_account(account_id)?;
        if let Some(balance) = self.balances.get(&account_id) {
            account.balance = *balance;
        }
        Ok(account)
    }
}

#[async_trait]
impl LedgerTx for MemoryTx {
    async fn create_transfer(
        &mut self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        amount: i64,
    ) -> LedgerResult<Transfer> {
        self.shared.check_fault(FaultPoint::CreateTransfer)?;
        validate_transfer_amount(amount)?;
        self.shared.committed_account(from_account_id)?;
        self.shared.committed_account(to_account_id)?;

        let transfer = Transfer {
            id: self.shared.transfer_seq.fetch_add(1, Ordering::SeqCst) + 1,
            from_account_id,
            to_account_id,
            amount,
            created_at: Utc::now(),
        };
        self.transfers.push(transfer.clone());
        Ok(transfer)
    }

    async fn create_entry(&mut self, account_id: AccountId, amount: i64) -> LedgerResult<Entry> {
        self.shared.check_fault(FaultPoint::CreateEntry)?;
        validate_entry_amount(amount)?;
        self.shared.committed_account(account_id)?;

        let entry = Entry {
            id: self.shared.entry_seq.fetch_add(1, Ordering::SeqCst) + 1,
            account_id,
            amount,
            created_at: Utc::now(),
        };
        self.entries.push(entry.clone());
        Ok(entry)
    }

    async fn add_account_balance(
        &mut self,
        account_id: AccountId,
        delta: i64,
    ) -> LedgerResult<Account> {
        self.shared.check_fault(FaultPoint::AddAccountBalance)?;
        self.shared.committed_account(account_id)?;
        self.lock(account_id).await?;

        // Row is locked: the committed balance cannot move until this unit ends
        let mut account = self.view(account_id)?;
        account.balance = account.balance.checked_add(delta).ok_or_else(|| {
            LedgerError::StoreFault(format!("balance out of range for account {}", account_id))
        })?;
        self.balances.insert(account_id, account.balance);
        Ok(account)
    }

    async fn get_account(&mut self, account_id: AccountId) -> LedgerResult<Account> {
        self.view(account_id)
    }

    async fn get_account_for_update(&mut self, account_id: AccountId) -> LedgerResult<Account> {
        self.shared.committed_account(account_id)?;
        self.lock(account_id).await?;
        self.view(account_id)
    }

    async fn commit(mut self) -> LedgerResult<()> {
        self.shared.check_fault(FaultPoint::Commit)?;

        let mut tables = self.shared.tables();
        // An account may have been deleted after this unit wrote rows that reference it
        let dangling = self
            .entries
            .iter()
            .map(|e| e.account_id)
            .chain(
                self.transfers
                    .iter()
                    .flat_map(|t| [t.from_account_id, t.to_account_id]),
            )
            .find(|id| !tables.accounts.contains_key(id));
        if let Some(account_id) = dangling {
            return Err(LedgerError::StoreFault(format!(
                "foreign key violation: account {} no longer exists",
                account_id
            )));
        }

        for (account_id, balance) in &self.balances {
            if let Some(account) = tables.accounts.get_mut(account_id) {
                account.balance = *balance;
            }
        }
        for entry in self.entries.drain(..) {
            tables.entries.insert(entry.id, entry);
        }
        for transfer in self.transfers.drain(..) {
            tables.transfers.insert(transfer.id, transfer);
        }
        drop(tables);

        // Row locks are released as `self` goes out of scope
        Ok(())
    }

    async fn rollback(self) -> LedgerResult<()> {
        debug!(
            entries = self.entries.len(),
            transfers = self.transfers.len(),
            "Discarding buffered writes"
        );
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> LedgerResult<MemoryTx> {
        self.shared.check_fault(FaultPoint::Begin)?;
        Ok(MemoryTx::new(self.shared.clone()))
    }

    async fn create_account(&self, new_account: &NewAccount) -> LedgerResult<Account> {
        new_account.validate()?;

        let account = Account {
            id: self.shared.account_seq.fetch_add(1, Ordering::SeqCst) + 1,
            owner: new_account.owner.clone(),
            balance: new_account.balance,
            currency: new_account.currency.clone(),
            created_at: Utc::now(),
        };
        self.shared
            .tables()
            .accounts
            .insert(account.id, account.clone());
        Ok(account)
    }

    async fn get_account(&self, account_id: AccountId) -> LedgerResult<Account> {
        self.shared.committed_account(account_id)
    }

    async fn list_accounts(&self, params: ListParams) -> LedgerResult<Vec<Account>> {
        params.validate()?;
        Ok(self
            .shared
            .tables()
            .accounts
            .values()
            .skip(params.offset as usize)
            .take(params.limit as usize)
            .cloned()
            .collect())
    }

    async fn update_account_balance(
        &self,
        account_id: AccountId,
        balance: i64,
    ) -> LedgerResult<Account> {
        self.shared.committed_account(account_id)?;
        let _row = self.shared.lock_row(account_id).await?;

        let mut tables = self.shared.tables();
        let account = tables
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| LedgerError::account_not_found(account_id))?;
        account.balance = balance;
        Ok(account.clone())
    }

    async fn delete_account(&self, account_id: AccountId) -> LedgerResult<()> {
        self.shared.committed_account(account_id)?;
        let _row = self.shared.lock_row(account_id).await?;

        let mut tables = self.shared.tables();
        let referenced = tables.entries.values().any(|e| e.account_id == account_id)
            || tables
                .transfers
                .values()
                .any(|t| t.from_account_id == account_id || t.to_account_id == account_id);
        if referenced {
            return Err(LedgerError::StoreFault(format!(
                "foreign key violation: account {} is still referenced",
                account_id
            )));
        }

        tables
            .accounts
            .remove(&account_id)
            .map(|_| ())
            .ok_or_else(|| LedgerError::account_not_found(account_id))
    }

    async fn get_entry(&self, entry_id: i64) -> LedgerResult<Entry> {
        self.shared
            .tables()
            .entries
            .get(&entry_id)
            .cloned()
            .ok_or_else(|| LedgerError::entry_not_found(entry_id))
    }

    async fn list_entries(
        &self,
        account_id: AccountId,
        params: ListParams,
    ) -> LedgerResult<Vec<Entry>> {
        params.validate()?;
        Ok(self
            .shared
            .tables()
            .entries
            .values()
            .filter(|e| e.account_id == account_id)
            .skip(params.offset as usize)
            .take(params.limit as usize)
            .cloned()
            .collect())
    }

    async fn get_transfer(&self, transfer_id: i64) -> LedgerResult<Transfer> {
        self.shared
            .tables()
            .transfers
            .get(&transfer_id)
            .cloned()
            .ok_or_else(|| LedgerError::transfer_not_found(transfer_id))
    }

    async fn list_transfers(
        &self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        params: ListParams,
    ) -> LedgerResult<Vec<Transfer>> {
        params.validate()?;
        Ok(self
            .shared
            .tables()
            .transfers
            .values()
            .filter(|t| t.from_account_id == from_account_id || t.to_account_id == to_account_id)
            .skip(params.offset as usize)
            .take(params.limit as usize)
            .cloned()
            .collect())
    }
}
