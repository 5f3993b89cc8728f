//! Transfer orchestrator
//!
//! One call to [`TransferService::transfer_tx`] is one atomic unit:
//!
//! 1. insert the transfer `{from, to, amount}`
//! 2. insert the debit entry `-amount` on `from`
//! 3. insert the credit entry `+amount` on `to`
//! 4. apply both balance deltas, smaller account id first
//! 5. return the transfer, both entries and both updated accounts
//!
//! Step 4 is what keeps opposing transfers on the same pair from deadlocking:
//! A→B and B→A both lock `min(A, B)` before `max(A, B)`, so the second one waits
//! instead of closing a cycle.

use std::sync::Arc;

use tracing::{info, warn};

use super::balance::{apply_delta, lock_order};
use super::error::LedgerResult;
use super::executor::run_atomic;
use super::models::{TransferResult, TransferTxParams};
use super::state::TransferOutcome;
use super::store::{LedgerStore, LedgerTx};

pub struct TransferService<S: LedgerStore> {
    store: Arc<S>,
}

impl<S: LedgerStore> Clone for TransferService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: LedgerStore> TransferService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Move `amount` from one account to another as a double-entry transfer.
    ///
    /// Invalid input is rejected before anything touches the store. Any later
    /// failure rolls the whole unit back and is returned unchanged; conflicts are
    /// not retried here (see [`super::retry`]).
    pub async fn transfer_tx(&self, params: TransferTxParams) -> LedgerResult<TransferResult> {
        params.validate()?;

        let result = run_atomic(self.store.as_ref(), move |tx| {
            Box::pin(execute_transfer(tx, params))
        })
        .await;

        let outcome = TransferOutcome::of(&result);
        match &result {
            Ok(r) => info!(
                transfer_id = r.transfer.id,
                from = params.from_account_id,
                to = params.to_account_id,
                amount = params.amount,
                %outcome,
                "Transfer committed"
            ),
            Err(e) => warn!(
                from = params.from_account_id,
                to = params.to_account_id,
                amount = params.amount,
                code = e.code(),
                error = %e,
                %outcome,
                "Transfer aborted"
            ),
        }

        result
    }
}

async fn execute_transfer<T>(tx: &mut T, params: TransferTxParams) -> LedgerResult<TransferResult>
where
    T: LedgerTx + ?Sized,
{
    let TransferTxParams {
        from_account_id,
        to_account_id,
        amount,
    } = params;

    let transfer = tx
        .create_transfer(from_account_id, to_account_id, amount)
        .await?;
    let from_entry = tx.create_entry(from_account_id, -amount).await?;
    let to_entry = tx.create_entry(to_account_id, amount).await?;

    let [(first_id, first_delta), (second_id, second_delta)] =
        lock_order(from_account_id, to_account_id, amount);
    let first = apply_delta(tx, first_id, first_delta).await?;
    let second = apply_delta(tx, second_id, second_delta).await?;

    let (from_account, to_account) = if first_id == from_account_id {
        (first, second)
    } else {
        (second, first)
    };

    Ok(TransferResult {
        transfer,
        from_entry,
        to_entry,
        from_account,
        to_account,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::error::{LedgerError, ValidationError};
    use crate::ledger::memory::{FaultPoint, MemoryLedgerStore};
    use crate::ledger::models::{Account, NewAccount};

    async fn setup() -> (TransferService<MemoryLedgerStore>, Account, Account) {
        let store = Arc::new(MemoryLedgerStore::new());
        let a = store
            .create_account(&NewAccount::new("alice", 5000, "USD"))
            .await
            .unwrap();
        let b = store
            .create_account(&NewAccount::new("bob", 5000, "USD"))
            .await
            .unwrap();
        (TransferService::new(store), a, b)
    }

    #[tokio::test]
    async fn test_transfer_happy_path() {
        let (service, a, b) = setup().await;

        let result = service
            .transfer_tx(TransferTxParams::new(a.id, b.id, 10))
            .await
            .unwrap();

        assert_eq!(result.transfer.from_account_id, a.id);
        assert_eq!(result.transfer.to_account_id, b.id);
        assert_eq!(result.transfer.amount, 10);
        assert_eq!(result.from_entry.account_id, a.id);
        assert_eq!(result.from_entry.amount, -10);
        assert_eq!(result.to_entry.account_id, b.id);
        assert_eq!(result.to_entry.amount, 10);
        assert_eq!(result.from_account.id, a.id);
        assert_eq!(result.from_account.balance, 4990);
        assert_eq!(result.to_account.id, b.id);
        assert_eq!(result.to_account.balance, 5010);
    }

    #[tokio::test]
    async fn test_transfer_towards_smaller_id_maps_accounts_back() {
        let (service, a, b) = setup().await;
        assert!(a.id < b.id);

        let result = service
            .transfer_tx(TransferTxParams::new(b.id, a.id, 7))
            .await
            .unwrap();

        assert_eq!(result.from_account.id, b.id);
        assert_eq!(result.from_account.balance, 4993);
        assert_eq!(result.to_account.id, a.id);
        assert_eq!(result.to_account.balance, 5007);
    }

    #[tokio::test]
    async fn test_validation_rejected_before_begin() {
        let (service, a, b) = setup().await;
        // Begin would fail loudly if it were reached
        service.store().inject_fault(
            FaultPoint::Begin,
            0,
            LedgerError::StoreFault("begin reached".into()),
        );

        let err = service
            .transfer_tx(TransferTxParams::new(a.id, b.id, 0))
            .await
            .unwrap_err();
        assert_eq!(err, ValidationError::NonPositiveAmount(0).into());

        let err = service
            .transfer_tx(TransferTxParams::new(a.id, a.id, 10))
            .await
            .unwrap_err();
        assert_eq!(err, ValidationError::SameAccount(a.id).into());

        assert_eq!(service.store().transfer_count(), 0);
        assert_eq!(service.store().entry_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_destination_rolls_back() {
        let (service, a, _) = setup().await;

        let err = service
            .transfer_tx(TransferTxParams::new(a.id, 9999, 10))
            .await
            .unwrap_err();

        assert_eq!(err, LedgerError::account_not_found(9999));
        assert_eq!(service.store().get_account(a.id).await.unwrap().balance, 5000);
        assert_eq!(service.store().transfer_count(), 0);
        assert_eq!(service.store().entry_count(), 0);
    }
}
