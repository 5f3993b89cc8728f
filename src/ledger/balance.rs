//! Balance mutator
//!
//! The only path by which transfers change a balance. The store adds the delta
//! to whatever balance is currently persisted in one statement, so concurrent
//! mutators on the same account queue on its row lock instead of overwriting
//! each other. No overdraft guard: balances may go negative.

use tracing::trace;

use super::error::LedgerResult;
use super::models::{Account, AccountId};
use super::store::LedgerTx;

/// Apply a signed `delta` (credit > 0, debit < 0) and return the updated account
pub async fn apply_delta<T>(tx: &mut T, account_id: AccountId, delta: i64) -> LedgerResult<Account>
where
    T: LedgerTx + ?Sized,
{
    let account = tx.add_account_balance(account_id, delta).await?;
    trace!(account_id, delta, balance = account.balance, "Balance updated");
    Ok(account)
}

/// Canonical row lock order for a pair of accounts: smaller id first.
///
/// Returns `(account_id, delta)` pairs in the order they must be applied.
pub fn lock_order(
    from_account_id: AccountId,
    to_account_id: AccountId,
    amount: i64,
) -> [(AccountId, i64); 2] {
    let debit = (from_account_id, -amount);
    let credit = (to_account_id, amount);
    if from_account_id < to_account_id {
        [debit, credit]
    } else {
        [credit, debit]
    }
}
