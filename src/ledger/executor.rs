//! Transaction executor
//!
//! Wraps a unit of work in one atomic unit on the store:
//! `Ok` commits, `Err` rolls back and returns the error as-is.
//! Dropping the returned future (timeout, task abort) drops the handle, and the
//! store rolls the unit back; nothing is ever half-applied.

use futures::future::BoxFuture;
use tracing::{debug, warn};

use super::error::LedgerResult;
use super::store::{LedgerStore, LedgerTx};

/// Run `unit_of_work` atomically. No retry here; conflicts come back as
/// [`LedgerError::Conflict`](super::error::LedgerError::Conflict).
pub async fn run_atomic<S, T, F>(store: &S, unit_of_work: F) -> LedgerResult<T>
where
    S: LedgerStore + ?Sized,
    T: Send,
    F: for<'t> FnOnce(&'t mut S::Tx) -> BoxFuture<'t, LedgerResult<T>> + Send,
{
    let mut tx = store.begin().await?;
    debug!("Atomic unit begun");

    match unit_of_work(&mut tx).await {
        Ok(value) => {
            tx.commit().await?;
            debug!("Atomic unit committed");
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                // The store drops the unit on its own once the handle is gone
                warn!(error = %rollback_err, "Rollback failed");
            }
            debug!(error = %e, "Atomic unit rolled back");
            Err(e)
        }
    }
}
