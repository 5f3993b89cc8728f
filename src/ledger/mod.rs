//! Double-entry transfer engine
//!
//! # Architecture
//!
//! ```text
//! TransferService::transfer_tx
//!   └─ run_atomic ──────────────── one store transaction
//!        ├─ create_transfer
//!        ├─ create_entry (-amount, from)
//!        ├─ create_entry (+amount, to)
//!        └─ apply_delta ×2 ───────── smaller account id first
//! ```
//!
//! # Safety Invariants
//!
//! 1. **All-or-nothing**: a transfer, its two entries and both balance changes
//!    commit together or not at all, including on cancellation
//! 2. **Relative updates**: balances change only via `balance = balance + delta`
//! 3. **Canonical lock order**: row locks are taken in ascending account id, so
//!    opposing transfers on one pair queue instead of deadlocking
//! 4. **No hidden retry**: store conflicts reach the caller; [`retry`] is opt-in

pub mod balance;
pub mod error;
pub mod executor;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod retry;
pub mod state;
pub mod store;
pub mod transfer;


pub use balance::{apply_delta, lock_order};
pub use error::{LedgerError, LedgerResult, ValidationError};
pub use executor::run_atomic;
pub use memory::{FaultPoint, MemoryLedgerStore, MemoryTx};
pub use models::{
    Account, AccountId, Entry, ListParams, NewAccount, Transfer, TransferResult, TransferTxParams,
};
pub use postgres::{PgLedgerStore, PgLedgerTx};
pub use retry::{RetryPolicy, transfer_with_retry};
pub use state::TransferOutcome;
pub use store::{LedgerStore, LedgerTx};
pub use transfer::TransferService;
