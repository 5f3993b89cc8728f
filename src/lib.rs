//! ledger_engine - Double-entry money transfers on PostgreSQL
//!
//! Records a transfer, its two balancing entries and both updated balances as
//! one atomic unit, and stays deadlock-free when transfers between the same
//! pair of accounts run concurrently in opposite directions.
//!
//! # Modules
//!
//! - [`ledger`] - Entities, store seam, executor and the transfer orchestrator
//! - [`db`] - PostgreSQL pool and schema bootstrap
//! - [`config`] - YAML application config
//! - [`logging`] - tracing subscriber setup

pub mod config;
pub mod db;
pub mod ledger;
pub mod logging;

// Convenient re-exports at crate root
pub use ledger::{
    Account, Entry, LedgerError, LedgerStore, LedgerTx, MemoryLedgerStore, PgLedgerStore,
    RetryPolicy, Transfer, TransferResult, TransferService, TransferTxParams,
};
