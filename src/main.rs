//! ledger-engine - operator entry point
//!
//! ```text
//! ledger-engine [--env dev] [--memory] <command>
//!
//!   --init-schema                   create tables and exit
//!   --account <id>                  print one account
//!   --transfer <from> <to> <amount> run one transfer (with configured retry)
//!   --demo                          concurrent opposing transfers on two new accounts
//! ```

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, bail};

use ledger_engine::config::AppConfig;
use ledger_engine::db::Database;
use ledger_engine::ledger::{
    LedgerStore, MemoryLedgerStore, NewAccount, PgLedgerStore, RetryPolicy, TransferService,
    TransferTxParams, transfer_with_retry,
};

// ============================================================
// ARGUMENTS
// ============================================================

fn get_flag_value(args: &[String], names: &[&str]) -> Option<String> {
    for i in 0..args.len() {
        if names.contains(&args[i].as_str()) && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
    }
    None
}

fn has_flag(args: &[String], name: &str) -> bool {
    args.iter().any(|a| a == name)
}

fn get_env(args: &[String]) -> String {
    get_flag_value(args, &["--env", "-e"]).unwrap_or_else(|| "dev".to_string())
}

fn parse_id(value: &str, what: &str) -> Result<i64> {
    value
        .parse()
        .with_context(|| format!("{} must be an integer, got '{}'", what, value))
}

fn get_transfer_args(args: &[String]) -> Result<Option<TransferTxParams>> {
    let Some(pos) = args.iter().position(|a| a == "--transfer") else {
        return Ok(None);
    };
    let rest = &args[pos + 1..];
    if rest.len() < 3 {
        bail!("usage: --transfer <from> <to> <amount>");
    }
    Ok(Some(TransferTxParams::new(
        parse_id(&rest[0], "from")?,
        parse_id(&rest[1], "to")?,
        parse_id(&rest[2], "amount")?,
    )))
}

fn check_flag_combinations(args: &[String]) -> Result<()> {
    if has_flag(args, "--memory") && has_flag(args, "--init-schema") {
        bail!("--init-schema needs PostgreSQL; the in-memory store has no schema to create");
    }
    Ok(())
}

// ============================================================
// COMMANDS
// ============================================================

async fn run_demo<S: LedgerStore + 'static>(service: &TransferService<S>) -> Result<()> {
    let store = service.store();
    let a = store
        .create_account(&NewAccount::new("demo-a", 5000, "USD"))
        .await?;
    let b = store
        .create_account(&NewAccount::new("demo-b", 5000, "USD"))
        .await?;
    println!("before: #{}={} #{}={}", a.id, a.balance, b.id, b.balance);

    let started = Instant::now();
    let handles: Vec<_> = (0..100)
        .map(|i| {
            let service = service.clone();
            let params = if i % 2 == 0 {
                TransferTxParams::new(a.id, b.id, 10)
            } else {
                TransferTxParams::new(b.id, a.id, 10)
            };
            tokio::spawn(async move { service.transfer_tx(params).await })
        })
        .collect();

    let mut failed = 0;
    for handle in handles {
        if let Err(e) = handle.await? {
            tracing::error!(error = %e, "Demo transfer failed");
            failed += 1;
        }
    }

    let a = store.get_account(a.id).await?;
    let b = store.get_account(b.id).await?;
    println!(
        "after:  #{}={} #{}={} ({} failed, {:?})",
        a.id,
        a.balance,
        b.id,
        b.balance,
        failed,
        started.elapsed()
    );
    Ok(())
}

async fn run<S: LedgerStore + 'static>(
    store: Arc<S>,
    args: &[String],
    policy: RetryPolicy,
) -> Result<()> {
    let service = TransferService::new(store);

    if let Some(id) = get_flag_value(args, &["--account"]) {
        let account = service.store().get_account(parse_id(&id, "account")?).await?;
        println!("{}", serde_json::to_string_pretty(&account)?);
        return Ok(());
    }

    if let Some(params) = get_transfer_args(args)? {
        let result = transfer_with_retry(&service, params, policy).await?;
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    if has_flag(args, "--demo") {
        return run_demo(&service).await;
    }

    bail!("no command given: use --init-schema, --account, --transfer or --demo")
}

// ============================================================
// MAIN
// ============================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    check_flag_combinations(&args)?;

    let env = get_env(&args);
    let app_config = AppConfig::load(&env)?;
    let _log_guard = ledger_engine::logging::init_logging(&app_config)?;

    tracing::info!(
        env = %env,
        git = env!("GIT_HASH"),
        "Starting ledger-engine"
    );

    let policy = RetryPolicy::from(&app_config.transfer.retry);

    if has_flag(&args, "--memory") {
        let lock_timeout =
            std::time::Duration::from_millis(app_config.transfer.memory_lock_timeout_ms);
        let store = Arc::new(MemoryLedgerStore::with_lock_timeout(lock_timeout));
        return run(store, &args, policy).await;
    }

    let db = Database::connect(&app_config.database)
        .await
        .context("Failed to connect to PostgreSQL")?;

    if has_flag(&args, "--init-schema") {
        db.init_schema().await?;
        println!("schema ready");
        return Ok(());
    }

    db.health_check().await?;
    let store = Arc::new(PgLedgerStore::new(db.pool().clone()));
    run(store, &args, policy).await
}
