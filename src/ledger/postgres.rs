//! PostgreSQL store
//!
//! Balance updates take the row lock through the relative `UPDATE`; no
//! `SELECT ... FOR UPDATE` precedes them. Entry and transfer inserts only take
//! `FOR KEY SHARE` on the referenced accounts via their foreign keys, which does
//! not conflict with the `FOR NO KEY UPDATE` lock a balance update holds.

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::{Postgres, Transaction};

use super::error::{LedgerError, LedgerResult};
use super::models::{
    Account, AccountId, Entry, ListParams, NewAccount, Transfer, validate_entry_amount,
    validate_transfer_amount,
};
use super::store::{LedgerStore, LedgerTx};

const ACCOUNT_COLUMNS: &str = "id, owner, balance, currency, created_at";
const ENTRY_COLUMNS: &str = "id, account_id, amount, created_at";
const TRANSFER_COLUMNS: &str = "id, from_account_id, to_account_id, amount, created_at";

/// Map a foreign key violation on `constraint` back to the account it names
fn map_fk_violation(e: sqlx::Error, constraints: &[(&str, AccountId)]) -> LedgerError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_foreign_key_violation() {
            if let Some(constraint) = db_err.constraint() {
                for (name, account_id) in constraints {
                    if *name == constraint {
                        return LedgerError::account_not_found(*account_id);
                    }
                }
            }
        }
    }
    LedgerError::from(e)
}

#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Open PostgreSQL transaction. Dropped without commit, sqlx rolls it back.
pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn create_transfer(
        &mut self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        amount: i64,
    ) -> LedgerResult<Transfer> {
        validate_transfer_amount(amount)?;

        let sql = format!(
            "INSERT INTO transfers (from_account_id, to_account_id, amount) \
             VALUES ($1, $2, $3) RETURNING {}",
            TRANSFER_COLUMNS
        );
        sqlx::query_as::<_, Transfer>(&sql)
            .bind(from_account_id)
            .bind(to_account_id)
            .bind(amount)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| {
                map_fk_violation(
                    e,
                    &[
                        ("transfers_from_account_id_fkey", from_account_id),
                        ("transfers_to_account_id_fkey", to_account_id),
                    ],
                )
            })
    }

    async fn create_entry(&mut self, account_id: AccountId, amount: i64) -> LedgerResult<Entry> {
        validate_entry_amount(amount)?;

        let sql = format!(
            "INSERT INTO entries (account_id, amount) VALUES ($1, $2) RETURNING {}",
            ENTRY_COLUMNS
        );
        sqlx::query_as::<_, Entry>(&sql)
            .bind(account_id)
            .bind(amount)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| map_fk_violation(e, &[("entries_account_id_fkey", account_id)]))
    }

    async fn add_account_balance(
        &mut self,
        account_id: AccountId,
        delta: i64,
    ) -> LedgerResult<Account> {
        let sql = format!(
            "UPDATE accounts SET balance = balance + $1 WHERE id = $2 RETURNING {}",
            ACCOUNT_COLUMNS
        );
        sqlx::query_as::<_, Account>(&sql)
            .bind(delta)
            .bind(account_id)
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or_else(|| LedgerError::account_not_found(account_id))
    }

    async fn get_account(&mut self, account_id: AccountId) -> LedgerResult<Account> {
        let sql = format!("SELECT {} FROM accounts WHERE id = $1", ACCOUNT_COLUMNS);
        sqlx::query_as::<_, Account>(&sql)
            .bind(account_id)
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or_else(|| LedgerError::account_not_found(account_id))
    }

    async fn get_account_for_update(&mut self, account_id: AccountId) -> LedgerResult<Account> {
        let sql = format!(
            "SELECT {} FROM accounts WHERE id = $1 FOR NO KEY UPDATE",
            ACCOUNT_COLUMNS
        );
        sqlx::query_as::<_, Account>(&sql)
            .bind(account_id)
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or_else(|| LedgerError::account_not_found(account_id))
    }

    async fn commit(self) -> LedgerResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> LedgerResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    type Tx = PgLedgerTx;

    async fn begin(&self) -> LedgerResult<PgLedgerTx> {
        let tx = self.pool.begin().await?;
        Ok(PgLedgerTx { tx })
    }

    async fn create_account(&self, new_account: &NewAccount) -> LedgerResult<Account> {
        new_account.validate()?;

        let sql = format!(
            "INSERT INTO accounts (owner, balance, currency) VALUES ($1, $2, $3) RETURNING {}",
            ACCOUNT_COLUMNS
        );
        let account = sqlx::query_as::<_, Account>(&sql)
            .bind(&new_account.owner)
            .bind(new_account.balance)
            .bind(&new_account.currency)
            .fetch_one(&self.pool)
            .await?;
        Ok(account)
    }

    async fn get_account(&self, account_id: AccountId) -> LedgerResult<Account> {
        let sql = format!("SELECT {} FROM accounts WHERE id = $1", ACCOUNT_COLUMNS);
        sqlx::query_as::<_, Account>(&sql)
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| LedgerError::account_not_found(account_id))
    }

    async fn list_accounts(&self, params: ListParams) -> LedgerResult<Vec<Account>> {
        params.validate()?;

        let sql = format!(
            "SELECT {} FROM accounts ORDER BY id LIMIT $1 OFFSET $2",
            ACCOUNT_COLUMNS
        );
        let accounts = sqlx::query_as::<_, Account>(&sql)
            .bind(params.limit)
            .bind(params.offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(accounts)
    }

    async fn update_account_balance(
        &self,
        account_id: AccountId,
        balance: i64,
    ) -> LedgerResult<Account> {
        let sql = format!(
            "UPDATE accounts SET balance = $2 WHERE id = $1 RETURNING {}",
            ACCOUNT_COLUMNS
        );
        sqlx::query_as::<_, Account>(&sql)
            .bind(account_id)
            .bind(balance)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| LedgerError::account_not_found(account_id))
    }

    async fn delete_account(&self, account_id: AccountId) -> LedgerResult<()> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(account_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::account_not_found(account_id));
        }
        Ok(())
    }

    async fn get_entry(&self, entry_id: i64) -> LedgerResult<Entry> {
        let sql = format!("SELECT {} FROM entries WHERE id = $1", ENTRY_COLUMNS);
        sqlx::query_as::<_, Entry>(&sql)
            .bind(entry_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| LedgerError::entry_not_found(entry_id))
    }

    async fn list_entries(
        &self,
        account_id: AccountId,
        params: ListParams,
    ) -> LedgerResult<Vec<Entry>> {
        params.validate()?;

        let sql = format!(
            "SELECT {} FROM entries WHERE account_id = $1 ORDER BY id LIMIT $2 OFFSET $3",
            ENTRY_COLUMNS
        );
        let entries = sqlx::query_as::<_, Entry>(&sql)
            .bind(account_id)
            .bind(params.limit)
            .bind(params.offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(entries)
    }

    async fn get_transfer(&self, transfer_id: i64) -> LedgerResult<Transfer> {
        let sql = format!("SELECT {} FROM transfers WHERE id = $1", TRANSFER_COLUMNS);
        sqlx::query_as::<_, Transfer>(&sql)
            .bind(transfer_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| LedgerError::transfer_not_found(transfer_id))
    }

    async fn list_transfers(
        &self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        params: ListParams,
    ) -> LedgerResult<Vec<Transfer>> {
        params.validate()?;

        let sql = format!(
            "SELECT {} FROM transfers \
             WHERE from_account_id = $1 OR to_account_id = $2 \
             ORDER BY id LIMIT $3 OFFSET $4",
            TRANSFER_COLUMNS
        );
        let transfers = sqlx::query_as::<_, Transfer>(&sql)
            .bind(from_account_id)
            .bind(to_account_id)
            .bind(params.limit)
            .bind(params.offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(transfers)
    }
}
