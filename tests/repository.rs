use ledger_engine::ledger::{
    LedgerError, LedgerStore, ListParams, MemoryLedgerStore, NewAccount, TransferService,
    TransferTxParams, ValidationError,
};
use std::sync::Arc;

fn new_account(owner: &str) -> NewAccount {
    NewAccount::new(owner, 5000, "USD")
}

#[tokio::test]
async fn create_and_get_account() {
    let store = MemoryLedgerStore::new();

    let created = store.create_account(&new_account("alice")).await.unwrap();
    assert!(created.id > 0);
    assert_eq!(created.owner, "alice");
    assert_eq!(created.balance, 5000);
    assert_eq!(created.currency, "USD");

    let fetched = store.get_account(created.id).await.unwrap();
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn create_account_rejects_bad_input() {
    let store = MemoryLedgerStore::new();

    let err = store
        .create_account(&NewAccount::new("", 0, "USD"))
        .await
        .unwrap_err();
    assert_eq!(err, LedgerError::Validation(ValidationError::EmptyOwner));

    let err = store
        .create_account(&NewAccount::new("alice", 0, "dollars"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        LedgerError::Validation(ValidationError::InvalidCurrency("dollars".into()))
    );
    assert_eq!(store.account_count(), 0);
}

#[tokio::test]
async fn update_account_balance_keeps_identity() {
    let store = MemoryLedgerStore::new();
    let created = store.create_account(&new_account("alice")).await.unwrap();

    let updated = store.update_account_balance(created.id, 1234).await.unwrap();
    assert_eq!(updated.id, created.id);
    assert_eq!(updated.balance, 1234);
    assert_eq!(updated.owner, created.owner);
    assert_eq!(updated.currency, created.currency);
    assert_eq!(updated.created_at, created.created_at);
}

#[tokio::test]
async fn delete_account() {
    let store = MemoryLedgerStore::new();
    let created = store.create_account(&new_account("alice")).await.unwrap();

    store.delete_account(created.id).await.unwrap();

    assert_eq!(
        store.get_account(created.id).await.unwrap_err(),
        LedgerError::account_not_found(created.id)
    );
    assert_eq!(
        store.delete_account(created.id).await.unwrap_err(),
        LedgerError::account_not_found(created.id)
    );
}

#[tokio::test]
async fn delete_account_with_history_fails() {
    let store = Arc::new(MemoryLedgerStore::new());
    let a = store.create_account(&new_account("alice")).await.unwrap();
    let b = store.create_account(&new_account("bob")).await.unwrap();
    TransferService::new(store.clone())
        .transfer_tx(TransferTxParams::new(a.id, b.id, 1))
        .await
        .unwrap();

    let err = store.delete_account(a.id).await.unwrap_err();
    assert!(matches!(err, LedgerError::StoreFault(_)));
    assert!(store.get_account(a.id).await.is_ok());
}

#[tokio::test]
async fn list_accounts_pages_by_id() {
    let store = MemoryLedgerStore::new();
    for i in 0..10 {
        store
            .create_account(&new_account(&format!("owner{i}")))
            .await
            .unwrap();
    }

    let page = store.list_accounts(ListParams::new(5, 5)).await.unwrap();
    assert_eq!(page.len(), 5);
    assert!(page.windows(2).all(|w| w[0].id < w[1].id));
    assert_eq!(page[0].owner, "owner5");

    let err = store.list_accounts(ListParams::new(0, 0)).await.unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
}

#[tokio::test]
async fn list_entries_and_transfers() {
    let store = Arc::new(MemoryLedgerStore::new());
    let a = store.create_account(&new_account("alice")).await.unwrap();
    let b = store.create_account(&new_account("bob")).await.unwrap();
    let c = store.create_account(&new_account("carol")).await.unwrap();
    let service = TransferService::new(store.clone());

    service.transfer_tx(TransferTxParams::new(a.id, b.id, 1)).await.unwrap();
    service.transfer_tx(TransferTxParams::new(b.id, a.id, 2)).await.unwrap();
    service.transfer_tx(TransferTxParams::new(c.id, b.id, 3)).await.unwrap();

    let entries = store.list_entries(a.id, ListParams::default()).await.unwrap();
    let amounts: Vec<_> = entries.iter().map(|e| e.amount).collect();
    assert_eq!(amounts, [-1, 2]);

    // from = a OR to = b
    let transfers = store
        .list_transfers(a.id, b.id, ListParams::default())
        .await
        .unwrap();
    let amounts: Vec<_> = transfers.iter().map(|t| t.amount).collect();
    assert_eq!(amounts, [1, 3]);

    let page = store
        .list_transfers(a.id, b.id, ListParams::new(1, 1))
        .await
        .unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].amount, 3);
}

#[tokio::test]
async fn missing_rows_are_not_found() {
    let store = MemoryLedgerStore::new();
    assert_eq!(
        store.get_entry(7).await.unwrap_err(),
        LedgerError::entry_not_found(7)
    );
    assert_eq!(
        store.get_transfer(7).await.unwrap_err(),
        LedgerError::transfer_not_found(7)
    );
    assert_eq!(
        store.update_account_balance(7, 1).await.unwrap_err(),
        LedgerError::account_not_found(7)
    );
}
