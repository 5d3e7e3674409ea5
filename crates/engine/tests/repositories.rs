use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use chrono::NaiveDate;
use serde_json::{Value, json};
use tokio::sync::Notify;
use uuid::Uuid;

use engine::{
    Affected, AuthProvider, BudgetPatch, BudgetRepository, Details, EngineError, Identity,
    LogisticsProcessPatch, LogisticsRepository, MemoryStore, Money, NewBudget,
    NewLogisticsProcess, NewTransaction, ProcessStatus, Query, RecordStore, StoreError, Table,
    TransactionKind, TransactionPatch, TransactionRepository,
};

fn alice() -> Identity {
    Identity {
        id: Uuid::new_v4(),
        email: Some("alice@example.com".to_string()),
    }
}

fn signed_in_store() -> (Arc<MemoryStore>, Identity) {
    let identity = alice();
    (Arc::new(MemoryStore::signed_in(identity.clone())), identity)
}

fn new_budget(name: &str, total: i64) -> NewBudget {
    NewBudget {
        name: name.to_string(),
        total_amount: Money::new(total),
        currency_code: "USD".to_string(),
        start_date: None,
        end_date: None,
    }
}

fn income(cents: i64) -> NewTransaction {
    NewTransaction {
        amount: Money::new(cents),
        currency_code: "USD".to_string(),
        kind: TransactionKind::Income,
        description: Some("Invoice".to_string()),
        budget_id: None,
    }
}

/// Memory store whose next `select` can be parked after reading its rows,
/// and whose inserts can answer with an unreadable row.
#[derive(Default)]
struct GatedStore {
    inner: MemoryStore,
    hold_next_select: AtomicBool,
    garble_inserts: AtomicBool,
    entered: Notify,
    release: Notify,
}

impl GatedStore {
    fn signed_in(identity: Identity) -> Self {
        Self {
            inner: MemoryStore::signed_in(identity),
            ..Self::default()
        }
    }
}

impl RecordStore for GatedStore {
    async fn select(&self, table: Table, query: &Query) -> Result<Vec<Value>, StoreError> {
        let rows = self.inner.select(table, query).await;
        if self.hold_next_select.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        rows
    }

    async fn insert(&self, table: Table, row: Value) -> Result<Value, StoreError> {
        let stored = self.inner.insert(table, row).await?;
        if self.garble_inserts.load(Ordering::SeqCst) {
            return Ok(json!({"unexpected": true}));
        }
        Ok(stored)
    }

    async fn update(&self, table: Table, id: Uuid, fields: Value) -> Result<Vec<Value>, StoreError> {
        self.inner.update(table, id, fields).await
    }

    async fn delete(&self, table: Table, id: Uuid) -> Result<u64, StoreError> {
        self.inner.delete(table, id).await
    }

    async fn current_caller(&self) -> Option<Identity> {
        self.inner.current_caller().await
    }
}

#[tokio::test]
async fn create_then_list_returns_the_new_row_first() {
    let (store, identity) = signed_in_store();
    let repo = BudgetRepository::new(Arc::clone(&store));

    repo.create(new_budget("Older", 10_00)).await.unwrap();
    let created = repo.create(new_budget("Ops", 1_000_00)).await.unwrap();

    assert_eq!(created.spent_amount, Money::ZERO);
    assert_eq!(created.created_by, Some(identity.id));

    let snapshot = repo.snapshot().await;
    assert!(!snapshot.loading);
    assert!(snapshot.error.is_none());
    assert_eq!(snapshot.items.len(), 2);
    assert_eq!(snapshot.items[0].id, created.id);
}

#[tokio::test]
async fn list_is_idempotent() {
    let (store, _) = signed_in_store();
    let repo = TransactionRepository::new(Arc::clone(&store));
    repo.create(income(100_00)).await.unwrap();

    repo.list().await.unwrap();
    let first = repo.items().await;
    repo.list().await.unwrap();
    assert_eq!(repo.items().await, first);
}

#[tokio::test]
async fn transactions_list_defaults_to_ten_rows() {
    let (store, _) = signed_in_store();
    let repo = TransactionRepository::new(Arc::clone(&store));
    for i in 1..=12 {
        repo.create(income(i * 100)).await.unwrap();
    }
    assert_eq!(repo.limit(), Some(10));
    assert_eq!(repo.items().await.len(), 10);

    let export = TransactionRepository::new(store).with_limit(engine::EXPORT_LIMIT);
    export.list().await.unwrap();
    assert_eq!(export.items().await.len(), 12);
}

#[tokio::test]
async fn update_of_unknown_id_is_a_soft_failure() {
    let (store, _) = signed_in_store();
    let repo = BudgetRepository::new(Arc::clone(&store));
    repo.create(new_budget("Ops", 1_000_00)).await.unwrap();
    let before = repo.items().await;

    let outcome = repo
        .update(
            Uuid::new_v4(),
            BudgetPatch {
                spent_amount: Some(Money::new(5_00)),
                ..BudgetPatch::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(outcome, Affected::NotFoundOrDenied);
    assert_eq!(repo.items().await, before);
}

#[tokio::test]
async fn update_returns_the_changed_row_and_refreshes() {
    let (store, _) = signed_in_store();
    let repo = BudgetRepository::new(Arc::clone(&store));
    let budget = repo.create(new_budget("Ops", 1_000_00)).await.unwrap();

    let outcome = repo
        .update(
            budget.id,
            BudgetPatch {
                spent_amount: Some(Money::new(850_00)),
                ..BudgetPatch::default()
            },
        )
        .await
        .unwrap();

    let updated = outcome.into_option().unwrap();
    assert_eq!(updated.spent_amount, Money::new(850_00));
    assert_eq!(updated.executed_percentage(), 85.0);
    assert_eq!(repo.items().await[0].spent_amount, Money::new(850_00));
}

#[tokio::test]
async fn invalid_input_never_reaches_the_store() {
    let (store, _) = signed_in_store();
    let repo = TransactionRepository::new(Arc::clone(&store));

    let err = repo.create(income(-5_00)).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));
    assert!(store.rows(Table::Transactions).await.is_empty());
    // Rejected before the store, so no refresh either.
    assert!(repo.is_loading().await);
}

#[tokio::test]
async fn failed_list_keeps_the_previous_mirror() {
    let (store, _) = signed_in_store();
    let repo = BudgetRepository::new(Arc::clone(&store));
    repo.create(new_budget("Ops", 1_000_00)).await.unwrap();
    let before = repo.items().await;

    store
        .fail_next(StoreError::Server("connection reset".to_string()))
        .await;
    let err = repo.list().await.unwrap_err();

    assert_eq!(
        err,
        EngineError::Store(StoreError::Server("connection reset".to_string()))
    );
    let snapshot = repo.snapshot().await;
    assert_eq!(snapshot.items, before);
    assert_eq!(
        snapshot.error.as_deref(),
        Some("server error: connection reset")
    );
    assert!(!snapshot.loading);

    repo.list().await.unwrap();
    assert!(repo.last_error().await.is_none());
}

#[tokio::test]
async fn failed_write_surfaces_the_store_error() {
    let (store, _) = signed_in_store();
    let repo = LogisticsRepository::new(Arc::clone(&store));
    store.fail_next(StoreError::Forbidden).await;

    let err = repo
        .create(NewLogisticsProcess::named("Container 7"))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::Store(StoreError::Forbidden));
    assert!(store.rows(Table::LogisticsProcesses).await.is_empty());
    assert!(repo.items().await.is_empty());
}

#[tokio::test]
async fn failed_update_and_delete_keep_the_mirror() {
    let (store, _) = signed_in_store();
    let repo = BudgetRepository::new(Arc::clone(&store));
    let budget = repo.create(new_budget("Ops", 1_000_00)).await.unwrap();
    let before = repo.items().await;

    store.fail_next(StoreError::Forbidden).await;
    let err = repo
        .update(
            budget.id,
            BudgetPatch {
                name: Some("Renamed".to_string()),
                ..BudgetPatch::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::Store(StoreError::Forbidden));
    assert_eq!(repo.items().await, before);

    store
        .fail_next(StoreError::Server("connection reset".to_string()))
        .await;
    assert!(repo.delete(budget.id).await.is_err());
    assert_eq!(repo.items().await, before);
    assert_eq!(store.rows(Table::Budgets).await.len(), 1);
}

#[tokio::test]
async fn unreadable_create_response_leaves_the_mirror_alone() {
    let store = Arc::new(GatedStore::signed_in(alice()));
    let repo = BudgetRepository::new(Arc::clone(&store));
    repo.list().await.unwrap();

    store.garble_inserts.store(true, Ordering::SeqCst);
    let err = repo.create(new_budget("Ops", 1_00)).await.unwrap_err();
    assert!(matches!(err, EngineError::Decode(_)));
    assert!(repo.items().await.is_empty());

    // The row was written; the next read shows it.
    repo.list().await.unwrap();
    assert_eq!(repo.items().await.len(), 1);
}

#[tokio::test]
async fn loading_is_set_while_a_list_is_in_flight() {
    let store = Arc::new(GatedStore::signed_in(alice()));
    let repo = BudgetRepository::new(Arc::clone(&store));
    repo.list().await.unwrap();
    assert!(!repo.is_loading().await);

    store.hold_next_select.store(true, Ordering::SeqCst);
    let pending = tokio::spawn({
        let repo = repo.clone();
        async move { repo.list().await }
    });
    store.entered.notified().await;
    assert!(repo.is_loading().await);

    store.release.notify_one();
    pending.await.unwrap().unwrap();
    assert!(!repo.is_loading().await);
}

#[tokio::test]
async fn last_refresh_to_finish_replaces_the_mirror() {
    let store = Arc::new(GatedStore::signed_in(alice()));
    let repo = BudgetRepository::new(Arc::clone(&store));

    // This list reads the empty table, then stalls.
    store.hold_next_select.store(true, Ordering::SeqCst);
    let stale = tokio::spawn({
        let repo = repo.clone();
        async move { repo.list().await }
    });
    store.entered.notified().await;

    repo.create(new_budget("Ops", 1_00)).await.unwrap();
    assert_eq!(repo.items().await.len(), 1);

    store.release.notify_one();
    stale.await.unwrap().unwrap();
    assert!(repo.items().await.is_empty());

    repo.list().await.unwrap();
    assert_eq!(repo.items().await.len(), 1);
}

#[tokio::test]
async fn created_rows_read_back_with_the_same_fields() {
    let (store, identity) = signed_in_store();

    let budgets = BudgetRepository::new(Arc::clone(&store));
    let new = NewBudget {
        name: "Q3 freight".to_string(),
        total_amount: Money::new(2_500_50),
        currency_code: "EUR".to_string(),
        start_date: NaiveDate::from_ymd_opt(2024, 7, 1),
        end_date: NaiveDate::from_ymd_opt(2024, 9, 30),
    };
    budgets.create(new.clone()).await.unwrap();
    budgets.list().await.unwrap();
    let rows = budgets.items().await;
    assert_eq!(rows.len(), 1);
    let budget = &rows[0];
    assert_eq!(budget.name, new.name);
    assert_eq!(budget.total_amount, new.total_amount);
    assert_eq!(budget.spent_amount, Money::ZERO);
    assert_eq!(budget.currency_code, new.currency_code);
    assert_eq!(budget.start_date, new.start_date);
    assert_eq!(budget.end_date, new.end_date);
    assert_eq!(budget.created_by, Some(identity.id));

    let transactions = TransactionRepository::new(Arc::clone(&store));
    let new = NewTransaction {
        amount: Money::new(42_10),
        currency_code: "EUR".to_string(),
        kind: TransactionKind::Expense,
        description: Some("Fuel".to_string()),
        budget_id: Some(budget.id),
    };
    transactions.create(new.clone()).await.unwrap();
    transactions.list().await.unwrap();
    let rows = transactions.items().await;
    assert_eq!(rows.len(), 1);
    let tx = &rows[0];
    assert_eq!(tx.amount, new.amount);
    assert_eq!(tx.currency_code, new.currency_code);
    assert_eq!(tx.kind, new.kind);
    assert_eq!(tx.description, new.description);
    assert_eq!(tx.budget_id, new.budget_id);
    assert_eq!(tx.created_by, Some(identity.id));

    let processes = LogisticsRepository::new(Arc::clone(&store));
    let new = NewLogisticsProcess {
        name: "Container 7".to_string(),
        status: ProcessStatus::InProgress,
        assigned_to: Some(identity.id),
        details: Details::from_pairs([("carrier", "DHL"), ("pallets", "12")]).unwrap(),
    };
    processes.create(new.clone()).await.unwrap();
    processes.list().await.unwrap();
    let rows = processes.items().await;
    assert_eq!(rows.len(), 1);
    let process = &rows[0];
    assert_eq!(process.name, new.name);
    assert_eq!(process.status, new.status);
    assert_eq!(process.assigned_to, new.assigned_to);
    assert_eq!(process.details, new.details);
}

#[tokio::test]
async fn transaction_update_applies_or_reports_nothing_changed() {
    let (store, _) = signed_in_store();
    let repo = TransactionRepository::new(Arc::clone(&store));
    let tx = repo.create(income(10_00)).await.unwrap();

    let patch = TransactionPatch {
        amount: Some(Money::new(12_50)),
        kind: Some(TransactionKind::Expense),
        description: Some(None),
        ..TransactionPatch::default()
    };
    let updated = repo
        .update(tx.id, patch.clone())
        .await
        .unwrap()
        .into_option()
        .unwrap();
    assert_eq!(updated.amount, Money::new(12_50));
    assert_eq!(updated.kind, TransactionKind::Expense);
    assert_eq!(updated.description, None);
    assert_eq!(repo.items().await, vec![updated.clone()]);

    let outcome = repo.update(Uuid::new_v4(), patch).await.unwrap();
    assert_eq!(outcome, Affected::NotFoundOrDenied);
    assert_eq!(repo.items().await, vec![updated]);
}

#[tokio::test]
async fn no_caller_means_no_fetch() {
    let store = Arc::new(MemoryStore::new());
    store
        .seed(
            Table::Budgets,
            vec![json!({
                "id": Uuid::new_v4(),
                "name": "Seeded",
                "total_amount": 10,
                "spent_amount": 0,
                "currency_code": "USD",
                "created_at": "2024-01-01T00:00:00Z"
            })],
        )
        .await;
    let repo = BudgetRepository::new(Arc::clone(&store));

    repo.list().await.unwrap();
    let snapshot = repo.snapshot().await;
    assert!(snapshot.items.is_empty());
    assert!(!snapshot.loading);

    let err = repo.create(new_budget("Ops", 1_00)).await.unwrap_err();
    assert_eq!(err, EngineError::Store(StoreError::Unauthorized));
}

#[tokio::test]
async fn sync_caller_relists_only_on_identity_change() {
    let store = Arc::new(MemoryStore::new());
    let repo = BudgetRepository::new(Arc::clone(&store));

    assert!(repo.sync_caller().await.unwrap());
    assert!(!repo.sync_caller().await.unwrap());

    store
        .sign_up("bob@example.com", "secret", "Bob")
        .await
        .unwrap();
    repo.create(new_budget("Ops", 1_00)).await.unwrap();
    assert!(repo.sync_caller().await.unwrap());
    assert_eq!(repo.items().await.len(), 1);
    assert!(!repo.sync_caller().await.unwrap());

    store.sign_out().await.unwrap();
    assert!(store.current_caller().await.is_none());
    assert!(repo.sync_caller().await.unwrap());
}

#[tokio::test]
async fn moving_a_process_bumps_updated_at() {
    let (store, _) = signed_in_store();
    let repo = LogisticsRepository::new(Arc::clone(&store));
    let mut new = NewLogisticsProcess::named("Container 7");
    new.details = Details::from_pairs([("carrier", "DHL")]).unwrap();
    let process = repo.create(new).await.unwrap();
    assert_eq!(process.status, ProcessStatus::Pending);
    assert_eq!(process.details.get("carrier"), Some("DHL"));

    let moved = repo
        .update(
            process.id,
            LogisticsProcessPatch::move_to(ProcessStatus::InProgress),
        )
        .await
        .unwrap()
        .into_option()
        .unwrap();
    assert_eq!(moved.status, ProcessStatus::InProgress);
    assert!(moved.updated_at >= process.updated_at);
    assert_eq!(moved.created_at, process.created_at);
}

#[tokio::test]
async fn delete_removes_and_reports_missing_rows() {
    let (store, _) = signed_in_store();
    let repo = TransactionRepository::new(Arc::clone(&store));
    let tx = repo.create(income(10_00)).await.unwrap();

    assert!(repo.delete(tx.id).await.unwrap().is_applied());
    assert!(repo.items().await.is_empty());
    assert_eq!(
        repo.delete(tx.id).await.unwrap(),
        Affected::NotFoundOrDenied
    );
}

#[tokio::test]
async fn clones_share_one_mirror() {
    let (store, _) = signed_in_store();
    let repo = BudgetRepository::new(Arc::clone(&store));
    let other = repo.clone();
    repo.create(new_budget("Ops", 1_00)).await.unwrap();
    assert_eq!(other.items().await.len(), 1);
}
