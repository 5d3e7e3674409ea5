//! Per-entity repositories.
//!
//! A [`Repository`] mirrors one table: the last successfully fetched rows, a
//! loading flag and the last error message. Every successful write is
//! followed by a full re-read of the table; the mirror is never patched from
//! write responses. Concurrent refreshes may race and the last one to finish
//! replaces the mirror.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    Budget, LogisticsProcess, Query, Record, RecordStore, ResultEngine, Transaction,
    record::decode,
};

pub type BudgetRepository<S> = Repository<S, Budget>;
pub type TransactionRepository<S> = Repository<S, Transaction>;
pub type LogisticsRepository<S> = Repository<S, LogisticsProcess>;

/// Point-in-time copy of a repository mirror.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot<T> {
    pub items: Vec<T>,
    pub loading: bool,
    pub error: Option<String>,
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            loading: true,
            error: None,
        }
    }
}

/// Outcome of an update or delete that the store accepted.
#[derive(Clone, Debug, PartialEq)]
pub enum Affected<T> {
    Rows(T),
    /// The call succeeded but changed nothing: unknown id, or a row-level
    /// policy silently filtered the write.
    NotFoundOrDenied,
}

impl<T> Affected<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Rows(_))
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Rows(value) => Some(value),
            Self::NotFoundOrDenied => None,
        }
    }
}

pub struct Repository<S, T> {
    store: Arc<S>,
    state: Arc<RwLock<Snapshot<T>>>,
    /// Caller id seen at the last `sync_caller`; outer `None` until the first.
    seen_caller: Arc<RwLock<Option<Option<Uuid>>>>,
    limit: Option<usize>,
}

impl<S, T> Clone for Repository<S, T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            state: Arc::clone(&self.state),
            seen_caller: Arc::clone(&self.seen_caller),
            limit: self.limit,
        }
    }
}

impl<S: RecordStore, T: Record> Repository<S, T> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            state: Arc::new(RwLock::new(Snapshot::default())),
            seen_caller: Arc::new(RwLock::new(None)),
            limit: T::DEFAULT_LIMIT,
        }
    }

    /// Overrides the row limit used by `list()`.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub async fn snapshot(&self) -> Snapshot<T> {
        self.state.read().await.clone()
    }

    pub async fn items(&self) -> Vec<T> {
        self.state.read().await.items.clone()
    }

    pub async fn is_loading(&self) -> bool {
        self.state.read().await.loading
    }

    pub async fn last_error(&self) -> Option<String> {
        self.state.read().await.error.clone()
    }

    /// Re-reads the table, newest first.
    ///
    /// Without an authenticated caller nothing is fetched. On failure the
    /// previous rows stay in place and the message is kept in the mirror.
    pub async fn list(&self) -> ResultEngine<()> {
        let table = T::TABLE;
        if self.store.current_caller().await.is_none() {
            debug!(%table, "no authenticated caller, skipping fetch");
            self.state.write().await.loading = false;
            return Ok(());
        }

        self.state.write().await.loading = true;
        let query = Query::new().order_desc("created_at").limit(self.limit);
        let result = self.fetch(&query).await;

        let mut state = self.state.write().await;
        state.loading = false;
        match result {
            Ok(items) => {
                debug!(%table, rows = items.len(), "mirror refreshed");
                state.items = items;
                state.error = None;
                Ok(())
            }
            Err(err) => {
                warn!(%table, "fetch failed: {err}");
                state.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Re-lists when the authenticated caller differs from the one seen last
    /// time (always on the first call). Returns whether a re-list happened.
    pub async fn sync_caller(&self) -> ResultEngine<bool> {
        let caller = self.store.current_caller().await.map(|identity| identity.id);
        {
            let mut seen = self.seen_caller.write().await;
            if *seen == Some(caller) {
                return Ok(false);
            }
            *seen = Some(caller);
        }
        self.list().await?;
        Ok(true)
    }

    /// Inserts a row owned by the current caller, then refreshes the mirror.
    pub async fn create(&self, new: T::New) -> ResultEngine<T> {
        let table = T::TABLE;
        let mut row = T::insert_row(new)?;
        let creator = self
            .store
            .current_caller()
            .await
            .map(|identity| Value::String(identity.id.to_string()))
            .unwrap_or(Value::Null);
        row.insert("created_by".to_string(), creator);

        let stored = self
            .store
            .insert(table, Value::Object(row))
            .await
            .inspect_err(|err| warn!(%table, "create failed: {err}"))?;
        // An unreadable response fails the call before the mirror is touched.
        let record = decode::<T>(stored)
            .inspect_err(|err| warn!(%table, "created row is unreadable: {err}"))?;
        self.refresh_after_write().await;

        info!(%table, "{} created", T::LABEL);
        Ok(record)
    }

    /// Applies a partial update, then refreshes the mirror.
    pub async fn update(&self, id: Uuid, patch: T::Patch) -> ResultEngine<Affected<T>> {
        let table = T::TABLE;
        let fields = T::patch_row(patch)?;
        let rows = self
            .store
            .update(table, id, Value::Object(fields))
            .await
            .inspect_err(|err| warn!(%table, %id, "update failed: {err}"))?;
        self.refresh_after_write().await;

        match rows.into_iter().next() {
            Some(row) => Ok(Affected::Rows(decode::<T>(row)?)),
            None => {
                warn!(%table, %id, "update changed no rows");
                Ok(Affected::NotFoundOrDenied)
            }
        }
    }

    /// Deletes by id, then refreshes the mirror.
    pub async fn delete(&self, id: Uuid) -> ResultEngine<Affected<()>> {
        let table = T::TABLE;
        let removed = self
            .store
            .delete(table, id)
            .await
            .inspect_err(|err| warn!(%table, %id, "delete failed: {err}"))?;
        self.refresh_after_write().await;

        if removed == 0 {
            warn!(%table, %id, "delete removed no rows");
            return Ok(Affected::NotFoundOrDenied);
        }
        info!(%table, %id, "{} deleted", T::LABEL);
        Ok(Affected::Rows(()))
    }

    async fn fetch(&self, query: &Query) -> ResultEngine<Vec<T>> {
        let rows = self.store.select(T::TABLE, query).await?;
        rows.into_iter().map(decode::<T>).collect()
    }

    // The write already succeeded; a failed re-read only shows up in the mirror.
    async fn refresh_after_write(&self) {
        if let Err(err) = self.list().await {
            warn!(table = %T::TABLE, "refresh after write failed: {err}");
        }
    }
}
