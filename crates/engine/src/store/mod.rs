//! Seams towards the remote database-as-a-service.
//!
//! [`RecordStore`] is the row CRUD API (select with filter/order/limit,
//! insert, update, delete) and [`AuthProvider`] the session API. Rows cross
//! the seam as JSON objects; repositories own the typed conversion.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::StoreError;

pub mod memory;

/// Tables known to the dashboard.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Table {
    Budgets,
    Transactions,
    LogisticsProcesses,
    Currencies,
}

impl Table {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Budgets => "budgets",
            Self::Transactions => "transactions",
            Self::LogisticsProcesses => "logistics_processes",
            Self::Currencies => "currencies",
        }
    }

    /// Whether the store maintains an `updated_at` column on writes.
    pub fn tracks_updates(self) -> bool {
        matches!(self, Self::LogisticsProcesses | Self::Currencies)
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub descending: bool,
}

/// Read request: equality filters, optional ordering and optional limit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Query {
    pub filters: Vec<(String, String)>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &str, value: impl Into<String>) -> Self {
        self.filters.push((column.to_string(), value.into()));
        self
    }

    pub fn order_desc(mut self, column: &str) -> Self {
        self.order = Some(Order {
            column: column.to_string(),
            descending: true,
        });
        self
    }

    pub fn order_asc(mut self, column: &str) -> Self {
        self.order = Some(Order {
            column: column.to_string(),
            descending: false,
        });
        self
    }

    pub fn limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }
}

/// The authenticated caller as seen by the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub user: Identity,
}

/// Row CRUD against the remote store.
///
/// Consistency is read-after-write through refetch: callers never patch their
/// local copies from write responses.
pub trait RecordStore: Send + Sync + 'static {
    fn select(
        &self,
        table: Table,
        query: &Query,
    ) -> impl Future<Output = Result<Vec<Value>, StoreError>> + Send;

    /// Inserts one row and returns it as stored (id and timestamps assigned).
    fn insert(
        &self,
        table: Table,
        row: Value,
    ) -> impl Future<Output = Result<Value, StoreError>> + Send;

    /// Applies `fields` to the row with `id` and returns the affected rows.
    ///
    /// An empty vector is a successful call that changed nothing: the id does
    /// not exist or a row-level policy filtered the write.
    fn update(
        &self,
        table: Table,
        id: Uuid,
        fields: Value,
    ) -> impl Future<Output = Result<Vec<Value>, StoreError>> + Send;

    /// Deletes the row with `id`, returning how many rows were removed.
    fn delete(&self, table: Table, id: Uuid)
    -> impl Future<Output = Result<u64, StoreError>> + Send;

    fn current_caller(&self) -> impl Future<Output = Option<Identity>> + Send;
}

/// Session management offered by the authentication provider.
pub trait AuthProvider: Send + Sync + 'static {
    fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Session, StoreError>> + Send;

    /// Registers a new account. Returns `None` when the provider requires a
    /// confirmation step before a session exists.
    fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> impl Future<Output = Result<Option<Session>, StoreError>> + Send;

    fn sign_out(&self) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn session(&self) -> impl Future<Output = Option<Session>> + Send;
}
