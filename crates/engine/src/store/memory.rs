//! In-process record store.
//!
//! Behaves like the remote service as far as repositories can observe: the
//! store assigns ids and timestamps, orders stably, applies limits, reports
//! zero-row writes as empty results and refuses writes without a session.

use std::{cmp::Ordering, collections::HashMap};

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{AuthProvider, Identity, Query, RecordStore, Session, Table};
use crate::StoreError;

#[derive(Debug)]
struct Account {
    identity: Identity,
    password: String,
}

#[derive(Debug, Default)]
struct Inner {
    tables: HashMap<Table, Vec<Value>>,
    accounts: Vec<Account>,
    session: Option<Session>,
    fail_next: Option<StoreError>,
    last_stamp: Option<DateTime<Utc>>,
}

impl Inner {
    /// Strictly increasing write timestamps, so `created_at` ordering never ties
    /// between rows written by this store.
    fn next_stamp(&mut self) -> String {
        let mut now = Utc::now();
        if let Some(last) = self.last_stamp
            && now <= last
        {
            now = last + TimeDelta::microseconds(1);
        }
        self.last_stamp = Some(now);
        now.to_rfc3339_opts(SecondsFormat::Micros, true)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

fn session_for(identity: Identity) -> Session {
    Session {
        access_token: format!("memory-{}", Uuid::new_v4()),
        refresh_token: None,
        expires_at: None,
        user: identity,
    }
}

fn matches(row: &Value, column: &str, expected: &str) -> bool {
    match row.get(column) {
        Some(Value::String(value)) => value == expected,
        Some(Value::Null) | None => expected == "null",
        Some(other) => other.to_string() == expected,
    }
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::String(x)), Some(Value::String(y))) => {
            // Timestamps compare as instants; other text lexically.
            match (
                DateTime::parse_from_rfc3339(x),
                DateTime::parse_from_rfc3339(y),
            ) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                _ => x.cmp(y),
            }
        }
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), Some(_)) => Ordering::Less,
        (Some(_), None | Some(Value::Null)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store with an already established session for `identity`.
    pub fn signed_in(identity: Identity) -> Self {
        Self {
            inner: RwLock::new(Inner {
                session: Some(session_for(identity)),
                ..Inner::default()
            }),
        }
    }

    /// Appends raw rows exactly as given, bypassing id/timestamp assignment.
    pub async fn seed(&self, table: Table, rows: Vec<Value>) {
        let mut inner = self.inner.write().await;
        inner.tables.entry(table).or_default().extend(rows);
    }

    /// Makes the next CRUD call fail with `err`.
    pub async fn fail_next(&self, err: StoreError) {
        self.inner.write().await.fail_next = Some(err);
    }

    /// Raw rows currently stored for `table`, in insertion order.
    pub async fn rows(&self, table: Table) -> Vec<Value> {
        self.inner
            .read()
            .await
            .tables
            .get(&table)
            .cloned()
            .unwrap_or_default()
    }

    fn take_failure(inner: &mut Inner) -> Result<(), StoreError> {
        match inner.fail_next.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn require_session(inner: &Inner) -> Result<(), StoreError> {
        if inner.session.is_none() {
            return Err(StoreError::Unauthorized);
        }
        Ok(())
    }
}

impl RecordStore for MemoryStore {
    async fn select(&self, table: Table, query: &Query) -> Result<Vec<Value>, StoreError> {
        let mut inner = self.inner.write().await;
        Self::take_failure(&mut inner)?;

        let mut rows: Vec<Value> = inner
            .tables
            .get(&table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| {
                        query
                            .filters
                            .iter()
                            .all(|(column, value)| matches(row, column, value))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order) = &query.order {
            // Stable sort: ties keep insertion order.
            rows.sort_by(|a, b| {
                let ordering = compare(a.get(&order.column), b.get(&order.column));
                if order.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn insert(&self, table: Table, row: Value) -> Result<Value, StoreError> {
        let mut inner = self.inner.write().await;
        Self::take_failure(&mut inner)?;
        Self::require_session(&inner)?;

        let Value::Object(mut fields) = row else {
            return Err(StoreError::Validation("row must be an object".to_string()));
        };
        let stamp = inner.next_stamp();
        fields.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
        fields.insert("created_at".to_string(), Value::String(stamp.clone()));
        if table.tracks_updates() {
            fields.insert("updated_at".to_string(), Value::String(stamp));
        }

        let stored = Value::Object(fields);
        inner.tables.entry(table).or_default().push(stored.clone());
        Ok(stored)
    }

    async fn update(&self, table: Table, id: Uuid, fields: Value) -> Result<Vec<Value>, StoreError> {
        let mut inner = self.inner.write().await;
        Self::take_failure(&mut inner)?;
        Self::require_session(&inner)?;

        let Value::Object(fields) = fields else {
            return Err(StoreError::Validation("fields must be an object".to_string()));
        };
        let id = id.to_string();
        let stamp = inner.next_stamp();
        let mut affected = Vec::new();
        for row in inner.tables.entry(table).or_default().iter_mut() {
            if !matches(row, "id", &id) {
                continue;
            }
            if let Value::Object(existing) = row {
                for (key, value) in &fields {
                    if key == "id" || key == "created_at" {
                        continue;
                    }
                    existing.insert(key.clone(), value.clone());
                }
                if table.tracks_updates() {
                    existing.insert("updated_at".to_string(), Value::String(stamp.clone()));
                }
            }
            affected.push(row.clone());
        }
        Ok(affected)
    }

    async fn delete(&self, table: Table, id: Uuid) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        Self::take_failure(&mut inner)?;
        Self::require_session(&inner)?;

        let id = id.to_string();
        let rows = inner.tables.entry(table).or_default();
        let before = rows.len();
        rows.retain(|row| !matches(row, "id", &id));
        Ok((before - rows.len()) as u64)
    }

    async fn current_caller(&self) -> Option<Identity> {
        self.inner
            .read()
            .await
            .session
            .as_ref()
            .map(|session| session.user.clone())
    }
}

impl AuthProvider for MemoryStore {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, StoreError> {
        let mut inner = self.inner.write().await;
        let identity = inner
            .accounts
            .iter()
            .find(|account| {
                account.identity.email.as_deref() == Some(email) && account.password == password
            })
            .map(|account| account.identity.clone())
            .ok_or_else(|| StoreError::Validation("invalid login credentials".to_string()))?;
        let session = session_for(identity);
        inner.session = Some(session.clone());
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        _full_name: &str,
    ) -> Result<Option<Session>, StoreError> {
        let mut inner = self.inner.write().await;
        if inner
            .accounts
            .iter()
            .any(|account| account.identity.email.as_deref() == Some(email))
        {
            return Err(StoreError::Conflict("user already registered".to_string()));
        }
        let identity = Identity {
            id: Uuid::new_v4(),
            email: Some(email.to_string()),
        };
        inner.accounts.push(Account {
            identity: identity.clone(),
            password: password.to_string(),
        });
        let session = session_for(identity);
        inner.session = Some(session.clone());
        Ok(Some(session))
    }

    async fn sign_out(&self) -> Result<(), StoreError> {
        self.inner.write().await.session = None;
        Ok(())
    }

    async fn session(&self) -> Option<Session> {
        self.inner.read().await.session.clone()
    }
}
