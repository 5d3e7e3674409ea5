use engine::{Identity, Query, RecordStore, StoreError, Table};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::{RestStore, read_json, send};

const RETURN_REPRESENTATION: (&str, &str) = ("Prefer", "return=representation");

/// Query-string pairs for a filtered, ordered, limited read.
pub(crate) fn query_pairs(query: &Query) -> Vec<(String, String)> {
    let mut pairs = vec![("select".to_string(), "*".to_string())];
    pairs.extend(
        query
            .filters
            .iter()
            .map(|(column, value)| (column.clone(), format!("eq.{value}"))),
    );
    if let Some(order) = &query.order {
        let direction = if order.descending { "desc" } else { "asc" };
        pairs.push(("order".to_string(), format!("{}.{direction}", order.column)));
    }
    if let Some(limit) = query.limit {
        pairs.push(("limit".to_string(), limit.to_string()));
    }
    pairs
}

fn id_filter(id: Uuid) -> [(String, String); 1] {
    [("id".to_string(), format!("eq.{id}"))]
}

fn table_path(table: Table) -> String {
    format!("rest/v1/{table}")
}

impl RecordStore for RestStore {
    async fn select(&self, table: Table, query: &Query) -> Result<Vec<Value>, StoreError> {
        let endpoint = self.endpoint(&table_path(table))?;
        debug!(%table, "select");
        let request = self.http.get(endpoint).query(&query_pairs(query));
        let res = send(self.authorize(request).await).await?;
        read_json(res).await
    }

    async fn insert(&self, table: Table, row: Value) -> Result<Value, StoreError> {
        let endpoint = self.endpoint(&table_path(table))?;
        debug!(%table, "insert");
        let request = self
            .http
            .post(endpoint)
            .header(RETURN_REPRESENTATION.0, RETURN_REPRESENTATION.1)
            .json(&row);
        let res = send(self.authorize(request).await).await?;
        let rows: Vec<Value> = read_json(res).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode("insert returned no row".to_string()))
    }

    async fn update(
        &self,
        table: Table,
        id: Uuid,
        fields: Value,
    ) -> Result<Vec<Value>, StoreError> {
        let endpoint = self.endpoint(&table_path(table))?;
        debug!(%table, %id, "update");
        let request = self
            .http
            .patch(endpoint)
            .query(&id_filter(id))
            .header(RETURN_REPRESENTATION.0, RETURN_REPRESENTATION.1)
            .json(&fields);
        let res = send(self.authorize(request).await).await?;
        read_json(res).await
    }

    async fn delete(&self, table: Table, id: Uuid) -> Result<u64, StoreError> {
        let endpoint = self.endpoint(&table_path(table))?;
        debug!(%table, %id, "delete");
        let request = self
            .http
            .delete(endpoint)
            .query(&id_filter(id))
            .header(RETURN_REPRESENTATION.0, RETURN_REPRESENTATION.1);
        let res = send(self.authorize(request).await).await?;
        let rows: Vec<Value> = read_json(res).await?;
        Ok(rows.len() as u64)
    }

    async fn current_caller(&self) -> Option<Identity> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|session| session.user.clone())
    }
}
