//! Transaction primitives.
//!
//! A `Transaction` always stores a positive amount; whether it adds to or
//! subtracts from liquidity is carried by its [`TransactionKind`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
    EngineError, Money, Record, ResultEngine, Table,
    record::to_object,
    util::{ensure_positive, normalize_currency, normalize_optional_text},
};

/// Rows shown by the finance list when no explicit limit is requested.
pub const DEFAULT_TRANSACTION_LIMIT: usize = 10;
/// Rows fetched for reporting and export.
pub const EXPORT_LIMIT: usize = 1000;
/// Rows fetched for the analytics charts.
pub const ANALYTICS_LIMIT: usize = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl TryFrom<&str> for TransactionKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            other => Err(EngineError::InvalidKind(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub amount: Money,
    pub currency_code: String,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub budget_id: Option<Uuid>,
    #[serde(default)]
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Amount with the direction applied: income adds, expense subtracts.
    pub fn signed_amount(&self) -> Money {
        match self.kind {
            TransactionKind::Income => self.amount,
            TransactionKind::Expense => -self.amount,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NewTransaction {
    pub amount: Money,
    pub currency_code: String,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub description: Option<String>,
    pub budget_id: Option<Uuid>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TransactionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency_code: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<TransactionKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_id: Option<Option<Uuid>>,
}

impl Record for Transaction {
    const TABLE: Table = Table::Transactions;
    const LABEL: &'static str = "transaction";
    const DEFAULT_LIMIT: Option<usize> = Some(DEFAULT_TRANSACTION_LIMIT);

    type New = NewTransaction;
    type Patch = TransactionPatch;

    fn insert_row(new: NewTransaction) -> ResultEngine<Map<String, Value>> {
        ensure_positive(new.amount, "amount")?;
        let new = NewTransaction {
            currency_code: normalize_currency(&new.currency_code)?,
            description: normalize_optional_text(new.description.as_deref()),
            ..new
        };
        to_object(&new)
    }

    fn patch_row(patch: TransactionPatch) -> ResultEngine<Map<String, Value>> {
        let mut patch = patch;
        if let Some(amount) = patch.amount {
            ensure_positive(amount, "amount")?;
        }
        if let Some(code) = patch.currency_code.take() {
            patch.currency_code = Some(normalize_currency(&code)?);
        }
        if let Some(description) = patch.description.take() {
            patch.description = Some(normalize_optional_text(description.as_deref()));
        }
        to_object(&patch)
    }
}
