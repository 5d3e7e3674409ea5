//! Budgets.
//!
//! `spent_amount` is an independently stored field. Nothing here derives it
//! from transactions: it starts at zero on creation and changes only through
//! explicit updates (or store-side logic), and it may exceed `total_amount`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
    Money, Record, ResultEngine, Table,
    record::to_object,
    util::{
        ensure_date_range, ensure_non_negative, ensure_positive, normalize_currency,
        normalize_required_name,
    },
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub id: Uuid,
    pub name: String,
    pub total_amount: Money,
    #[serde(default)]
    pub spent_amount: Money,
    pub currency_code: String,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Where a budget stands relative to its total.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetState {
    Active,
    Completed,
    Exceeded,
}

impl BudgetState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Exceeded => "exceeded",
        }
    }
}

impl Budget {
    /// `spent / total * 100`, or 0 when the total is not positive.
    ///
    /// Not clamped: an over-budget row reports more than 100.
    pub fn executed_percentage(&self) -> f64 {
        if !self.total_amount.is_positive() {
            return 0.0;
        }
        self.spent_amount.as_f64() / self.total_amount.as_f64() * 100.0
    }

    pub fn is_exceeded(&self) -> bool {
        self.spent_amount > self.total_amount
    }

    pub fn remaining(&self) -> Money {
        self.total_amount - self.spent_amount
    }

    pub fn state(&self) -> BudgetState {
        if self.is_exceeded() {
            BudgetState::Exceeded
        } else if self.executed_percentage() >= 100.0 {
            BudgetState::Completed
        } else {
            BudgetState::Active
        }
    }
}

/// Fields accepted when creating a budget. The spent amount is not among
/// them: the repository always sends zero.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NewBudget {
    pub name: String,
    pub total_amount: Money,
    pub currency_code: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct BudgetPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spent_amount: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<Option<NaiveDate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<Option<NaiveDate>>,
}

impl Record for Budget {
    const TABLE: Table = Table::Budgets;
    const LABEL: &'static str = "budget";

    type New = NewBudget;
    type Patch = BudgetPatch;

    fn insert_row(new: NewBudget) -> ResultEngine<Map<String, Value>> {
        ensure_positive(new.total_amount, "total_amount")?;
        ensure_date_range(new.start_date, new.end_date)?;
        let new = NewBudget {
            name: normalize_required_name(&new.name, Self::LABEL)?,
            currency_code: normalize_currency(&new.currency_code)?,
            ..new
        };
        let mut row = to_object(&new)?;
        row.insert("spent_amount".to_string(), serde_json::to_value(Money::ZERO)?);
        Ok(row)
    }

    fn patch_row(patch: BudgetPatch) -> ResultEngine<Map<String, Value>> {
        let mut patch = patch;
        if let Some(name) = patch.name.take() {
            patch.name = Some(normalize_required_name(&name, Self::LABEL)?);
        }
        if let Some(code) = patch.currency_code.take() {
            patch.currency_code = Some(normalize_currency(&code)?);
        }
        if let Some(total) = patch.total_amount {
            ensure_positive(total, "total_amount")?;
        }
        if let Some(spent) = patch.spent_amount {
            ensure_non_negative(spent, "spent_amount")?;
        }
        if let (Some(start), Some(end)) = (patch.start_date, patch.end_date) {
            ensure_date_range(start, end)?;
        }
        to_object(&patch)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::EngineError;

    fn budget(total: i64, spent: i64) -> Budget {
        Budget {
            id: Uuid::new_v4(),
            name: "Ops".to_string(),
            total_amount: Money::new(total),
            spent_amount: Money::new(spent),
            currency_code: "USD".to_string(),
            start_date: None,
            end_date: None,
            created_by: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn percentage_is_unclamped_and_safe_on_zero_total() {
        assert_eq!(budget(100_000, 85_000).executed_percentage(), 85.0);
        assert_eq!(budget(100_00, 150_00).executed_percentage(), 150.0);
        assert_eq!(budget(0, 10).executed_percentage(), 0.0);
    }

    #[test]
    fn state_classification() {
        assert_eq!(budget(100, 50).state(), BudgetState::Active);
        assert_eq!(budget(100, 100).state(), BudgetState::Completed);
        assert_eq!(budget(100, 101).state(), BudgetState::Exceeded);
    }

    #[test]
    fn remaining_goes_negative_when_exceeded() {
        assert_eq!(budget(100_00, 40_00).remaining(), Money::new(60_00));
        assert_eq!(budget(100_00, 150_00).remaining(), Money::new(-50_00));
    }

    #[test]
    fn insert_row_forces_zero_spent_and_normalizes() {
        let row = Budget::insert_row(NewBudget {
            name: "  Marketing ".to_string(),
            total_amount: Money::new(1_000_00),
            currency_code: "eur".to_string(),
            start_date: None,
            end_date: None,
        })
        .unwrap();
        assert_eq!(row["name"], json!("Marketing"));
        assert_eq!(row["currency_code"], json!("EUR"));
        assert_eq!(row["spent_amount"], json!(0.0));
        assert!(!row.contains_key("id"));
    }

    #[test]
    fn insert_row_rejects_non_positive_total() {
        let err = Budget::insert_row(NewBudget {
            name: "Ops".to_string(),
            total_amount: Money::ZERO,
            currency_code: "USD".to_string(),
            start_date: None,
            end_date: None,
        })
        .unwrap_err();
        assert_eq!(
            err,
            EngineError::InvalidAmount("total_amount must be > 0".to_string())
        );
    }

    #[test]
    fn patch_row_sends_only_present_fields() {
        let row = Budget::patch_row(BudgetPatch {
            spent_amount: Some(Money::new(12_50)),
            end_date: Some(None),
            ..BudgetPatch::default()
        })
        .unwrap();
        assert_eq!(row.len(), 2);
        assert_eq!(row["spent_amount"], json!(12.5));
        assert_eq!(row["end_date"], Value::Null);
    }

    #[test]
    fn decodes_store_rows() {
        let budget: Budget = serde_json::from_value(json!({
            "id": "6f9619ff-8b86-d011-b42d-00c04fc964ff",
            "name": "Ops",
            "total_amount": 1000,
            "spent_amount": 850.5,
            "currency_code": "USD",
            "start_date": "2024-01-01",
            "end_date": null,
            "created_by": null,
            "created_at": "2024-01-05T10:00:00.123456+00:00"
        }))
        .unwrap();
        assert_eq!(budget.total_amount, Money::new(1_000_00));
        assert_eq!(budget.spent_amount, Money::new(850_50));
        assert_eq!(budget.start_date, NaiveDate::from_ymd_opt(2024, 1, 1));
    }
}
