//! Client-side narrowing of already listed rows.

use serde::{Deserialize, Serialize};

use crate::{Budget, BudgetState, LogisticsProcess, ProcessStatus, Transaction, TransactionKind};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionFilter {
    /// Case-insensitive substring of the description.
    pub search: Option<String>,
    pub kind: Option<TransactionKind>,
    pub currency: Option<String>,
}

impl TransactionFilter {
    pub fn matches(&self, tx: &Transaction) -> bool {
        if let Some(kind) = self.kind
            && tx.kind != kind
        {
            return false;
        }
        if let Some(currency) = non_blank(self.currency.as_deref())
            && !tx.currency_code.eq_ignore_ascii_case(currency)
        {
            return false;
        }
        match non_blank(self.search.as_deref()) {
            None => true,
            // Rows without a description never match a search.
            Some(needle) => tx
                .description
                .as_deref()
                .is_some_and(|description| contains_ignore_case(description, needle)),
        }
    }

    pub fn apply<'a>(&self, transactions: &'a [Transaction]) -> Vec<&'a Transaction> {
        transactions.iter().filter(|tx| self.matches(tx)).collect()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetFilter {
    pub state: Option<BudgetState>,
    pub currency: Option<String>,
}

impl BudgetFilter {
    pub fn matches(&self, budget: &Budget) -> bool {
        if let Some(state) = self.state
            && budget.state() != state
        {
            return false;
        }
        match non_blank(self.currency.as_deref()) {
            None => true,
            Some(currency) => budget.currency_code.eq_ignore_ascii_case(currency),
        }
    }

    pub fn apply<'a>(&self, budgets: &'a [Budget]) -> Vec<&'a Budget> {
        budgets.iter().filter(|budget| self.matches(budget)).collect()
    }
}

/// Processes whose name contains `search`, ignoring case. A blank search
/// keeps everything.
pub fn filter_processes<'a>(
    processes: &'a [LogisticsProcess],
    search: &str,
) -> Vec<&'a LogisticsProcess> {
    let needle = search.trim();
    processes
        .iter()
        .filter(|process| needle.is_empty() || contains_ignore_case(&process.name, needle))
        .collect()
}

/// One kanban column.
pub fn processes_in<'a>(
    processes: &'a [LogisticsProcess],
    status: ProcessStatus,
) -> Vec<&'a LogisticsProcess> {
    processes
        .iter()
        .filter(|process| process.status == status)
        .collect()
}

/// Currency codes in first-seen order, without duplicates.
pub fn distinct_currencies<'a, I>(codes: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen: Vec<String> = Vec::new();
    for code in codes {
        if !seen.iter().any(|known| known == code) {
            seen.push(code.to_string());
        }
    }
    seen
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::{Details, Money};

    fn tx(kind: TransactionKind, currency: &str, description: Option<&str>) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            amount: Money::new(1_00),
            currency_code: currency.to_string(),
            kind,
            description: description.map(str::to_string),
            budget_id: None,
            created_by: None,
            created_at: Utc::now(),
        }
    }

    fn process(name: &str, status: ProcessStatus) -> LogisticsProcess {
        LogisticsProcess {
            id: Uuid::new_v4(),
            name: name.to_string(),
            status,
            assigned_to: None,
            created_by: None,
            details: Details::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn search_ignores_case_and_skips_missing_descriptions() {
        let rows = vec![
            tx(TransactionKind::Income, "USD", Some("Invoice ACME")),
            tx(TransactionKind::Expense, "USD", None),
            tx(TransactionKind::Expense, "EUR", Some("acme fuel")),
        ];
        let filter = TransactionFilter {
            search: Some("Acme".to_string()),
            ..TransactionFilter::default()
        };
        assert_eq!(filter.apply(&rows).len(), 2);

        let filter = TransactionFilter {
            search: Some("acme".to_string()),
            kind: Some(TransactionKind::Expense),
            currency: Some("eur".to_string()),
        };
        let hits = filter.apply(&rows);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].description.as_deref(), Some("acme fuel"));

        assert_eq!(TransactionFilter::default().apply(&rows).len(), 3);
    }

    #[test]
    fn budget_filter_by_state() {
        let mut over = Budget {
            id: Uuid::new_v4(),
            name: "Over".to_string(),
            total_amount: Money::new(100),
            spent_amount: Money::new(150),
            currency_code: "USD".to_string(),
            start_date: None,
            end_date: None,
            created_by: None,
            created_at: Utc::now(),
        };
        let filter = BudgetFilter {
            state: Some(BudgetState::Exceeded),
            currency: None,
        };
        assert!(filter.matches(&over));
        over.spent_amount = Money::new(10);
        assert!(!filter.matches(&over));
    }

    #[test]
    fn process_search_and_columns() {
        let rows = vec![
            process("Container Rotterdam", ProcessStatus::Pending),
            process("Truck 12", ProcessStatus::InProgress),
            process("container Lima", ProcessStatus::Pending),
        ];
        assert_eq!(filter_processes(&rows, "CONTAINER").len(), 2);
        assert_eq!(filter_processes(&rows, "  ").len(), 3);
        assert_eq!(processes_in(&rows, ProcessStatus::Pending).len(), 2);
        assert!(processes_in(&rows, ProcessStatus::Cancelled).is_empty());
    }

    #[test]
    fn distinct_currencies_keep_first_seen_order() {
        let codes = distinct_currencies(["EUR", "USD", "EUR", "ARS", "USD"]);
        assert_eq!(codes, vec!["EUR", "USD", "ARS"]);
    }
}
