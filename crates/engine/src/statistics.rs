//! Derived dashboard figures.
//!
//! Everything here is a pure function of already fetched rows: no I/O and no
//! wall clock. Empty inputs give zero values and empty series. Amounts are
//! summed as stored, across currencies, without conversion.

use std::collections::BTreeMap;

use chrono::Datelike;
use chrono_tz::Tz;
use serde::Serialize;

use crate::{
    Budget, LogisticsProcess, Money, ProcessStatus, Transaction, TransactionKind,
    settings::{DateFormat, UserSettings},
};

/// Day buckets kept by [`daily_series`].
pub const SERIES_DAYS: usize = 7;
/// Budgets kept by [`budget_distribution`].
pub const DISTRIBUTION_SLICES: usize = 5;

/// Income minus expenses over all transactions. May be negative.
pub fn total_liquidity(transactions: &[Transaction]) -> Money {
    transactions.iter().map(Transaction::signed_amount).sum()
}

/// `Σ spent / Σ total * 100` over all budgets; 0 when the total is 0.
pub fn budget_executed(budgets: &[Budget]) -> f64 {
    let total: Money = budgets.iter().map(|budget| budget.total_amount).sum();
    let spent: Money = budgets.iter().map(|budget| budget.spent_amount).sum();
    if !total.is_positive() {
        return 0.0;
    }
    spent.as_f64() / total.as_f64() * 100.0
}

/// Width of a progress bar for `percentage`, clamped to `0..=100`.
pub fn progress_width(percentage: f64) -> f64 {
    percentage.clamp(0.0, 100.0)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressLevel {
    Normal,
    Warning,
    Critical,
}

impl ProgressLevel {
    pub fn for_percentage(percentage: f64) -> Self {
        if percentage >= 90.0 {
            Self::Critical
        } else if percentage >= 75.0 {
            Self::Warning
        } else {
            Self::Normal
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProcessCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub cancelled: usize,
}

impl ProcessCounts {
    pub fn from_processes(processes: &[LogisticsProcess]) -> Self {
        processes
            .iter()
            .fold(Self::default(), |mut counts, process| {
                match process.status {
                    ProcessStatus::Pending => counts.pending += 1,
                    ProcessStatus::InProgress => counts.in_progress += 1,
                    ProcessStatus::Completed => counts.completed += 1,
                    ProcessStatus::Cancelled => counts.cancelled += 1,
                }
                counts
            })
    }

    pub fn get(&self, status: ProcessStatus) -> usize {
        match status {
            ProcessStatus::Pending => self.pending,
            ProcessStatus::InProgress => self.in_progress,
            ProcessStatus::Completed => self.completed,
            ProcessStatus::Cancelled => self.cancelled,
        }
    }

    /// Pending plus in progress.
    pub fn active(&self) -> usize {
        self.pending + self.in_progress
    }

    /// Non-zero counts in board column order.
    pub fn distribution(&self) -> Vec<(ProcessStatus, usize)> {
        ProcessStatus::ALL
            .into_iter()
            .map(|status| (status, self.get(status)))
            .filter(|(_, count)| *count > 0)
            .collect()
    }
}

/// Headline figures of the dashboard.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct DashboardStats {
    pub total_liquidity: Money,
    pub budget_executed: f64,
    pub active_processes: usize,
    pub pending_processes: usize,
}

impl DashboardStats {
    pub fn compute(
        transactions: &[Transaction],
        budgets: &[Budget],
        processes: &[LogisticsProcess],
    ) -> Self {
        let counts = ProcessCounts::from_processes(processes);
        Self {
            total_liquidity: total_liquidity(transactions),
            budget_executed: budget_executed(budgets),
            active_processes: counts.active(),
            pending_processes: counts.pending,
        }
    }
}

/// Income and expense summed for one calendar day.
///
/// Buckets are keyed on month and day only, so the same day of different
/// years lands in the same bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct DayBucket {
    pub month: u32,
    pub day: u32,
    pub income: Money,
    pub expense: Money,
}

impl DayBucket {
    pub fn label(&self, format: DateFormat) -> String {
        match format {
            DateFormat::DayFirst => format!("{:02}/{:02}", self.day, self.month),
            DateFormat::MonthFirst => format!("{:02}/{:02}", self.month, self.day),
        }
    }
}

/// Per-day income/expense for the chart: chronological, last
/// [`SERIES_DAYS`] buckets. Days come from each row's own `created_at` seen
/// in `tz`.
pub fn daily_series(transactions: &[Transaction], tz: Tz) -> Vec<DayBucket> {
    let mut buckets: BTreeMap<(u32, u32), DayBucket> = BTreeMap::new();
    for tx in transactions {
        let local = tx.created_at.with_timezone(&tz);
        let key = (local.month(), local.day());
        let bucket = buckets.entry(key).or_insert(DayBucket {
            month: key.0,
            day: key.1,
            income: Money::ZERO,
            expense: Money::ZERO,
        });
        match tx.kind {
            TransactionKind::Income => bucket.income += tx.amount,
            TransactionKind::Expense => bucket.expense += tx.amount,
        }
    }

    let skip = buckets.len().saturating_sub(SERIES_DAYS);
    buckets.into_values().skip(skip).collect()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BudgetSlice {
    pub name: String,
    pub value: Money,
}

/// The first [`DISTRIBUTION_SLICES`] budgets in list order with their totals.
pub fn budget_distribution(budgets: &[Budget]) -> Vec<BudgetSlice> {
    budgets
        .iter()
        .take(DISTRIBUTION_SLICES)
        .map(|budget| BudgetSlice {
            name: budget.name.clone(),
            value: budget.total_amount,
        })
        .collect()
}

/// Budgets at or above the alert threshold, when alerts are enabled.
pub fn budget_alerts<'a>(budgets: &'a [Budget], settings: &UserSettings) -> Vec<&'a Budget> {
    if !settings.budget_alerts {
        return Vec::new();
    }
    let threshold = f64::from(settings.budget_threshold.percent());
    budgets
        .iter()
        .filter(|budget| budget.executed_percentage() >= threshold)
        .collect()
}
