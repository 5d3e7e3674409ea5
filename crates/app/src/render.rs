//! Plain-text views of the dashboard.

use std::fmt::Write;

use chrono_tz::Tz;
use engine::{
    Budget, BudgetSlice, Currency, DashboardStats, DayBucket, LogisticsProcess, ProcessCounts,
    ProcessStatus, ProgressLevel, Transaction, UserSettings, processes_in, progress_width,
    symbol_for,
};

const BAR_WIDTH: usize = 20;

fn bar(percentage: f64) -> String {
    let filled = (progress_width(percentage) / 100.0 * BAR_WIDTH as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), ".".repeat(BAR_WIDTH - filled))
}

fn level_marker(percentage: f64) -> &'static str {
    match ProgressLevel::for_percentage(percentage) {
        ProgressLevel::Normal => "",
        ProgressLevel::Warning => " !",
        ProgressLevel::Critical => " !!",
    }
}

fn status_title(status: ProcessStatus) -> &'static str {
    match status {
        ProcessStatus::Pending => "Pending",
        ProcessStatus::InProgress => "In progress",
        ProcessStatus::Completed => "Completed",
        ProcessStatus::Cancelled => "Cancelled",
    }
}

pub fn stats(
    stats: &DashboardStats,
    counts: &ProcessCounts,
    alerts: &[&Budget],
    settings: &UserSettings,
    currencies: &[Currency],
) -> String {
    let symbol = symbol_for(currencies, settings.default_currency.code());
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Total liquidity:   {}",
        settings.format_amount(stats.total_liquidity, symbol)
    );
    let _ = writeln!(
        out,
        "Budget executed:   {:.1}% {}",
        stats.budget_executed,
        bar(stats.budget_executed)
    );
    let _ = writeln!(out, "Active processes:  {}", stats.active_processes);
    let _ = writeln!(out, "Pending processes: {}", stats.pending_processes);

    let distribution = counts.distribution();
    if !distribution.is_empty() {
        let _ = writeln!(out, "\nProcesses by status:");
        for (status, count) in distribution {
            let _ = writeln!(out, "  {:<12} {count}", status_title(status));
        }
    }

    if !alerts.is_empty() {
        let _ = writeln!(
            out,
            "\nBudgets over {}%:",
            settings.budget_threshold.percent()
        );
        for budget in alerts {
            let _ = writeln!(
                out,
                "  {} ({:.1}%)",
                budget.name,
                budget.executed_percentage()
            );
        }
    }
    out
}

pub fn budgets(budgets: &[&Budget], settings: &UserSettings, currencies: &[Currency]) -> String {
    if budgets.is_empty() {
        return "No budgets.\n".to_string();
    }
    let mut out = String::new();
    for budget in budgets {
        let symbol = symbol_for(currencies, &budget.currency_code);
        let percentage = budget.executed_percentage();
        let period = match (budget.start_date, budget.end_date) {
            (Some(start), Some(end)) => format!(
                " {} - {}",
                settings.format_date(start),
                settings.format_date(end)
            ),
            (Some(start), None) => format!(" from {}", settings.format_date(start)),
            (None, Some(end)) => format!(" until {}", settings.format_date(end)),
            (None, None) => String::new(),
        };
        let _ = writeln!(
            out,
            "{}  {}{}\n  {} / {} ({} left)  {} {:.1}%{}  [{}]",
            budget.id,
            budget.name,
            period,
            settings.format_amount(budget.spent_amount, symbol),
            settings.format_amount(budget.total_amount, symbol),
            settings.format_amount(budget.remaining(), symbol),
            bar(percentage),
            percentage,
            level_marker(percentage),
            budget.state().as_str(),
        );
    }
    out
}

pub fn transactions(
    transactions: &[&Transaction],
    settings: &UserSettings,
    currencies: &[Currency],
    tz: Tz,
) -> String {
    if transactions.is_empty() {
        return "No transactions.\n".to_string();
    }
    let mut out = String::new();
    for tx in transactions {
        let symbol = symbol_for(currencies, &tx.currency_code);
        let _ = writeln!(
            out,
            "{}  {}  {:<7}  {:>14}  {}",
            tx.id,
            settings.format_date(tx.created_at.with_timezone(&tz).date_naive()),
            tx.kind.as_str(),
            settings.format_amount(tx.signed_amount(), symbol),
            tx.description.as_deref().unwrap_or("-"),
        );
    }
    out
}

/// Kanban columns in board order.
pub fn board(processes: &[LogisticsProcess]) -> String {
    let mut out = String::new();
    for status in ProcessStatus::ALL {
        let column = processes_in(processes, status);
        let _ = writeln!(out, "== {} ({})", status_title(status), column.len());
        for process in column {
            let _ = write!(out, "  {}  {}", process.id, process.name);
            if let Some(assignee) = process.assigned_to {
                let _ = write!(out, "  @{assignee}");
            }
            let _ = writeln!(out);
            for (key, value) in process.details.iter() {
                let _ = writeln!(out, "      {key}: {value}");
            }
        }
    }
    out
}

pub fn chart(series: &[DayBucket], slices: &[BudgetSlice], settings: &UserSettings) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Income / expense per day:");
    if series.is_empty() {
        let _ = writeln!(out, "  no data");
    }
    let peak = series
        .iter()
        .flat_map(|bucket| [bucket.income.as_f64(), bucket.expense.as_f64()])
        .fold(0.0_f64, f64::max);
    for bucket in series {
        let scale = |value: f64| {
            if peak > 0.0 { value / peak * 100.0 } else { 0.0 }
        };
        let _ = writeln!(
            out,
            "  {}  +{} {:>10}\n         -{} {:>10}",
            bucket.label(settings.date_format),
            bar(scale(bucket.income.as_f64())),
            bucket.income.to_string(),
            bar(scale(bucket.expense.as_f64())),
            bucket.expense.to_string(),
        );
    }

    let _ = writeln!(out, "\nBudget distribution:");
    if slices.is_empty() {
        let _ = writeln!(out, "  no data");
    }
    for slice in slices {
        let _ = writeln!(out, "  {:<20} {:>12}", slice.name, slice.value.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bars_are_clamped() {
        assert_eq!(bar(0.0), format!("[{}]", ".".repeat(BAR_WIDTH)));
        assert_eq!(bar(150.0), format!("[{}]", "#".repeat(BAR_WIDTH)));
        assert_eq!(bar(50.0).matches('#').count(), BAR_WIDTH / 2);
    }

    #[test]
    fn markers_follow_levels() {
        assert_eq!(level_marker(10.0), "");
        assert_eq!(level_marker(80.0), " !");
        assert_eq!(level_marker(95.0), " !!");
    }

    #[test]
    fn empty_board_lists_every_column() {
        let out = board(&[]);
        assert_eq!(out.lines().count(), 4);
        assert!(out.starts_with("== Pending (0)"));
    }
}
