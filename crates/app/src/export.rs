//! CSV report of everything the caller can see.

use std::io::Write;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use csv::Writer;
use engine::{Budget, LogisticsProcess, Transaction, UserSettings};
use serde::Serialize;

use crate::error::Result;

/// One line of the report. Sections share a single column layout so the file
/// opens cleanly in a spreadsheet.
#[derive(Debug, Serialize)]
struct ReportRow<'a> {
    section: &'a str,
    date: String,
    name: String,
    kind: &'a str,
    amount: String,
    currency: &'a str,
    spent: String,
    executed_pct: String,
    details: String,
}

pub struct Report<'a> {
    pub transactions: &'a [Transaction],
    pub budgets: &'a [Budget],
    pub processes: &'a [LogisticsProcess],
    /// Dates are reported as calendar days in this zone.
    pub tz: Tz,
}

impl Report<'_> {
    fn date(&self, at: DateTime<Utc>, settings: &UserSettings) -> String {
        settings.format_date(at.with_timezone(&self.tz).date_naive())
    }

    pub fn write_csv<W: Write>(&self, out: W, settings: &UserSettings) -> Result<()> {
        let mut writer = Writer::from_writer(out);

        for tx in self.transactions {
            writer.serialize(ReportRow {
                section: "transaction",
                date: self.date(tx.created_at, settings),
                name: tx.description.clone().unwrap_or_default(),
                kind: tx.kind.as_str(),
                amount: tx.amount.to_string(),
                currency: &tx.currency_code,
                spent: String::new(),
                executed_pct: String::new(),
                details: String::new(),
            })?;
        }

        for budget in self.budgets {
            writer.serialize(ReportRow {
                section: "budget",
                date: self.date(budget.created_at, settings),
                name: budget.name.clone(),
                kind: budget.state().as_str(),
                amount: budget.total_amount.to_string(),
                currency: &budget.currency_code,
                spent: budget.spent_amount.to_string(),
                executed_pct: format!("{:.1}", budget.executed_percentage()),
                details: String::new(),
            })?;
        }

        for process in self.processes {
            let details = process
                .details
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect::<Vec<_>>()
                .join("; ");
            writer.serialize(ReportRow {
                section: "process",
                date: self.date(process.created_at, settings),
                name: process.name.clone(),
                kind: process.status.as_str(),
                amount: String::new(),
                currency: "",
                spent: String::new(),
                executed_pct: String::new(),
                details,
            })?;
        }

        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use engine::{Details, Money, ProcessStatus, TransactionKind};
    use uuid::Uuid;

    use super::*;

    #[test]
    fn writes_one_section_per_entity() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 10, 0, 0).unwrap();
        let transactions = vec![Transaction {
            id: Uuid::new_v4(),
            amount: Money::new(100_00),
            currency_code: "USD".to_string(),
            kind: TransactionKind::Income,
            description: Some("Invoice, March".to_string()),
            budget_id: None,
            created_by: None,
            created_at: at,
        }];
        let budgets = vec![Budget {
            id: Uuid::new_v4(),
            name: "Ops".to_string(),
            total_amount: Money::new(1000_00),
            spent_amount: Money::new(850_00),
            currency_code: "USD".to_string(),
            start_date: None,
            end_date: None,
            created_by: None,
            created_at: at,
        }];
        let processes = vec![LogisticsProcess {
            id: Uuid::new_v4(),
            name: "Container 7".to_string(),
            status: ProcessStatus::InProgress,
            assigned_to: None,
            created_by: None,
            details: Details::from_pairs([("carrier", "DHL")]).unwrap(),
            created_at: at,
            updated_at: at,
        }];

        let report = Report {
            transactions: &transactions,
            budgets: &budgets,
            processes: &processes,
            tz: chrono_tz::UTC,
        };
        let mut out = Vec::new();
        report.write_csv(&mut out, &UserSettings::default()).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "section,date,name,kind,amount,currency,spent,executed_pct,details"
        );
        assert_eq!(
            lines[1],
            "transaction,09/03/2024,\"Invoice, March\",income,100.00,USD,,,"
        );
        assert_eq!(lines[2], "budget,09/03/2024,Ops,active,1000.00,USD,850.00,85.0,");
        assert_eq!(lines[3], "process,09/03/2024,Container 7,in_progress,,,,,carrier=DHL");
    }

    #[test]
    fn dates_follow_the_report_timezone() {
        let late = Utc.with_ymd_and_hms(2024, 3, 9, 23, 30, 0).unwrap();
        let transactions = vec![Transaction {
            id: Uuid::new_v4(),
            amount: Money::new(5_00),
            currency_code: "EUR".to_string(),
            kind: TransactionKind::Expense,
            description: None,
            budget_id: None,
            created_by: None,
            created_at: late,
        }];
        let report = Report {
            transactions: &transactions,
            budgets: &[],
            processes: &[],
            tz: chrono_tz::Europe::Madrid,
        };
        let mut out = Vec::new();
        report.write_csv(&mut out, &UserSettings::default()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text.lines().nth(1),
            Some("transaction,10/03/2024,,expense,5.00,EUR,,,")
        );
    }
}
