use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Query, RecordStore, ResultEngine, Table};

/// Reference currency row.
///
/// Currencies are looked up, never mutated: budgets and transactions point at
/// them through `currency_code` and nothing here enforces that the code exists.
/// `rate_to_usd` is carried for display only; aggregates sum raw amounts
/// without conversion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Currency {
    pub code: String,
    pub name: String,
    pub symbol: Option<String>,
    pub rate_to_usd: f64,
    pub updated_at: DateTime<Utc>,
}

/// Loads the currency table ordered by code.
pub async fn fetch_currencies<S: RecordStore>(store: &S) -> ResultEngine<Vec<Currency>> {
    let rows = store
        .select(Table::Currencies, &Query::new().order_asc("code"))
        .await?;
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(Into::into))
        .collect()
}

/// Returns the display symbol for `code`, falling back to the code itself.
pub fn symbol_for<'a>(currencies: &'a [Currency], code: &'a str) -> &'a str {
    currencies
        .iter()
        .find(|currency| currency.code.eq_ignore_ascii_case(code))
        .and_then(|currency| currency.symbol.as_deref())
        .unwrap_or(code)
}

/// Normalizes a user supplied currency code (`" usd "` -> `"USD"`).
pub(crate) fn normalize_code(code: &str) -> Option<String> {
    let trimmed = code.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn currency(code: &str, symbol: Option<&str>) -> Currency {
        Currency {
            code: code.to_string(),
            name: code.to_string(),
            symbol: symbol.map(ToString::to_string),
            rate_to_usd: 1.0,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn symbol_lookup_falls_back_to_code() {
        let currencies = vec![currency("USD", Some("$")), currency("ARS", None)];
        assert_eq!(symbol_for(&currencies, "usd"), "$");
        assert_eq!(symbol_for(&currencies, "ARS"), "ARS");
        assert_eq!(symbol_for(&currencies, "BRL"), "BRL");
    }

    #[test]
    fn normalize_rejects_blank_codes() {
        assert_eq!(normalize_code(" eur "), Some("EUR".to_string()));
        assert_eq!(normalize_code("   "), None);
    }
}
