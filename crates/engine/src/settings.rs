//! Per-user display preferences persisted as a small JSON file.
//!
//! Settings are a plain value passed explicitly to whatever formats output;
//! there is no process-wide instance.

use std::{fmt, fs, io::ErrorKind, path::Path, str::FromStr};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{EngineError, Money, ResultEngine};

pub const DEFAULT_SETTINGS_PATH: &str = "config/user_settings.json";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Es,
    En,
    Pt,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefaultCurrency {
    #[default]
    #[serde(rename = "USD")]
    Usd,
    #[serde(rename = "EUR")]
    Eur,
    #[serde(rename = "BRL")]
    Brl,
    #[serde(rename = "ARS")]
    Ars,
}

impl DefaultCurrency {
    pub fn code(self) -> &'static str {
        match self {
            Self::Usd => "USD",
            Self::Eur => "EUR",
            Self::Brl => "BRL",
            Self::Ars => "ARS",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateFormat {
    #[default]
    #[serde(rename = "DD/MM/YYYY")]
    DayFirst,
    #[serde(rename = "MM/DD/YYYY")]
    MonthFirst,
}

impl DateFormat {
    fn pattern(self) -> &'static str {
        match self {
            Self::DayFirst => "%d/%m/%Y",
            Self::MonthFirst => "%m/%d/%Y",
        }
    }
}

/// Budget alert threshold in percent. Stored as a bare JSON number.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Threshold {
    Seventy,
    #[default]
    Eighty,
    Ninety,
}

impl Threshold {
    pub fn percent(self) -> u8 {
        match self {
            Self::Seventy => 70,
            Self::Eighty => 80,
            Self::Ninety => 90,
        }
    }
}

impl TryFrom<u8> for Threshold {
    type Error = EngineError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            70 => Ok(Self::Seventy),
            80 => Ok(Self::Eighty),
            90 => Ok(Self::Ninety),
            other => Err(EngineError::InvalidSettings(format!(
                "budget threshold must be 70, 80 or 90, got {other}"
            ))),
        }
    }
}

impl From<Threshold> for u8 {
    fn from(value: Threshold) -> Self {
        value.percent()
    }
}

macro_rules! parse_via_serde {
    ($($ty:ty => $what:literal),* $(,)?) => {
        $(
            impl FromStr for $ty {
                type Err = EngineError;

                fn from_str(value: &str) -> Result<Self, Self::Err> {
                    serde_json::from_value(serde_json::Value::String(value.trim().to_string()))
                        .map_err(|_| {
                            EngineError::InvalidSettings(format!("invalid {}: {value}", $what))
                        })
                }
            }
        )*
    };
}

parse_via_serde!(
    Language => "language",
    DefaultCurrency => "currency",
    DateFormat => "date format",
);

impl FromStr for Threshold {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let percent: u8 = value.trim().parse().map_err(|_| {
            EngineError::InvalidSettings(format!("invalid budget threshold: {value}"))
        })?;
        Self::try_from(percent)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    pub language: Language,
    pub default_currency: DefaultCurrency,
    pub date_format: DateFormat,
    pub budget_alerts: bool,
    pub budget_threshold: Threshold,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            language: Language::Es,
            default_currency: DefaultCurrency::Usd,
            date_format: DateFormat::DayFirst,
            budget_alerts: true,
            budget_threshold: Threshold::Eighty,
        }
    }
}

/// Partial update; absent fields keep their current value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    pub language: Option<Language>,
    pub default_currency: Option<DefaultCurrency>,
    pub date_format: Option<DateFormat>,
    pub budget_alerts: Option<bool>,
    pub budget_threshold: Option<Threshold>,
}

impl UserSettings {
    /// Reads settings from `path`; a missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> ResultEngine<Self> {
        let path = path.as_ref();
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no settings file, using defaults");
                return Ok(Self::default());
            }
            Err(err) => return Err(err.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> ResultEngine<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let payload = serde_json::to_string_pretty(self)?;
        fs::write(path, payload)?;
        Ok(())
    }

    /// Restores the defaults and removes the persisted file.
    pub fn reset(path: impl AsRef<Path>) -> ResultEngine<Self> {
        match fs::remove_file(path.as_ref()) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        Ok(Self::default())
    }

    pub fn apply(&mut self, patch: SettingsPatch) {
        if let Some(language) = patch.language {
            self.language = language;
        }
        if let Some(currency) = patch.default_currency {
            self.default_currency = currency;
        }
        if let Some(format) = patch.date_format {
            self.date_format = format;
        }
        if let Some(alerts) = patch.budget_alerts {
            self.budget_alerts = alerts;
        }
        if let Some(threshold) = patch.budget_threshold {
            self.budget_threshold = threshold;
        }
    }

    pub fn format_date(&self, date: NaiveDate) -> String {
        date.format(self.date_format.pattern()).to_string()
    }

    /// `-$15.00`, `€1200.50`: the sign goes before the symbol.
    pub fn format_amount(&self, amount: Money, symbol: &str) -> String {
        if amount.is_negative() {
            format!("-{symbol}{}", -amount)
        } else {
            format!("{symbol}{amount}")
        }
    }
}

impl fmt::Display for UserSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let date_format = match self.date_format {
            DateFormat::DayFirst => "DD/MM/YYYY",
            DateFormat::MonthFirst => "MM/DD/YYYY",
        };
        let language = match self.language {
            Language::Es => "es",
            Language::En => "en",
            Language::Pt => "pt",
        };
        writeln!(f, "language:         {language}")?;
        writeln!(f, "default currency: {}", self.default_currency.code())?;
        writeln!(f, "date format:      {date_format}")?;
        writeln!(f, "budget alerts:    {}", self.budget_alerts)?;
        write!(f, "alert threshold:  {}%", self.budget_threshold.percent())
    }
}
