//! Logistics processes tracked on the kanban board.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
    EngineError, Record, ResultEngine, Table, record::to_object, util::normalize_required_name,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl ProcessStatus {
    /// Board column order.
    pub const ALL: [ProcessStatus; 4] = [
        Self::Pending,
        Self::InProgress,
        Self::Completed,
        Self::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Pending and in-progress processes count as active.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::InProgress)
    }
}

impl TryFrom<&str> for ProcessStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "in_progress" | "in-progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(EngineError::InvalidStatus(other.to_string())),
        }
    }
}

/// Free-form key/value attributes of a process, ordered by key.
///
/// Keys are trimmed and must not be empty. Rows read from the store may carry
/// `null` (read as empty) or non-string values (kept as their JSON text).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Details(BTreeMap<String, String>);

impl Details {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a map from key/value pairs; a later duplicate key wins.
    pub fn from_pairs<K, V, I>(pairs: I) -> ResultEngine<Self>
    where
        K: AsRef<str>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut details = Self::new();
        for (key, value) in pairs {
            details.insert(key.as_ref(), value)?;
        }
        Ok(details)
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) -> ResultEngine<()> {
        let key = key.trim();
        if key.is_empty() {
            return Err(EngineError::InvalidDetails(
                "detail key must not be empty".to_string(),
            ));
        }
        self.0.insert(key.to_string(), value.into());
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key.trim())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for Details {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<Map<String, Value>>::deserialize(deserializer)?;
        let entries = raw
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(text) => text,
                    other => other.to_string(),
                };
                (key, value)
            })
            .collect();
        Ok(Self(entries))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogisticsProcess {
    pub id: Uuid,
    pub name: String,
    pub status: ProcessStatus,
    #[serde(default)]
    pub assigned_to: Option<Uuid>,
    #[serde(default)]
    pub created_by: Option<Uuid>,
    #[serde(default)]
    pub details: Details,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NewLogisticsProcess {
    pub name: String,
    pub status: ProcessStatus,
    pub assigned_to: Option<Uuid>,
    pub details: Details,
}

impl NewLogisticsProcess {
    /// A new pending process without assignee or details.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: ProcessStatus::Pending,
            assigned_to: None,
            details: Details::new(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct LogisticsProcessPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ProcessStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<Option<Uuid>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Details>,
}

impl LogisticsProcessPatch {
    /// Patch produced by dragging a card to another column.
    pub fn move_to(status: ProcessStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

impl Record for LogisticsProcess {
    const TABLE: Table = Table::LogisticsProcesses;
    const LABEL: &'static str = "process";

    type New = NewLogisticsProcess;
    type Patch = LogisticsProcessPatch;

    fn insert_row(new: NewLogisticsProcess) -> ResultEngine<Map<String, Value>> {
        let new = NewLogisticsProcess {
            name: normalize_required_name(&new.name, Self::LABEL)?,
            ..new
        };
        to_object(&new)
    }

    fn patch_row(patch: LogisticsProcessPatch) -> ResultEngine<Map<String, Value>> {
        let mut patch = patch;
        if let Some(name) = patch.name.take() {
            patch.name = Some(normalize_required_name(&name, Self::LABEL)?);
        }
        to_object(&patch)
    }
}
