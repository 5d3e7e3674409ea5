//! Binding between typed rows and the JSON rows crossing the store seam.

use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::{EngineError, ResultEngine, Table};

/// A row type owned by one [`Repository`](crate::Repository).
pub trait Record: DeserializeOwned + Clone + Send + Sync + 'static {
    const TABLE: Table;
    /// Singular noun used in log lines and messages.
    const LABEL: &'static str;
    /// Row limit applied by `list()` unless overridden.
    const DEFAULT_LIMIT: Option<usize> = None;

    /// Creation fields: everything except id, timestamps and creator.
    type New: Send + Sync;
    /// Partial update: only the fields being changed.
    type Patch: Send + Sync;

    /// Validates creation fields and renders the insert payload.
    fn insert_row(new: Self::New) -> ResultEngine<Map<String, Value>>;

    /// Validates a patch and renders the update payload.
    fn patch_row(patch: Self::Patch) -> ResultEngine<Map<String, Value>>;
}

pub(crate) fn to_object<T: Serialize>(value: &T) -> ResultEngine<Map<String, Value>> {
    match serde_json::to_value(value)? {
        Value::Object(fields) => Ok(fields),
        other => Err(EngineError::Decode(format!(
            "expected an object, got {other}"
        ))),
    }
}

pub(crate) fn decode<T: Record>(row: Value) -> ResultEngine<T> {
    serde_json::from_value(row)
        .map_err(|err| EngineError::Decode(format!("invalid {} row: {err}", T::LABEL)))
}
