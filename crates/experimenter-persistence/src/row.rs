//! Conversions between `experimenter_domain::schema::KeyValue` /
//! `serde_json::Value` and `sqlx::any` row/query binding. Isolates the
//! `sqlx::Any` column-typing quirks (it exposes `i32`/`i64`/`f64`/`str`/
//! `bool`, never a dynamic "whatever the column is" type) from the rest of
//! the crate.

use experimenter_domain::schema::KeyValue;
use indexmap::IndexMap;
use sqlx::any::AnyRow;
use sqlx::{Row, ValueRef};

/// Binds a `KeyValue` onto an in-progress `sqlx::Any` query.
pub fn bind_key_value<'q>(
    query: sqlx::query::Query<'q, sqlx::Any, sqlx::any::AnyArguments<'q>>,
    value: &'q KeyValue,
) -> sqlx::query::Query<'q, sqlx::Any, sqlx::any::AnyArguments<'q>> {
    match value {
        KeyValue::Integer(v) => query.bind(*v),
        KeyValue::Boolean(v) => query.bind(*v),
        KeyValue::Text(v) => query.bind(v.as_str()),
    }
}

/// Reads one named column out of an `AnyRow` as a `KeyValue`, using the
/// declared SQL type to decide how to decode it (integers/booleans decode
/// natively; everything else decodes as text, matching the canonical
/// string representation used for dedup, §4.2).
pub fn key_value_from_row(row: &AnyRow, name: &str, sql_type: &str) -> KeyValue {
    let upper = sql_type.to_ascii_uppercase();
    if upper.contains("INT") {
        if let Ok(v) = row.try_get::<i64, _>(name) {
            return KeyValue::Integer(v);
        }
    }
    if upper.contains("BOOL") {
        if let Ok(v) = row.try_get::<bool, _>(name) {
            return KeyValue::Boolean(v);
        }
    }
    row.try_get::<String, _>(name)
        .map(KeyValue::Text)
        .unwrap_or_else(|_| KeyValue::Text(String::new()))
}

/// Converts an entire row into an ordered, column-keyed JSON record for the
/// typed row-set accessors (§10.5), decoding every column as text and
/// leaving numeric/boolean parsing to the caller if it needs it — the
/// accessor's contract is "every declared column, in order", not a typed
/// schema of its own.
pub fn row_to_json_map(row: &AnyRow, columns: &[String]) -> IndexMap<String, serde_json::Value> {
    let mut out = IndexMap::with_capacity(columns.len());
    for col in columns {
        let value = if let Ok(raw) = row.try_get_raw(col.as_str()) {
            if raw.is_null() {
                serde_json::Value::Null
            } else if let Ok(v) = row.try_get::<i64, _>(col.as_str()) {
                serde_json::Value::from(v)
            } else if let Ok(v) = row.try_get::<f64, _>(col.as_str()) {
                serde_json::Value::from(v)
            } else if let Ok(v) = row.try_get::<bool, _>(col.as_str()) {
                serde_json::Value::from(v)
            } else if let Ok(v) = row.try_get::<String, _>(col.as_str()) {
                serde_json::Value::from(v)
            } else {
                serde_json::Value::Null
            }
        } else {
            serde_json::Value::Null
        };
        out.insert(col.clone(), value);
    }
    out
}
