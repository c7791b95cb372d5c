//! Row decoding into JSON.
//!
//! Rows only come from the introspection queries in [`crate::db::schema`];
//! DDL statements return none. Those queries yield four kinds of columns:
//!
//! | kind | column types seen | JSON |
//! |---|---|---|
//! | text | `text`, `name`, `varchar`, MySQL catalog text reported as `VARBINARY` | string |
//! | integer | `int2`/`int4`/`int8`, `BIGINT UNSIGNED`, SQLite `INTEGER` | number |
//! | boolean | `bool` | bool |
//! | json | `json` (enum labels from `json_agg`) | the value itself |
//!
//! SQL NULL becomes `null`, and so does a value that does not decode as its
//! column kind; one odd column never fails the whole operation.

use crate::models::QueryRow;
use serde_json::Value as JsonValue;
use sqlx::mysql::MySqlRow;
use sqlx::postgres::PgRow;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, ColumnIndex, Decode, Row, Type, TypeInfo};

/// How a result column is turned into JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    Boolean,
    Json,
}

impl ColumnKind {
    /// Classify a driver type name such as `INT8` or `BIGINT UNSIGNED`.
    pub fn of(type_name: &str) -> Self {
        let lower = type_name.to_ascii_lowercase();
        let base = lower.split_whitespace().next().unwrap_or_default();
        match base {
            "bool" | "boolean" => Self::Boolean,
            "json" | "jsonb" => Self::Json,
            "int" | "int2" | "int4" | "int8" | "integer" | "tinyint" | "smallint"
            | "mediumint" | "bigint" => Self::Integer,
            _ => Self::Text,
        }
    }
}

/// Bytes as a JSON string: UTF-8 text as-is, anything else base64.
pub fn decode_binary_value(bytes: &[u8]) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};

    match std::str::from_utf8(bytes) {
        Ok(s) => JsonValue::String(s.to_string()),
        Err(_) => JsonValue::String(STANDARD.encode(bytes)),
    }
}

/// Trait for converting database rows to JSON maps.
pub trait RowToJson {
    fn to_json_map(&self) -> QueryRow;
}

impl RowToJson for PgRow {
    fn to_json_map(&self) -> QueryRow {
        collect_row(self, decode_postgres)
    }
}

impl RowToJson for MySqlRow {
    fn to_json_map(&self) -> QueryRow {
        collect_row(self, decode_mysql)
    }
}

impl RowToJson for SqliteRow {
    fn to_json_map(&self) -> QueryRow {
        collect_row(self, decode_sqlite)
    }
}

fn collect_row<R: Row>(row: &R, decode: fn(&R, usize, ColumnKind) -> JsonValue) -> QueryRow {
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, col)| {
            let kind = ColumnKind::of(col.type_info().name());
            (col.name().to_string(), decode(row, idx, kind))
        })
        .collect()
}

/// A non-null value of type `T`, or `None` for NULL and type mismatches.
fn value<'r, R, T>(row: &'r R, idx: usize) -> Option<T>
where
    R: Row,
    usize: ColumnIndex<R>,
    T: Decode<'r, R::Database> + Type<R::Database>,
{
    row.try_get::<Option<T>, _>(idx).ok().flatten()
}

fn decode_postgres(row: &PgRow, idx: usize, kind: ColumnKind) -> JsonValue {
    let decoded = match kind {
        // PostgreSQL integers only decode into their exact width
        ColumnKind::Integer => value::<_, i64>(row, idx)
            .map(JsonValue::from)
            .or_else(|| value::<_, i32>(row, idx).map(JsonValue::from))
            .or_else(|| value::<_, i16>(row, idx).map(JsonValue::from)),
        ColumnKind::Boolean => value::<_, bool>(row, idx).map(JsonValue::Bool),
        ColumnKind::Json => value::<_, JsonValue>(row, idx),
        ColumnKind::Text => value::<_, String>(row, idx).map(JsonValue::String),
    };
    decoded.unwrap_or(JsonValue::Null)
}

fn decode_mysql(row: &MySqlRow, idx: usize, kind: ColumnKind) -> JsonValue {
    let decoded = match kind {
        // CAST(... AS UNSIGNED) sizes only fit u64
        ColumnKind::Integer => value::<_, i64>(row, idx)
            .map(JsonValue::from)
            .or_else(|| value::<_, u64>(row, idx).map(JsonValue::from)),
        ColumnKind::Boolean => value::<_, bool>(row, idx).map(JsonValue::Bool),
        ColumnKind::Json => value::<_, JsonValue>(row, idx),
        ColumnKind::Text => value::<_, String>(row, idx)
            .map(JsonValue::String)
            .or_else(|| value::<_, Vec<u8>>(row, idx).map(|b| decode_binary_value(&b))),
    };
    decoded.unwrap_or(JsonValue::Null)
}

/// Pragma and expression columns often carry no declared type, so text
/// columns fall back to the storage class of the value itself.
fn decode_sqlite(row: &SqliteRow, idx: usize, kind: ColumnKind) -> JsonValue {
    let decoded = match kind {
        ColumnKind::Integer => value::<_, i64>(row, idx).map(JsonValue::from),
        ColumnKind::Boolean => value::<_, bool>(row, idx).map(JsonValue::Bool),
        ColumnKind::Json => value::<_, String>(row, idx)
            .map(|s| serde_json::from_str(&s).unwrap_or(JsonValue::String(s))),
        ColumnKind::Text => value::<_, String>(row, idx)
            .map(JsonValue::String)
            .or_else(|| value::<_, i64>(row, idx).map(JsonValue::from))
            .or_else(|| value::<_, Vec<u8>>(row, idx).map(|b| decode_binary_value(&b))),
    };
    decoded.unwrap_or(JsonValue::Null)
}
