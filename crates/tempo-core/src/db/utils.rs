//! Row-mapping helpers shared by the query modules.

use std::str::FromStr;

use jiff::Timestamp;
use rusqlite::types::Type;
use serde_json::{Map, Value};

/// Parses a required RFC 3339 timestamp column.
pub(super) fn parse_timestamp(column: usize, raw: String) -> rusqlite::Result<Timestamp> {
    raw.parse::<Timestamp>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e))
    })
}

/// Parses an optional RFC 3339 timestamp column.
pub(super) fn parse_timestamp_opt(
    column: usize,
    raw: Option<String>,
) -> rusqlite::Result<Option<Timestamp>> {
    raw.map(|s| parse_timestamp(column, s)).transpose()
}

/// Parses an enum stored as text through its `FromStr` implementation.
pub(super) fn parse_enum<T>(column: usize, raw: String) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    raw.parse::<T>().map_err(|message| {
        rusqlite::Error::FromSqlConversionFailure(
            column,
            Type::Text,
            Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)),
        )
    })
}

/// Parses a JSON string-array column; NULL and malformed data read as empty.
pub(super) fn parse_string_list(raw: Option<String>) -> Vec<String> {
    raw.as_deref()
        .and_then(|s| serde_json::from_str::<Vec<String>>(s).ok())
        .unwrap_or_default()
}

/// Parses a JSON object column; NULL and malformed data read as empty.
pub(super) fn parse_json_map(raw: Option<String>) -> Map<String, Value> {
    raw.as_deref()
        .and_then(|s| serde_json::from_str::<Map<String, Value>>(s).ok())
        .unwrap_or_default()
}

/// Serializes a string list for storage.
pub(super) fn to_json_list(values: &[String]) -> String {
    serde_json::to_string(values).unwrap_or_else(|_| "[]".to_string())
}

/// Serializes a JSON object for storage.
pub(super) fn to_json_map(map: &Map<String, Value>) -> String {
    serde_json::to_string(map).unwrap_or_else(|_| "{}".to_string())
}
