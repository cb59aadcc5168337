//! Database-agnostic type mappings.
//!
//! This module maps database-specific column values onto [`CellValue`].
//!
//! # Architecture
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies column types into logical categories
//! 2. Database-specific decoders handle the actual value extraction
//!
//! PostgreSQL rows arrive through the simple query protocol, so every value is
//! in text format and NUMERIC can be kept as its exact decimal text. SQLite has
//! no reliable declared type for computed columns; its values are decoded by
//! their runtime storage class instead.

use crate::models::{CellValue, DatabaseType};
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Decode, Row, Type, TypeInfo, ValueRef};

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Date,
    Timestamp,
    TimestampTz,
    Binary,
    Null,
    Unknown,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, db: DatabaseType) -> TypeCategory {
    let lower = type_name.to_lowercase();

    if lower == "null" {
        return TypeCategory::Null;
    }

    // Decimal/Numeric - check first as it overlaps with "numeric" in float checks
    if lower.contains("decimal") || lower.contains("numeric") {
        // SQLite's NUMERIC is actually a float
        if db == DatabaseType::SQLite && lower == "numeric" {
            return TypeCategory::Float;
        }
        return TypeCategory::Decimal;
    }

    if lower.contains("int") || lower.contains("serial") {
        return TypeCategory::Integer;
    }

    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    if lower.contains("float") || lower.contains("double") || lower == "real" {
        return TypeCategory::Float;
    }

    if lower == "timestamptz" || lower == "timestamp with time zone" {
        return TypeCategory::TimestampTz;
    }

    if lower.starts_with("timestamp") || lower == "datetime" {
        return TypeCategory::Timestamp;
    }

    if lower == "date" {
        return TypeCategory::Date;
    }

    if lower.contains("blob") || lower.contains("binary") || lower == "bytea" {
        return TypeCategory::Binary;
    }

    if lower.contains("char") || lower.contains("text") || lower == "name" {
        return TypeCategory::Text;
    }

    TypeCategory::Unknown
}

// =============================================================================
// Decimal Type Support
// =============================================================================

/// Wrapper type for raw NUMERIC values as strings.
/// This preserves the exact database representation.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        <String as Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("numeric") || name.contains("decimal")
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::Postgres>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

// =============================================================================
// Binary Encoding
// =============================================================================

/// Render binary data as text: UTF-8 when valid, base64 otherwise.
pub fn render_binary(bytes: &[u8]) -> String {
    use base64::{Engine as _, engine::general_purpose::STANDARD};

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => STANDARD.encode(bytes),
    }
}

// =============================================================================
// Row Conversion Trait
// =============================================================================

/// Trait for converting database rows to result table rows.
pub trait RowToValues {
    fn column_names(&self) -> Vec<String>;
    fn to_values(&self) -> Vec<CellValue>;
}

impl RowToValues for PgRow {
    fn column_names(&self) -> Vec<String> {
        self.columns().iter().map(|c| c.name().to_string()).collect()
    }

    fn to_values(&self) -> Vec<CellValue> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize_type(col.type_info().name(), DatabaseType::PostgreSQL);
                postgres::decode_column(self, idx, category)
            })
            .collect()
    }
}

impl RowToValues for SqliteRow {
    fn column_names(&self) -> Vec<String> {
        self.columns().iter().map(|c| c.name().to_string()).collect()
    }

    fn to_values(&self) -> Vec<CellValue> {
        (0..self.columns().len())
            .map(|idx| sqlite::decode_column(self, idx))
            .collect()
    }
}

// =============================================================================
// Database-Specific Decoders
// =============================================================================

mod postgres {
    use super::*;
    use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

    pub fn decode_column(row: &PgRow, idx: usize, category: TypeCategory) -> CellValue {
        match row.try_get_raw(idx) {
            Ok(raw) if raw.is_null() => return CellValue::Null,
            Ok(_) => {}
            Err(e) => {
                tracing::error!(column = idx, error = %e, "Failed to read column");
                return CellValue::Null;
            }
        }

        match category {
            TypeCategory::Decimal => decode_decimal(row, idx),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => decode_boolean(row, idx),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Date => decode_date(row, idx),
            TypeCategory::Timestamp => decode_timestamp(row, idx),
            TypeCategory::TimestampTz => decode_timestamptz(row, idx),
            TypeCategory::Binary => decode_binary(row, idx),
            _ => decode_text(row, idx),
        }
    }

    fn decode_decimal(row: &PgRow, idx: usize) -> CellValue {
        match row.try_get::<RawDecimal, _>(idx) {
            Ok(v) => CellValue::Decimal(v.0),
            Err(e) => {
                tracing::error!("Failed to decode NUMERIC: {:?}", e);
                CellValue::Null
            }
        }
    }

    fn decode_integer(row: &PgRow, idx: usize) -> CellValue {
        if let Ok(v) = row.try_get::<i16, _>(idx) {
            return CellValue::Int(v.into());
        }
        if let Ok(v) = row.try_get::<i32, _>(idx) {
            return CellValue::Int(v.into());
        }
        if let Ok(v) = row.try_get::<i64, _>(idx) {
            return CellValue::Int(v);
        }
        decode_text(row, idx)
    }

    fn decode_boolean(row: &PgRow, idx: usize) -> CellValue {
        row.try_get::<bool, _>(idx)
            .map(CellValue::Bool)
            .unwrap_or_else(|_| decode_text(row, idx))
    }

    fn decode_float(row: &PgRow, idx: usize) -> CellValue {
        if let Ok(v) = row.try_get::<f64, _>(idx) {
            return CellValue::Float(v);
        }
        if let Ok(v) = row.try_get::<f32, _>(idx) {
            return CellValue::Float(v as f64);
        }
        decode_text(row, idx)
    }

    fn decode_date(row: &PgRow, idx: usize) -> CellValue {
        row.try_get::<NaiveDate, _>(idx)
            .map(CellValue::Date)
            .unwrap_or_else(|_| decode_text(row, idx))
    }

    fn decode_timestamp(row: &PgRow, idx: usize) -> CellValue {
        row.try_get::<NaiveDateTime, _>(idx)
            .map(CellValue::Timestamp)
            .unwrap_or_else(|_| decode_text(row, idx))
    }

    fn decode_timestamptz(row: &PgRow, idx: usize) -> CellValue {
        row.try_get::<DateTime<Utc>, _>(idx)
            .map(CellValue::TimestampTz)
            .unwrap_or_else(|_| decode_text(row, idx))
    }

    fn decode_binary(row: &PgRow, idx: usize) -> CellValue {
        row.try_get::<Vec<u8>, _>(idx)
            .map(|v| CellValue::Binary(render_binary(&v)))
            .unwrap_or(CellValue::Null)
    }

    fn decode_text(row: &PgRow, idx: usize) -> CellValue {
        // Text-format values always decode as strings, whatever the declared type.
        match row.try_get_unchecked::<String, _>(idx) {
            Ok(v) => CellValue::Text(v),
            Err(e) => {
                tracing::warn!(column = idx, error = %e, "Unsupported column value, exporting NULL");
                CellValue::Null
            }
        }
    }
}

mod sqlite {
    use super::*;

    pub fn decode_column(row: &SqliteRow, idx: usize) -> CellValue {
        let storage_class = match row.try_get_raw(idx) {
            Ok(raw) if raw.is_null() => return CellValue::Null,
            Ok(raw) => categorize_type(raw.type_info().name(), DatabaseType::SQLite),
            Err(e) => {
                tracing::error!(column = idx, error = %e, "Failed to read column");
                return CellValue::Null;
            }
        };

        match storage_class {
            TypeCategory::Integer => row
                .try_get_unchecked::<i64, _>(idx)
                .map(CellValue::Int)
                .unwrap_or(CellValue::Null),
            TypeCategory::Float => row
                .try_get_unchecked::<f64, _>(idx)
                .map(CellValue::Float)
                .unwrap_or(CellValue::Null),
            TypeCategory::Binary => row
                .try_get_unchecked::<Vec<u8>, _>(idx)
                .map(|v| CellValue::Binary(render_binary(&v)))
                .unwrap_or(CellValue::Null),
            _ => row
                .try_get_unchecked::<String, _>(idx)
                .map(CellValue::Text)
                .unwrap_or(CellValue::Null),
        }
    }
}
