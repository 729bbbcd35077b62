// Copyright (c) 2025 ADBC Drivers Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Generic row model shared by every result decoder.
//!
//! A [`Row`] is an ordered association of column name to nullable scalar
//! [`Value`]. Column names are shared between all rows decoded from the same
//! batch, so producing a row only allocates its values.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use std::fmt;
use std::sync::Arc;

/// A fixed-point decimal as carried by Arrow `Decimal128`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal128 {
    pub unscaled: i128,
    pub precision: u8,
    pub scale: i8,
}

impl Decimal128 {
    pub fn new(unscaled: i128, precision: u8, scale: i8) -> Self {
        Self {
            unscaled,
            precision,
            scale,
        }
    }
}

impl fmt::Display for Decimal128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale <= 0 {
            // A negative scale appends zeros to the unscaled digits.
            if self.unscaled == 0 {
                return f.write_str("0");
            }
            let zeros = usize::from(self.scale.unsigned_abs());
            return write!(f, "{}{}", self.unscaled, "0".repeat(zeros));
        }

        let scale = self.scale as usize;
        let digits = self.unscaled.unsigned_abs().to_string();
        let digits = format!("{:0>width$}", digits, width = scale + 1);
        let (int_part, frac_part) = digits.split_at(digits.len() - scale);
        let sign = if self.unscaled < 0 { "-" } else { "" };
        write!(f, "{}{}.{}", sign, int_part, frac_part)
    }
}

/// Scalar cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    Decimal(Decimal128),
    String(String),
}

/// Discriminant of a [`Value`], used to describe expected slot types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Date,
    Timestamp,
    Decimal,
    String,
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Int8(_) => ValueKind::Int8,
            Value::Int16(_) => ValueKind::Int16,
            Value::Int32(_) => ValueKind::Int32,
            Value::Int64(_) => ValueKind::Int64,
            Value::UInt8(_) => ValueKind::UInt8,
            Value::UInt16(_) => ValueKind::UInt16,
            Value::UInt32(_) => ValueKind::UInt32,
            Value::UInt64(_) => ValueKind::UInt64,
            Value::Float32(_) => ValueKind::Float32,
            Value::Float64(_) => ValueKind::Float64,
            Value::Date(_) => ValueKind::Date,
            Value::Timestamp(_) => ValueKind::Timestamp,
            Value::Decimal(_) => ValueKind::Decimal,
            Value::String(_) => ValueKind::String,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Canonical text form, `None` for null.
    ///
    /// This is the representation the JSON_ARRAY format uses on the wire, so
    /// rows decoded from either format compare equal through it.
    pub fn text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Int8(v) => write!(f, "{}", v),
            Value::Int16(v) => write!(f, "{}", v),
            Value::Int32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::UInt8(v) => write!(f, "{}", v),
            Value::UInt16(v) => write!(f, "{}", v),
            Value::UInt32(v) => write!(f, "{}", v),
            Value::UInt64(v) => write!(f, "{}", v),
            Value::Float32(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Timestamp(ts) => {
                let precision = if ts.timestamp_subsec_nanos() % 1_000_000 == 0 {
                    SecondsFormat::Millis
                } else {
                    SecondsFormat::Micros
                };
                f.write_str(&ts.to_rfc3339_opts(precision, true))
            }
            Value::Decimal(d) => write!(f, "{}", d),
            Value::String(s) => f.write_str(s),
        }
    }
}

/// One result row: values in column order plus the shared column names.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Callers guarantee `values.len() == columns.len()`; decoders check it.
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    pub fn columns(&self) -> &Arc<[String]> {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value by column name. First match wins on duplicate names.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.position(column).map(|i| &self.values[i])
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn value_at(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    /// Canonical text of every value, in column order.
    pub fn to_text(&self) -> Vec<Option<String>> {
        self.values.iter().map(Value::text).collect()
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_decimal_display() {
        assert_eq!(Decimal128::new(1250, 10, 2).to_string(), "12.50");
        assert_eq!(Decimal128::new(-5, 10, 3).to_string(), "-0.005");
        assert_eq!(Decimal128::new(0, 10, 2).to_string(), "0.00");
        assert_eq!(Decimal128::new(42, 10, 0).to_string(), "42");
        assert_eq!(Decimal128::new(42, 10, -2).to_string(), "4200");
        assert_eq!(Decimal128::new(0, 10, -3).to_string(), "0");
    }

    #[test]
    fn test_decimal_display_beyond_i128_range() {
        let text = Value::Decimal(Decimal128::new(1, 38, -40)).to_string();
        assert_eq!(text, format!("1{}", "0".repeat(40)));

        let text = Decimal128::new(-7, 38, -128).to_string();
        assert_eq!(text.len(), 2 + 128);
        assert!(text.starts_with("-70"));
    }

    #[test]
    fn test_timestamp_text_precision() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        assert_eq!(
            Value::Timestamp(ts).text().unwrap(),
            "2024-01-01T10:00:00.000Z"
        );

        let ts = ts + chrono::Duration::microseconds(1_500);
        assert_eq!(
            Value::Timestamp(ts).text().unwrap(),
            "2024-01-01T10:00:00.001500Z"
        );
    }

    #[test]
    fn test_null_has_no_text() {
        assert_eq!(Value::Null.text(), None);
        assert_eq!(Value::Boolean(true).text().as_deref(), Some("true"));
        assert_eq!(
            Value::Date(NaiveDate::from_ymd_opt(2023, 12, 31).unwrap())
                .text()
                .as_deref(),
            Some("2023-12-31")
        );
    }

    #[test]
    fn test_row_lookup_by_name() {
        let columns: Arc<[String]> = vec!["id".to_string(), "name".to_string()].into();
        let row = Row::new(
            columns,
            vec![Value::Int32(7), Value::String("alice".into())],
        );

        assert_eq!(row.len(), 2);
        assert_eq!(row.get("name"), Some(&Value::String("alice".into())));
        assert_eq!(row.get("missing"), None);
        assert_eq!(row.position("id"), Some(0));

        let pairs: Vec<_> = row.iter().map(|(c, v)| (c.to_string(), v.kind())).collect();
        assert_eq!(
            pairs,
            vec![
                ("id".to_string(), ValueKind::Int32),
                ("name".to_string(), ValueKind::String)
            ]
        );
    }
}
