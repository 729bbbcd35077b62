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

//! SQL statements and their named parameters.
//!
//! ```
//! use databricks_sql_executor::{QueryParameter, Statement};
//!
//! let statement = Statement::builder("SELECT * FROM orders WHERE region = :region AND qty > :qty")
//!     .with_parameter(QueryParameter::string("region", "EMEA"))
//!     .with_parameter(QueryParameter::int("qty", 10))
//!     .build();
//! assert_eq!(statement.parameters().len(), 2);
//! ```

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Wire type tag of a statement parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParameterType {
    String,
    Int,
    Long,
    Double,
    Decimal,
    Boolean,
    Date,
    Timestamp,
    /// Used for null values so the parameter is still named in the payload.
    Void,
}

/// A named statement parameter, serialized as `{name, value, type}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryParameter {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    #[serde(rename = "type")]
    param_type: ParameterType,
}

impl QueryParameter {
    /// A parameter with an explicit type. A `None` value is always sent as VOID.
    pub fn new(name: impl Into<String>, value: Option<String>, param_type: ParameterType) -> Self {
        let param_type = if value.is_none() {
            ParameterType::Void
        } else {
            param_type
        };
        Self {
            name: name.into(),
            value,
            param_type,
        }
    }

    pub fn null(name: impl Into<String>) -> Self {
        Self::new(name, None, ParameterType::Void)
    }

    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, Some(value.into()), ParameterType::String)
    }

    pub fn int(name: impl Into<String>, value: i32) -> Self {
        Self::new(name, Some(value.to_string()), ParameterType::Int)
    }

    pub fn long(name: impl Into<String>, value: i64) -> Self {
        Self::new(name, Some(value.to_string()), ParameterType::Long)
    }

    pub fn double(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, Some(value.to_string()), ParameterType::Double)
    }

    /// Decimal given in its text form, e.g. `"12.50"`.
    pub fn decimal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, Some(value.into()), ParameterType::Decimal)
    }

    pub fn boolean(name: impl Into<String>, value: bool) -> Self {
        Self::new(name, Some(value.to_string()), ParameterType::Boolean)
    }

    pub fn date(name: impl Into<String>, value: NaiveDate) -> Self {
        Self::new(
            name,
            Some(value.format("%Y-%m-%d").to_string()),
            ParameterType::Date,
        )
    }

    pub fn timestamp(name: impl Into<String>, value: DateTime<Utc>) -> Self {
        Self::new(
            name,
            Some(value.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            ParameterType::Timestamp,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn param_type(&self) -> ParameterType {
        self.param_type
    }
}

/// Immutable SQL text plus ordered parameters.
///
/// Cloning is cheap; the parameter list is shared.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: Arc<str>,
    parameters: Arc<[QueryParameter]>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self::builder(sql).build()
    }

    pub fn builder(sql: impl Into<String>) -> StatementBuilder {
        StatementBuilder {
            sql: sql.into(),
            parameters: Vec::new(),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn parameters(&self) -> &[QueryParameter] {
        &self.parameters
    }
}

#[derive(Debug, Clone)]
pub struct StatementBuilder {
    sql: String,
    parameters: Vec<QueryParameter>,
}

impl StatementBuilder {
    pub fn with_parameter(mut self, parameter: QueryParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_parameters(mut self, parameters: impl IntoIterator<Item = QueryParameter>) -> Self {
        self.parameters.extend(parameters);
        self
    }

    pub fn build(self) -> Statement {
        Statement {
            sql: self.sql.into(),
            parameters: self.parameters.into(),
        }
    }
}

impl From<&str> for Statement {
    fn from(sql: &str) -> Self {
        Statement::new(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_null_value_is_void() {
        let p = QueryParameter::new("x", None, ParameterType::Int);
        assert_eq!(p.param_type(), ParameterType::Void);

        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json, serde_json::json!({"name": "x", "type": "VOID"}));
    }

    #[test]
    fn test_typed_constructors_render_values() {
        let d = QueryParameter::date("d", NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(d.value(), Some("2024-02-29"));
        assert_eq!(d.param_type(), ParameterType::Date);

        let ts = QueryParameter::timestamp("t", Utc.with_ymd_and_hms(2024, 1, 1, 8, 30, 0).unwrap());
        assert_eq!(ts.value(), Some("2024-01-01T08:30:00Z"));

        assert_eq!(QueryParameter::boolean("b", true).value(), Some("true"));
        assert_eq!(QueryParameter::long("l", -9).value(), Some("-9"));
        assert_eq!(
            serde_json::to_value(QueryParameter::decimal("m", "12.50")).unwrap()["type"],
            "DECIMAL"
        );
    }

    #[test]
    fn test_builder_keeps_order() {
        let stmt = Statement::builder("SELECT :a, :b")
            .with_parameter(QueryParameter::string("a", "1"))
            .with_parameters([QueryParameter::double("b", 2.5), QueryParameter::null("c")])
            .build();
        let names: Vec<&str> = stmt.parameters().iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(stmt.sql(), "SELECT :a, :b");
    }
}
