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

//! Mapping of generic rows onto caller-defined record types.
//!
//! A record type describes itself once through [`TypedRecord::shape`]: which
//! column feeds which constructor slot (by `order`), and the constructor
//! with its parameter slot types. The shape compiles into an ordered table
//! of `(column, slot, expected type)`.
//!
//! ```
//! use databricks_sql_executor::materialize::{RecordShape, SlotType, TypedRecord};
//! use databricks_sql_executor::types::ValueKind;
//!
//! struct Person {
//!     name: String,
//!     age: i32,
//! }
//!
//! impl TypedRecord for Person {
//!     fn shape() -> RecordShape<Self> {
//!         RecordShape::new()
//!             .field("name", 1)
//!             .field("age", 2)
//!             .constructor(
//!                 &[SlotType::required(ValueKind::String), SlotType::required(ValueKind::Int32)],
//!                 |args| Ok(Person { name: args.next()?, age: args.next()? }),
//!             )
//!     }
//! }
//! ```
//!
//! Three [`MaterializeStrategy`] values trade compile work against lookups.
//! They produce the same records and the same errors. Shape errors
//! surface when the first row is materialized.

use crate::error::{Error, Result};
use crate::types::row::{Decimal128, Row, Value, ValueKind};
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// A record type that can be built from a [`Row`].
pub trait TypedRecord: Sized + Send + 'static {
    fn shape() -> RecordShape<Self>;
}

/// Expected type of one constructor parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotType {
    pub kind: ValueKind,
    pub nullable: bool,
}

impl SlotType {
    /// Value slot: rejects null.
    pub const fn required(kind: ValueKind) -> Self {
        Self {
            kind,
            nullable: false,
        }
    }

    /// Nullable slot: accepts null.
    pub const fn nullable(kind: ValueKind) -> Self {
        Self {
            kind,
            nullable: true,
        }
    }

    pub fn accepts(&self, value: &Value) -> bool {
        match value {
            Value::Null => self.nullable,
            other => other.kind() == self.kind,
        }
    }
}

type BuildFn<T> = fn(&mut ConstructorArgs) -> Result<T>;

struct Constructor<T> {
    params: Vec<SlotType>,
    build: BuildFn<T>,
}

/// Declared mapping of a record type.
pub struct RecordShape<T> {
    type_name: &'static str,
    fields: Vec<(String, usize)>,
    constructors: Vec<Constructor<T>>,
}

impl<T> Default for RecordShape<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RecordShape<T> {
    pub fn new() -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            fields: Vec::new(),
            constructors: Vec::new(),
        }
    }

    /// Map `column` to the constructor parameter at position `order`.
    pub fn field(mut self, column: impl Into<String>, order: usize) -> Self {
        self.fields.push((column.into(), order));
        self
    }

    pub fn constructor(mut self, params: &[SlotType], build: BuildFn<T>) -> Self {
        self.constructors.push(Constructor {
            params: params.to_vec(),
            build,
        });
        self
    }

    pub fn compile(self) -> Result<CompiledRecord<T>> {
        let type_name = self.type_name;
        let mut constructors = self.constructors;
        if constructors.len() != 1 {
            return Err(Error::Configuration(format!(
                "{} must declare exactly one constructor, found {}",
                type_name,
                constructors.len()
            )));
        }
        let Constructor { params, build } = constructors.remove(0);

        let mut fields = self.fields;
        fields.sort_by_key(|(_, order)| *order);

        if fields.len() != params.len() {
            return Err(Error::Argument(format!(
                "{} maps {} columns but its constructor takes {} parameters",
                type_name,
                fields.len(),
                params.len()
            )));
        }

        let table = fields
            .into_iter()
            .zip(params)
            .enumerate()
            .map(|(slot, ((column, _), expected))| FieldSlot {
                column,
                slot,
                expected,
            })
            .collect();

        Ok(CompiledRecord {
            type_name,
            table,
            build,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSlot {
    pub column: String,
    pub slot: usize,
    pub expected: SlotType,
}

/// Compiled `[(column, slot, expected type)]` table plus the constructor.
pub struct CompiledRecord<T> {
    type_name: &'static str,
    table: Vec<FieldSlot>,
    build: BuildFn<T>,
}

impl<T> std::fmt::Debug for CompiledRecord<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledRecord")
            .field("type_name", &self.type_name)
            .field("table", &self.table)
            .finish()
    }
}

impl<T> CompiledRecord<T> {
    pub fn table(&self) -> &[FieldSlot] {
        &self.table
    }

    /// Look up every column by name and build the record.
    pub fn materialize(&self, row: &Row) -> Result<T> {
        let mut values = Vec::with_capacity(self.table.len());
        for entry in &self.table {
            let value = row
                .get(&entry.column)
                .ok_or_else(|| self.missing_column(entry))?;
            values.push(self.check(entry, value)?);
        }
        self.construct(values)
    }

    /// Column position of every table entry within `columns`.
    pub fn positions(&self, columns: &[String]) -> Result<Vec<usize>> {
        self.table
            .iter()
            .map(|entry| {
                columns
                    .iter()
                    .position(|c| *c == entry.column)
                    .ok_or_else(|| self.missing_column(entry))
            })
            .collect()
    }

    /// Build the record reading values at precomputed positions.
    pub fn materialize_at(&self, row: &Row, positions: &[usize]) -> Result<T> {
        let mut values = Vec::with_capacity(self.table.len());
        for (entry, &position) in self.table.iter().zip(positions) {
            let value = row
                .value_at(position)
                .ok_or_else(|| self.missing_column(entry))?;
            values.push(self.check(entry, value)?);
        }
        self.construct(values)
    }

    fn check(&self, entry: &FieldSlot, value: &Value) -> Result<Value> {
        if entry.expected.accepts(value) {
            return Ok(value.clone());
        }
        Err(Error::Argument(format!(
            "{}: column '{}' holds {:?}, which cannot be assigned to parameter {} of type {:?}{}",
            self.type_name,
            entry.column,
            value.kind(),
            entry.slot,
            entry.expected.kind,
            if entry.expected.nullable {
                "?"
            } else {
                ""
            }
        )))
    }

    fn missing_column(&self, entry: &FieldSlot) -> Error {
        Error::Argument(format!(
            "{}: row has no column '{}' for parameter {}",
            self.type_name, entry.column, entry.slot
        ))
    }

    fn construct(&self, values: Vec<Value>) -> Result<T> {
        let mut args = ConstructorArgs {
            type_name: self.type_name,
            values: values.into_iter(),
            taken: 0,
        };
        let record = (self.build)(&mut args)?;
        args.finish()?;
        Ok(record)
    }
}

/// Positional arguments handed to a record constructor.
pub struct ConstructorArgs {
    type_name: &'static str,
    values: std::vec::IntoIter<Value>,
    taken: usize,
}

impl ConstructorArgs {
    /// Take the next argument, converted to `V`.
    #[allow(clippy::should_implement_trait)]
    pub fn next<V: FromValue>(&mut self) -> Result<V> {
        let value = self.values.next().ok_or_else(|| {
            Error::Argument(format!(
                "{}: constructor asked for argument {} but only {} were supplied",
                self.type_name,
                self.taken + 1,
                self.taken
            ))
        })?;
        self.taken += 1;
        V::from_value(value).map_err(|e| match e {
            Error::Argument(msg) => {
                Error::Argument(format!("{} argument {}: {}", self.type_name, self.taken, msg))
            }
            other => other,
        })
    }

    fn finish(&self) -> Result<()> {
        let left = self.values.len();
        if left > 0 {
            return Err(Error::Argument(format!(
                "{}: constructor used {} arguments, {} left over",
                self.type_name, self.taken, left
            )));
        }
        Ok(())
    }
}

/// Conversion out of a [`Value`] for constructor arguments.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self>;
}

fn mismatch(value: &Value, expected: &str) -> Error {
    Error::Argument(format!("expected {}, got {:?}", expected, value.kind()))
}

macro_rules! from_value {
    ($ty:ty, $variant:ident) => {
        impl FromValue for $ty {
            fn from_value(value: Value) -> Result<Self> {
                match value {
                    Value::$variant(v) => Ok(v),
                    other => Err(mismatch(&other, stringify!($ty))),
                }
            }
        }
    };
}

from_value!(bool, Boolean);
from_value!(i8, Int8);
from_value!(i16, Int16);
from_value!(i32, Int32);
from_value!(i64, Int64);
from_value!(u8, UInt8);
from_value!(u16, UInt16);
from_value!(u32, UInt32);
from_value!(u64, UInt64);
from_value!(f32, Float32);
from_value!(f64, Float64);
from_value!(NaiveDate, Date);
from_value!(DateTime<Utc>, Timestamp);
from_value!(Decimal128, Decimal);
from_value!(String, String);

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MaterializeStrategy {
    /// Compile the shape for every row.
    Naive,
    /// Look up the compiled shape in a process-wide per-type cache for every row.
    Cached,
    /// Compile once per materializer and resolve column positions once per
    /// column layout, then read values positionally.
    #[default]
    Precompiled,
}

static COMPILED: OnceLock<DashMap<TypeId, Arc<dyn Any + Send + Sync>>> = OnceLock::new();

/// Compiled shape of `T`, compiled on first request and shared afterwards.
/// Failed compilations are not cached.
pub fn cached_record<T: TypedRecord>() -> Result<Arc<CompiledRecord<T>>> {
    let cache = COMPILED.get_or_init(DashMap::new);
    let key = TypeId::of::<T>();

    if let Some(entry) = cache.get(&key) {
        let any = Arc::clone(entry.value());
        drop(entry);
        if let Ok(compiled) = any.downcast::<CompiledRecord<T>>() {
            return Ok(compiled);
        }
    }

    let compiled = Arc::new(T::shape().compile()?);
    debug!("Compiled record shape for {}", std::any::type_name::<T>());
    cache.insert(key, Arc::clone(&compiled) as Arc<dyn Any + Send + Sync>);
    Ok(compiled)
}

enum State<T> {
    Naive,
    Cached,
    Precompiled {
        compiled: Option<CompiledRecord<T>>,
        layout: Option<(Arc<[String]>, Vec<usize>)>,
    },
}

/// Row-to-record converter for one result stream.
pub struct Materializer<T: TypedRecord> {
    state: State<T>,
}

impl<T: TypedRecord> Materializer<T> {
    pub fn new(strategy: MaterializeStrategy) -> Self {
        let state = match strategy {
            MaterializeStrategy::Naive => State::Naive,
            MaterializeStrategy::Cached => State::Cached,
            MaterializeStrategy::Precompiled => State::Precompiled {
                compiled: None,
                layout: None,
            },
        };
        Self { state }
    }

    pub fn materialize(&mut self, row: &Row) -> Result<T> {
        match &mut self.state {
            State::Naive => T::shape().compile()?.materialize(row),
            State::Cached => cached_record::<T>()?.materialize(row),
            State::Precompiled { compiled, layout } => {
                let ready = match compiled.take() {
                    Some(c) => c,
                    None => T::shape().compile()?,
                };
                let compiled = &*compiled.insert(ready);

                let stale = match layout {
                    Some((columns, _)) => {
                        !Arc::ptr_eq(columns, row.columns()) && **columns != **row.columns()
                    }
                    None => true,
                };
                if stale {
                    let positions = compiled.positions(row.columns())?;
                    *layout = Some((Arc::clone(row.columns()), positions));
                }

                match layout {
                    Some((_, positions)) => compiled.materialize_at(row, positions),
                    None => compiled.materialize(row),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Person {
        name: String,
        age: i32,
    }

    impl TypedRecord for Person {
        fn shape() -> RecordShape<Self> {
            RecordShape::new()
                .field("age", 2)
                .field("name", 1)
                .constructor(
                    &[
                        SlotType::required(ValueKind::String),
                        SlotType::required(ValueKind::Int32),
                    ],
                    |args| {
                        Ok(Person {
                            name: args.next()?,
                            age: args.next()?,
                        })
                    },
                )
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct PersonWithTitle {
        name: String,
        age: i32,
        title: Option<String>,
    }

    impl TypedRecord for PersonWithTitle {
        fn shape() -> RecordShape<Self> {
            RecordShape::new()
                .field("name", 1)
                .field("age", 2)
                .field("title", 3)
                .constructor(
                    &[
                        SlotType::required(ValueKind::String),
                        SlotType::required(ValueKind::Int32),
                        SlotType::nullable(ValueKind::String),
                    ],
                    |args| {
                        Ok(PersonWithTitle {
                            name: args.next()?,
                            age: args.next()?,
                            title: args.next()?,
                        })
                    },
                )
        }
    }

    #[derive(Debug)]
    struct TwoConstructors;

    impl TypedRecord for TwoConstructors {
        fn shape() -> RecordShape<Self> {
            RecordShape::new()
                .field("name", 1)
                .constructor(&[SlotType::required(ValueKind::String)], |_| {
                    Ok(TwoConstructors)
                })
                .constructor(&[], |_| Ok(TwoConstructors))
        }
    }

    #[derive(Debug)]
    struct TooFewFields;

    impl TypedRecord for TooFewFields {
        fn shape() -> RecordShape<Self> {
            RecordShape::new().field("name", 1).constructor(
                &[
                    SlotType::required(ValueKind::String),
                    SlotType::required(ValueKind::Int32),
                ],
                |_| Ok(TooFewFields),
            )
        }
    }

    const ALL: [MaterializeStrategy; 3] = [
        MaterializeStrategy::Naive,
        MaterializeStrategy::Cached,
        MaterializeStrategy::Precompiled,
    ];

    fn row(columns: &[&str], values: Vec<Value>) -> Row {
        let columns: Arc<[String]> = columns
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .into();
        Row::new(columns, values)
    }

    #[test]
    fn test_compile_orders_table_by_constructor_order() {
        let compiled = Person::shape().compile().unwrap();
        let columns: Vec<&str> = compiled.table().iter().map(|e| e.column.as_str()).collect();
        assert_eq!(columns, vec!["name", "age"]);
        assert_eq!(compiled.table()[1].slot, 1);
    }

    #[test]
    fn test_strategies_agree_on_records() {
        let r = row(
            &["age", "title", "name"],
            vec![
                Value::Int32(41),
                Value::Null,
                Value::String("Ada".to_string()),
            ],
        );
        let expected = PersonWithTitle {
            name: "Ada".to_string(),
            age: 41,
            title: None,
        };
        for strategy in ALL {
            let mut m = Materializer::<PersonWithTitle>::new(strategy);
            assert_eq!(m.materialize(&r).unwrap(), expected, "{:?}", strategy);
        }
    }

    #[test]
    fn test_precompiled_follows_layout_change() {
        let mut m = Materializer::<Person>::new(MaterializeStrategy::Precompiled);
        let a = row(
            &["name", "age"],
            vec![Value::String("a".into()), Value::Int32(1)],
        );
        let b = row(
            &["age", "name"],
            vec![Value::Int32(2), Value::String("b".into())],
        );
        assert_eq!(m.materialize(&a).unwrap().age, 1);
        assert_eq!(m.materialize(&b).unwrap().name, "b");
    }

    #[test]
    fn test_null_into_required_slot_is_argument_error() {
        let r = row(&["name", "age"], vec![Value::String("x".into()), Value::Null]);
        for strategy in ALL {
            let err = Materializer::<Person>::new(strategy)
                .materialize(&r)
                .unwrap_err();
            assert!(matches!(err, Error::Argument(_)), "{:?}", strategy);
        }
    }

    #[test]
    fn test_type_mismatch_is_argument_error() {
        let r = row(
            &["name", "age"],
            vec![Value::String("x".into()), Value::String("41".into())],
        );
        let messages: Vec<String> = ALL
            .iter()
            .map(|s| {
                Materializer::<Person>::new(*s)
                    .materialize(&r)
                    .unwrap_err()
                    .to_string()
            })
            .collect();
        assert!(messages.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_missing_column_is_argument_error() {
        let r = row(&["name"], vec![Value::String("x".into())]);
        for strategy in ALL {
            assert!(matches!(
                Materializer::<Person>::new(strategy).materialize(&r),
                Err(Error::Argument(_))
            ));
        }
    }

    #[test]
    fn test_constructor_count_is_configuration_error() {
        let r = row(&["name"], vec![Value::String("x".into())]);
        for strategy in ALL {
            assert!(matches!(
                Materializer::<TwoConstructors>::new(strategy).materialize(&r),
                Err(Error::Configuration(_))
            ));
        }
    }

    #[test]
    fn test_field_count_mismatch_is_argument_error() {
        let r = row(&["name"], vec![Value::String("x".into())]);
        for strategy in ALL {
            assert!(matches!(
                Materializer::<TooFewFields>::new(strategy).materialize(&r),
                Err(Error::Argument(_))
            ));
        }
    }

    #[test]
    fn test_cached_record_is_shared() {
        let a = cached_record::<Person>().unwrap();
        let b = cached_record::<Person>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_option_from_value() {
        assert_eq!(Option::<i64>::from_value(Value::Null).unwrap(), None);
        assert_eq!(Option::<i64>::from_value(Value::Int64(3)).unwrap(), Some(3));
        assert!(i64::from_value(Value::Null).is_err());
    }
}
