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

//! Streaming decoder for `ARROW_STREAM` chunk bodies.
//!
//! Body frames are pushed into an Arrow IPC [`StreamDecoder`] as they
//! arrive. Each completed `RecordBatch` is turned into rows one at a time,
//! so at most one batch is held in memory.
//!
//! Supported column types: boolean, signed and unsigned 8/16/32/64-bit
//! integers, float32/64, date32/64, timestamp (any unit, any timezone),
//! decimal128 and UTF-8 strings. Any other type fails with
//! `Error::NotSupported` when its batch arrives.

use crate::client::ByteStream;
use crate::error::{Error, Result};
use crate::reader::RowStream;
use crate::types::row::{Decimal128, Row, Value};
use arrow_array::cast::AsArray;
use arrow_array::types::{
    Date32Type, Date64Type, Decimal128Type, Float32Type, Float64Type, Int16Type, Int32Type,
    Int64Type, Int8Type, TimestampMicrosecondType, TimestampMillisecondType,
    TimestampNanosecondType, TimestampSecondType, UInt16Type, UInt32Type, UInt64Type, UInt8Type,
};
use arrow_array::{Array, ArrayRef, RecordBatch};
use arrow_buffer::Buffer;
use arrow_ipc::reader::StreamDecoder;
use arrow_schema::{DataType, SchemaRef, TimeUnit};
use chrono::NaiveDateTime;
use futures::StreamExt;
use std::sync::Arc;
use tracing::trace;

/// Whether rows of this Arrow type can be decoded.
pub fn is_supported(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Boolean
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
            | DataType::Date32
            | DataType::Date64
            | DataType::Timestamp(_, _)
            | DataType::Decimal128(_, _)
            | DataType::Utf8
            | DataType::LargeUtf8
    )
}

fn check_schema(schema: &SchemaRef) -> Result<Arc<[String]>> {
    for field in schema.fields() {
        if !is_supported(field.data_type()) {
            return Err(Error::NotSupported(format!(
                "Unsupported data type {} for column '{}'",
                field.data_type(),
                field.name()
            )));
        }
    }
    Ok(schema
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect::<Vec<_>>()
        .into())
}

fn out_of_range(data_type: &DataType) -> Error {
    Error::Decode(format!("{} value out of range", data_type))
}

fn timestamp(value: Option<NaiveDateTime>, data_type: &DataType) -> Result<Value> {
    value
        .map(|ts| Value::Timestamp(ts.and_utc()))
        .ok_or_else(|| out_of_range(data_type))
}

/// Extract one cell as a [`Value`].
pub fn cell(array: &ArrayRef, row: usize) -> Result<Value> {
    if array.is_null(row) {
        return Ok(Value::Null);
    }

    let data_type = array.data_type();
    let value = match data_type {
        DataType::Boolean => Value::Boolean(array.as_boolean().value(row)),
        DataType::Int8 => Value::Int8(array.as_primitive::<Int8Type>().value(row)),
        DataType::Int16 => Value::Int16(array.as_primitive::<Int16Type>().value(row)),
        DataType::Int32 => Value::Int32(array.as_primitive::<Int32Type>().value(row)),
        DataType::Int64 => Value::Int64(array.as_primitive::<Int64Type>().value(row)),
        DataType::UInt8 => Value::UInt8(array.as_primitive::<UInt8Type>().value(row)),
        DataType::UInt16 => Value::UInt16(array.as_primitive::<UInt16Type>().value(row)),
        DataType::UInt32 => Value::UInt32(array.as_primitive::<UInt32Type>().value(row)),
        DataType::UInt64 => Value::UInt64(array.as_primitive::<UInt64Type>().value(row)),
        DataType::Float32 => Value::Float32(array.as_primitive::<Float32Type>().value(row)),
        DataType::Float64 => Value::Float64(array.as_primitive::<Float64Type>().value(row)),
        DataType::Date32 => array
            .as_primitive::<Date32Type>()
            .value_as_date(row)
            .map(Value::Date)
            .ok_or_else(|| out_of_range(data_type))?,
        DataType::Date64 => array
            .as_primitive::<Date64Type>()
            .value_as_date(row)
            .map(Value::Date)
            .ok_or_else(|| out_of_range(data_type))?,
        DataType::Timestamp(TimeUnit::Second, _) => timestamp(
            array
                .as_primitive::<TimestampSecondType>()
                .value_as_datetime(row),
            data_type,
        )?,
        DataType::Timestamp(TimeUnit::Millisecond, _) => timestamp(
            array
                .as_primitive::<TimestampMillisecondType>()
                .value_as_datetime(row),
            data_type,
        )?,
        DataType::Timestamp(TimeUnit::Microsecond, _) => timestamp(
            array
                .as_primitive::<TimestampMicrosecondType>()
                .value_as_datetime(row),
            data_type,
        )?,
        DataType::Timestamp(TimeUnit::Nanosecond, _) => timestamp(
            array
                .as_primitive::<TimestampNanosecondType>()
                .value_as_datetime(row),
            data_type,
        )?,
        DataType::Decimal128(precision, scale) => Value::Decimal(Decimal128::new(
            array.as_primitive::<Decimal128Type>().value(row),
            *precision,
            *scale,
        )),
        DataType::Utf8 => Value::String(array.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => Value::String(array.as_string::<i64>().value(row).to_string()),
        other => {
            return Err(Error::NotSupported(format!(
                "Unsupported data type {}",
                other
            )))
        }
    };
    Ok(value)
}

/// Build row `index` of `batch`.
pub fn batch_row(batch: &RecordBatch, columns: &Arc<[String]>, index: usize) -> Result<Row> {
    let values = batch
        .columns()
        .iter()
        .map(|array| cell(array, index))
        .collect::<Result<Vec<_>>>()?;
    Ok(Row::new(Arc::clone(columns), values))
}

struct CurrentBatch {
    batch: RecordBatch,
    next_row: usize,
}

struct DecodeState {
    body: ByteStream,
    decoder: StreamDecoder,
    pending: Buffer,
    columns: Option<Arc<[String]>>,
    current: Option<CurrentBatch>,
}

impl DecodeState {
    fn accept(&mut self, batch: RecordBatch) -> Result<()> {
        if self.columns.is_none() {
            self.columns = Some(check_schema(&batch.schema())?);
        }
        trace!("Decoded Arrow batch with {} rows", batch.num_rows());
        self.current = Some(CurrentBatch { batch, next_row: 0 });
        Ok(())
    }

    fn next_row(&mut self) -> Result<Option<Row>> {
        let (Some(current), Some(columns)) = (self.current.as_mut(), self.columns.as_ref()) else {
            return Ok(None);
        };
        if current.next_row >= current.batch.num_rows() {
            self.current = None;
            return Ok(None);
        }
        let row = batch_row(&current.batch, columns, current.next_row)?;
        current.next_row += 1;
        Ok(Some(row))
    }
}

/// Decode an `ARROW_STREAM` body into rows.
///
/// Column names come from the IPC schema; `_schema` from the manifest is
/// not consulted because the stream carries its own.
pub fn decode_arrow(body: ByteStream, _schema: Arc<[String]>) -> RowStream {
    let state = DecodeState {
        body,
        decoder: StreamDecoder::new(),
        pending: Buffer::from_vec(Vec::<u8>::new()),
        columns: None,
        current: None,
    };

    futures::stream::try_unfold(state, |mut st| async move {
        loop {
            if let Some(row) = st.next_row()? {
                return Ok(Some((row, st)));
            }

            if !st.pending.is_empty() {
                if let Some(batch) = st.decoder.decode(&mut st.pending)? {
                    st.accept(batch)?;
                }
                continue;
            }

            match st.body.next().await {
                Some(bytes) => st.pending = Buffer::from_vec(bytes?.to_vec()),
                None => {
                    st.decoder.finish()?;
                    return Ok(None);
                }
            }
        }
    })
    .boxed()
}
