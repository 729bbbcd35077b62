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

//! Streaming decoder for `JSON_ARRAY` chunk bodies.
//!
//! A body is one top-level array of records, each record an array of
//! column values:
//!
//! ```text
//! [["1","alice",null],["2","bob","x"],null]
//! ```
//!
//! The scanner tracks nesting depth and string state byte by byte so it
//! can cut complete records out of partial network frames. Only the record
//! currently being assembled stays buffered; bytes before it are dropped.
//! Top-level `null` records are skipped.

use crate::client::ByteStream;
use crate::error::{Error, Result};
use crate::reader::RowStream;
use crate::types::row::{Row, Value};
use futures::StreamExt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Before the opening `[`.
    Start,
    /// Expecting a record, or `]` if the array is still empty.
    Element { first: bool },
    /// Inside a record that began at `start`.
    Record {
        start: usize,
        depth: usize,
        in_string: bool,
        escaped: bool,
    },
    /// After a record, expecting `,` or `]`.
    Separator,
    Done,
}

/// Incremental splitter of a JSON array-of-arrays.
#[derive(Debug)]
pub struct JsonArrayScanner {
    buf: Vec<u8>,
    pos: usize,
    state: State,
}

impl Default for JsonArrayScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonArrayScanner {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            pos: 0,
            state: State::Start,
        }
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes held for the record in progress.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Next complete record, or `None` when more input is needed or the
    /// array has ended.
    pub fn next_record(&mut self) -> Result<Option<Vec<serde_json::Value>>> {
        loop {
            if self.pos >= self.buf.len() {
                self.compact();
                return Ok(None);
            }
            let b = self.buf[self.pos];

            match self.state {
                State::Start => {
                    if !b.is_ascii_whitespace() {
                        if b != b'[' {
                            return Err(unexpected(b, "'['"));
                        }
                        self.state = State::Element { first: true };
                    }
                    self.pos += 1;
                }
                State::Element { first } => match b {
                    _ if b.is_ascii_whitespace() => self.pos += 1,
                    b']' if first => {
                        self.state = State::Done;
                        self.pos += 1;
                    }
                    b'[' => {
                        self.state = State::Record {
                            start: self.pos,
                            depth: 1,
                            in_string: false,
                            escaped: false,
                        };
                        self.pos += 1;
                    }
                    b'n' => {
                        if self.buf.len() - self.pos < 4 {
                            self.compact();
                            return Ok(None);
                        }
                        if &self.buf[self.pos..self.pos + 4] != b"null" {
                            return Err(unexpected(b, "a record or null"));
                        }
                        self.pos += 4;
                        self.state = State::Separator;
                    }
                    _ => return Err(unexpected(b, "a record or null")),
                },
                State::Record { .. } => {
                    if let Some((start, end)) = self.scan_record() {
                        let values = serde_json::from_slice(&self.buf[start..=end])
                            .map_err(|e| Error::Decode(format!("malformed JSON record: {}", e)))?;
                        self.pos = end + 1;
                        self.state = State::Separator;
                        return Ok(Some(values));
                    }
                }
                State::Separator => {
                    match b {
                        _ if b.is_ascii_whitespace() => {}
                        b',' => self.state = State::Element { first: false },
                        b']' => self.state = State::Done,
                        _ => return Err(unexpected(b, "',' or ']'")),
                    }
                    self.pos += 1;
                }
                State::Done => {
                    if !b.is_ascii_whitespace() {
                        return Err(unexpected(b, "end of input"));
                    }
                    self.pos += 1;
                }
            }
        }
    }

    /// Advance through the current record. Returns its start and the index
    /// of its closing bracket, or `None` after consuming all buffered bytes.
    fn scan_record(&mut self) -> Option<(usize, usize)> {
        let State::Record {
            start,
            mut depth,
            mut in_string,
            mut escaped,
        } = self.state
        else {
            return None;
        };

        while self.pos < self.buf.len() {
            let c = self.buf[self.pos];
            if in_string {
                if escaped {
                    escaped = false;
                } else if c == b'\\' {
                    escaped = true;
                } else if c == b'"' {
                    in_string = false;
                }
            } else {
                match c {
                    b'"' => in_string = true,
                    b'[' | b'{' => depth += 1,
                    b']' | b'}' => {
                        depth -= 1;
                        if depth == 0 {
                            return Some((start, self.pos));
                        }
                    }
                    _ => {}
                }
            }
            self.pos += 1;
        }

        self.state = State::Record {
            start,
            depth,
            in_string,
            escaped,
        };
        None
    }

    /// Check that the input formed a complete array.
    pub fn finish(&self) -> Result<()> {
        match self.state {
            State::Done => Ok(()),
            _ => Err(Error::Decode(
                "JSON_ARRAY body ended before the closing ']'".to_string(),
            )),
        }
    }

    /// Drop bytes that no pending record needs.
    fn compact(&mut self) {
        let keep_from = match self.state {
            State::Record { start, .. } => start,
            _ => self.pos,
        };
        if keep_from == 0 {
            return;
        }
        self.buf.drain(..keep_from);
        self.pos -= keep_from;
        if let State::Record { ref mut start, .. } = self.state {
            *start = 0;
        }
    }
}

fn unexpected(byte: u8, expected: &str) -> Error {
    Error::Decode(format!(
        "unexpected '{}' in JSON_ARRAY body, expected {}",
        byte.escape_ascii(),
        expected
    ))
}

/// Convert a JSON scalar. Nested arrays and objects keep their JSON text.
pub fn json_to_value(value: serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int64(i)
            } else if let Some(u) = n.as_u64() {
                Value::UInt64(u)
            } else {
                Value::Float64(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_json::Value::String(s) => Value::String(s),
        other => Value::String(other.to_string()),
    }
}

fn to_row(schema: &Arc<[String]>, values: Vec<serde_json::Value>) -> Result<Row> {
    if values.len() != schema.len() {
        return Err(Error::Decode(format!(
            "JSON record has {} values but the schema has {} columns",
            values.len(),
            schema.len()
        )));
    }
    Ok(Row::new(
        Arc::clone(schema),
        values.into_iter().map(json_to_value).collect(),
    ))
}

struct DecodeState {
    body: ByteStream,
    scanner: JsonArrayScanner,
    schema: Arc<[String]>,
}

/// Decode a `JSON_ARRAY` body into rows, pulling body bytes on demand.
pub fn decode_json(body: ByteStream, schema: Arc<[String]>) -> RowStream {
    let state = DecodeState {
        body,
        scanner: JsonArrayScanner::new(),
        schema,
    };

    futures::stream::try_unfold(state, |mut st| async move {
        loop {
            if let Some(values) = st.scanner.next_record()? {
                let row = to_row(&st.schema, values)?;
                return Ok(Some((row, st)));
            }
            match st.body.next().await {
                Some(bytes) => st.scanner.feed(&bytes?),
                None => {
                    st.scanner.finish()?;
                    return Ok(None);
                }
            }
        }
    })
    .boxed()
}
