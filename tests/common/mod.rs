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

//! Shared mocks for the integration tests.
//!
//! `ScriptedClient` plays back a list of statement states and serves chunk
//! links; `FixtureLinkClient` serves per-chunk bodies with optional latency.
//! Bodies are generated for a small fixed table:
//!
//! | column | JSON_ARRAY      | ARROW_STREAM            |
//! |--------|-----------------|-------------------------|
//! | id     | "42"            | Int64                   |
//! | name   | "user_42"/null  | Utf8 (null every 7th)   |
//! | amount | "4.20"          | Decimal128(10, 2)       |
//! | ts     | "...T00:00:42Z" | Timestamp(us, UTC)      |
//! | day    | "2024-01-01"    | Date32                  |
//! | flag   | "true"          | Boolean                 |

#![allow(dead_code)]

use arrow_array::builder::{
    BooleanBuilder, Date32Builder, Decimal128Builder, Int64Builder, StringBuilder,
    TimestampMicrosecondBuilder,
};
use arrow_array::{ArrayRef, RecordBatch};
use arrow_ipc::writer::StreamWriter;
use arrow_schema::{DataType, Field, Schema, TimeUnit};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{Duration as ChronoDuration, NaiveDate, TimeZone, Utc};
use databricks_sql_executor::client::{ByteStream, DatabricksClient, ExternalLinkClient};
use databricks_sql_executor::config::{ExecutorConfig, PollConfig};
use databricks_sql_executor::error::{Error, Phase, Result};
use databricks_sql_executor::types::chunk::ChunkPayload;
use databricks_sql_executor::types::sea::{
    ChunkInfo, ColumnInfo, ExecuteStatementRequest, ExternalLink, GetChunksResponse,
    ResultManifest, ResultSchema, ServiceError, StatementExecutionResponse, StatementStatus,
    WarehouseInfo,
};
use databricks_sql_executor::ResultFormat;
use futures::StreamExt;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const STATEMENT_ID: &str = "01ef-test-statement";
pub const COLUMNS: [&str; 6] = ["id", "name", "amount", "ts", "day", "flag"];

// =============================================================================
// Fixture data
// =============================================================================

fn name_of(id: i64) -> Option<String> {
    (id % 7 != 3).then(|| format!("user_{}", id))
}

fn ts_micros(id: i64) -> i64 {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    (base + ChronoDuration::seconds(id)).timestamp_micros()
}

fn day_of(id: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + ChronoDuration::days(id % 30)
}

/// Text form of row `id` as the JSON_ARRAY format returns it.
pub fn expected_text(id: i64) -> Vec<Option<String>> {
    let ts = Utc.timestamp_micros(ts_micros(id)).unwrap();
    vec![
        Some(id.to_string()),
        name_of(id),
        Some(format!("{}.{:02}", (id * 10) / 100, (id * 10) % 100)),
        Some(ts.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)),
        Some(day_of(id).format("%Y-%m-%d").to_string()),
        Some((id % 2 == 0).to_string()),
    ]
}

pub fn json_body(rows: std::ops::Range<i64>) -> Bytes {
    let rows: Vec<Vec<Option<String>>> = rows.map(expected_text).collect();
    Bytes::from(serde_json::to_vec(&rows).unwrap())
}

fn arrow_batch(rows: std::ops::Range<i64>) -> RecordBatch {
    let mut id = Int64Builder::new();
    let mut name = StringBuilder::new();
    let mut amount = Decimal128Builder::new().with_precision_and_scale(10, 2).unwrap();
    let mut ts = TimestampMicrosecondBuilder::new().with_timezone("UTC");
    let mut day = Date32Builder::new();
    let mut flag = BooleanBuilder::new();

    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
    for row in rows {
        id.append_value(row);
        name.append_option(name_of(row));
        amount.append_value((row * 10) as i128);
        ts.append_value(ts_micros(row));
        day.append_value((day_of(row) - epoch).num_days() as i32);
        flag.append_value(row % 2 == 0);
    }

    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("name", DataType::Utf8, true),
        Field::new("amount", DataType::Decimal128(10, 2), false),
        Field::new(
            "ts",
            DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
            false,
        ),
        Field::new("day", DataType::Date32, false),
        Field::new("flag", DataType::Boolean, false),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(id.finish()),
        Arc::new(name.finish()),
        Arc::new(amount.finish()),
        Arc::new(ts.finish()),
        Arc::new(day.finish()),
        Arc::new(flag.finish()),
    ];
    RecordBatch::try_new(schema, columns).unwrap()
}

/// Arrow IPC stream with the rows split into batches of at most 16.
pub fn arrow_body(rows: std::ops::Range<i64>) -> Bytes {
    let first = arrow_batch(rows.start..rows.start);
    let mut buf = Vec::new();
    {
        let mut writer = StreamWriter::try_new(&mut buf, &first.schema()).unwrap();
        let mut start = rows.start;
        while start < rows.end {
            let end = (start + 16).min(rows.end);
            writer.write(&arrow_batch(start..end)).unwrap();
            start = end;
        }
        writer.finish().unwrap();
    }
    Bytes::from(buf)
}

pub fn body(format: ResultFormat, rows: std::ops::Range<i64>) -> Bytes {
    match format {
        ResultFormat::JsonArray => json_body(rows),
        ResultFormat::ArrowStream => arrow_body(rows),
    }
}

/// Manifest for chunks of the given sizes.
pub fn manifest(chunk_rows: &[i64]) -> ResultManifest {
    let mut offset = 0;
    let chunks = chunk_rows
        .iter()
        .enumerate()
        .map(|(index, rows)| {
            let chunk = ChunkInfo {
                chunk_index: index as i64,
                row_offset: offset,
                row_count: Some(*rows),
                byte_count: Some(rows * 64),
            };
            offset += rows;
            chunk
        })
        .collect::<Vec<_>>();

    ResultManifest {
        format: None,
        schema: ResultSchema {
            column_count: Some(COLUMNS.len() as i32),
            columns: COLUMNS
                .iter()
                .enumerate()
                .map(|(position, name)| ColumnInfo {
                    name: name.to_string(),
                    type_name: None,
                    type_text: None,
                    position: Some(position as i32),
                })
                .collect(),
        },
        total_chunk_count: Some(chunks.len() as i64),
        total_row_count: Some(offset),
        total_byte_count: None,
        truncated: false,
        chunks: Some(chunks),
    }
}

pub fn config() -> ExecutorConfig {
    ExecutorConfig::new("https://test.cloud.databricks.com", "wh-1").with_poll(PollConfig {
        initial_delay: Duration::from_secs(1),
        max_total_wait: Duration::from_secs(600),
    })
}

// =============================================================================
// Mock DatabricksClient
// =============================================================================

/// Plays back statement states: the first for submit, the rest for polls.
/// The last state repeats once the script runs out.
#[derive(Debug)]
pub struct ScriptedClient {
    states: Mutex<VecDeque<&'static str>>,
    last_state: Mutex<&'static str>,
    manifest: ResultManifest,
    /// Per chunk: whether the chunk endpoint returns a link.
    has_link: Vec<bool>,
    failing_chunk: Option<i64>,
    warehouse_down: bool,
    pub submits: AtomicUsize,
    pub polls: AtomicUsize,
    pub chunk_calls: AtomicUsize,
    pub cancels: AtomicUsize,
    pub warehouse_calls: AtomicUsize,
    pub requests: Mutex<Vec<ExecuteStatementRequest>>,
}

impl ScriptedClient {
    pub fn new(states: &[&'static str], manifest: ResultManifest) -> Self {
        let chunks = manifest.chunks.as_ref().map(|c| c.len()).unwrap_or(0);
        Self {
            states: Mutex::new(states.iter().copied().collect()),
            last_state: Mutex::new("PENDING"),
            manifest,
            has_link: vec![true; chunks],
            failing_chunk: None,
            warehouse_down: false,
            submits: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
            chunk_calls: AtomicUsize::new(0),
            cancels: AtomicUsize::new(0),
            warehouse_calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding(chunk_rows: &[i64]) -> Self {
        Self::new(&["SUCCEEDED"], manifest(chunk_rows))
    }

    pub fn without_link(mut self, chunk_index: usize) -> Self {
        self.has_link[chunk_index] = false;
        self
    }

    pub fn with_failing_chunk(mut self, chunk_index: i64) -> Self {
        self.failing_chunk = Some(chunk_index);
        self
    }

    pub fn with_warehouse_down(mut self) -> Self {
        self.warehouse_down = true;
        self
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn next_response(&self) -> StatementExecutionResponse {
        let state = {
            let mut states = self.states.lock().unwrap();
            let mut last = self.last_state.lock().unwrap();
            if let Some(state) = states.pop_front() {
                *last = state;
            }
            *last
        };

        let error = matches!(state, "FAILED" | "CANCELED" | "CLOSED").then(|| ServiceError {
            error_code: Some("BAD_REQUEST".to_string()),
            message: Some(format!("statement ended as {}", state)),
        });

        StatementExecutionResponse {
            statement_id: STATEMENT_ID.to_string(),
            status: StatementStatus {
                state: state.to_string(),
                error,
            },
            manifest: (state == "SUCCEEDED").then(|| self.manifest.clone()),
        }
    }
}

#[async_trait]
impl DatabricksClient for ScriptedClient {
    async fn execute_statement(
        &self,
        request: &ExecuteStatementRequest,
    ) -> Result<StatementExecutionResponse> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        Ok(self.next_response())
    }

    async fn get_statement_status(
        &self,
        _statement_id: &str,
    ) -> Result<StatementExecutionResponse> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        Ok(self.next_response())
    }

    async fn get_result_chunk(
        &self,
        statement_id: &str,
        chunk_index: i64,
        row_offset: i64,
    ) -> Result<GetChunksResponse> {
        self.chunk_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_chunk == Some(chunk_index) {
            return Err(Error::Transport {
                phase: Phase::ChunkMetadata,
                status: Some(500),
                chunk_index: None,
                message: "internal error".to_string(),
            });
        }

        let links = self
            .has_link
            .get(chunk_index as usize)
            .copied()
            .unwrap_or(false)
            .then(|| {
                vec![ExternalLink {
                    external_link: link_url(statement_id, chunk_index),
                    expiration: Some((Utc::now() + ChronoDuration::minutes(15)).to_rfc3339()),
                    chunk_index: Some(chunk_index),
                    row_offset: Some(row_offset),
                    row_count: None,
                    byte_count: None,
                    http_headers: None,
                }]
            });

        Ok(GetChunksResponse {
            chunk_index: Some(chunk_index),
            row_offset: Some(row_offset),
            row_count: None,
            external_links: links,
        })
    }

    async fn cancel_statement(&self, _statement_id: &str) -> Result<()> {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_warehouse(&self, warehouse_id: &str) -> Result<WarehouseInfo> {
        self.warehouse_calls.fetch_add(1, Ordering::SeqCst);
        if self.warehouse_down {
            return Err(Error::Transport {
                phase: Phase::HealthCheck,
                status: Some(503),
                chunk_index: None,
                message: "warehouse unavailable".to_string(),
            });
        }
        Ok(WarehouseInfo {
            id: Some(warehouse_id.to_string()),
            state: Some("RUNNING".to_string()),
        })
    }
}

pub fn link_url(statement_id: &str, chunk_index: i64) -> String {
    format!(
        "https://storage.example.com/{}/chunk{}",
        statement_id, chunk_index
    )
}

// =============================================================================
// Mock ExternalLinkClient
// =============================================================================

struct ActiveGuard(Arc<AtomicUsize>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Serves chunk bodies in 32-byte frames after a per-chunk delay.
#[derive(Debug, Default)]
pub struct FixtureLinkClient {
    bodies: HashMap<i64, Bytes>,
    delays: HashMap<i64, Duration>,
    failing_chunk: Option<i64>,
    pub downloads: AtomicUsize,
    active: Arc<AtomicUsize>,
    pub max_active: AtomicUsize,
}

impl FixtureLinkClient {
    /// Bodies for consecutive chunks of the given sizes.
    pub fn new(format: ResultFormat, chunk_rows: &[i64]) -> Self {
        let mut bodies = HashMap::new();
        let mut offset = 0;
        for (index, rows) in chunk_rows.iter().enumerate() {
            bodies.insert(index as i64, body(format, offset..offset + rows));
            offset += rows;
        }
        Self {
            bodies,
            ..Default::default()
        }
    }

    pub fn with_delays(mut self, delays_ms: &[u64]) -> Self {
        for (index, ms) in delays_ms.iter().enumerate() {
            self.delays
                .insert(index as i64, Duration::from_millis(*ms));
        }
        self
    }

    pub fn with_failing_chunk(mut self, chunk_index: i64) -> Self {
        self.failing_chunk = Some(chunk_index);
        self
    }

    pub fn with_body(mut self, chunk_index: i64, body: Bytes) -> Self {
        self.bodies.insert(chunk_index, body);
        self
    }
}

#[async_trait]
impl ExternalLinkClient for FixtureLinkClient {
    async fn download(&self, payload: &ChunkPayload) -> Result<ByteStream> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        let guard = ActiveGuard(Arc::clone(&self.active));

        if let Some(delay) = self.delays.get(&payload.chunk_index) {
            tokio::time::sleep(*delay).await;
        }

        if self.failing_chunk == Some(payload.chunk_index) {
            return Err(Error::Transport {
                phase: Phase::ExternalDownload,
                status: Some(403),
                chunk_index: None,
                message: "link expired".to_string(),
            });
        }

        let body = self.bodies.get(&payload.chunk_index).cloned().unwrap_or_default();
        let frames: Vec<Result<Bytes>> = body
            .chunks(32)
            .map(|frame| Ok(Bytes::copy_from_slice(frame)))
            .collect();

        Ok(futures::stream::iter(frames)
            .map(move |frame| {
                let _held = &guard;
                frame
            })
            .boxed())
    }
}
