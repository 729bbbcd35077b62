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

//! Databricks SQL Statement Execution for Rust
//!
//! This crate submits SQL statements to a Databricks SQL warehouse through
//! the Statement Execution API and streams the results back as rows.
//!
//! ## Overview
//!
//! - [`StatementExecutor`] - Entry point; owns the HTTP clients and configuration
//! - [`Statement`] - SQL text plus named parameters
//! - [`RowStream`] - Lazy, cancellable stream of [`Row`]s
//! - [`materialize`] - Mapping of rows onto caller-defined record types
//!
//! ## Features
//!
//! - **External links**: Results are fetched chunk by chunk from pre-signed URLs
//! - **Two formats**: `JSON_ARRAY` and Arrow IPC (`ARROW_STREAM`) decode to the same rows
//! - **Parallel download**: Bounded concurrent chunk retrieval with in-order delivery
//!
//! ## Example
//!
//! ```ignore
//! use databricks_sql_executor::{
//!     ExecutorConfig, PersonalAccessToken, QueryOptions, Statement, StatementExecutor,
//! };
//! use futures::TryStreamExt;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! let config = ExecutorConfig::new("https://my-workspace.databricks.com", "abc123");
//! let executor = StatementExecutor::new(config, Arc::new(PersonalAccessToken::new("dapi...")))?;
//!
//! let rows: Vec<_> = executor
//!     .execute("SELECT * FROM my_table", QueryOptions::default(), CancellationToken::new())
//!     .try_collect()
//!     .await?;
//! ```
//!
//! ## Configuration Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `databricks.workspace_url` | | Workspace URL |
//! | `databricks.warehouse_id` | | SQL warehouse ID |
//! | `databricks.http_path` | | SQL warehouse HTTP path (extracts warehouse_id) |
//! | `databricks.timeout_in_seconds` | 30 | Server-side `wait_timeout` (0 or 5..=50) |
//! | `databricks.max_buffered_chunks` | 0 | Parallel download bound (0 = unbounded) |
//! | `databricks.poll.initial_delay_ms` | 1000 | First poll delay, doubled each poll |
//! | `databricks.poll.max_wait_secs` | 600 | Total poll wait budget |
//! | `databricks.health_check.start_hour` | 6 | First UTC hour of the probe window |
//! | `databricks.health_check.end_hour` | 20 | Last UTC hour of the probe window |
//! | `databricks.http.connect_timeout_ms` | 30000 | Connect timeout |
//! | `databricks.http.read_timeout_ms` | 60000 | Per-request timeout for API calls |
//! | `databricks.log_level` | | Crate log level (`off` disables) |
//! | `databricks.log_file` | | Append logs to this file instead of stderr |

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod health;
pub mod logging;
pub mod materialize;
pub mod protocol;
pub mod reader;
pub mod statement;
pub mod types;

// Re-export main types
pub use auth::{AuthProvider, PersonalAccessToken};
pub use config::{ExecutorConfig, PollConfig};
pub use error::{Error, Phase, Result};
pub use executor::{QueryOptions, StatementExecutor};
pub use health::{HealthCheck, HealthCheckConfig, HealthStatus};
pub use materialize::{MaterializeStrategy, RecordShape, SlotType, TypedRecord};
pub use reader::{ResultFormat, RowStream};
pub use statement::{ParameterType, QueryParameter, Statement};
pub use types::row::{Decimal128, Row, Value, ValueKind};

// Re-export client types for advanced users
pub use client::{DatabricksClient, DatabricksHttpClient, ExternalLinkClient, HttpClientConfig};
