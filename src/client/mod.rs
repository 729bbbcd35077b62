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

//! Client implementations for communicating with Databricks SQL endpoints.
//!
//! This module provides:
//! - `DatabricksClient` trait: control-plane calls of the Statement Execution API
//! - `ExternalLinkClient` trait: streaming download of pre-signed chunk links
//! - `DatabricksHttpClient`: Low-level HTTP client (reqwest)
//! - `SeaClient`: REST implementation of both traits

pub mod http;
pub mod sea;

use crate::error::Result;
use crate::types::chunk::ChunkPayload;
use crate::types::sea::{
    ExecuteStatementRequest, GetChunksResponse, StatementExecutionResponse, WarehouseInfo,
};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

pub use http::{DatabricksHttpClient, HttpClientConfig};
pub use sea::{SeaClient, SeaLinkClient};

/// Body of a chunk download, delivered as it arrives.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Control-plane operations the executor depends on.
///
/// Implementations map non-success HTTP responses to `Error::Transport`
/// tagged with the matching phase, and do not retry.
#[async_trait]
pub trait DatabricksClient: Send + Sync + std::fmt::Debug {
    /// Submit a statement (`POST /statements`).
    async fn execute_statement(
        &self,
        request: &ExecuteStatementRequest,
    ) -> Result<StatementExecutionResponse>;

    /// Poll statement status (`GET /statements/{id}`).
    async fn get_statement_status(&self, statement_id: &str) -> Result<StatementExecutionResponse>;

    /// Fetch the external links of one result chunk.
    async fn get_result_chunk(
        &self,
        statement_id: &str,
        chunk_index: i64,
        row_offset: i64,
    ) -> Result<GetChunksResponse>;

    /// Ask the service to cancel a running statement.
    async fn cancel_statement(&self, statement_id: &str) -> Result<()>;

    /// Fetch warehouse details (`GET /warehouses/{id}`).
    async fn get_warehouse(&self, warehouse_id: &str) -> Result<WarehouseInfo>;
}

/// Downloads chunk bodies from pre-signed URLs, without the bearer token.
#[async_trait]
pub trait ExternalLinkClient: Send + Sync + std::fmt::Debug {
    /// Start the download. The returned stream yields body bytes lazily;
    /// dropping it closes the connection.
    async fn download(&self, payload: &ChunkPayload) -> Result<ByteStream>;
}
