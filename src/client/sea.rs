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

//! SEA (Statement Execution API) client implementation.
//!
//! `SeaClient` implements the control-plane `DatabricksClient` trait against
//! the REST endpoints under `{host}/api/2.0/sql`. `SeaLinkClient` implements
//! `ExternalLinkClient` for pre-signed chunk URLs.

use crate::client::{ByteStream, DatabricksClient, DatabricksHttpClient, ExternalLinkClient};
use crate::error::{Error, Phase, Result};
use crate::types::chunk::ChunkPayload;
use crate::types::sea::{
    ExecuteStatementRequest, GetChunksResponse, StatementExecutionResponse, WarehouseInfo,
};
use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::{Method, Response};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;

/// SEA client for the Databricks SQL Statement Execution API.
#[derive(Debug)]
pub struct SeaClient {
    http_client: Arc<DatabricksHttpClient>,
    host: String,
}

impl SeaClient {
    /// Create a new SEA client. `host` is the workspace URL, e.g.
    /// `https://adb-123.azuredatabricks.net`.
    pub fn new(http_client: Arc<DatabricksHttpClient>, host: impl Into<String>) -> Self {
        Self {
            http_client,
            host: host.into(),
        }
    }

    /// Build the base URL for API requests.
    fn base_url(&self) -> String {
        format!("{}/api/2.0/sql", self.host.trim_end_matches('/'))
    }

    fn build(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        self.http_client.inner().request(method, url)
    }

    async fn read_json<T: DeserializeOwned>(
        phase: Phase,
        response: Response,
        what: &str,
    ) -> Result<T> {
        let body = response.text().await.map_err(|e| {
            Error::transport(phase, format!("Failed to read {} response: {}", what, e))
        })?;

        serde_json::from_str(&body).map_err(|e| {
            Error::Protocol(format!(
                "Failed to parse {} response: {} - body: {}",
                what, e, body
            ))
        })
    }
}

fn build_error(phase: Phase, e: reqwest::Error) -> Error {
    Error::transport(phase, format!("Failed to build request: {}", e))
}

#[async_trait]
impl DatabricksClient for SeaClient {
    async fn execute_statement(
        &self,
        request_body: &ExecuteStatementRequest,
    ) -> Result<StatementExecutionResponse> {
        let url = format!("{}/statements", self.base_url());

        debug!(
            "Executing statement at {} (format={}, {} parameters)",
            url,
            request_body.format,
            request_body.parameters.len()
        );

        let request = self
            .build(Method::POST, &url)
            .header("Content-Type", "application/json")
            .json(request_body)
            .build()
            .map_err(|e| build_error(Phase::Submit, e))?;

        let response = self.http_client.execute(Phase::Submit, request).await?;
        let sea_response: StatementExecutionResponse =
            Self::read_json(Phase::Submit, response, "execute").await?;

        debug!(
            "Execute response: statement_id={}, state={}",
            sea_response.statement_id, sea_response.status.state
        );

        Ok(sea_response)
    }

    async fn get_statement_status(&self, statement_id: &str) -> Result<StatementExecutionResponse> {
        let url = format!("{}/statements/{}", self.base_url(), statement_id);

        debug!("Getting statement status at {}", url);

        let request = self
            .build(Method::GET, &url)
            .build()
            .map_err(|e| build_error(Phase::Poll, e))?;

        let response = self.http_client.execute(Phase::Poll, request).await?;
        let sea_response: StatementExecutionResponse =
            Self::read_json(Phase::Poll, response, "status").await?;

        debug!(
            "Status response: statement_id={}, state={}",
            sea_response.statement_id, sea_response.status.state
        );

        Ok(sea_response)
    }

    async fn get_result_chunk(
        &self,
        statement_id: &str,
        chunk_index: i64,
        row_offset: i64,
    ) -> Result<GetChunksResponse> {
        let url = format!(
            "{}/statements/{}/result/chunks/{}",
            self.base_url(),
            statement_id,
            chunk_index
        );

        debug!("Getting result chunk at {} (row_offset={})", url, row_offset);

        let request = self
            .build(Method::GET, &url)
            .query(&[("row_offset", row_offset)])
            .build()
            .map_err(|e| build_error(Phase::ChunkMetadata, e).for_chunk(chunk_index))?;

        let response = self
            .http_client
            .execute(Phase::ChunkMetadata, request)
            .await
            .map_err(|e| e.for_chunk(chunk_index))?;

        Self::read_json(Phase::ChunkMetadata, response, "chunks")
            .await
            .map_err(|e| e.for_chunk(chunk_index))
    }

    async fn cancel_statement(&self, statement_id: &str) -> Result<()> {
        let url = format!("{}/statements/{}/cancel", self.base_url(), statement_id);

        debug!("Canceling statement at {}", url);

        let request = self
            .build(Method::POST, &url)
            .build()
            .map_err(|e| build_error(Phase::Cancel, e))?;

        self.http_client.execute(Phase::Cancel, request).await?;

        debug!("Canceled statement: {}", statement_id);

        Ok(())
    }

    async fn get_warehouse(&self, warehouse_id: &str) -> Result<WarehouseInfo> {
        let url = format!("{}/warehouses/{}", self.base_url(), warehouse_id);

        debug!("Checking warehouse at {}", url);

        let request = self
            .build(Method::GET, &url)
            .build()
            .map_err(|e| build_error(Phase::HealthCheck, e))?;

        let response = self.http_client.execute(Phase::HealthCheck, request).await?;
        Self::read_json(Phase::HealthCheck, response, "warehouse").await
    }
}

/// Downloads pre-signed chunk links with an unauthenticated client.
#[derive(Debug)]
pub struct SeaLinkClient {
    http_client: Arc<DatabricksHttpClient>,
}

impl SeaLinkClient {
    pub fn new(http_client: Arc<DatabricksHttpClient>) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl ExternalLinkClient for SeaLinkClient {
    async fn download(&self, payload: &ChunkPayload) -> Result<ByteStream> {
        let chunk_index = payload.chunk_index;

        // Build request with custom headers from the link
        let mut request_builder = self.http_client.inner().request(Method::GET, &payload.url);
        for (key, value) in &payload.http_headers {
            request_builder = request_builder.header(key, value);
        }

        let request = request_builder
            .build()
            .map_err(|e| build_error(Phase::ExternalDownload, e).for_chunk(chunk_index))?;

        let response = self
            .http_client
            .execute_without_auth(Phase::ExternalDownload, request)
            .await
            .map_err(|e| e.for_chunk(chunk_index))?;

        let stream = response.bytes_stream().map_err(move |e| {
            Error::transport(
                Phase::ExternalDownload,
                format!("Failed to read download body: {}", e),
            )
            .for_chunk(chunk_index)
        });

        Ok(Box::pin(stream))
    }
}
