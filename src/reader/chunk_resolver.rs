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

//! Statement-scoped resolution of chunk indices to download links.
//!
//! Wraps a `DatabricksClient` and binds it to one statement. Each call makes
//! one `GET .../result/chunks/{chunk_index}?row_offset={row_offset}` request
//! and keeps the first external link. A chunk without links holds no rows.

use crate::client::DatabricksClient;
use crate::error::Result;
use crate::types::chunk::{ChunkDescriptor, ChunkPayload};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct ChunkResolver {
    client: Arc<dyn DatabricksClient>,
    statement_id: String,
}

impl ChunkResolver {
    pub fn new(client: Arc<dyn DatabricksClient>, statement_id: impl Into<String>) -> Self {
        Self {
            client,
            statement_id: statement_id.into(),
        }
    }

    /// Resolve a chunk. `Ok(None)` means the chunk is empty and must be skipped.
    pub async fn resolve(&self, chunk: &ChunkDescriptor) -> Result<Option<ChunkPayload>> {
        let response = self
            .client
            .get_result_chunk(&self.statement_id, chunk.chunk_index, chunk.row_offset)
            .await
            .map_err(|e| e.for_chunk(chunk.chunk_index))?;

        let Some(link) = response
            .external_links
            .as_ref()
            .and_then(|links| links.first())
        else {
            debug!(
                "Chunk {} of statement {} has no external links, skipping",
                chunk.chunk_index, self.statement_id
            );
            return Ok(None);
        };

        let payload = ChunkPayload::from_external_link(chunk.chunk_index, link);
        if payload.is_expired() {
            warn!(
                "Link for chunk {} of statement {} already expired at {:?}",
                chunk.chunk_index, self.statement_id, payload.expiration
            );
        }

        debug!(
            "Resolved chunk {} of statement {} (row_offset={}, rows={:?})",
            chunk.chunk_index, self.statement_id, chunk.row_offset, chunk.row_count
        );
        Ok(Some(payload))
    }
}
