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

//! Opens chunk downloads and attaches the format decoder.
//!
//! The download is started (response headers received) by [`ChunkDownloader::open`];
//! the body is consumed only as the returned row stream is polled.
//!
//! Every downloader clone shares one [`DownloadStats`], so the counters cover
//! all chunks of a statement.

use crate::client::ExternalLinkClient;
use crate::error::Result;
use crate::reader::{ResultFormat, RowStream};
use crate::types::chunk::ChunkPayload;
use futures::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Per-statement download counters.
#[derive(Debug)]
pub struct DownloadStats {
    started: Instant,
    chunks: AtomicU64,
    bytes: AtomicU64,
    rows: AtomicU64,
}

/// Point-in-time copy of [`DownloadStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadSummary {
    pub chunks: u64,
    pub bytes: u64,
    pub rows: u64,
    pub elapsed: Duration,
}

impl DownloadStats {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            chunks: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
            rows: AtomicU64::new(0),
        }
    }

    pub fn summary(&self) -> DownloadSummary {
        DownloadSummary {
            chunks: self.chunks.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            rows: self.rows.load(Ordering::Relaxed),
            elapsed: self.started.elapsed(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChunkDownloader {
    link_client: Arc<dyn ExternalLinkClient>,
    format: ResultFormat,
    schema: Arc<[String]>,
    stats: Arc<DownloadStats>,
}

impl ChunkDownloader {
    pub fn new(
        link_client: Arc<dyn ExternalLinkClient>,
        format: ResultFormat,
        schema: Arc<[String]>,
    ) -> Self {
        Self {
            link_client,
            format,
            schema,
            stats: Arc::new(DownloadStats::new()),
        }
    }

    pub fn stats(&self) -> &DownloadStats {
        &self.stats
    }

    /// Start downloading `payload` and return its rows.
    pub async fn open(&self, payload: &ChunkPayload) -> Result<RowStream> {
        let start = Instant::now();
        let chunk_index = payload.chunk_index;

        debug!("Opening download of chunk {}", chunk_index);
        let body = self
            .link_client
            .download(payload)
            .await
            .map_err(|e| e.for_chunk(chunk_index))?;
        self.stats.chunks.fetch_add(1, Ordering::Relaxed);
        debug!(
            "Chunk {} responded after {:.3}s",
            chunk_index,
            start.elapsed().as_secs_f64()
        );

        let byte_stats = Arc::clone(&self.stats);
        let body = body
            .inspect(move |frame| {
                if let Ok(bytes) = frame {
                    byte_stats
                        .bytes
                        .fetch_add(bytes.len() as u64, Ordering::Relaxed);
                }
            })
            .boxed();

        let row_stats = Arc::clone(&self.stats);
        let mut rows = 0usize;
        let stream = self
            .format
            .decode(body, Arc::clone(&self.schema))
            .inspect(move |item| match item {
                Ok(_) => {
                    rows += 1;
                    row_stats.rows.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) if !e.is_cancellation() => {
                    debug!("Chunk {} failed after {} rows: {}", chunk_index, rows, e)
                }
                Err(_) => {}
            });

        Ok(stream.boxed())
    }
}
