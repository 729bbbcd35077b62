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

//! Statement execution entry point.
//!
//! [`StatementExecutor::execute`] returns a lazy [`RowStream`]. Nothing is
//! sent to the service until the stream is first polled. Once polled, the
//! statement is submitted and polled to completion, then its chunks are
//! resolved, downloaded and decoded either one at a time
//! ([`sequential`]) or concurrently with in-order delivery ([`parallel`]).
//!
//! ## Pipeline
//!
//! ```text
//! [StatementProtocol] --manifest--> [ChunkResolver] --link--> [ChunkDownloader] --> rows
//! ```
//!
//! Every stage observes the caller's `CancellationToken`. A cancelled stream
//! yields `Error::Cancelled` once and then ends.

pub mod parallel;
pub mod sequential;

use crate::auth::AuthProvider;
use crate::client::{
    DatabricksClient, DatabricksHttpClient, ExternalLinkClient, SeaClient, SeaLinkClient,
};
use crate::config::ExecutorConfig;
use crate::error::{Error, Result};
use crate::health::HealthCheck;
use crate::logging::init_logging;
use crate::materialize::{MaterializeStrategy, Materializer, TypedRecord};
use crate::protocol::StatementProtocol;
use crate::reader::{ChunkDownloader, ChunkResolver, ResultFormat, RowStream};
use crate::statement::Statement;
use crate::types::chunk::Manifest;
use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Per-call execution choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryOptions {
    pub format: ResultFormat,
    /// Download chunks concurrently, bounded by `max_buffered_chunks`.
    pub parallel: bool,
}

impl QueryOptions {
    /// Arrow results with concurrent chunk downloads.
    pub fn arrow_parallel() -> Self {
        Self {
            format: ResultFormat::ArrowStream,
            parallel: true,
        }
    }

    pub fn with_format(mut self, format: ResultFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_parallel_download(mut self) -> Self {
        self.parallel = true;
        self
    }
}

/// Everything needed to turn a manifest's chunks into rows.
#[derive(Debug, Clone)]
pub(crate) struct ChunkContext {
    pub manifest: Manifest,
    pub resolver: ChunkResolver,
    pub downloader: ChunkDownloader,
}

impl ChunkContext {
    fn new(
        manifest: Manifest,
        client: Arc<dyn DatabricksClient>,
        link_client: Arc<dyn ExternalLinkClient>,
        format: ResultFormat,
    ) -> Self {
        let resolver = ChunkResolver::new(client, manifest.statement_id.clone());
        let downloader = ChunkDownloader::new(link_client, format, Arc::clone(&manifest.schema));
        Self {
            manifest,
            resolver,
            downloader,
        }
    }

    /// Log the download counters once every chunk has been consumed.
    fn finish(&self) {
        let summary = self.downloader.stats().summary();
        info!(
            "Statement {} read: {} rows from {} chunks, {} bytes in {:.3}s",
            self.manifest.statement_id,
            summary.rows,
            summary.chunks,
            summary.bytes,
            summary.elapsed.as_secs_f64()
        );
    }
}

/// Executes SQL statements against one warehouse.
#[derive(Debug, Clone)]
pub struct StatementExecutor {
    client: Arc<dyn DatabricksClient>,
    link_client: Arc<dyn ExternalLinkClient>,
    config: ExecutorConfig,
}

impl StatementExecutor {
    /// Build an executor talking to the configured workspace over HTTPS.
    ///
    /// Statement API calls carry the auth header. Chunk downloads go to
    /// pre-signed URLs and are sent without it.
    pub fn new(config: ExecutorConfig, auth_provider: Arc<dyn AuthProvider>) -> Result<Self> {
        config.validate()?;
        init_logging(&config.log);

        let http_client = Arc::new(DatabricksHttpClient::new(
            config.http.clone(),
            auth_provider,
        )?);
        let client: Arc<dyn DatabricksClient> = Arc::new(SeaClient::new(
            http_client,
            config.workspace_url.trim_end_matches('/'),
        ));

        let download_client = Arc::new(DatabricksHttpClient::unauthenticated(config.http.clone())?);
        let link_client: Arc<dyn ExternalLinkClient> =
            Arc::new(SeaLinkClient::new(download_client));

        info!(
            "Created statement executor for warehouse {} at {}",
            config.warehouse_id, config.workspace_url
        );
        Ok(Self {
            client,
            link_client,
            config,
        })
    }

    /// Build an executor over caller-supplied clients.
    pub fn with_clients(
        config: ExecutorConfig,
        client: Arc<dyn DatabricksClient>,
        link_client: Arc<dyn ExternalLinkClient>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            client,
            link_client,
            config,
        })
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Execute a statement and stream its rows.
    pub fn execute(
        &self,
        statement: impl Into<Statement>,
        options: QueryOptions,
        cancel: CancellationToken,
    ) -> RowStream {
        let statement = statement.into();
        let protocol = StatementProtocol::new(Arc::clone(&self.client), &self.config);
        let client = Arc::clone(&self.client);
        let link_client = Arc::clone(&self.link_client);
        let max_buffered_chunks = self.config.max_buffered_chunks;
        let token = cancel.clone();

        let rows = stream::once(async move {
            let manifest = protocol.run(&statement, options.format, &token).await?;
            if manifest.is_empty() {
                debug!(
                    "Statement {} returned no rows, skipping chunk retrieval",
                    manifest.statement_id
                );
                return Ok::<RowStream, Error>(stream::empty().boxed());
            }

            let context = ChunkContext::new(manifest, client, link_client, options.format);
            Ok(if options.parallel {
                parallel::read_chunks(context, max_buffered_chunks, token)
            } else {
                sequential::read_chunks(context)
            })
        })
        .try_flatten();

        with_cancellation(rows.boxed(), cancel)
    }

    /// Execute a statement and map every row onto `T`.
    pub fn execute_typed<T: TypedRecord>(
        &self,
        statement: impl Into<Statement>,
        options: QueryOptions,
        strategy: MaterializeStrategy,
        cancel: CancellationToken,
    ) -> BoxStream<'static, Result<T>> {
        let mut materializer = Materializer::<T>::new(strategy);
        let records = self
            .execute(statement, options, cancel)
            .map(move |row| row.and_then(|row| materializer.materialize(&row)));
        fuse_on_error(records.boxed())
    }

    /// Warehouse health probe bound to this executor's client.
    pub fn health_check(&self) -> HealthCheck {
        HealthCheck::new(
            Arc::clone(&self.client),
            self.config.warehouse_id.clone(),
            self.config.health,
        )
    }
}

/// End `inner` with `Error::Cancelled` as soon as `cancel` fires, and after
/// the first error in general.
pub(crate) fn with_cancellation(inner: RowStream, cancel: CancellationToken) -> RowStream {
    stream::unfold(Some((inner, cancel)), |state| async move {
        let (mut inner, cancel) = state?;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Row stream cancelled by caller");
                Some((Err(Error::Cancelled), None))
            }
            item = inner.next() => match item {
                Some(Ok(row)) => Some((Ok(row), Some((inner, cancel)))),
                Some(Err(e)) => Some((Err(e), None)),
                None => None,
            },
        }
    })
    .boxed()
}

fn fuse_on_error<T: Send + 'static>(
    inner: BoxStream<'static, Result<T>>,
) -> BoxStream<'static, Result<T>> {
    stream::unfold(Some(inner), |state| async move {
        let mut inner = state?;
        match inner.next().await? {
            Ok(item) => Some((Ok(item), Some(inner))),
            Err(e) => Some((Err(e), None)),
        }
    })
    .boxed()
}
