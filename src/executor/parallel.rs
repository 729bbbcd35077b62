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

//! Concurrent chunk retrieval with in-order delivery.
//!
//! ## Pipeline Architecture
//!
//! ```text
//! [Dispatcher] --spawn--> [Chunk tasks] --(index, rows)--> reorder buffer --> [Consumer]
//!      ^                                                                        |
//!      +------------------------ permits released on drain ---------------------+
//! ```
//!
//! The dispatcher takes one semaphore permit per chunk, in index order, and
//! spawns a task that resolves and opens the chunk. The opened row stream
//! carries its permit, so a permit is held from dispatch until the consumer
//! has drained that chunk. With `max_buffered_chunks = N` at most N chunks
//! are in flight or waiting in the buffer. `0` lifts the bound.
//!
//! The consumer keeps out-of-order arrivals in a `BTreeMap` keyed by chunk
//! index and only ever yields from `next_chunk`. Since permits are taken in
//! index order, the chunk the consumer waits for always already holds one.
//!
//! Downloads start as soon as the statement succeeds rather than when rows
//! are requested, which trades laziness for throughput.
//!
//! ## Failure
//!
//! A failing chunk task publishes its error under its own index and the
//! dispatcher stops handing out chunks past it. Earlier chunks keep going,
//! so the consumer yields every row before the failed chunk and then the
//! error, exactly as the sequential reader would. A panicked task has no
//! index and ends the stream at once. Dropping the stream cancels every
//! outstanding task.

use crate::error::{Error, Result};
use crate::executor::ChunkContext;
use crate::protocol::cancellable;
use crate::reader::RowStream;
use crate::types::chunk::ChunkDescriptor;
use futures::stream;
use futures::StreamExt;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, trace};

enum Delivery {
    Chunk(i64, Result<RowStream>),
    /// A chunk task died without reporting its index.
    Fatal(Error),
}

pub(crate) fn read_chunks(
    context: ChunkContext,
    max_buffered_chunks: usize,
    cancel: CancellationToken,
) -> RowStream {
    let total_chunks = context.manifest.chunks.len();
    let width = if max_buffered_chunks == 0 {
        total_chunks.max(1)
    } else {
        max_buffered_chunks
    };
    debug!(
        "Reading {} chunks of statement {} with up to {} in flight",
        total_chunks, context.manifest.statement_id, width
    );

    let (result_tx, result_rx) = mpsc::unbounded_channel::<Delivery>();
    let child = cancel.child_token();
    let context = Arc::new(context);

    tokio::spawn(dispatch(
        Arc::clone(&context),
        Arc::new(Semaphore::new(width)),
        Arc::new(AtomicI64::new(i64::MAX)),
        result_tx,
        child.clone(),
    ));

    let state = ReorderBuffer {
        context,
        result_rx,
        pending: BTreeMap::new(),
        next_chunk: 0,
        total_chunks: total_chunks as i64,
        current: None,
        _guard: child.drop_guard(),
    };

    stream::try_unfold(state, |mut state| async move {
        loop {
            state.collect_ready()?;

            if let Some(rows) = state.current.as_mut() {
                match rows.next().await {
                    Some(row) => return Ok(Some((row?, state))),
                    None => {
                        trace!("Chunk {} drained", state.next_chunk);
                        state.current = None;
                        state.next_chunk += 1;
                        continue;
                    }
                }
            }

            if state.next_chunk >= state.total_chunks {
                state.context.finish();
                return Ok(None);
            }

            if let Some(opened) = state.pending.remove(&state.next_chunk) {
                state.current = Some(opened?);
                continue;
            }

            match state.result_rx.recv().await {
                Some(delivery) => state.accept(delivery)?,
                None => {
                    return Err(Error::Protocol(format!(
                        "chunk {} was never delivered",
                        state.next_chunk
                    )))
                }
            }
        }
    })
    .boxed()
}

struct ReorderBuffer {
    context: Arc<ChunkContext>,
    result_rx: UnboundedReceiver<Delivery>,
    pending: BTreeMap<i64, Result<RowStream>>,
    next_chunk: i64,
    total_chunks: i64,
    current: Option<RowStream>,
    _guard: DropGuard,
}

impl ReorderBuffer {
    /// Move arrivals into the buffer without waiting.
    fn collect_ready(&mut self) -> Result<()> {
        while let Ok(delivery) = self.result_rx.try_recv() {
            self.accept(delivery)?;
        }
        Ok(())
    }

    /// Chunk errors wait in the buffer until `next_chunk` reaches them.
    fn accept(&mut self, delivery: Delivery) -> Result<()> {
        match delivery {
            Delivery::Chunk(index, opened) => {
                self.pending.insert(index, opened);
                Ok(())
            }
            Delivery::Fatal(e) => Err(e),
        }
    }
}

async fn dispatch(
    context: Arc<ChunkContext>,
    semaphore: Arc<Semaphore>,
    first_failed: Arc<AtomicI64>,
    result_tx: UnboundedSender<Delivery>,
    cancel: CancellationToken,
) {
    let mut tasks = JoinSet::new();
    let past_failure = |index: i64| index > first_failed.load(Ordering::SeqCst);

    for chunk in context.manifest.chunks.iter().copied() {
        if past_failure(chunk.chunk_index) {
            break;
        }
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Dispatcher cancelled before chunk {}", chunk.chunk_index);
                break;
            }
            permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };
        if past_failure(chunk.chunk_index) {
            debug!("Not dispatching chunk {} after a failed chunk", chunk.chunk_index);
            break;
        }

        trace!("Dispatching chunk {}", chunk.chunk_index);
        tasks.spawn(fetch_chunk(
            Arc::clone(&context),
            chunk,
            permit,
            Arc::clone(&first_failed),
            result_tx.clone(),
            cancel.clone(),
        ));
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            if e.is_panic() {
                error!("Chunk task panicked: {}", e);
                let _ = result_tx.send(Delivery::Fatal(Error::Protocol(format!(
                    "chunk task failed: {}",
                    e
                ))));
                cancel.cancel();
            }
        }
    }
    debug!("Dispatcher finished");
}

async fn fetch_chunk(
    context: Arc<ChunkContext>,
    chunk: ChunkDescriptor,
    permit: OwnedSemaphorePermit,
    first_failed: Arc<AtomicI64>,
    result_tx: UnboundedSender<Delivery>,
    cancel: CancellationToken,
) {
    let index = chunk.chunk_index;
    let opened = cancellable(&cancel, async {
        match context.resolver.resolve(&chunk).await? {
            Some(payload) => context.downloader.open(&payload).await,
            None => Ok(stream::empty().boxed()),
        }
    })
    .await;

    match opened {
        Ok(rows) => {
            let rows = rows
                .map(move |row| {
                    let _held = &permit;
                    row
                })
                .boxed();
            let _ = result_tx.send(Delivery::Chunk(index, Ok(rows)));
        }
        Err(Error::Cancelled) => {
            trace!("Chunk {} cancelled", index);
        }
        Err(e) => {
            error!("Chunk {} failed: {}", index, e);
            first_failed.fetch_min(index, Ordering::SeqCst);
            let _ = result_tx.send(Delivery::Chunk(index, Err(e)));
        }
    }
}
