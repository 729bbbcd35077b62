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

//! One chunk at a time, in index order.
//!
//! At most one download is open. The next chunk is resolved only after the
//! previous one is fully drained, so rows never need to be buffered.

use crate::executor::ChunkContext;
use crate::reader::RowStream;
use futures::stream;
use futures::StreamExt;
use tracing::debug;

struct SequentialState {
    context: ChunkContext,
    next_chunk: usize,
    current: Option<RowStream>,
}

pub(crate) fn read_chunks(context: ChunkContext) -> RowStream {
    let state = SequentialState {
        context,
        next_chunk: 0,
        current: None,
    };

    stream::try_unfold(state, |mut state| async move {
        loop {
            if let Some(rows) = state.current.as_mut() {
                match rows.next().await {
                    Some(row) => return Ok(Some((row?, state))),
                    None => {
                        debug!("Chunk {} drained", state.next_chunk - 1);
                        state.current = None;
                    }
                }
            }

            let Some(chunk) = state.context.manifest.chunks.get(state.next_chunk).copied() else {
                debug!(
                    "All {} chunks of statement {} consumed",
                    state.context.manifest.chunks.len(),
                    state.context.manifest.statement_id
                );
                state.context.finish();
                return Ok(None);
            };
            state.next_chunk += 1;

            if let Some(payload) = state.context.resolver.resolve(&chunk).await? {
                state.current = Some(state.context.downloader.open(&payload).await?);
            }
        }
    })
    .boxed()
}
