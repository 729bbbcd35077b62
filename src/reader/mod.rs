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

//! Result readers: from chunk metadata to a lazy stream of rows.
//!
//! This module provides:
//! - `ChunkResolver`: Resolves a chunk index to its pre-signed download link
//! - `ChunkDownloader`: Opens a link and feeds its body to a decoder
//! - `json` / `arrow`: Format decoders producing [`Row`]s

pub mod arrow;
pub mod chunk_downloader;
pub mod chunk_resolver;
pub mod json;

use crate::client::ByteStream;
use crate::error::Result;
use crate::types::row::Row;
use futures::stream::BoxStream;
use std::fmt;
use std::sync::Arc;

pub use chunk_downloader::ChunkDownloader;
pub use chunk_resolver::ChunkResolver;

/// Lazy sequence of decoded rows. Ends at the first error.
pub type RowStream = BoxStream<'static, Result<Row>>;

/// Wire format requested at submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResultFormat {
    JsonArray,
    #[default]
    ArrowStream,
}

impl ResultFormat {
    /// Value of the `format` field of the submit request.
    pub fn wire_name(&self) -> &'static str {
        match self {
            ResultFormat::JsonArray => "JSON_ARRAY",
            ResultFormat::ArrowStream => "ARROW_STREAM",
        }
    }

    /// Decode one chunk body. `schema` holds the manifest's column names.
    pub fn decode(self, body: ByteStream, schema: Arc<[String]>) -> RowStream {
        match self {
            ResultFormat::JsonArray => json::decode_json(body, schema),
            ResultFormat::ArrowStream => arrow::decode_arrow(body, schema),
        }
    }
}

impl fmt::Display for ResultFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}
