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

//! Result layout types: the validated manifest and resolved chunk links.

use crate::error::{Error, Result};
use crate::reader::ResultFormat;
use crate::types::sea::{ExternalLink, ResultManifest};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Position of one chunk within the result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkDescriptor {
    pub chunk_index: i64,
    pub row_offset: i64,
    pub row_count: Option<i64>,
    pub byte_count: Option<i64>,
}

/// Result layout of a succeeded statement.
///
/// Chunks are sorted by index and form the contiguous range `0..N`.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub statement_id: String,
    pub format: Option<String>,
    pub total_row_count: i64,
    pub schema: Arc<[String]>,
    pub chunks: Vec<ChunkDescriptor>,
    pub truncated: bool,
}

impl Manifest {
    /// Validate a wire manifest and convert it.
    pub fn from_wire(statement_id: &str, manifest: ResultManifest) -> Result<Self> {
        let schema: Arc<[String]> = manifest
            .schema
            .columns
            .into_iter()
            .map(|c| c.name)
            .collect::<Vec<_>>()
            .into();

        let mut chunks: Vec<ChunkDescriptor> = manifest
            .chunks
            .unwrap_or_default()
            .into_iter()
            .map(|c| ChunkDescriptor {
                chunk_index: c.chunk_index,
                row_offset: c.row_offset,
                row_count: c.row_count,
                byte_count: c.byte_count,
            })
            .collect();
        chunks.sort_by_key(|c| c.chunk_index);

        for (expected, chunk) in chunks.iter().enumerate() {
            if chunk.chunk_index != expected as i64 {
                return Err(Error::Protocol(format!(
                    "statement {} manifest chunks are not contiguous: expected index {}, found {}",
                    statement_id, expected, chunk.chunk_index
                )));
            }
        }

        if let Some(total) = manifest.total_chunk_count {
            if total != chunks.len() as i64 {
                warn!(
                    "Manifest for statement {} reports {} chunks but lists {}",
                    statement_id,
                    total,
                    chunks.len()
                );
            }
        }

        Ok(Self {
            statement_id: statement_id.to_string(),
            format: manifest.format,
            total_row_count: manifest.total_row_count.unwrap_or(0),
            schema,
            chunks,
            truncated: manifest.truncated,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.total_row_count <= 0
    }

    /// Fail when the service reports a different format than was requested.
    /// A manifest without a format is accepted.
    pub fn check_format(&self, requested: ResultFormat) -> Result<()> {
        match self.format.as_deref() {
            Some(reported) if reported != requested.wire_name() => Err(Error::Protocol(format!(
                "statement {} returned {} results, expected {}",
                self.statement_id, reported, requested
            ))),
            _ => Ok(()),
        }
    }
}

/// Resolved download location for one chunk.
#[derive(Debug, Clone)]
pub struct ChunkPayload {
    pub chunk_index: i64,
    /// Pre-signed URL; requests to it must not carry the bearer token.
    pub url: String,
    pub http_headers: HashMap<String, String>,
    pub expiration: Option<DateTime<Utc>>,
}

impl ChunkPayload {
    /// Convert from the SEA link. An unparsable expiration is ignored.
    pub fn from_external_link(chunk_index: i64, link: &ExternalLink) -> Self {
        let expiration = link.expiration.as_deref().and_then(|raw| {
            DateTime::parse_from_rfc3339(raw)
                .map(|ts| ts.with_timezone(&Utc))
                .map_err(|e| {
                    warn!(
                        "Ignoring invalid expiration '{}' for chunk {}: {}",
                        raw, chunk_index, e
                    )
                })
                .ok()
        });

        Self {
            chunk_index,
            url: link.external_link.clone(),
            http_headers: link.http_headers.clone().unwrap_or_default(),
            expiration,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expiration.is_some_and(|exp| Utc::now() >= exp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::sea::{ChunkInfo, ColumnInfo, ResultSchema};

    fn chunk(index: i64, offset: i64) -> ChunkInfo {
        ChunkInfo {
            chunk_index: index,
            row_offset: offset,
            row_count: Some(10),
            byte_count: None,
        }
    }

    fn manifest(chunks: Vec<ChunkInfo>) -> ResultManifest {
        ResultManifest {
            format: Some("JSON_ARRAY".to_string()),
            schema: ResultSchema {
                column_count: Some(1),
                columns: vec![ColumnInfo {
                    name: "id".to_string(),
                    type_name: None,
                    type_text: None,
                    position: Some(0),
                }],
            },
            total_chunk_count: Some(chunks.len() as i64),
            total_row_count: Some(10 * chunks.len() as i64),
            total_byte_count: None,
            truncated: false,
            chunks: Some(chunks),
        }
    }

    #[test]
    fn test_manifest_sorts_chunks() {
        let m = Manifest::from_wire("s", manifest(vec![chunk(1, 10), chunk(0, 0)])).unwrap();
        let indices: Vec<i64> = m.chunks.iter().map(|c| c.chunk_index).collect();
        assert_eq!(indices, vec![0, 1]);
        assert_eq!(&*m.schema, &["id".to_string()]);
    }

    #[test]
    fn test_manifest_rejects_gap() {
        let err = Manifest::from_wire("s", manifest(vec![chunk(0, 0), chunk(2, 20)])).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn test_manifest_rejects_duplicate() {
        let err = Manifest::from_wire("s", manifest(vec![chunk(0, 0), chunk(0, 0)])).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn test_missing_row_count_is_empty() {
        let mut wire = manifest(vec![]);
        wire.total_row_count = None;
        assert!(Manifest::from_wire("s", wire).unwrap().is_empty());
    }

    #[test]
    fn test_check_format() {
        let mut m = Manifest::from_wire("s", manifest(vec![chunk(0, 0)])).unwrap();
        assert!(m.check_format(ResultFormat::JsonArray).is_ok());
        let err = m.check_format(ResultFormat::ArrowStream).unwrap_err();
        assert!(matches!(err, Error::Protocol(ref msg) if msg.contains("JSON_ARRAY")));

        m.format = None;
        assert!(m.check_format(ResultFormat::ArrowStream).is_ok());
    }

    #[test]
    fn test_payload_from_external_link() {
        let link = ExternalLink {
            external_link: "https://storage.example.com/c0".to_string(),
            expiration: Some("2099-01-01T00:00:00Z".to_string()),
            chunk_index: Some(0),
            row_offset: Some(0),
            row_count: Some(1),
            byte_count: Some(1),
            http_headers: Some(HashMap::from([("x-ms-blob".to_string(), "1".to_string())])),
        };
        let payload = ChunkPayload::from_external_link(0, &link);
        assert_eq!(payload.url, "https://storage.example.com/c0");
        assert_eq!(payload.http_headers.len(), 1);
        assert!(!payload.is_expired());
    }

    #[test]
    fn test_payload_expired_and_invalid_expiration() {
        let mut link = ExternalLink {
            external_link: "https://storage.example.com/c0".to_string(),
            expiration: Some("2000-01-01T00:00:00Z".to_string()),
            chunk_index: None,
            row_offset: None,
            row_count: None,
            byte_count: None,
            http_headers: None,
        };
        assert!(ChunkPayload::from_external_link(0, &link).is_expired());

        link.expiration = Some("not-a-date".to_string());
        let payload = ChunkPayload::from_external_link(0, &link);
        assert!(payload.expiration.is_none());
        assert!(!payload.is_expired());
    }
}
