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

//! Error taxonomy for statement execution.
//!
//! Every fallible operation in the crate returns [`Result`]. Failures are
//! grouped by where they originate (HTTP transport, protocol contract, the
//! statement itself, decoding, configuration) so callers can react to the
//! category instead of parsing messages.
//!
//! [`Error::Cancelled`] is not a failure: it is the signal a row stream ends
//! with after the caller's cancellation token fires. Use
//! [`Error::is_cancellation`] to tell it apart.

use std::fmt;
use std::time::Duration;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The HTTP exchange a transport error happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Submit,
    Poll,
    ChunkMetadata,
    ExternalDownload,
    Cancel,
    HealthCheck,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Submit => "submit",
            Phase::Poll => "poll",
            Phase::ChunkMetadata => "chunk-metadata",
            Phase::ExternalDownload => "external-download",
            Phase::Cancel => "cancel",
            Phase::HealthCheck => "health-check",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Non-success HTTP status or connection failure.
    #[error("{phase} request failed{}{}: {message}", fmt_status(.status), fmt_chunk(.chunk_index))]
    Transport {
        phase: Phase,
        /// `None` when no response was received.
        status: Option<u16>,
        chunk_index: Option<i64>,
        message: String,
    },

    /// The service answered with something that breaks the API contract.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The statement reached a terminal state other than `SUCCEEDED`.
    #[error("statement {statement_id} ended in state {state}{}", fmt_message(.message))]
    ExecutionFailure {
        statement_id: String,
        state: String,
        message: Option<String>,
    },

    #[error("statement {statement_id} did not complete within {waited:?}")]
    TimeoutExceeded {
        statement_id: String,
        waited: Duration,
    },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("not supported: {0}")]
    NotSupported(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid argument: {0}")]
    Argument(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    pub fn transport(phase: Phase, message: impl Into<String>) -> Self {
        Error::Transport {
            phase,
            status: None,
            chunk_index: None,
            message: message.into(),
        }
    }

    /// Attach the chunk index to a transport error; other variants pass through.
    pub fn for_chunk(self, index: i64) -> Self {
        match self {
            Error::Transport {
                phase,
                status,
                message,
                ..
            } => Error::Transport {
                phase,
                status,
                chunk_index: Some(index),
                message,
            },
            other => other,
        }
    }

    /// True for the cancellation signal, false for every real failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// HTTP status of a transport error, if a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Transport { status, .. } => *status,
            _ => None,
        }
    }
}

fn fmt_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" with HTTP {}", s)).unwrap_or_default()
}

fn fmt_chunk(chunk_index: &Option<i64>) -> String {
    chunk_index
        .map(|i| format!(" (chunk {})", i))
        .unwrap_or_default()
}

fn fmt_message(message: &Option<String>) -> String {
    message
        .as_ref()
        .map(|m| format!(": {}", m))
        .unwrap_or_default()
}

impl From<arrow_schema::ArrowError> for Error {
    fn from(e: arrow_schema::ArrowError) -> Self {
        Error::Decode(format!("Arrow IPC: {}", e))
    }
}
