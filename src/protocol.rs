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

//! Submit-and-poll state machine of the Statement Execution API.
//!
//! ```text
//!   submit ──► PENDING ──► RUNNING ──► SUCCEEDED ──► Manifest
//!                 │           │
//!                 └───────────┴──────► FAILED | CANCELED | CLOSED ──► ExecutionFailure
//! ```
//!
//! While the statement is pending or running the protocol sleeps and polls
//! again. The first sleep is `PollConfig::initial_delay` and each later one
//! doubles. Before sleeping, if the total time slept plus the next sleep
//! would exceed `PollConfig::max_total_wait`, polling stops with
//! `TimeoutExceeded`. A status request is only sent after a sleep, and no
//! request follows a terminal response.

use crate::client::DatabricksClient;
use crate::config::{ExecutorConfig, PollConfig};
use crate::error::{Error, Result};
use crate::reader::ResultFormat;
use crate::statement::Statement;
use crate::types::chunk::Manifest;
use crate::types::sea::{ExecuteStatementRequest, StatementExecutionResponse, StatementState};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const DISPOSITION: &str = "EXTERNAL_LINKS";

#[derive(Debug, Clone)]
pub struct StatementProtocol {
    client: Arc<dyn DatabricksClient>,
    warehouse_id: String,
    wait_timeout: String,
    poll: PollConfig,
}

impl StatementProtocol {
    pub fn new(client: Arc<dyn DatabricksClient>, config: &ExecutorConfig) -> Self {
        Self {
            client,
            warehouse_id: config.warehouse_id.clone(),
            wait_timeout: config.wait_timeout(),
            poll: config.poll,
        }
    }

    pub fn build_request(
        &self,
        statement: &Statement,
        format: ResultFormat,
    ) -> ExecuteStatementRequest {
        ExecuteStatementRequest {
            warehouse_id: self.warehouse_id.clone(),
            statement: statement.sql().to_string(),
            parameters: statement.parameters().to_vec(),
            disposition: DISPOSITION.to_string(),
            format: format.wire_name().to_string(),
            wait_timeout: Some(self.wait_timeout.clone()),
        }
    }

    /// POST the statement. Returns whatever state the service reports.
    pub async fn submit(
        &self,
        statement: &Statement,
        format: ResultFormat,
    ) -> Result<StatementExecutionResponse> {
        let request = self.build_request(statement, format);
        self.client.execute_statement(&request).await
    }

    /// GET the current status of a submitted statement.
    pub async fn poll(&self, statement_id: &str) -> Result<StatementExecutionResponse> {
        self.client.get_statement_status(statement_id).await
    }

    /// Submit, then poll until the statement is terminal.
    ///
    /// If `cancel` fires while the statement is still pending or running, a
    /// remote cancel request is sent in the background and `Error::Cancelled`
    /// is returned without waiting for it.
    pub async fn run(
        &self,
        statement: &Statement,
        format: ResultFormat,
        cancel: &CancellationToken,
    ) -> Result<Manifest> {
        let mut response = cancellable(cancel, self.submit(statement, format)).await?;
        let statement_id = response.statement_id.clone();
        info!("Submitted statement {} (format={})", statement_id, format);

        let mut delay = self.poll.initial_delay;
        let mut waited = Duration::ZERO;

        loop {
            let state = parse_state(&response)?;
            debug!("Statement {} is {}", statement_id, state);

            match state {
                StatementState::Succeeded => return succeeded(response, format),
                StatementState::Failed | StatementState::Canceled | StatementState::Closed => {
                    let message = response.status.error.as_ref().and_then(|e| e.describe());
                    warn!(
                        "Statement {} ended in state {}: {}",
                        statement_id,
                        state,
                        message.as_deref().unwrap_or("no error details")
                    );
                    return Err(Error::ExecutionFailure {
                        statement_id,
                        state: state.to_string(),
                        message,
                    });
                }
                StatementState::Pending | StatementState::Running => {
                    if waited + delay > self.poll.max_total_wait {
                        warn!(
                            "Statement {} still {} after waiting {:?}",
                            statement_id, state, waited
                        );
                        return Err(Error::TimeoutExceeded {
                            statement_id,
                            waited,
                        });
                    }

                    let slept = cancellable(cancel, async {
                        tokio::time::sleep(delay).await;
                        Ok(())
                    })
                    .await;
                    if slept.is_err() {
                        self.cancel_remote(&statement_id);
                        return Err(Error::Cancelled);
                    }
                    waited += delay;
                    delay = delay.saturating_mul(2);

                    response = match cancellable(cancel, self.poll(&statement_id)).await {
                        Err(Error::Cancelled) => {
                            self.cancel_remote(&statement_id);
                            return Err(Error::Cancelled);
                        }
                        other => other?,
                    };
                }
            }
        }
    }

    /// Fire-and-forget remote cancellation.
    fn cancel_remote(&self, statement_id: &str) {
        let client = Arc::clone(&self.client);
        let statement_id = statement_id.to_string();
        debug!("Requesting remote cancellation of statement {}", statement_id);
        tokio::spawn(async move {
            if let Err(e) = client.cancel_statement(&statement_id).await {
                warn!("Remote cancel of statement {} failed: {}", statement_id, e);
            }
        });
    }
}

/// Race `fut` against the token. Cancellation wins ties.
pub(crate) async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = fut => result,
    }
}

fn parse_state(response: &StatementExecutionResponse) -> Result<StatementState> {
    StatementState::parse(&response.status.state).ok_or_else(|| {
        error!(
            "Statement {} returned unrecognized state '{}'",
            response.statement_id, response.status.state
        );
        Error::Protocol(format!(
            "unrecognized statement state '{}' for statement {}",
            response.status.state, response.statement_id
        ))
    })
}

fn succeeded(response: StatementExecutionResponse, format: ResultFormat) -> Result<Manifest> {
    let manifest = response.manifest.ok_or_else(|| {
        Error::Protocol(format!(
            "statement {} succeeded without a result manifest",
            response.statement_id
        ))
    })?;
    let manifest = Manifest::from_wire(&response.statement_id, manifest)?;
    manifest.check_format(format)?;
    info!(
        "Statement {} succeeded: {} rows in {} chunks{}",
        manifest.statement_id,
        manifest.total_row_count,
        manifest.chunks.len(),
        if manifest.truncated { " (truncated)" } else { "" }
    );
    Ok(manifest)
}
