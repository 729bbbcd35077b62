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

//! Executor configuration.
//!
//! Values can be set through the `with_*` builders or by string key with
//! [`ExecutorConfig::set_option`]:
//!
//! | Key | Meaning |
//! |-----|---------|
//! | `databricks.workspace_url` | Workspace URL, e.g. `https://adb-1.azuredatabricks.net` |
//! | `databricks.warehouse_id` | SQL warehouse id |
//! | `databricks.http_path` | `/sql/1.0/warehouses/{id}`; sets the warehouse id |
//! | `databricks.timeout_in_seconds` | Server-side `wait_timeout` of the submit call |
//! | `databricks.max_buffered_chunks` | Parallel download width, `0` for unbounded |
//! | `databricks.poll.initial_delay_ms` | First status poll delay |
//! | `databricks.poll.max_wait_secs` | Total polling budget |
//! | `databricks.health_check.start_hour` / `end_hour` | UTC window of the warehouse probe |
//! | `databricks.http.connect_timeout_ms` / `read_timeout_ms` | HTTP client timeouts |
//! | `databricks.log_level` / `databricks.log_file` | See [`crate::logging`] |

use crate::client::HttpClientConfig;
use crate::error::{Error, Result};
use crate::health::HealthCheckConfig;
use crate::logging::LogConfig;
use std::time::Duration;

pub const DEFAULT_TIMEOUT_IN_SECONDS: u32 = 30;

/// Backoff parameters of the status polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Wait before the first status poll. Doubles after every poll.
    pub initial_delay: Duration,
    /// Polling gives up once the next wait would push the total past this.
    pub max_total_wait: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_total_wait: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub workspace_url: String,
    pub warehouse_id: String,
    /// Seconds the submit call lets the server hold the request open. `0`
    /// makes submission return immediately.
    pub timeout_in_seconds: u32,
    /// Upper bound on concurrently open chunks in the parallel executor.
    /// `0` means one task per chunk with no bound.
    pub max_buffered_chunks: usize,
    pub poll: PollConfig,
    pub http: HttpClientConfig,
    pub health: HealthCheckConfig,
    pub log: LogConfig,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            workspace_url: String::new(),
            warehouse_id: String::new(),
            timeout_in_seconds: DEFAULT_TIMEOUT_IN_SECONDS,
            max_buffered_chunks: 0,
            poll: PollConfig::default(),
            http: HttpClientConfig::default(),
            health: HealthCheckConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl ExecutorConfig {
    pub fn new(workspace_url: impl Into<String>, warehouse_id: impl Into<String>) -> Self {
        Self {
            workspace_url: workspace_url.into(),
            warehouse_id: warehouse_id.into(),
            ..Default::default()
        }
    }

    pub fn with_workspace_url(mut self, url: impl Into<String>) -> Self {
        self.workspace_url = url.into();
        self
    }

    pub fn with_warehouse_id(mut self, id: impl Into<String>) -> Self {
        self.warehouse_id = id.into();
        self
    }

    pub fn with_timeout_in_seconds(mut self, seconds: u32) -> Self {
        self.timeout_in_seconds = seconds;
        self
    }

    pub fn with_max_buffered_chunks(mut self, chunks: usize) -> Self {
        self.max_buffered_chunks = chunks;
        self
    }

    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_http(mut self, http: HttpClientConfig) -> Self {
        self.http = http;
        self
    }

    pub fn with_log(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    /// `wait_timeout` field of the submit request.
    pub fn wait_timeout(&self) -> String {
        format!("{}s", self.timeout_in_seconds)
    }

    /// Set an option by key. Unknown keys and unparsable values are errors.
    pub fn set_option(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "databricks.workspace_url" => self.workspace_url = value.to_string(),
            "databricks.warehouse_id" => self.warehouse_id = value.to_string(),
            "databricks.http_path" => {
                self.warehouse_id = extract_warehouse_id(value).ok_or_else(|| {
                    Error::Configuration(format!(
                        "http_path '{}' does not name a warehouse (/sql/1.0/warehouses/{{id}})",
                        value
                    ))
                })?;
            }
            "databricks.timeout_in_seconds" => self.timeout_in_seconds = parse(key, value)?,
            "databricks.max_buffered_chunks" => self.max_buffered_chunks = parse(key, value)?,
            "databricks.poll.initial_delay_ms" => {
                self.poll.initial_delay = Duration::from_millis(parse(key, value)?)
            }
            "databricks.poll.max_wait_secs" => {
                self.poll.max_total_wait = Duration::from_secs(parse(key, value)?)
            }
            "databricks.health_check.start_hour" => self.health.start_hour = parse(key, value)?,
            "databricks.health_check.end_hour" => self.health.end_hour = parse(key, value)?,
            "databricks.http.connect_timeout_ms" => {
                self.http.connect_timeout = Duration::from_millis(parse(key, value)?)
            }
            "databricks.http.read_timeout_ms" => {
                self.http.read_timeout = Duration::from_millis(parse(key, value)?)
            }
            "databricks.log_level" => self.log.level = Some(value.to_string()),
            "databricks.log_file" => self.log.file = Some(value.to_string()),
            _ => {
                return Err(Error::Configuration(format!("unknown option '{}'", key)));
            }
        }
        Ok(())
    }

    /// Check that the configuration can drive an execution.
    pub fn validate(&self) -> Result<()> {
        if self.workspace_url.trim().is_empty() {
            return Err(Error::Configuration("workspace_url is not set".to_string()));
        }
        if !self.workspace_url.starts_with("https://") && !self.workspace_url.starts_with("http://")
        {
            return Err(Error::Configuration(format!(
                "workspace_url '{}' must start with https://",
                self.workspace_url
            )));
        }
        if self.warehouse_id.trim().is_empty() {
            return Err(Error::Configuration("warehouse_id is not set".to_string()));
        }
        if self.timeout_in_seconds != 0 && !(5..=50).contains(&self.timeout_in_seconds) {
            return Err(Error::Configuration(format!(
                "timeout_in_seconds must be 0 or between 5 and 50, got {}",
                self.timeout_in_seconds
            )));
        }
        if self.poll.initial_delay.is_zero() {
            return Err(Error::Configuration(
                "poll initial delay must be positive".to_string(),
            ));
        }
        self.health.validate()
    }
}

/// Extract warehouse ID from an HTTP path of the form `/sql/1.0/warehouses/{id}`.
pub fn extract_warehouse_id(http_path: &str) -> Option<String> {
    http_path
        .strip_prefix("/sql/1.0/warehouses/")
        .or_else(|| http_path.strip_prefix("sql/1.0/warehouses/"))
        .map(|s| s.trim_end_matches('/').to_string())
        .filter(|s| !s.is_empty())
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e| {
        Error::Configuration(format!("invalid value '{}' for option '{}': {}", value, key, e))
    })
}
