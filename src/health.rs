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

//! Warehouse reachability probe.
//!
//! Warehouses may be stopped outside working hours, so the probe only calls
//! the API inside a daily UTC hour window and reports healthy otherwise.

use crate::client::DatabricksClient;
use crate::error::{Error, Result};
use chrono::{DateTime, Timelike, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthCheckConfig {
    /// First UTC hour (inclusive) in which the warehouse is probed.
    pub start_hour: u32,
    /// Last UTC hour (inclusive) in which the warehouse is probed.
    pub end_hour: u32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            start_hour: 6,
            end_hour: 20,
        }
    }
}

impl HealthCheckConfig {
    pub fn validate(&self) -> Result<()> {
        if self.start_hour > 23 || self.end_hour > 23 {
            return Err(Error::Configuration(format!(
                "health check hours must be 0..=23, got {}..={}",
                self.start_hour, self.end_hour
            )));
        }
        Ok(())
    }

    pub fn in_window(&self, now: DateTime<Utc>) -> bool {
        let hour = now.hour();
        self.start_hour <= hour && hour <= self.end_hour
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Unhealthy(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

#[derive(Debug, Clone)]
pub struct HealthCheck {
    client: Arc<dyn DatabricksClient>,
    warehouse_id: String,
    config: HealthCheckConfig,
}

impl HealthCheck {
    pub fn new(
        client: Arc<dyn DatabricksClient>,
        warehouse_id: impl Into<String>,
        config: HealthCheckConfig,
    ) -> Self {
        Self {
            client,
            warehouse_id: warehouse_id.into(),
            config,
        }
    }

    pub async fn check(&self) -> HealthStatus {
        self.check_at(Utc::now()).await
    }

    pub async fn check_at(&self, now: DateTime<Utc>) -> HealthStatus {
        if !self.config.in_window(now) {
            debug!(
                "Skipping warehouse probe at hour {} (window {}..={})",
                now.hour(),
                self.config.start_hour,
                self.config.end_hour
            );
            return HealthStatus::Healthy;
        }

        match self.client.get_warehouse(&self.warehouse_id).await {
            Ok(info) => {
                debug!(
                    "Warehouse {} reachable (state={:?})",
                    self.warehouse_id, info.state
                );
                HealthStatus::Healthy
            }
            Err(e) => {
                warn!("Warehouse {} health probe failed: {}", self.warehouse_id, e);
                HealthStatus::Unhealthy(format!(
                    "Databricks SQL Statement Execution API is unhealthy: {}",
                    e
                ))
            }
        }
    }
}
