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

//! HTTP client implementation for Databricks SQL API.
//!
//! This module provides a low-level HTTP client with:
//! - Connection pooling
//! - Bearer token authentication
//! - Configurable timeouts
//!
//! Failed requests are not retried here. The statement protocol's status
//! polling is the only repetition the executor performs.

use crate::auth::AuthProvider;
use crate::error::{Error, Phase, Result};
use reqwest::{Client, Request, Response};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for the HTTP client.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Connection timeout duration.
    pub connect_timeout: Duration,
    /// Overall timeout for a control-plane request.
    pub read_timeout: Duration,
    /// Maximum number of idle connections per host.
    pub max_connections_per_host: usize,
    /// User agent string.
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(60),
            max_connections_per_host: 100,
            user_agent: format!("databricks-sql-executor/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// HTTP client for communicating with Databricks SQL endpoints.
///
/// Two instances are used per executor: one carrying the bearer token for
/// the control plane, and one sending pre-signed link downloads without it.
/// Download clients have no overall timeout since chunk bodies are streamed.
#[derive(Debug)]
pub struct DatabricksHttpClient {
    client: Client,
    config: HttpClientConfig,
    auth_provider: Option<Arc<dyn AuthProvider>>,
}

impl DatabricksHttpClient {
    /// Creates an authenticated client for control-plane calls.
    pub fn new(config: HttpClientConfig, auth_provider: Arc<dyn AuthProvider>) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.read_timeout)
            .pool_max_idle_per_host(config.max_connections_per_host)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            auth_provider: Some(auth_provider),
        })
    }

    /// Creates a client for pre-signed URLs. It never sends an Authorization header.
    pub fn unauthenticated(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.max_connections_per_host)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            auth_provider: None,
        })
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Returns the underlying reqwest client for building requests.
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Get the authorization header value.
    pub fn auth_header(&self) -> Result<String> {
        match &self.auth_provider {
            Some(provider) => provider.get_auth_header(),
            None => Err(Error::Configuration(
                "HTTP client has no auth provider".to_string(),
            )),
        }
    }

    /// Execute an authenticated request.
    ///
    /// A non-success status becomes [`Error::Transport`] tagged with `phase`
    /// and carrying the response body as its message.
    pub async fn execute(&self, phase: Phase, mut request: Request) -> Result<Response> {
        let header = self.auth_header()?;
        let value = header
            .parse()
            .map_err(|e| Error::Configuration(format!("Invalid authorization header: {}", e)))?;
        request
            .headers_mut()
            .insert(reqwest::header::AUTHORIZATION, value);
        self.execute_impl(phase, request).await
    }

    /// Execute a request without authentication (for pre-signed link downloads).
    pub async fn execute_without_auth(&self, phase: Phase, mut request: Request) -> Result<Response> {
        request.headers_mut().remove(reqwest::header::AUTHORIZATION);
        self.execute_impl(phase, request).await
    }

    async fn execute_impl(&self, phase: Phase, request: Request) -> Result<Response> {
        debug!("Executing {} {} ({})", request.method(), request.url(), phase);

        let response = self.client.execute(request).await.map_err(|e| {
            warn!("{} request failed before a response: {}", phase, e);
            Error::transport(phase, format!("HTTP request failed: {}", e))
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_body = response.text().await.unwrap_or_default();
        warn!("{} request returned HTTP {}", phase, status.as_u16());
        Err(Error::Transport {
            phase,
            status: Some(status.as_u16()),
            chunk_index: None,
            message: error_body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::PersonalAccessToken;
    use reqwest::Method;

    #[test]
    fn test_http_client_config_default() {
        let config = HttpClientConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.read_timeout, Duration::from_secs(60));
        assert_eq!(config.max_connections_per_host, 100);
        assert!(config.user_agent.starts_with("databricks-sql-executor/"));
    }

    #[tokio::test]
    async fn test_http_client_creation() {
        let config = HttpClientConfig::default();
        let auth = Arc::new(PersonalAccessToken::new("test-token"));
        let client = DatabricksHttpClient::new(config, auth);
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_auth_header() {
        let config = HttpClientConfig::default();
        let auth = Arc::new(PersonalAccessToken::new("test-token"));
        let client = DatabricksHttpClient::new(config, auth).unwrap();

        let header = client.auth_header().unwrap();
        assert_eq!(header, "Bearer test-token");
    }

    #[tokio::test]
    async fn test_unauthenticated_client_has_no_header() {
        let client = DatabricksHttpClient::unauthenticated(HttpClientConfig::default()).unwrap();
        assert!(matches!(client.auth_header(), Err(Error::Configuration(_))));
    }

    #[tokio::test]
    async fn test_connection_failure_is_transport_without_status() {
        let client = DatabricksHttpClient::unauthenticated(HttpClientConfig {
            connect_timeout: Duration::from_millis(200),
            ..Default::default()
        })
        .unwrap();
        // Port 9 on localhost is the discard service; nothing listens there in CI.
        let request = client
            .inner()
            .request(Method::GET, "http://127.0.0.1:9/chunk")
            .build()
            .unwrap();

        let err = client
            .execute_without_auth(Phase::ExternalDownload, request)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Transport {
                phase: Phase::ExternalDownload,
                status: None,
                ..
            }
        ));
    }
}
