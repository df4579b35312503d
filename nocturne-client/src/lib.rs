//! Nocturne Ledger Client
//!
//! A small, type-safe client for reading from and writing to the job
//! registry contract.
//!
//! Reads go to the node's view endpoint. Writes are handed to a transaction
//! relay that holds the worker's signing key, so this crate never builds or
//! signs transactions itself.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use nocturne_client::{JobContract, NodeClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = NodeClient::new(
//!         "https://node.example.com/v1",
//!         "https://relay.example.com",
//!         "0xworker",
//!     );
//!     let contract = JobContract::new(Arc::new(client), "0xregistry");
//!
//!     let jobs = contract.get_jobs().await?;
//!     println!("Registry holds {} job(s)", jobs.len());
//!     Ok(())
//! }
//! ```

pub mod connection;
pub mod error;
mod jobs;

// Re-export commonly used types
pub use connection::{ConnectionEvent, ConnectionState, ConnectionTracker, TransitionError};
pub use error::{ClientError, Result};
pub use jobs::{JOB_MODULE, JobContract};

use async_trait::async_trait;
use nocturne_core::domain::ledger::{FunctionId, TransactionReceipt};
use nocturne_core::dto::{InvokeRequest, LedgerInfo, ViewRequest};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

/// Read and write capability against the ledger
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Calls a view function and returns its return values in order
    async fn view(&self, function: &FunctionId, arguments: Vec<Value>) -> Result<Vec<Value>>;

    /// Submits an entry function call and waits for its receipt
    ///
    /// A receipt whose `success` flag is false is turned into
    /// [`ClientError::TransactionFailed`].
    async fn invoke(
        &self,
        function: &FunctionId,
        arguments: Vec<Value>,
    ) -> Result<TransactionReceipt>;

    /// Fetches the ledger summary; used to check connectivity
    async fn ledger_info(&self) -> Result<LedgerInfo>;
}

/// HTTP implementation of [`LedgerClient`]
#[derive(Debug, Clone)]
pub struct NodeClient {
    /// Base URL of the node REST API (e.g., "https://node.example.com/v1")
    base_url: String,
    /// Base URL of the transaction relay
    relay_url: String,
    /// Account the relay signs for
    sender: String,
    /// HTTP client instance
    client: Client,
}

impl NodeClient {
    /// Create a new node client
    ///
    /// # Arguments
    /// * `base_url` - The node REST API base URL
    /// * `relay_url` - The transaction relay base URL
    /// * `sender` - Account address writes are submitted for
    pub fn new(
        base_url: impl Into<String>,
        relay_url: impl Into<String>,
        sender: impl Into<String>,
    ) -> Self {
        Self::with_client(base_url, relay_url, sender, Client::new())
    }

    /// Create a new node client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(
        base_url: impl Into<String>,
        relay_url: impl Into<String>,
        sender: impl Into<String>,
        client: Client,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            relay_url: relay_url.into().trim_end_matches('/').to_string(),
            sender: sender.into(),
            client,
        }
    }

    /// Get the base URL of the node
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the base URL of the relay
    pub fn relay_url(&self) -> &str {
        &self.relay_url
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }
}

#[async_trait]
impl LedgerClient for NodeClient {
    async fn view(&self, function: &FunctionId, arguments: Vec<Value>) -> Result<Vec<Value>> {
        let url = format!("{}/view", self.base_url);
        debug!("View {}", function);

        let response = self
            .client
            .post(&url)
            .json(&ViewRequest::new(function, arguments))
            .send()
            .await?;

        self.handle_response(response).await
    }

    async fn invoke(
        &self,
        function: &FunctionId,
        arguments: Vec<Value>,
    ) -> Result<TransactionReceipt> {
        let url = format!("{}/invoke", self.relay_url);
        debug!("Invoke {} as {}", function, self.sender);

        let response = self
            .client
            .post(&url)
            .json(&InvokeRequest::new(&self.sender, function, arguments))
            .send()
            .await?;

        let receipt: TransactionReceipt = self.handle_response(response).await?;
        if !receipt.success {
            return Err(ClientError::TransactionFailed {
                hash: receipt.hash,
                vm_status: receipt.vm_status,
            });
        }

        Ok(receipt)
    }

    async fn ledger_info(&self) -> Result<LedgerInfo> {
        let url = format!("{}/", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = NodeClient::new("http://localhost:8080/v1", "http://localhost:9090", "0x1");
        assert_eq!(client.base_url(), "http://localhost:8080/v1");
        assert_eq!(client.relay_url(), "http://localhost:9090");
        assert_eq!(client.sender(), "0x1");
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = NodeClient::new("http://localhost:8080/v1/", "http://localhost:9090/", "0x1");
        assert_eq!(client.base_url(), "http://localhost:8080/v1");
        assert_eq!(client.relay_url(), "http://localhost:9090");
    }

    #[test]
    fn test_client_with_custom_client() {
        let http_client = Client::new();
        let client =
            NodeClient::with_client("http://localhost:8080", "http://r", "0x1", http_client);
        assert_eq!(client.base_url(), "http://localhost:8080");
    }
}
