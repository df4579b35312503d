//! Data Transfer Objects for node and relay communication
//!
//! Request bodies sent to the node's view endpoint and to the transaction
//! relay, plus the ledger summary used as a connectivity check.

use serde::{Deserialize, Serialize};

use crate::domain::ledger::FunctionId;

/// Body of `POST /view`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewRequest {
    pub function: String,
    pub type_arguments: Vec<String>,
    pub arguments: Vec<serde_json::Value>,
}

impl ViewRequest {
    pub fn new(function: &FunctionId, arguments: Vec<serde_json::Value>) -> Self {
        Self {
            function: function.to_string(),
            type_arguments: Vec::new(),
            arguments,
        }
    }
}

/// Body of `POST /invoke` on the transaction relay
///
/// The relay owns the signing key for `sender`; this side never sees key material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokeRequest {
    pub sender: String,
    pub function: String,
    pub type_arguments: Vec<String>,
    pub arguments: Vec<serde_json::Value>,
}

impl InvokeRequest {
    pub fn new(
        sender: impl Into<String>,
        function: &FunctionId,
        arguments: Vec<serde_json::Value>,
    ) -> Self {
        Self {
            sender: sender.into(),
            function: function.to_string(),
            type_arguments: Vec::new(),
            arguments,
        }
    }
}

/// Subset of the node's ledger info returned by `GET /`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerInfo {
    pub chain_id: u8,
    pub ledger_version: String,
    #[serde(default)]
    pub block_height: Option<String>,
}
