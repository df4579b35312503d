//! Listener configuration
//!
//! Defines the worker identity, the node and relay endpoints, the registry
//! address and the polling behaviour.

use std::str::FromStr;
use std::time::Duration;

/// Listener configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Account the listener claims jobs for
    pub worker_address: String,

    /// Node REST API base URL (e.g., "https://node.example.com/v1")
    pub node_url: String,

    /// Transaction relay base URL; writes are signed there
    pub relay_url: String,

    /// Account the job registry module is published under
    pub contract_address: String,

    /// How often to check the registry for new jobs
    pub poll_interval: Duration,

    /// Wait for each batch to be processed before counting it as delivered
    pub await_handler_completion: bool,

    /// Task reported when failing a job
    pub default_task_id: u64,

    /// Connection attempts at startup before giving up
    pub connect_max_retries: u32,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(worker_address: String, node_url: String, contract_address: String) -> Self {
        Self {
            worker_address,
            relay_url: node_url.clone(),
            node_url,
            contract_address,
            poll_interval: Duration::from_millis(5000),
            await_handler_completion: true,
            default_task_id: 1,
            connect_max_retries: 10,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - WORKER_ADDRESS (required)
    /// - NODE_URL (required)
    /// - JOB_CONTRACT_ADDRESS (required)
    /// - RELAY_URL (optional, default: NODE_URL)
    /// - POLL_INTERVAL_MS (optional, default: 5000)
    /// - AWAIT_HANDLER_COMPLETION (optional, default: true)
    /// - DEFAULT_TASK_ID (optional, default: 1)
    /// - CONNECT_MAX_RETRIES (optional, default: 10)
    pub fn from_env() -> anyhow::Result<Self> {
        let worker_address = required("WORKER_ADDRESS")?;
        let node_url = required("NODE_URL")?;
        let contract_address = required("JOB_CONTRACT_ADDRESS")?;

        let mut config = Self::new(worker_address, node_url, contract_address);

        if let Ok(relay_url) = std::env::var("RELAY_URL") {
            config.relay_url = relay_url;
        }
        config.poll_interval = Duration::from_millis(optional("POLL_INTERVAL_MS", 5000)?);
        config.await_handler_completion = parse_flag(
            "AWAIT_HANDLER_COMPLETION",
            std::env::var("AWAIT_HANDLER_COMPLETION").ok(),
            true,
        )?;
        config.default_task_id = optional("DEFAULT_TASK_ID", 1)?;
        config.connect_max_retries = optional("CONNECT_MAX_RETRIES", 10)?;

        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, address) in [
            ("worker_address", &self.worker_address),
            ("contract_address", &self.contract_address),
        ] {
            if !address.starts_with("0x") || address.len() < 3 {
                anyhow::bail!("{} must be a 0x-prefixed account address", name);
            }
        }

        for (name, url) in [("node_url", &self.node_url), ("relay_url", &self.relay_url)] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("{} must start with http:// or https://", name);
            }
        }

        if self.poll_interval.is_zero() {
            anyhow::bail!("poll_interval must be greater than 0");
        }

        if self.connect_max_retries == 0 {
            anyhow::bail!("connect_max_retries must be greater than 0");
        }

        Ok(())
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    std::env::var(key).map_err(|_| anyhow::anyhow!("{} environment variable not set", key))
}

fn optional<T: FromStr>(key: &str, default: T) -> anyhow::Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} has an invalid value: {}", key, raw)),
        Err(_) => Ok(default),
    }
}

fn parse_flag(key: &str, raw: Option<String>, default: bool) -> anyhow::Result<bool> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("{} has an invalid value: {}", key, raw),
    }
}
