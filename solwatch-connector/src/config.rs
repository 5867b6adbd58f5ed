use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::rpc::Commitment;

/// The top-level configuration for the `solwatch-connector` library.
///
/// This struct aggregates the chain endpoints, the timer settings of the background
/// loops and the channel capacities. It is typically deserialized from a configuration
/// file and passed to the `WorkerController` upon construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ConnectorConfig {
    pub solana: Solana,
    pub synchronizer: Synchronizer,
    pub health: Health,
    pub worker: Worker,
    pub channels: ChannelConfig,
}

/// Defines the connection settings for the Solana cluster being watched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Solana {
    pub rpc_url: String,
    pub ws_url: String,
    /// Chain ticker stamped on every emitted event, e.g. `SOL`.
    pub chain: String,
    pub network: String,
    /// Commitment used for every address subscription the synchronizer creates.
    pub commitment: Commitment,
}

/// Settings of the address set synchronizer loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Synchronizer {
    /// How often the active address set is reconciled against the registry.
    pub refresh_interval_secs: u64,
    /// An address is active when it was queried within this trailing window.
    pub active_window_secs: u64,
}

/// Settings of the connection health monitor loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Health {
    pub check_interval_secs: u64,
    /// Consecutive failed reconnects tolerated before the registry refuses further attempts.
    pub max_reconnect_attempts: u32,
}

/// Settings of the worker lifecycle controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Worker {
    /// Upper bound for a single subscribe, unsubscribe or transaction lookup call.
    pub call_timeout_secs: u64,
    /// First delay of the sync retry backoff.
    pub sync_retry_delay_secs: u64,
    /// Ceiling of the sync retry backoff.
    pub sync_retry_max_delay_secs: u64,
}

/// Defines capacities for the MPSC channels within the connector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ChannelConfig {
    /// The buffer capacity for connection events flowing into the registry dispatcher.
    pub notification_buffer: usize,
}

impl Synchronizer {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn active_window(&self) -> Duration {
        Duration::from_secs(self.active_window_secs)
    }
}

impl Health {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }
}

impl Worker {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

impl Default for Solana {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8899".to_string(),
            ws_url: "ws://127.0.0.1:8900".to_string(),
            chain: "SOL".to_string(),
            network: "mainnet".to_string(),
            commitment: Commitment::Confirmed,
        }
    }
}

impl Default for Synchronizer {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 60,
            active_window_secs: 60 * 60,
        }
    }
}

impl Default for Health {
    fn default() -> Self {
        Self {
            check_interval_secs: 30,
            max_reconnect_attempts: 5,
        }
    }
}

impl Default for Worker {
    fn default() -> Self {
        Self {
            call_timeout_secs: 10,
            sync_retry_delay_secs: 5,
            sync_retry_max_delay_secs: 60,
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            notification_buffer: 1024,
        }
    }
}
