//! # Chain RPC Seams
//!
//! The connector never talks to a cluster directly. Everything it needs from the chain
//! goes through the traits in this module, which lets the node crate plug in the Solana
//! websocket and JSON-RPC clients and lets tests plug in in-memory doubles.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, sync::Arc};
use tokio::sync::mpsc;

use crate::{error::Result, transform::RawTransaction};

/// How finalized a state must be before a subscription reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    #[default]
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Commitment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "confirmed" => Ok(Commitment::Confirmed),
            "finalized" => Ok(Commitment::Finalized),
            other => Err(format!("unsupported commitment level '{}'", other)),
        }
    }
}

/// The remote-assigned identifier of one logs subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionHandle(pub u64);

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An event pushed by a live connection into the registry's dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// A logs notification for the subscription identified by `handle`.
    Log {
        handle: SubscriptionHandle,
        signature: String,
    },
    /// The notification stream behind `handle` ended without being unsubscribed.
    Dropped {
        handle: SubscriptionHandle,
        reason: String,
    },
}

impl ConnectionEvent {
    pub fn handle(&self) -> SubscriptionHandle {
        match self {
            ConnectionEvent::Log { handle, .. } | ConnectionEvent::Dropped { handle, .. } => *handle,
        }
    }
}

/// A long-lived logs subscription connection.
#[async_trait]
pub trait LogsConnection: Send + Sync {
    /// Subscribes to the logs of every transaction mentioning `address`.
    async fn logs_subscribe(
        &self,
        address: &str,
        commitment: Commitment,
    ) -> Result<SubscriptionHandle>;

    /// Tears down the subscription identified by `handle`.
    async fn logs_unsubscribe(&self, handle: SubscriptionHandle) -> Result<()>;
}

/// Produces fresh [`LogsConnection`]s, both at start-up and on every reconnect.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    /// Opens a new connection that reports its notifications on `events`.
    async fn connect(
        &self,
        events: mpsc::Sender<ConnectionEvent>,
    ) -> Result<Arc<dyn LogsConnection>>;
}

/// Parameters of a single transaction lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionQuery {
    pub tx_id: String,
    pub network: String,
    pub chain: String,
}

/// Resolves transaction signatures to their full payload.
#[async_trait]
pub trait ChainStateProvider: Send + Sync {
    /// Returns `None` when the chain does not (yet) know the transaction.
    async fn get_transaction(&self, query: TransactionQuery) -> Result<Option<RawTransaction>>;
}
