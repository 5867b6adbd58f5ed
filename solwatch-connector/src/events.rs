use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::{ConnectorError, Result};

/// A coin movement observed for a watched address.
///
/// One `CoinEvent` is built per handled notification and handed to the [`EventSink`];
/// the connector keeps no reference to it afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinEvent {
    pub chain: String,
    pub network: String,
    pub txid: String,
    pub index: u32,
    pub height: u64,
    pub is_coinbase: bool,
    pub value: u64,
    pub address: String,
    pub script: Vec<u8>,
    pub wallet_refs: Vec<String>,
    pub spent_txid: String,
    pub spent_height: u64,
}

/// Downstream consumer of coin events.
///
/// Events may arrive out of order; deduplication is the sink's business.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: CoinEvent) -> Result<()>;
}

/// Forwards every event into an MPSC channel.
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    tx: mpsc::Sender<CoinEvent>,
}

impl ChannelEventSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<CoinEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EventSink for ChannelEventSink {
    async fn emit(&self, event: CoinEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| ConnectorError::SinkClosed)
    }
}

/// Writes each event as one structured log line.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn emit(&self, event: CoinEvent) -> Result<()> {
        tracing::info!(
            chain = %event.chain,
            network = %event.network,
            txid = %event.txid,
            address = %event.address,
            height = event.height,
            value = event.value,
            "[COIN] address coin event"
        );
        Ok(())
    }
}
