use async_trait::async_trait;
use std::{sync::Arc, time::Duration};

use crate::{
    error::{with_timeout, Result},
    events::{CoinEvent, EventSink},
    registry::NotificationHandler,
    rpc::{ChainStateProvider, TransactionQuery},
    transform::{transform_transaction, CanonicalTransactionRecord, TransformContext},
};

/// Turns routed logs notifications into coin events.
///
/// Every notification is handled on its own task, so a slow lookup for one signature
/// never holds up the next.
pub struct NotificationProcessor {
    chain: String,
    network: String,
    chain_state: Arc<dyn ChainStateProvider>,
    sink: Arc<dyn EventSink>,
    call_timeout: Duration,
}

impl NotificationProcessor {
    pub fn new(
        chain: &str,
        network: &str,
        chain_state: Arc<dyn ChainStateProvider>,
        sink: Arc<dyn EventSink>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            chain: chain.to_string(),
            network: network.to_string(),
            chain_state,
            sink,
            call_timeout,
        }
    }

    fn coin_event(&self, record: &CanonicalTransactionRecord, signature: String, address: String) -> CoinEvent {
        CoinEvent {
            chain: self.chain.clone(),
            network: self.network.clone(),
            txid: signature,
            index: 0,
            height: record.block_height.unwrap_or(0),
            is_coinbase: false,
            value: record.value,
            address,
            script: Vec::new(),
            wallet_refs: Vec::new(),
            spent_txid: String::new(),
            spent_height: 0,
        }
    }
}

#[async_trait]
impl NotificationHandler for NotificationProcessor {
    async fn on_notification(&self, signature: String, address: String) -> Result<()> {
        tracing::debug!(
            signature = %signature,
            address = %address,
            "Processing transaction notification"
        );

        let query = TransactionQuery {
            tx_id: signature.clone(),
            network: self.network.clone(),
            chain: self.chain.clone(),
        };
        let Some(tx) = with_timeout(
            "get_transaction",
            self.call_timeout,
            self.chain_state.get_transaction(query),
        )
        .await?
        else {
            tracing::warn!(signature = %signature, "Transaction not found");
            return Ok(());
        };

        let record = transform_transaction(&TransformContext::standalone(&self.chain, &self.network), &tx)?;
        let event = self.coin_event(&record, signature.clone(), address.clone());
        self.sink.emit(event).await?;

        tracing::info!(
            signature = %signature,
            address = %address,
            "Emitted coin event"
        );
        Ok(())
    }
}
