//! Websocket-backed logs subscriptions.
//!
//! Each `logsSubscribe` runs on its own task that owns the notification stream and
//! forwards it as [`ConnectionEvent`]s. Unsubscribing (or dropping the connection)
//! cancels the task, which then tears the remote subscription down.

use async_trait::async_trait;
use dashmap::DashMap;
use solana_client::{
    nonblocking::pubsub_client::PubsubClient,
    rpc_config::{RpcTransactionLogsConfig, RpcTransactionLogsFilter},
};
use solana_sdk::commitment_config::{CommitmentConfig, CommitmentLevel};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::sync::{mpsc, oneshot};
use tokio_stream::StreamExt;

use solwatch_connector::{
    error::{ConnectorError, Result},
    rpc::{Commitment, ConnectionEvent, ConnectionProvider, LogsConnection, SubscriptionHandle},
};

/// Handles are unique for the whole process, so events of a replaced connection can
/// never be routed to a subscription of its successor.
static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

type CancelTx = oneshot::Sender<oneshot::Sender<()>>;

/// Opens a fresh websocket connection on every `connect`.
pub struct PubsubConnectionProvider {
    ws_url: String,
}

impl PubsubConnectionProvider {
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
        }
    }
}

#[async_trait]
impl ConnectionProvider for PubsubConnectionProvider {
    async fn connect(
        &self,
        events: mpsc::Sender<ConnectionEvent>,
    ) -> Result<Arc<dyn LogsConnection>> {
        let client = PubsubClient::new(&self.ws_url)
            .await
            .map_err(|e| ConnectorError::Rpc(e.to_string()))?;
        tracing::info!("Connected to {}", self.ws_url);
        Ok(Arc::new(PubsubLogsConnection {
            client: Arc::new(client),
            events,
            cancels: DashMap::new(),
        }))
    }
}

pub struct PubsubLogsConnection {
    client: Arc<PubsubClient>,
    events: mpsc::Sender<ConnectionEvent>,
    cancels: DashMap<SubscriptionHandle, CancelTx>,
}

#[async_trait]
impl LogsConnection for PubsubLogsConnection {
    async fn logs_subscribe(
        &self,
        address: &str,
        commitment: Commitment,
    ) -> Result<SubscriptionHandle> {
        let handle = SubscriptionHandle(NEXT_HANDLE.fetch_add(1, Ordering::SeqCst));
        let (ready_tx, ready_rx) = oneshot::channel();
        let (cancel_tx, cancel_rx) = oneshot::channel();

        tokio::spawn(forward_logs(
            self.client.clone(),
            handle,
            address.to_string(),
            commitment_config(commitment),
            self.events.clone(),
            ready_tx,
            cancel_rx,
        ));

        match ready_rx.await {
            Ok(Ok(())) => {
                self.cancels.insert(handle, cancel_tx);
                Ok(handle)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ConnectorError::Rpc(format!(
                "subscription task for {} ended before confirming",
                address
            ))),
        }
    }

    async fn logs_unsubscribe(&self, handle: SubscriptionHandle) -> Result<()> {
        let Some((_, cancel)) = self.cancels.remove(&handle) else {
            return Err(ConnectorError::Rpc(format!("unknown subscription {}", handle)));
        };
        let (done_tx, done_rx) = oneshot::channel();
        if cancel.send(done_tx).is_err() {
            // The stream already ended on its own.
            return Ok(());
        }
        done_rx
            .await
            .map_err(|_| ConnectorError::Rpc(format!("unsubscribe of {} was interrupted", handle)))
    }
}

fn commitment_config(commitment: Commitment) -> CommitmentConfig {
    let commitment = match commitment {
        Commitment::Confirmed => CommitmentLevel::Confirmed,
        Commitment::Finalized => CommitmentLevel::Finalized,
    };
    CommitmentConfig { commitment }
}

enum Exit {
    Ended,
    ReceiverGone,
    Cancelled(Option<oneshot::Sender<()>>),
}

async fn forward_logs(
    client: Arc<PubsubClient>,
    handle: SubscriptionHandle,
    address: String,
    commitment: CommitmentConfig,
    events: mpsc::Sender<ConnectionEvent>,
    ready: oneshot::Sender<Result<()>>,
    mut cancel: oneshot::Receiver<oneshot::Sender<()>>,
) {
    let subscribed = client
        .logs_subscribe(
            RpcTransactionLogsFilter::Mentions(vec![address.clone()]),
            RpcTransactionLogsConfig {
                commitment: Some(commitment),
            },
        )
        .await;

    let (mut stream, unsubscribe) = match subscribed {
        Ok(subscription) => subscription,
        Err(e) => {
            let _ = ready.send(Err(ConnectorError::Rpc(e.to_string())));
            return;
        }
    };
    if ready.send(Ok(())).is_err() {
        // The caller gave up waiting; nobody will ever learn this handle.
        drop(stream);
        unsubscribe().await;
        return;
    }

    let exit = loop {
        tokio::select! {
            maybe_msg = stream.next() => match maybe_msg {
                Some(msg) => {
                    let event = ConnectionEvent::Log {
                        handle,
                        signature: msg.value.signature,
                    };
                    if events.send(event).await.is_err() {
                        break Exit::ReceiverGone;
                    }
                }
                None => break Exit::Ended,
            },
            reply = &mut cancel => break Exit::Cancelled(reply.ok()),
        }
    };
    drop(stream);

    match exit {
        Exit::Ended => {
            tracing::warn!(address = %address, "Logs stream {} ended", handle);
            let _ = events
                .send(ConnectionEvent::Dropped {
                    handle,
                    reason: "logs stream ended".to_string(),
                })
                .await;
        }
        Exit::ReceiverGone => unsubscribe().await,
        Exit::Cancelled(done) => {
            unsubscribe().await;
            if let Some(done) = done {
                let _ = done.send(());
            }
        }
    }
}
