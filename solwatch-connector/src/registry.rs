//! # Subscription Registry
//!
//! The registry owns every live per-address logs subscription of the worker and the
//! routing table that maps remote subscription handles back to the watched address.
//!
//! ## Concurrency
//! Reads (`list_active`, health checks, notification routing) go straight to the
//! concurrent maps. Every mutation (`subscribe`, `unsubscribe`, `reconnect`, `cleanup`)
//! runs under a single async writer lock that also guards the bound connection, so no
//! mutation can interleave with a reconnect in progress.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{
    sync::{mpsc, watch, Mutex},
    task::JoinHandle,
};

use crate::{
    error::{with_timeout, ConnectorError, Result},
    rpc::{Commitment, ConnectionEvent, LogsConnection, SubscriptionHandle},
    shutdown,
};

/// Receives every routed logs notification.
#[async_trait]
pub trait NotificationHandler: Send + Sync {
    async fn on_notification(&self, signature: String, address: String) -> Result<()>;
}

/// The identity of a subscription: one address watched at one commitment level.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    pub address: String,
    pub commitment: Commitment,
}

impl SubscriptionKey {
    pub fn new(address: impl Into<String>, commitment: Commitment) -> Self {
        Self {
            address: address.into(),
            commitment,
        }
    }
}

/// A snapshot of one registry entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub address: String,
    pub commitment: Commitment,
    pub handle: Option<SubscriptionHandle>,
    pub is_active: bool,
    pub last_seen: DateTime<Utc>,
}

/// Health of the registry's connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryHealthState {
    pub is_healthy: bool,
    pub reconnect_attempts: u32,
    pub max_reconnect_attempts: u32,
}

struct Slot {
    subscription: Subscription,
    /// Creation order, replayed on reconnect.
    seq: u64,
}

#[derive(Default)]
struct WriterState {
    connection: Option<Arc<dyn LogsConnection>>,
    next_seq: u64,
    /// Pairs a failed reconnect could not restore; retried in full by the next attempt.
    pending: Vec<SubscriptionKey>,
}

pub struct SubscriptionRegistry {
    chain_network: String,
    handler: Arc<dyn NotificationHandler>,
    call_timeout: Duration,
    max_reconnect_attempts: u32,
    writer: Mutex<WriterState>,
    entries: DashMap<SubscriptionKey, Slot>,
    routes: DashMap<SubscriptionHandle, SubscriptionKey>,
    healthy: AtomicBool,
    reconnect_attempts: AtomicU32,
}

impl SubscriptionRegistry {
    pub fn new(
        chain: &str,
        network: &str,
        handler: Arc<dyn NotificationHandler>,
        call_timeout: Duration,
        max_reconnect_attempts: u32,
    ) -> Self {
        Self {
            chain_network: format!("{}:{}", chain, network),
            handler,
            call_timeout,
            max_reconnect_attempts,
            writer: Mutex::new(WriterState::default()),
            entries: DashMap::new(),
            routes: DashMap::new(),
            healthy: AtomicBool::new(true),
            reconnect_attempts: AtomicU32::new(0),
        }
    }

    /// Binds the connection used by every subsequent call and re-arms reconnects.
    pub async fn initialize(&self, connection: Arc<dyn LogsConnection>) {
        let mut writer = self.writer.lock().await;
        writer.connection = Some(connection);
        self.reconnect_attempts.store(0, Ordering::SeqCst);
        tracing::info!("Subscription registry initialized for {}", self.chain_network);
    }

    /// Subscribes to the logs of `address`. A pair that is already active is left
    /// untouched without any network call. A pair whose stream was lost is closed and
    /// opened again.
    ///
    /// Returns `true` when a remote subscription was opened.
    ///
    /// # Errors
    ///
    /// A failed subscribe marks the registry unhealthy and is returned to the caller.
    pub async fn subscribe(&self, address: &str, commitment: Commitment) -> Result<bool> {
        let key = SubscriptionKey::new(address, commitment);
        if self.is_active(&key) {
            tracing::debug!("Already subscribed to {} with {} commitment", address, commitment);
            return Ok(false);
        }

        let mut writer = self.writer.lock().await;
        // A concurrent caller may have registered the pair while we waited for the lock.
        if self.is_active(&key) {
            return Ok(false);
        }
        let connection = writer
            .connection
            .clone()
            .ok_or(ConnectorError::NotInitialized)?;

        if let Some((_, stale)) = self.entries.remove(&key) {
            if let Some(handle) = stale.subscription.handle {
                self.routes.remove(&handle);
                tracing::info!(address = %address, "Replacing inactive subscription {}", handle);
                if let Err(e) = self.close(connection.as_ref(), handle).await {
                    tracing::debug!("Ignoring unsubscribe failure for {}: {}", handle, e);
                }
            }
        }

        match self.open(&mut writer, connection.as_ref(), key).await {
            Ok(handle) => {
                tracing::info!(
                    "Subscribed to {} logs with {} commitment (ID: {})",
                    address,
                    commitment,
                    handle
                );
                self.settle_health(&writer);
                Ok(true)
            }
            Err(e) => {
                tracing::error!(address = %address, "Failed to subscribe: {}", e);
                self.mark_unhealthy(&e.to_string());
                Err(e)
            }
        }
    }

    /// Removes the pair, issuing a best-effort remote unsubscribe. Unknown pairs are ignored.
    pub async fn unsubscribe(&self, address: &str, commitment: Commitment) {
        let writer = self.writer.lock().await;
        let key = SubscriptionKey::new(address, commitment);
        let Some((_, slot)) = self.entries.remove(&key) else {
            return;
        };
        if !slot.subscription.is_active {
            self.settle_health(&writer);
        }
        let Some(handle) = slot.subscription.handle else {
            return;
        };
        self.routes.remove(&handle);

        let Some(connection) = writer.connection.as_ref() else {
            tracing::warn!(address = %address, "No connection bound, dropping subscription {} locally", handle);
            return;
        };
        match self.close(connection.as_ref(), handle).await {
            Ok(()) => tracing::info!("Unsubscribed from {} logs (ID: {})", address, handle),
            Err(e) => tracing::error!(address = %address, "Failed to unsubscribe: {}", e),
        }
    }

    /// Returns every entry, including those whose stream was lost, in no particular order.
    pub fn list(&self) -> Vec<Subscription> {
        self.entries
            .iter()
            .map(|slot| slot.subscription.clone())
            .collect()
    }

    /// Returns every entry currently marked active, in no particular order.
    pub fn list_active(&self) -> Vec<Subscription> {
        self.entries
            .iter()
            .filter(|slot| slot.subscription.is_active)
            .map(|slot| slot.subscription.clone())
            .collect()
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    pub fn health(&self) -> RegistryHealthState {
        RegistryHealthState {
            is_healthy: self.is_healthy(),
            reconnect_attempts: self.reconnect_attempts.load(Ordering::SeqCst),
            max_reconnect_attempts: self.max_reconnect_attempts,
        }
    }

    /// Rebinds to `connection` and restores every previously registered pair in its
    /// original order.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::ReconnectExhausted`] without touching the network once
    /// the attempt ceiling is reached. Any single resubscribe failure aborts the attempt,
    /// leaving the table cleared and the registry unhealthy.
    pub async fn reconnect(&self, connection: Arc<dyn LogsConnection>) -> Result<()> {
        let mut writer = self.writer.lock().await;

        let attempts = self.reconnect_attempts.load(Ordering::SeqCst);
        if attempts >= self.max_reconnect_attempts {
            tracing::error!("Max reconnection attempts reached for {}", self.chain_network);
            return Err(ConnectorError::ReconnectExhausted { attempts });
        }
        self.reconnect_attempts.store(attempts + 1, Ordering::SeqCst);
        writer.connection = Some(connection.clone());

        let keys = self.replay_order(&mut writer);
        self.entries.clear();
        self.routes.clear();

        let mut opened = Vec::with_capacity(keys.len());
        for key in &keys {
            match self.open(&mut writer, connection.as_ref(), key.clone()).await {
                Ok(handle) => opened.push(handle),
                Err(e) => {
                    tracing::error!(
                        address = %key.address,
                        "Failed to reconnect for {}: {}",
                        self.chain_network,
                        e
                    );
                    for handle in opened {
                        if let Err(err) = self.close(connection.as_ref(), handle).await {
                            tracing::debug!("Ignoring unsubscribe failure for {}: {}", handle, err);
                        }
                    }
                    self.entries.clear();
                    self.routes.clear();
                    writer.pending = keys.clone();
                    self.healthy.store(false, Ordering::SeqCst);
                    return Err(e);
                }
            }
        }

        writer.pending.clear();
        self.reconnect_attempts.store(0, Ordering::SeqCst);
        self.healthy.store(true, Ordering::SeqCst);
        tracing::info!(
            "Successfully reconnected and resubscribed {} addresses for {}",
            keys.len(),
            self.chain_network
        );
        Ok(())
    }

    /// Unsubscribes everything, ignoring individual failures, and empties the table.
    pub async fn cleanup(&self) {
        let mut writer = self.writer.lock().await;
        tracing::info!("Cleaning up subscriptions for {}", self.chain_network);

        let handles: Vec<(SubscriptionHandle, String)> = self
            .entries
            .iter()
            .filter_map(|slot| {
                slot.subscription
                    .handle
                    .map(|h| (h, slot.subscription.address.clone()))
            })
            .collect();

        if let Some(connection) = writer.connection.clone() {
            for (handle, address) in handles {
                if let Err(e) = self.close(connection.as_ref(), handle).await {
                    tracing::error!(address = %address, "Error cleaning up subscription {}: {}", handle, e);
                }
            }
        }

        self.entries.clear();
        self.routes.clear();
        writer.pending.clear();
    }

    /// Routes one connection event.
    ///
    /// A log notification is handed to the [`NotificationHandler`] on its own task, whose
    /// handle is returned; handler failures are logged there and never reach the caller.
    /// A dropped stream marks the registry unhealthy.
    pub fn dispatch(&self, event: ConnectionEvent) -> Option<JoinHandle<()>> {
        let handle = event.handle();
        let Some(key) = self.routes.get(&handle).map(|k| k.clone()) else {
            tracing::debug!("Ignoring event for unknown subscription {}", handle);
            return None;
        };

        match event {
            ConnectionEvent::Log { signature, .. } => {
                tracing::debug!("Log notification received for {}: {}", key.address, signature);
                if let Some(mut slot) = self.entries.get_mut(&key) {
                    slot.subscription.last_seen = Utc::now();
                }

                let handler = self.handler.clone();
                Some(tokio::spawn(async move {
                    if let Err(e) = handler.on_notification(signature.clone(), key.address).await {
                        tracing::error!(
                            signature = %signature,
                            "Error processing transaction notification: {}",
                            e
                        );
                    }
                }))
            }
            ConnectionEvent::Dropped { reason, .. } => {
                tracing::warn!(address = %key.address, "Subscription stream {} dropped: {}", handle, reason);
                self.mark_unhealthy(&reason);
                None
            }
        }
    }

    /// Feeds connection events into [`dispatch`](Self::dispatch) until `shutdown` fires
    /// or every sender is gone.
    pub async fn run_dispatcher(
        self: Arc<Self>,
        mut events: mpsc::Receiver<ConnectionEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        tracing::info!("Notification dispatcher started for {}", self.chain_network);
        loop {
            tokio::select! {
                maybe_event = events.recv() => match maybe_event {
                    Some(event) => {
                        self.dispatch(event);
                    }
                    None => {
                        tracing::info!("All connection senders closed. Dispatcher shutting down.");
                        break;
                    }
                },
                _ = shutdown::requested(&mut shutdown) => {
                    tracing::info!("Dispatcher: shutdown signal received, exiting.");
                    break;
                }
            }
        }
    }

    fn mark_unhealthy(&self, reason: &str) {
        self.healthy.store(false, Ordering::SeqCst);
        tracing::error!("Subscription error for {}: {}", self.chain_network, reason);
        for mut slot in self.entries.iter_mut() {
            slot.subscription.is_active = false;
        }
    }

    fn is_active(&self, key: &SubscriptionKey) -> bool {
        self.entries
            .get(key)
            .is_some_and(|slot| slot.subscription.is_active)
    }

    /// Healthy again once every entry has a live stream and no failed reconnect is pending.
    fn settle_health(&self, writer: &WriterState) {
        if writer.pending.is_empty() && self.entries.iter().all(|slot| slot.subscription.is_active) {
            self.healthy.store(true, Ordering::SeqCst);
        }
    }

    /// Pending pairs of a failed attempt first, then live entries by creation order.
    fn replay_order(&self, writer: &mut WriterState) -> Vec<SubscriptionKey> {
        let mut live: Vec<(u64, SubscriptionKey)> = self
            .entries
            .iter()
            .map(|slot| (slot.seq, slot.key().clone()))
            .collect();
        live.sort_by_key(|(seq, _)| *seq);

        let mut seen = HashSet::new();
        std::mem::take(&mut writer.pending)
            .into_iter()
            .chain(live.into_iter().map(|(_, key)| key))
            .filter(|key| seen.insert(key.clone()))
            .collect()
    }

    async fn open(
        &self,
        writer: &mut WriterState,
        connection: &dyn LogsConnection,
        key: SubscriptionKey,
    ) -> Result<SubscriptionHandle> {
        let handle = with_timeout(
            "logs_subscribe",
            self.call_timeout,
            connection.logs_subscribe(&key.address, key.commitment),
        )
        .await?;

        writer.next_seq += 1;
        self.routes.insert(handle, key.clone());
        self.entries.insert(
            key.clone(),
            Slot {
                subscription: Subscription {
                    address: key.address,
                    commitment: key.commitment,
                    handle: Some(handle),
                    is_active: true,
                    last_seen: Utc::now(),
                },
                seq: writer.next_seq,
            },
        );
        Ok(handle)
    }

    async fn close(&self, connection: &dyn LogsConnection, handle: SubscriptionHandle) -> Result<()> {
        with_timeout(
            "logs_unsubscribe",
            self.call_timeout,
            connection.logs_unsubscribe(handle),
        )
        .await
    }
}
