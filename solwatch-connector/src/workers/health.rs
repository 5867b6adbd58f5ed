use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, watch},
    time::{interval_at, Instant, MissedTickBehavior},
};

use crate::{
    error::{with_timeout, Result},
    registry::SubscriptionRegistry,
    rpc::{ConnectionEvent, ConnectionProvider},
    shutdown,
    storage::SyncingNodeElection,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthCheckOutcome {
    Healthy,
    Reconnected,
    ReconnectFailed,
    /// The attempt ceiling is reached; no connection is opened until the registry is
    /// initialized again.
    Exhausted,
}

/// Level-triggered liveness check: every tick that finds the registry unhealthy fetches a
/// fresh connection and asks the registry to reconnect onto it.
pub struct HealthMonitor {
    registry: Arc<SubscriptionRegistry>,
    connections: Arc<dyn ConnectionProvider>,
    events: mpsc::Sender<ConnectionEvent>,
    chain_network: String,
    check_interval: Duration,
    call_timeout: Duration,
}

impl HealthMonitor {
    pub fn new(
        registry: Arc<SubscriptionRegistry>,
        connections: Arc<dyn ConnectionProvider>,
        events: mpsc::Sender<ConnectionEvent>,
        chain_network: String,
        check_interval: Duration,
        call_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            connections,
            events,
            chain_network,
            check_interval,
            call_timeout,
        }
    }

    /// Runs one health check. Failures are logged, never escalated.
    pub async fn check(&self) -> HealthCheckOutcome {
        if self.registry.is_healthy() {
            return HealthCheckOutcome::Healthy;
        }
        let health = self.registry.health();
        if health.reconnect_attempts >= health.max_reconnect_attempts {
            tracing::error!(
                "Max reconnection attempts ({}) reached for {}, not reconnecting",
                health.max_reconnect_attempts,
                self.chain_network
            );
            return HealthCheckOutcome::Exhausted;
        }

        tracing::warn!(
            "Subscription unhealthy for {}, attempting reconnect",
            self.chain_network
        );
        match self.reconnect().await {
            Ok(()) => {
                tracing::info!("Successfully reconnected for {}", self.chain_network);
                HealthCheckOutcome::Reconnected
            }
            Err(e) => {
                tracing::error!("Failed to reconnect for {}: {}", self.chain_network, e);
                HealthCheckOutcome::ReconnectFailed
            }
        }
    }

    async fn reconnect(&self) -> Result<()> {
        let connection = with_timeout(
            "connect",
            self.call_timeout,
            self.connections.connect(self.events.clone()),
        )
        .await?;
        self.registry.reconnect(connection).await
    }

    /// Checks every `check_interval` until `shutdown` fires. Ticks are skipped while the
    /// node does not hold the syncing election.
    pub async fn run(
        self,
        election: Arc<dyn SyncingNodeElection>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = interval_at(Instant::now() + self.check_interval, self.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let stopping = *shutdown.borrow();
                    if stopping || !election.is_elected().await {
                        continue;
                    }
                    self.check().await;
                },
                _ = shutdown::requested(&mut shutdown) => {
                    tracing::info!("HealthMonitor: shutdown signal received, exiting.");
                    return;
                }
            }
        }
    }
}
