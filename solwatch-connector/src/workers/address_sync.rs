use chrono::Utc;
use std::{
    collections::HashSet,
    sync::Arc,
    time::Duration,
};
use tokio::{
    sync::watch,
    time::{interval_at, Instant, MissedTickBehavior},
};

use crate::{
    config::ConnectorConfig,
    error::{ConnectorError, Result},
    registry::SubscriptionRegistry,
    rpc::Commitment,
    shutdown,
    storage::{AddressStore, SyncingNodeElection},
};

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub subscribed: usize,
    pub unsubscribed: usize,
    /// Addresses whose subscribe failed; they are retried on the next pass.
    pub failed: Vec<String>,
}

/// Keeps the registry's subscriptions equal to the set of recently queried addresses.
///
/// Each pass diffs the full active set against the full subscribed set, so one pass
/// converges regardless of what was missed before.
pub struct AddressSynchronizer {
    chain: String,
    network: String,
    commitment: Commitment,
    active_window: Duration,
    refresh_interval: Duration,
    store: Arc<dyn AddressStore>,
    registry: Arc<SubscriptionRegistry>,
}

impl AddressSynchronizer {
    pub fn new(
        config: &ConnectorConfig,
        store: Arc<dyn AddressStore>,
        registry: Arc<SubscriptionRegistry>,
    ) -> Self {
        Self {
            chain: config.solana.chain.clone(),
            network: config.solana.network.clone(),
            commitment: config.solana.commitment,
            active_window: config.synchronizer.active_window(),
            refresh_interval: config.synchronizer.refresh_interval(),
            store,
            registry,
        }
    }

    /// Runs one reconciliation pass.
    ///
    /// # Errors
    ///
    /// Only a failure to read the active set aborts the pass; individual subscribe
    /// failures are reported in the returned [`ReconcileReport`].
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let window = chrono::Duration::from_std(self.active_window)
            .map_err(|e| ConnectorError::Storage(format!("invalid active window: {}", e)))?;
        let since = Utc::now() - window;
        let active: HashSet<String> = self
            .store
            .active_addresses(&self.chain, &self.network, since)
            .await?;

        let registered = self.registry.list();
        let watched: HashSet<&str> = registered
            .iter()
            .filter(|sub| sub.is_active)
            .map(|sub| sub.address.as_str())
            .collect();

        tracing::debug!(
            active = active.len(),
            subscribed = watched.len(),
            "Reconciling address subscriptions"
        );

        let mut report = ReconcileReport::default();

        for address in active.iter().filter(|a| !watched.contains(a.as_str())) {
            match self.registry.subscribe(address, self.commitment).await {
                Ok(true) => {
                    tracing::info!(address = %address, "Subscribed to new active address");
                    report.subscribed += 1;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(address = %address, "Failed to subscribe to new address: {}", e);
                    report.failed.push(address.clone());
                }
            }
        }

        // Lost streams of a commitment no longer configured are dropped along with the
        // addresses that left the active set.
        let stale = registered.iter().filter(|sub| {
            !active.contains(&sub.address) || (!sub.is_active && sub.commitment != self.commitment)
        });
        for sub in stale {
            self.registry.unsubscribe(&sub.address, sub.commitment).await;
            tracing::info!(address = %sub.address, "Unsubscribed from inactive address");
            report.unsubscribed += 1;
        }

        Ok(report)
    }

    /// Reconciles every `refresh_interval` until `shutdown` fires. Ticks are skipped while
    /// the node does not hold the syncing election.
    pub async fn run(
        self,
        election: Arc<dyn SyncingNodeElection>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = interval_at(Instant::now() + self.refresh_interval, self.refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let stopping = *shutdown.borrow();
                    if stopping || !election.is_elected().await {
                        continue;
                    }
                    match self.reconcile().await {
                        Ok(report) => tracing::debug!(?report, "Address refresh complete"),
                        Err(e) => tracing::error!("Failed to refresh address subscriptions: {}", e),
                    }
                },
                _ = shutdown::requested(&mut shutdown) => {
                    tracing::info!("AddressSynchronizer: shutdown signal received, exiting.");
                    return;
                }
            }
        }
    }
}
