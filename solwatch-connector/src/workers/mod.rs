//! # Worker Lifecycle Controller & Background Loops
//!
//! This module defines the `WorkerController`, which owns the RPC connection of one
//! chain/network pair and orchestrates every background service needed to keep its
//! address subscriptions live.
//!
//! ## Core Components
//!
//! - [`WorkerController`]: drives the `Stopped -> Starting -> Syncing -> Stopping`
//!   lifecycle and owns the handles of every task it spawns.
//! - **Loops**:
//!   - `AddressSynchronizer`: reconciles the watched addresses against storage.
//!   - `HealthMonitor`: reconnects and resubscribes when the registry turns unhealthy.
//!   - the registry dispatcher: routes connection events to the `NotificationProcessor`.
//!

mod address_sync;
mod health;
mod notifications;

pub use address_sync::{AddressSynchronizer, ReconcileReport};
pub use health::{HealthCheckOutcome, HealthMonitor};
pub use notifications::NotificationProcessor;

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{
    sync::{mpsc, watch, Mutex},
    task::JoinHandle,
    time::sleep,
};

use crate::{
    config::ConnectorConfig,
    error::{with_timeout, Result},
    events::EventSink,
    registry::SubscriptionRegistry,
    rpc::{ChainStateProvider, ConnectionEvent, ConnectionProvider},
    shutdown,
    storage::{AddressStore, SyncingNodeElection},
};

/// Lifecycle state of a [`WorkerController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Stopped,
    Starting,
    Syncing,
    /// Sync setup failed; a retry is scheduled.
    SyncFailed,
    Stopping,
}

/// The external collaborators a worker is wired to.
#[derive(Clone)]
pub struct WorkerDeps {
    pub connections: Arc<dyn ConnectionProvider>,
    pub chain_state: Arc<dyn ChainStateProvider>,
    pub addresses: Arc<dyn AddressStore>,
    pub election: Arc<dyn SyncingNodeElection>,
    pub sink: Arc<dyn EventSink>,
}

#[derive(Default)]
struct Tasks {
    events: Option<mpsc::Sender<ConnectionEvent>>,
    dispatcher: Option<JoinHandle<()>>,
    loops: Vec<JoinHandle<()>>,
}

/// The orchestrator of one chain/network worker.
///
/// Only one process per chain/network pair should be syncing at a time; the
/// [`SyncingNodeElection`] collaborator decides which.
pub struct WorkerController {
    config: Arc<ConnectorConfig>,
    deps: WorkerDeps,
    registry: Arc<SubscriptionRegistry>,
    state: watch::Sender<WorkerState>,
    shutdown: watch::Sender<bool>,
    stopping: AtomicBool,
    tasks: Mutex<Tasks>,
}

impl WorkerController {
    /// Creates a controller in the `Stopped` state. Nothing runs until [`start`](Self::start).
    pub fn new(config: Arc<ConnectorConfig>, deps: WorkerDeps) -> Self {
        let call_timeout = config.worker.call_timeout();
        let processor = NotificationProcessor::new(
            &config.solana.chain,
            &config.solana.network,
            deps.chain_state.clone(),
            deps.sink.clone(),
            call_timeout,
        );
        let registry = Arc::new(SubscriptionRegistry::new(
            &config.solana.chain,
            &config.solana.network,
            Arc::new(processor),
            call_timeout,
            config.health.max_reconnect_attempts,
        ));
        let (state, _) = watch::channel(WorkerState::Stopped);
        let (shutdown, _) = watch::channel(false);

        Self {
            config,
            deps,
            registry,
            state,
            shutdown,
            stopping: AtomicBool::new(false),
            tasks: Mutex::new(Tasks::default()),
        }
    }

    pub fn registry(&self) -> Arc<SubscriptionRegistry> {
        self.registry.clone()
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// A receiver observing every state transition.
    pub fn watch_state(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    fn chain_network(&self) -> String {
        format!("{}:{}", self.config.solana.chain, self.config.solana.network)
    }

    fn set_state(&self, state: WorkerState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!("Worker {} state {:?} -> {:?}", self.chain_network(), previous, state);
        }
    }

    /// Acquires a connection, binds the registry to it, starts routing notifications and
    /// registers this process as the syncing node.
    pub async fn start(&self) -> Result<()> {
        tracing::info!("Starting Solana worker for {}", self.chain_network());
        self.stopping.store(false, Ordering::SeqCst);
        self.shutdown.send_replace(false);
        self.set_state(WorkerState::Starting);

        if let Err(e) = self.bring_up().await {
            tracing::error!("Failed to start Solana worker: {}", e);
            self.stop().await;
            return Err(e);
        }

        self.set_state(WorkerState::Syncing);
        Ok(())
    }

    async fn bring_up(&self) -> Result<()> {
        let (events_tx, events_rx) = mpsc::channel(self.config.channels.notification_buffer);
        let connection = with_timeout(
            "connect",
            self.config.worker.call_timeout(),
            self.deps.connections.connect(events_tx.clone()),
        )
        .await?;
        self.registry.initialize(connection).await;
        tracing::info!("RPC connection established for {}", self.chain_network());

        {
            let mut tasks = self.tasks.lock().await;
            tasks.events = Some(events_tx);
            tasks.dispatcher = Some(tokio::spawn(
                self.registry
                    .clone()
                    .run_dispatcher(events_rx, self.shutdown.subscribe()),
            ));
        }

        self.deps.election.register().await
    }

    /// Starts the address synchronizer and health monitor loops.
    ///
    /// Does nothing unless this node holds the syncing election and is not stopping. A
    /// failed setup is retried with exponential backoff for as long as both hold.
    pub async fn sync(&self) {
        let mut delay = Duration::from_secs(self.config.worker.sync_retry_delay_secs);
        let max_delay = Duration::from_secs(self.config.worker.sync_retry_max_delay_secs).max(delay);
        let mut shutdown = self.shutdown.subscribe();

        loop {
            if self.stopping.load(Ordering::SeqCst) || !self.deps.election.is_elected().await {
                tracing::debug!("Not syncing {}: stopping or not the syncing node", self.chain_network());
                return;
            }

            tracing::info!("Starting sync for {}", self.chain_network());
            match self.start_loops().await {
                Ok(()) => {
                    self.set_state(WorkerState::Syncing);
                    tracing::info!("Sync started for {}", self.chain_network());
                    return;
                }
                Err(e) => {
                    tracing::error!(
                        "Sync failed for {}: {}. Retrying in {:?}",
                        self.chain_network(),
                        e,
                        delay
                    );
                    self.set_state(WorkerState::SyncFailed);
                    tokio::select! {
                        _ = sleep(delay) => {},
                        _ = shutdown::requested(&mut shutdown) => return,
                    }
                    delay = (delay * 2).min(max_delay);
                }
            }
        }
    }

    async fn start_loops(&self) -> Result<()> {
        let mut tasks = self.tasks.lock().await;
        if !tasks.loops.is_empty() {
            tracing::debug!("Sync loops already running for {}", self.chain_network());
            return Ok(());
        }
        let events = tasks
            .events
            .clone()
            .ok_or(crate::error::ConnectorError::NotInitialized)?;

        let synchronizer = AddressSynchronizer::new(
            &self.config,
            self.deps.addresses.clone(),
            self.registry.clone(),
        );
        let report = synchronizer.reconcile().await?;
        tracing::info!(
            "Subscribed to {} active addresses ({} failed)",
            report.subscribed,
            report.failed.len()
        );

        let monitor = HealthMonitor::new(
            self.registry.clone(),
            self.deps.connections.clone(),
            events,
            self.chain_network(),
            self.config.health.check_interval(),
            self.config.worker.call_timeout(),
        );

        tasks.loops.push(tokio::spawn(
            synchronizer.run(self.deps.election.clone(), self.shutdown.subscribe()),
        ));
        tasks.loops.push(tokio::spawn(
            monitor.run(self.deps.election.clone(), self.shutdown.subscribe()),
        ));
        Ok(())
    }

    /// Stops every loop, unsubscribes everything and releases the syncing election.
    ///
    /// Safe to call in any state, including after a `start` that never completed.
    /// Notification handlers already in flight are left to finish on their own.
    pub async fn stop(&self) {
        tracing::info!("Stopping Solana worker for {}", self.chain_network());
        self.stopping.store(true, Ordering::SeqCst);
        self.set_state(WorkerState::Stopping);
        self.shutdown.send_replace(true);

        let (dispatcher, loops) = {
            let mut tasks = self.tasks.lock().await;
            tasks.events = None;
            (tasks.dispatcher.take(), std::mem::take(&mut tasks.loops))
        };
        for handle in loops.into_iter().chain(dispatcher) {
            if let Err(e) = handle.await {
                tracing::warn!("Worker task ended abnormally: {}", e);
            }
        }

        self.registry.cleanup().await;
        if let Err(e) = self.deps.election.unregister().await {
            tracing::warn!("Failed to unregister syncing node: {}", e);
        }
        self.set_state(WorkerState::Stopped);
    }
}
