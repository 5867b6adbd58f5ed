use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::Result;

/// A trait defining the address storage the synchronizer reconciles against.
/// This allows for different database implementations.
#[async_trait]
pub trait AddressStore: Send + Sync {
    /// Returns every address of `chain`/`network` whose last query time is at or after `since`.
    async fn active_addresses(
        &self,
        chain: &str,
        network: &str,
        since: DateTime<Utc>,
    ) -> Result<HashSet<String>>;

    /// Records that `address` was queried at `at`.
    async fn touch(&self, chain: &str, network: &str, address: &str, at: DateTime<Utc>) -> Result<()>;
}

/// The election deciding which process syncs a chain/network pair.
#[async_trait]
pub trait SyncingNodeElection: Send + Sync {
    async fn register(&self) -> Result<()>;
    async fn unregister(&self) -> Result<()>;
    async fn is_elected(&self) -> bool;
}

/// A single-process election: the node is elected for as long as it is registered.
#[derive(Debug, Default)]
pub struct LocalElection {
    registered: AtomicBool,
}

impl LocalElection {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SyncingNodeElection for LocalElection {
    async fn register(&self) -> Result<()> {
        self.registered.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn unregister(&self) -> Result<()> {
        self.registered.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn is_elected(&self) -> bool {
        self.registered.load(Ordering::SeqCst)
    }
}
