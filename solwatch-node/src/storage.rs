//! Provides the `sled`-based implementation of the address store defined in the
//! `solwatch-connector` library.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sled::Db;
use std::collections::HashSet;

use solwatch_connector::{
    error::{ConnectorError, Result},
    storage::AddressStore,
};

/// A `sled`-backed [`AddressStore`].
///
/// Every address lives under `address::{chain}:{network}:{address}` and maps to the
/// millisecond timestamp of its last query, stored as a decimal string.
#[derive(Clone)]
pub struct SledAddressStore {
    db: Db,
}

impl SledAddressStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    fn prefix(chain: &str, network: &str) -> String {
        format!("address::{}:{}:", chain, network)
    }
}

fn storage_err(e: sled::Error) -> ConnectorError {
    ConnectorError::Storage(e.to_string())
}

#[async_trait]
impl AddressStore for SledAddressStore {
    /// Scans the chain/network prefix and keeps addresses queried at or after `since`.
    /// Entries whose value cannot be read as a timestamp are skipped.
    async fn active_addresses(
        &self,
        chain: &str,
        network: &str,
        since: DateTime<Utc>,
    ) -> Result<HashSet<String>> {
        let prefix = Self::prefix(chain, network);
        let since_ms = since.timestamp_millis();
        let mut active = HashSet::new();

        for entry in self.db.scan_prefix(prefix.as_bytes()) {
            let (key, value) = entry.map_err(storage_err)?;
            let Some(last_queried) = std::str::from_utf8(&value)
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
            else {
                tracing::warn!("Skipping unreadable address entry {:?}", key);
                continue;
            };
            if last_queried < since_ms {
                continue;
            }
            if let Ok(address) = std::str::from_utf8(&key[prefix.len()..]) {
                active.insert(address.to_string());
            }
        }
        Ok(active)
    }

    /// Records the query time of `address` and flushes it to disk.
    async fn touch(&self, chain: &str, network: &str, address: &str, at: DateTime<Utc>) -> Result<()> {
        let key = format!("{}{}", Self::prefix(chain, network), address);
        self.db
            .insert(key.as_bytes(), at.timestamp_millis().to_string().as_bytes())
            .map_err(storage_err)?;
        self.db.flush_async().await.map_err(storage_err)?;
        Ok(())
    }
}
