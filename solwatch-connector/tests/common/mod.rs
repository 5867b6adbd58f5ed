#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use solwatch_connector::{
    error::{ConnectorError, Result},
    registry::NotificationHandler,
    rpc::{
        ChainStateProvider, Commitment, ConnectionEvent, ConnectionProvider, LogsConnection,
        SubscriptionHandle, TransactionQuery,
    },
    storage::AddressStore,
    transform::RawTransaction,
};
use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};
use tokio::sync::mpsc;

/// An in-memory logs connection that counts every call it receives.
#[derive(Default)]
pub struct MockConnection {
    next_handle: AtomicU64,
    pub subscribes: AtomicUsize,
    pub unsubscribes: AtomicUsize,
    pub fail_subscribe: AtomicBool,
    pub fail_unsubscribe: AtomicBool,
    pub subscribed: Mutex<Vec<(String, Commitment)>>,
    live: Mutex<HashMap<SubscriptionHandle, String>>,
}

impl MockConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let conn = Self::default();
        conn.fail_subscribe.store(true, Ordering::SeqCst);
        Arc::new(conn)
    }

    pub fn subscribe_calls(&self) -> usize {
        self.subscribes.load(Ordering::SeqCst)
    }

    pub fn unsubscribe_calls(&self) -> usize {
        self.unsubscribes.load(Ordering::SeqCst)
    }

    /// The handle currently bound to `address`, if any.
    pub fn handle_of(&self, address: &str) -> Option<SubscriptionHandle> {
        self.live
            .lock()
            .unwrap()
            .iter()
            .find(|(_, a)| a.as_str() == address)
            .map(|(h, _)| *h)
    }

    pub fn live_count(&self) -> usize {
        self.live.lock().unwrap().len()
    }
}

#[async_trait]
impl LogsConnection for MockConnection {
    async fn logs_subscribe(
        &self,
        address: &str,
        commitment: Commitment,
    ) -> Result<SubscriptionHandle> {
        self.subscribes.fetch_add(1, Ordering::SeqCst);
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(ConnectorError::Rpc("subscribe refused".to_string()));
        }
        let handle = SubscriptionHandle(self.next_handle.fetch_add(1, Ordering::SeqCst) + 1);
        self.live.lock().unwrap().insert(handle, address.to_string());
        self.subscribed
            .lock()
            .unwrap()
            .push((address.to_string(), commitment));
        Ok(handle)
    }

    async fn logs_unsubscribe(&self, handle: SubscriptionHandle) -> Result<()> {
        self.unsubscribes.fetch_add(1, Ordering::SeqCst);
        if self.fail_unsubscribe.load(Ordering::SeqCst) {
            return Err(ConnectorError::Rpc("unsubscribe refused".to_string()));
        }
        self.live.lock().unwrap().remove(&handle);
        Ok(())
    }
}

/// Hands out queued connections in order; once the queue is empty it fails.
#[derive(Default)]
pub struct MockProvider {
    queue: Mutex<Vec<Arc<MockConnection>>>,
    pub connects: AtomicUsize,
    pub events: Mutex<Option<mpsc::Sender<ConnectionEvent>>>,
}

impl MockProvider {
    pub fn with(connections: Vec<Arc<MockConnection>>) -> Arc<Self> {
        let provider = Self::default();
        *provider.queue.lock().unwrap() = connections.into_iter().rev().collect();
        Arc::new(provider)
    }

    pub fn push(&self, connection: Arc<MockConnection>) {
        self.queue.lock().unwrap().insert(0, connection);
    }

    pub fn connect_calls(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// The event sender handed to the most recent `connect`.
    pub fn sender(&self) -> mpsc::Sender<ConnectionEvent> {
        self.events
            .lock()
            .unwrap()
            .clone()
            .expect("connect was never called")
    }
}

#[async_trait]
impl ConnectionProvider for MockProvider {
    async fn connect(
        &self,
        events: mpsc::Sender<ConnectionEvent>,
    ) -> Result<Arc<dyn LogsConnection>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        *self.events.lock().unwrap() = Some(events);
        match self.queue.lock().unwrap().pop() {
            Some(conn) => Ok(conn as Arc<dyn LogsConnection>),
            None => Err(ConnectorError::Rpc("connection refused".to_string())),
        }
    }
}

/// Serves transactions from a fixed map keyed by signature.
#[derive(Default)]
pub struct MockChainState {
    pub transactions: Mutex<HashMap<String, RawTransaction>>,
    pub lookups: AtomicUsize,
}

impl MockChainState {
    pub fn with(transactions: Vec<RawTransaction>) -> Arc<Self> {
        let state = Self::default();
        {
            let mut map = state.transactions.lock().unwrap();
            for tx in transactions {
                map.insert(tx.transaction.signatures[0].clone(), tx);
            }
        }
        Arc::new(state)
    }
}

#[async_trait]
impl ChainStateProvider for MockChainState {
    async fn get_transaction(&self, query: TransactionQuery) -> Result<Option<RawTransaction>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.transactions.lock().unwrap().get(&query.tx_id).cloned())
    }
}

/// An address store backed by a map of last query times.
#[derive(Default)]
pub struct MemoryAddressStore {
    pub addresses: Mutex<HashMap<(String, String, String), DateTime<Utc>>>,
    pub fail: AtomicBool,
}

impl MemoryAddressStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, chain: &str, network: &str, address: &str, at: DateTime<Utc>) {
        self.addresses.lock().unwrap().insert(
            (chain.to_string(), network.to_string(), address.to_string()),
            at,
        );
    }

    pub fn remove(&self, chain: &str, network: &str, address: &str) {
        self.addresses.lock().unwrap().remove(&(
            chain.to_string(),
            network.to_string(),
            address.to_string(),
        ));
    }
}

#[async_trait]
impl AddressStore for MemoryAddressStore {
    async fn active_addresses(
        &self,
        chain: &str,
        network: &str,
        since: DateTime<Utc>,
    ) -> Result<HashSet<String>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ConnectorError::Storage("store offline".to_string()));
        }
        Ok(self
            .addresses
            .lock()
            .unwrap()
            .iter()
            .filter(|((c, n, _), at)| c == chain && n == network && **at >= since)
            .map(|((_, _, a), _)| a.clone())
            .collect())
    }

    async fn touch(&self, chain: &str, network: &str, address: &str, at: DateTime<Utc>) -> Result<()> {
        self.insert(chain, network, address, at);
        Ok(())
    }
}

/// Records every notification it is handed.
#[derive(Default)]
pub struct RecordingHandler {
    pub seen: Mutex<Vec<(String, String)>>,
}

impl RecordingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl NotificationHandler for RecordingHandler {
    async fn on_notification(&self, signature: String, address: String) -> Result<()> {
        self.seen.lock().unwrap().push((signature, address));
        Ok(())
    }
}

/// A `jsonParsed` system transfer of `lamports` from `from` to `to`.
pub fn transfer_json(signature: &str, from: &str, to: &str, lamports: u64) -> Value {
    json!({
        "slot": 250_000_123u64,
        "blockTime": 1_700_000_000i64,
        "version": "legacy",
        "transaction": {
            "signatures": [signature],
            "message": {
                "accountKeys": [
                    { "pubkey": from, "signer": true, "writable": true },
                    { "pubkey": to, "signer": false, "writable": true },
                    { "pubkey": "11111111111111111111111111111111", "signer": false, "writable": false }
                ],
                "recentBlockhash": "9sHcv6xwn9YkB8nxTUGKDwPwNnmqVp5oAXxU8Fdkm4J6",
                "instructions": [
                    {
                        "program": "system",
                        "programId": "11111111111111111111111111111111",
                        "parsed": {
                            "type": "transfer",
                            "info": { "source": from, "destination": to, "lamports": lamports }
                        }
                    }
                ]
            }
        },
        "meta": {
            "fee": 5000,
            "err": null,
            "preBalances": [1_000_000_000u64, 0, 1],
            "postBalances": [1_000_000_000u64 - lamports - 5000, lamports, 1],
            "preTokenBalances": [],
            "postTokenBalances": []
        }
    })
}

pub fn transfer(signature: &str, from: &str, to: &str, lamports: u64) -> RawTransaction {
    serde_json::from_value(transfer_json(signature, from, to, lamports)).unwrap()
}
