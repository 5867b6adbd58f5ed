//! A core Rust library for watching Solana addresses through per-address logs subscriptions.
//!
//! This crate provides the building blocks of a chain-monitoring worker: it keeps one
//! logs subscription alive for every recently queried address, survives connection loss
//! and turns every matching transaction into a canonical record and a coin event.
//!
//! # Key Components
//!
//! *   [`registry::SubscriptionRegistry`]: The table of live subscriptions, their health and
//!     the routing of notifications back to the watched address.
//! *   [`workers::WorkerController`]: The main entry point. It owns the connection and runs
//!     the address synchronizer, the health monitor and the notification dispatcher.
//! *   [`transform`]: Pure conversion of `jsonParsed` transactions into
//!     [`transform::CanonicalTransactionRecord`]s.
//! *   [`rpc`] and [`storage`]: The seams through which the chain, the address store and the
//!     syncing-node election are plugged in.

/// Defines configuration structures for the connector.
pub mod config;
pub mod error;
/// Coin events and the sinks that receive them.
pub mod events;
pub mod registry;
/// Connection, subscription and transaction lookup traits.
pub mod rpc;
mod shutdown;
/// Address storage and syncing-node election traits.
pub mod storage;
pub mod transform;
/// The background workers and their lifecycle controller.
pub mod workers;

pub use error::{ConnectorError, Result};
