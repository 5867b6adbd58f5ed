//! Block stream payloads: the batch form in which a streaming provider delivers
//! transactions, and the server-side style filter that narrows a batch down to the
//! watched addresses.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::{
    transform_transaction, BlockContext, CanonicalTransactionRecord, RawTransaction,
    TransactionStatus, TransformContext,
};
use crate::error::{ConnectorError, Result};

/// The vote program; transactions touching it are never interesting to wallets.
pub const VOTE_PROGRAM_ID: &str = "Vote111111111111111111111111111111111111111";

/// A block as delivered by a stream, optionally carrying its transactions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamBlock {
    #[serde(flatten)]
    pub context: BlockContext,
    #[serde(default)]
    pub transactions: Vec<RawTransaction>,
}

/// One stream delivery.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamPayload {
    #[serde(default)]
    pub block: Option<StreamBlock>,
    /// Takes precedence over `block.transactions` when present.
    #[serde(default)]
    pub transactions: Option<Vec<RawTransaction>>,
    /// Index-aligned with the transaction list.
    #[serde(default)]
    pub tx_statuses: Option<Vec<TransactionStatus>>,
}

impl StreamPayload {
    fn transactions(&self) -> Option<&[RawTransaction]> {
        match (&self.transactions, &self.block) {
            (Some(txs), _) => Some(txs.as_slice()),
            (None, Some(block)) => Some(block.transactions.as_slice()),
            (None, None) => None,
        }
    }
}

/// The key of the provider-side allow-list holding the watched addresses of a chain/network.
pub fn address_list_key(chain: &str, network: &str) -> String {
    format!("{}-{}-addressStream", chain.to_lowercase(), network)
}

/// Transforms every transaction of `payload`, in delivery order.
///
/// A block time, once seen, carries forward to later transactions of the same payload
/// that have none of their own.
pub fn transform_stream(
    payload: &StreamPayload,
    chain: &str,
    network: &str,
) -> Result<Vec<CanonicalTransactionRecord>> {
    let transactions = payload.transactions().ok_or_else(|| {
        ConnectorError::MalformedTransaction("stream payload has neither block nor transactions".to_string())
    })?;

    let mut block = payload
        .block
        .as_ref()
        .map(|b| b.context.clone())
        .unwrap_or_default();

    transactions
        .iter()
        .enumerate()
        .map(|(index, tx)| {
            block.block_time = block.block_time.or(tx.block_time);
            let ctx = TransformContext {
                chain,
                network,
                block: Some(&block),
                status: payload.tx_statuses.as_ref().and_then(|s| s.get(index)),
            };
            transform_transaction(&ctx, tx)
        })
        .collect()
}

/// Returns `true` when `tx` is a validator vote.
pub fn is_vote_transaction(tx: &RawTransaction) -> bool {
    let message = &tx.transaction.message;
    message.instructions.iter().any(|ix| {
        ix.program.as_deref() == Some("vote")
            || ix.parsed_type() == Some("compactupdatevotestate")
    }) || message
        .account_keys
        .iter()
        .any(|key| key.pubkey == VOTE_PROGRAM_ID)
}

/// Keeps only non-vote transactions that mention at least one `allowed` address.
///
/// Status entries are filtered in lockstep so that index alignment survives.
pub fn filter_stream_transactions(payload: StreamPayload, allowed: &HashSet<String>) -> StreamPayload {
    let keep = |tx: &RawTransaction| {
        !is_vote_transaction(tx)
            && tx
                .transaction
                .message
                .account_keys
                .iter()
                .any(|key| allowed.contains(&key.pubkey))
    };

    let StreamPayload {
        mut block,
        transactions,
        tx_statuses,
    } = payload;

    let (transactions, tx_statuses) = match transactions {
        Some(txs) => {
            let (txs, statuses) = retain_aligned(txs, tx_statuses, keep);
            (Some(txs), statuses)
        }
        None => match block.as_mut() {
            Some(b) => {
                let (txs, statuses) = retain_aligned(std::mem::take(&mut b.transactions), tx_statuses, keep);
                b.transactions = txs;
                (None, statuses)
            }
            None => (None, tx_statuses),
        },
    };

    StreamPayload {
        block,
        transactions,
        tx_statuses,
    }
}

fn retain_aligned<F>(
    txs: Vec<RawTransaction>,
    statuses: Option<Vec<TransactionStatus>>,
    keep: F,
) -> (Vec<RawTransaction>, Option<Vec<TransactionStatus>>)
where
    F: Fn(&RawTransaction) -> bool,
{
    let mask: Vec<bool> = txs.iter().map(&keep).collect();
    let statuses = statuses.map(|statuses| {
        statuses
            .into_iter()
            .enumerate()
            .filter(|(i, _)| mask.get(*i).copied().unwrap_or(false))
            .map(|(_, s)| s)
            .collect()
    });
    let txs = txs
        .into_iter()
        .zip(&mask)
        .filter(|(_, kept)| **kept)
        .map(|(tx, _)| tx)
        .collect();
    (txs, statuses)
}
