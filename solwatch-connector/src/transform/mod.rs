//! # Canonical Event Transformer
//!
//! Pure mapping from chain-native transaction payloads into the
//! [`CanonicalTransactionRecord`] shape used by downstream storage and eventing.
//! Nothing in this module performs I/O or keeps state, so the same input always yields
//! the same record.

mod raw;
pub mod stream;

pub use raw::{
    BlockContext, RawAccountKey, RawInstruction, RawMessage, RawMeta, RawTokenAmount,
    RawTokenBalance, RawTransaction, RawTransactionBody, TransactionStatus,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConnectorError, Result};

/// The chain-agnostic representation of one transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalTransactionRecord {
    pub chain: String,
    pub network: String,
    pub txid: String,
    pub category: Option<String>,
    pub from: String,
    pub to: Option<String>,
    /// Lamports moved by the first parsed instruction.
    pub value: u64,
    pub fee: u64,
    pub status: Option<String>,
    pub tx_type: Option<String>,
    pub block_height: Option<u64>,
    pub block_hash: Option<String>,
    pub block_time: DateTime<Utc>,
    pub block_time_normalized: DateTime<Utc>,
    pub error: Option<TransactionFailure>,
    pub token_transfers: Vec<TokenTransfer>,
    pub account_data: Vec<AccountBalanceChange>,
    pub instructions: Vec<InstructionRecord>,
}

/// The execution error reported by the transaction metadata, kept as structured JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionFailure {
    pub error: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTransfer {
    pub from_token_account: String,
    pub to_token_account: String,
    /// Signed change in base units (`post - pre`).
    pub token_amount: i128,
    pub mint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBalanceChange {
    pub account: String,
    pub native_balance_change: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructionRecord {
    pub accounts: Vec<String>,
    pub data: Option<String>,
    pub program_id: String,
}

/// Everything surrounding a transaction that influences its canonical record.
#[derive(Debug, Clone, Copy)]
pub struct TransformContext<'a> {
    pub chain: &'a str,
    pub network: &'a str,
    pub block: Option<&'a BlockContext>,
    pub status: Option<&'a TransactionStatus>,
}

impl<'a> TransformContext<'a> {
    /// A context with no enclosing block and no status entry.
    pub fn standalone(chain: &'a str, network: &'a str) -> Self {
        Self {
            chain,
            network,
            block: None,
            status: None,
        }
    }
}

/// Maps one raw transaction into its canonical record.
///
/// # Errors
///
/// Returns [`ConnectorError::MalformedTransaction`] when the payload cannot yield a
/// trustworthy record: no signature anywhere, no status metadata, balance arrays shorter
/// than the account keys, or token balances pointing outside the account keys.
pub fn transform_transaction(
    ctx: &TransformContext<'_>,
    tx: &RawTransaction,
) -> Result<CanonicalTransactionRecord> {
    let message = &tx.transaction.message;
    let meta = tx
        .meta
        .as_ref()
        .ok_or_else(|| malformed("transaction has no status metadata"))?;

    let txid = tx
        .transaction
        .signatures
        .first()
        .cloned()
        .or_else(|| ctx.status.and_then(|s| s.signature.clone()))
        .ok_or_else(|| malformed("transaction has no signatures"))?;

    let block_height = meta
        .slot
        .or(tx.slot)
        .or_else(|| ctx.block.and_then(|b| b.block_height))
        .or_else(|| ctx.status.and_then(|s| s.slot));

    let block_hash = message
        .recent_blockhash
        .clone()
        .or_else(|| ctx.block.and_then(|b| b.block_hash.clone()));

    let block_time = ctx
        .block
        .and_then(|b| b.block_time)
        .or(tx.block_time)
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

    let status = tx
        .confirmation_status
        .clone()
        .or_else(|| ctx.status.and_then(|s| s.confirmation_status.clone()));

    let from = message
        .account_keys
        .iter()
        .find(|key| key.signer)
        .map(|key| key.pubkey.clone())
        .unwrap_or_default();

    let parsed_ix = message.instructions.iter().find(|ix| ix.parsed.is_some());
    let category = parsed_ix.and_then(|ix| ix.parsed_type()).map(str::to_string);
    let info = parsed_ix.and_then(|ix| ix.parsed_info());
    let to = info
        .and_then(|info| info.get("destination"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let value = info.and_then(|info| info.get("lamports")).map_or(0, lamports);

    Ok(CanonicalTransactionRecord {
        chain: ctx.chain.to_string(),
        network: ctx.network.to_string(),
        txid,
        category,
        from,
        to,
        value,
        fee: meta.fee,
        status,
        tx_type: tx.version.as_ref().map(version_label),
        block_height,
        block_hash,
        block_time,
        block_time_normalized: block_time,
        error: meta.err.clone().map(|error| TransactionFailure { error }),
        token_transfers: token_transfers(message, meta)?,
        account_data: account_data(message, meta)?,
        instructions: message.instructions.iter().map(instruction_record).collect(),
    })
}

fn malformed(reason: &str) -> ConnectorError {
    ConnectorError::MalformedTransaction(reason.to_string())
}

/// Reads a lamport amount as a whole unsigned count. Negative and non-numeric values read
/// as zero; fractional values are truncated toward zero.
fn lamports(raw: &Value) -> u64 {
    match raw {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn version_label(version: &Value) -> String {
    match version {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_amount(balance: &RawTokenBalance) -> Result<i128> {
    balance.ui_token_amount.amount.parse::<i128>().map_err(|_| {
        ConnectorError::MalformedTransaction(format!(
            "token amount '{}' of account index {} is not an integer",
            balance.ui_token_amount.amount, balance.account_index
        ))
    })
}

fn account_at(message: &RawMessage, index: usize) -> Result<String> {
    message
        .account_keys
        .get(index)
        .map(|key| key.pubkey.clone())
        .ok_or_else(|| {
            ConnectorError::MalformedTransaction(format!(
                "token balance references account index {} of {}",
                index,
                message.account_keys.len()
            ))
        })
}

fn token_transfers(message: &RawMessage, meta: &RawMeta) -> Result<Vec<TokenTransfer>> {
    let (Some(pre), Some(post)) = (&meta.pre_token_balances, &meta.post_token_balances) else {
        return Ok(Vec::new());
    };

    let mut transfers = Vec::new();
    for pre_balance in pre {
        let Some(post_balance) = post
            .iter()
            .find(|p| p.account_index == pre_balance.account_index && p.mint == pre_balance.mint)
        else {
            continue;
        };

        let delta = parse_amount(post_balance)? - parse_amount(pre_balance)?;
        if delta == 0 {
            continue;
        }
        transfers.push(TokenTransfer {
            from_token_account: account_at(message, pre_balance.account_index)?,
            to_token_account: account_at(message, post_balance.account_index)?,
            token_amount: delta,
            mint: pre_balance.mint.clone(),
        });
    }
    Ok(transfers)
}

fn account_data(message: &RawMessage, meta: &RawMeta) -> Result<Vec<AccountBalanceChange>> {
    let keys = message.account_keys.len();
    if meta.pre_balances.len() < keys || meta.post_balances.len() < keys {
        return Err(ConnectorError::MalformedTransaction(format!(
            "{} account keys but {} pre and {} post balances",
            keys,
            meta.pre_balances.len(),
            meta.post_balances.len()
        )));
    }

    Ok(message
        .account_keys
        .iter()
        .zip(meta.pre_balances.iter().zip(&meta.post_balances))
        .map(|(key, (pre, post))| AccountBalanceChange {
            account: key.pubkey.clone(),
            native_balance_change: (*post as i128 - *pre as i128) as i64,
        })
        .collect())
}

fn instruction_record(ix: &RawInstruction) -> InstructionRecord {
    InstructionRecord {
        accounts: ix.accounts.clone().unwrap_or_default(),
        data: ix.data.clone(),
        program_id: ix.program_id.clone().unwrap_or_default(),
    }
}
