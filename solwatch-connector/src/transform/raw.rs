//! Chain-native transaction payloads as delivered by `jsonParsed` RPC responses and
//! block streams. Every field the transformer can live without is optional so that one
//! missing key never rejects an otherwise usable payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One transaction with its status metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    #[serde(default)]
    pub slot: Option<u64>,
    #[serde(default)]
    pub block_time: Option<i64>,
    /// `"legacy"` or a numeric version.
    #[serde(default)]
    pub version: Option<Value>,
    #[serde(default)]
    pub confirmation_status: Option<String>,
    pub transaction: RawTransactionBody,
    #[serde(default)]
    pub meta: Option<RawMeta>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransactionBody {
    #[serde(default)]
    pub signatures: Vec<String>,
    pub message: RawMessage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    #[serde(default)]
    pub account_keys: Vec<RawAccountKey>,
    #[serde(default)]
    pub instructions: Vec<RawInstruction>,
    #[serde(default)]
    pub recent_blockhash: Option<String>,
}

/// An account key of the message. Plain base58 strings are accepted as well and read
/// as non-signing, read-only keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "AccountKeyRepr")]
pub struct RawAccountKey {
    pub pubkey: String,
    pub signer: bool,
    pub writable: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AccountKeyRepr {
    Plain(String),
    Parsed {
        pubkey: String,
        #[serde(default)]
        signer: bool,
        #[serde(default)]
        writable: bool,
    },
}

impl From<AccountKeyRepr> for RawAccountKey {
    fn from(repr: AccountKeyRepr) -> Self {
        match repr {
            AccountKeyRepr::Plain(pubkey) => Self {
                pubkey,
                signer: false,
                writable: false,
            },
            AccountKeyRepr::Parsed {
                pubkey,
                signer,
                writable,
            } => Self {
                pubkey,
                signer,
                writable,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawInstruction {
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub program_id: Option<String>,
    /// Decoded instruction, usually `{ "type": ..., "info": {...} }`.
    #[serde(default)]
    pub parsed: Option<Value>,
    #[serde(default)]
    pub accounts: Option<Vec<String>>,
    #[serde(default)]
    pub data: Option<String>,
}

impl RawInstruction {
    /// The `type` of the parsed instruction, when it has one.
    pub fn parsed_type(&self) -> Option<&str> {
        self.parsed.as_ref()?.get("type")?.as_str()
    }

    pub(crate) fn parsed_info(&self) -> Option<&Value> {
        self.parsed.as_ref()?.get("info")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMeta {
    #[serde(default)]
    pub slot: Option<u64>,
    #[serde(default)]
    pub fee: u64,
    #[serde(default)]
    pub err: Option<Value>,
    #[serde(default)]
    pub pre_balances: Vec<u64>,
    #[serde(default)]
    pub post_balances: Vec<u64>,
    #[serde(default)]
    pub pre_token_balances: Option<Vec<RawTokenBalance>>,
    #[serde(default)]
    pub post_token_balances: Option<Vec<RawTokenBalance>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTokenBalance {
    pub account_index: usize,
    pub mint: String,
    pub ui_token_amount: RawTokenAmount,
    #[serde(default)]
    pub owner: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTokenAmount {
    /// Raw integer amount in base units, as a decimal string.
    pub amount: String,
    #[serde(default)]
    pub decimals: Option<u8>,
}

/// Block-level context surrounding a transaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockContext {
    #[serde(default)]
    pub block_height: Option<u64>,
    #[serde(default, rename = "blockhash")]
    pub block_hash: Option<String>,
    #[serde(default)]
    pub block_time: Option<i64>,
}

/// Per-transaction status entry of a stream payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStatus {
    #[serde(default)]
    pub slot: Option<u64>,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub confirmation_status: Option<String>,
}
