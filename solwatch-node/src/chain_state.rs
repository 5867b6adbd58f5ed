use async_trait::async_trait;
use serde_json::json;
use solana_client::{nonblocking::rpc_client::RpcClient, rpc_request::RpcRequest};

use solwatch_connector::{
    error::{ConnectorError, Result},
    rpc::{ChainStateProvider, Commitment, TransactionQuery},
    transform::RawTransaction,
};

/// Looks transactions up with `getTransaction` in `jsonParsed` encoding.
pub struct RpcChainState {
    client: RpcClient,
    commitment: Commitment,
}

impl RpcChainState {
    pub fn new(rpc_url: impl Into<String>, commitment: Commitment) -> Self {
        Self {
            client: RpcClient::new(rpc_url.into()),
            commitment,
        }
    }
}

#[async_trait]
impl ChainStateProvider for RpcChainState {
    async fn get_transaction(&self, query: TransactionQuery) -> Result<Option<RawTransaction>> {
        tracing::debug!(
            signature = %query.tx_id,
            "Fetching transaction on {}:{}",
            query.chain,
            query.network
        );
        let params = json!([
            query.tx_id,
            {
                "encoding": "jsonParsed",
                "commitment": self.commitment.as_str(),
                "maxSupportedTransactionVersion": 0
            }
        ]);
        self.client
            .send::<Option<RawTransaction>>(RpcRequest::GetTransaction, params)
            .await
            .map_err(|e| ConnectorError::Rpc(e.to_string()))
    }
}
