use std::time::Duration;
use thiserror::Error;

/// Defines the error types surfaced by the connector components.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectorError {
    #[error("Connection not initialized")]
    NotInitialized,

    #[error("RPC call failed: {0}")]
    Rpc(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("Reconnect refused after {attempts} failed attempts")]
    ReconnectExhausted { attempts: u32 },

    #[error("Malformed transaction: {0}")]
    MalformedTransaction(String),

    #[error("Address store error: {0}")]
    Storage(String),

    #[error("Syncing node election error: {0}")]
    Election(String),

    #[error("Event sink closed")]
    SinkClosed,
}

impl ConnectorError {
    /// Returns `true` for failures the owning loop simply retries on its next tick.
    pub fn is_transient(&self) -> bool {
        matches!(self, ConnectorError::Rpc(_) | ConnectorError::Timeout { .. })
    }
}

pub type Result<T, E = ConnectorError> = std::result::Result<T, E>;

/// Runs `fut` under `after`, mapping an elapsed deadline to [`ConnectorError::Timeout`].
pub(crate) async fn with_timeout<T, F>(operation: &'static str, after: Duration, fut: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(res) => res,
        Err(_) => Err(ConnectorError::Timeout { operation, after }),
    }
}
