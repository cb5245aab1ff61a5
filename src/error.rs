use thiserror::Error;

/// Everything that can sink a run. Variants are compared in tests and
/// replayed across task boundaries, hence `Clone` and `PartialEq`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    #[error("Please select a network")]
    NoNetworkSelected,

    #[error("Unknown network: {0}")]
    InvalidNetwork(String),

    #[error("Wallet address and private key are required")]
    MissingCredentials,

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Not authorized, please log in again")]
    Unauthorized,

    #[error("RPC unavailable: {0}")]
    RpcUnavailable(String),

    #[error("Trade service returned no transaction hash")]
    MissingTransactionHash,

    #[error("{message}")]
    TradeService { message: String },

    #[error("Run cancelled")]
    Cancelled,
}

impl RunError {
    /// Cancellation is the one failure that produces no user-facing
    /// message or notification.
    pub fn is_silent(&self) -> bool {
        matches!(self, RunError::Cancelled)
    }
}
