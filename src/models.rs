use crate::{error::RunError, network::NetworkIdentity};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fmt;

/// One run attempt, constructed fresh per submission and discarded after the
/// run settles. The private key is opaque: redacted from `Debug`, never
/// serialized, never logged.
#[derive(Clone)]
pub struct RunRequest {
    pub network: NetworkIdentity,
    pub address: String,
    pub private_key: String,
}

impl fmt::Debug for RunRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunRequest")
            .field("network", &self.network)
            .field("address", &self.address)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Wire shape of the trade service response body.
#[derive(Debug, Clone, Deserialize)]
pub struct RunResponse {
    pub data: Option<TxBundle>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TxBundle {
    #[serde(rename = "frontrunTxHash")]
    pub frontrun_tx_hash: Option<String>,
    #[serde(rename = "targetTxHash")]
    pub target_tx_hash: Option<String>,
    #[serde(rename = "TakeProfitTxHash")]
    pub take_profit_tx_hash: Option<String>,
}

/// Validated outcome of a trade call. Produced once, immutable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub frontrun_tx_hash: String,
    pub target_tx_hash: String,
    pub take_profit_tx_hash: Option<String>,
    pub service_message: String,
}

impl RunResult {
    /// A response without the primary (frontrun) hash is a failure even when
    /// the transport call itself succeeded.
    pub fn from_response(response: RunResponse) -> Result<Self, RunError> {
        let bundle = response.data.unwrap_or_default();
        let frontrun_tx_hash = match bundle.frontrun_tx_hash {
            Some(hash) if !hash.is_empty() => hash,
            _ => return Err(RunError::MissingTransactionHash),
        };

        Ok(RunResult {
            frontrun_tx_hash,
            target_tx_hash: bundle.target_tx_hash.unwrap_or_default(),
            take_profit_tx_hash: bundle.take_profit_tx_hash.filter(|h| !h.is_empty()),
            service_message: response.message,
        })
    }
}

/// Point-in-time native-unit balance. Two of these (pre-run, post-run) back
/// the profit figure; they are invalidated whenever a new run starts.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceSnapshot {
    pub network: NetworkIdentity,
    pub address: String,
    pub value: Decimal,
    pub observed_at: DateTime<Utc>,
}

/// Chain-reported outcome of a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    Pending,
    Confirmed { success: bool },
}

/// The orchestrator's state machine. Exactly one `RunState` is live at a
/// time; timer handles belong to the orchestrator's run context, not to the
/// state value itself.
#[derive(Debug, Clone, PartialEq)]
pub enum RunState {
    Idle,
    Validating,
    Running { started_at: DateTime<Utc> },
    AwaitingMinimumDuration { remaining_ms: u64 },
    Succeeded { result: RunResult, profit: Option<Decimal> },
    Failed { error: RunError },
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Succeeded { .. } | RunState::Failed { .. })
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self,
            RunState::Validating | RunState::Running { .. } | RunState::AwaitingMinimumDuration { .. }
        )
    }
}
