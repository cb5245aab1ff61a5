use crate::{
    config::Config,
    error::RunError,
    models::{BalanceSnapshot, ReceiptStatus},
    network::NetworkIdentity,
    utils::units::wei_hex_to_native,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde_json::{json, Value};
use std::{num::NonZeroU32, sync::Arc, time::Duration};
use tracing::debug;

/// Read-only chain access, one JSON-RPC node per network. Both operations are
/// single non-blocking queries; repeated polling is the caller's business.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn get_balance(
        &self,
        network: NetworkIdentity,
        address: &str,
    ) -> Result<BalanceSnapshot, RunError>;

    async fn get_receipt(
        &self,
        network: NetworkIdentity,
        tx_hash: &str,
    ) -> Result<ReceiptStatus, RunError>;
}

type DirectRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

pub struct HttpChainClient {
    config: Config,
    http_client: Client,
    rate_limiter: Arc<DirectRateLimiter>,
}

impl HttpChainClient {
    pub fn new(config: Config) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.rpc.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        let quota = Quota::per_second(
            NonZeroU32::new(config.rpc.max_requests_per_second)
                .context("max_requests_per_second must be non-zero")?,
        )
        .allow_burst(NonZeroU32::new(config.rpc.burst_size).context("burst_size must be non-zero")?);
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        Ok(Self {
            config,
            http_client,
            rate_limiter,
        })
    }

    /// The endpoint is resolved from the network at the moment of use; there
    /// is no cached per-network client to go stale after a switch.
    async fn rpc_call(
        &self,
        network: NetworkIdentity,
        method: &str,
        params: Value,
    ) -> Result<Value, RunError> {
        let endpoint = network.rpc_endpoint(&self.config)?.to_string();
        self.rate_limiter.until_ready().await;

        let request_body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .http_client
            .post(&endpoint)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| RunError::RpcUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RunError::RpcUnavailable(format!(
                "RPC request failed with status: {}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| RunError::RpcUnavailable(e.to_string()))?;

        if let Some(error) = body.get("error") {
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown RPC error")
                .to_string();
            // -32602 is the node echoing back a malformed parameter.
            if error.get("code").and_then(|c| c.as_i64()) == Some(-32602) {
                return Err(RunError::InvalidAddress(message));
            }
            return Err(RunError::RpcUnavailable(message));
        }

        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }
}

#[async_trait]
impl ChainRpc for HttpChainClient {
    async fn get_balance(
        &self,
        network: NetworkIdentity,
        address: &str,
    ) -> Result<BalanceSnapshot, RunError> {
        let result = self
            .rpc_call(network, "eth_getBalance", json!([address, "latest"]))
            .await?;

        let hex = result
            .as_str()
            .ok_or_else(|| RunError::RpcUnavailable("Non-string balance result".to_string()))?;
        let value = wei_hex_to_native(hex).map_err(|e| RunError::RpcUnavailable(e.to_string()))?;

        debug!("Balance for {} on {}: {}", address, network, value);
        Ok(BalanceSnapshot {
            network,
            address: address.to_string(),
            value,
            observed_at: chrono::Utc::now(),
        })
    }

    async fn get_receipt(
        &self,
        network: NetworkIdentity,
        tx_hash: &str,
    ) -> Result<ReceiptStatus, RunError> {
        let result = self
            .rpc_call(network, "eth_getTransactionReceipt", json!([tx_hash]))
            .await?;

        if result.is_null() {
            return Ok(ReceiptStatus::Pending);
        }

        let success = result.get("status").and_then(|s| s.as_str()) == Some("0x1");
        debug!("Receipt for {}: success={}", tx_hash, success);
        Ok(ReceiptStatus::Confirmed { success })
    }
}
